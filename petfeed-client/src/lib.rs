mod comment;
pub use comment::{Reply, RootComment};

mod config;
pub use config::{SessionConfig, DEFAULT_REPLY_PAGE_SIZE, DEFAULT_ROOT_PAGE_SIZE};

mod expansion;
pub use expansion::{Expansion, Toggle};

pub mod mention;
pub use mention::{MentionPrefix, Rendered};

mod mutation;
pub use mutation::{CreateRequest, DeleteRequest, LikeRequest, ParentRef};

mod page_cache;
pub use page_cache::{PageMode, RootPageRequest, WindowExt};

mod reply_store;
pub use reply_store::ReplyRequest;

pub mod sequence;

mod session;
pub use session::{Completion, Discard, ThreadSession, ThreadSnapshot};

#[cfg(test)]
mod fuzz;

pub mod api {
    pub use petfeed_api::*;
}

pub mod prelude {
    pub use crate::WindowExt;
}
