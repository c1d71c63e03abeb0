use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod comment;
pub use comment::{Comment, CommentId, LikeState, NewComment, PostId};

mod error;
pub use error::Error;

mod gateway;
pub use gateway::Gateway;

mod page;
pub use page::{PageWindow, ReplyPage};

mod user;
pub use user::{Author, AuthToken, UserId};

pub fn validate_content(content: &str) -> Result<(), Error> {
    if content.trim().is_empty() {
        return Err(Error::Validation(String::from("comment content is empty")));
    }
    if content.contains('\0') {
        return Err(Error::Validation(String::from(
            "null byte in comment content is not allowed",
        )));
    }
    Ok(())
}
