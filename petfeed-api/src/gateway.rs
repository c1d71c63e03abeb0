use async_trait::async_trait;

use crate::{Comment, CommentId, Error, LikeState, NewComment, PageWindow, PostId, ReplyPage};

/// Remote source of truth for a post's discussion
///
/// Implementations handle transport, serialization and authentication. Methods
/// take `&self` so that several requests can be in flight at the same time.
#[async_trait]
pub trait Gateway {
    async fn fetch_root_comments(
        &self,
        post: PostId,
        page: u32,
        limit: u32,
    ) -> Result<PageWindow<Comment>, Error>;

    async fn fetch_replies(
        &self,
        root: CommentId,
        page: u32,
        limit: u32,
    ) -> Result<ReplyPage<Comment>, Error>;

    async fn post_comment(&self, comment: NewComment) -> Result<Comment, Error>;

    async fn delete_comment(&self, id: CommentId) -> Result<(), Error>;

    async fn toggle_like(&self, id: CommentId) -> Result<LikeState, Error>;
}
