use std::collections::HashSet;

use uuid::Uuid;

use crate::{Author, Time, UserId, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn stub() -> PostId {
        PostId(STUB_UUID)
    }
}

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

/// A comment as the server sends it, be it a root comment or a reply
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: Author,
    pub content: String,
    pub created_at: Time,
    pub updated_at: Time,

    /// Set of users who liked this comment
    #[serde(default)]
    pub likes: HashSet<UserId>,

    /// Total number of replies the server knows of, only meaningful on root comments
    #[serde(default)]
    pub reply_count: u32,

    /// Immediate parent, None for root comments
    #[serde(default)]
    pub parent_id: Option<CommentId>,

    /// Root comment owning this reply, None for root comments
    #[serde(default)]
    pub root_id: Option<CommentId>,

    #[serde(default)]
    pub mention_prefix: Option<String>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.root_id.is_some()
    }
}

/// Body of a comment creation request
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub content: String,
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub root_id: Option<CommentId>,
    pub mention_prefix: Option<String>,
}

impl NewComment {
    pub fn root(post_id: PostId, content: String) -> NewComment {
        NewComment {
            content,
            post_id,
            parent_id: None,
            root_id: None,
            mention_prefix: None,
        }
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        crate::validate_content(&self.content)?;
        match (self.parent_id, self.root_id) {
            (None, None) | (Some(_), Some(_)) => Ok(()),
            _ => Err(crate::Error::Validation(String::from(
                "a reply needs both a parent and a root",
            ))),
        }
    }
}

/// Server answer to a like toggle, from the point of view of the acting user
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LikeState {
    pub id: CommentId,
    pub liked_by_me: bool,
    pub total_likes: u64,
}
