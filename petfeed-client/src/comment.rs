use std::collections::HashSet;

use crate::api::{self, Author, CommentId, PostId, Time, UserId};

/// A comment attached directly to a post, along with what the client loaded
/// of its replies
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RootComment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: Author,
    pub content: String,
    pub created_at: Time,
    pub updated_at: Time,
    pub likes: HashSet<UserId>,

    /// Total reported by the server, loaded or not
    pub reply_count: u32,

    /// Loaded replies, in page order
    pub replies: Vec<Reply>,
    pub is_expanded: bool,

    /// Whether the first reply page was ever fetched
    pub replies_loaded: bool,
}

/// A comment living under a root comment, whichever comment it answers
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reply {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: Author,
    pub content: String,
    pub created_at: Time,
    pub updated_at: Time,
    pub likes: HashSet<UserId>,

    /// Immediate parent, either the root or another reply of the same root
    pub parent_id: CommentId,
    pub root_id: CommentId,
    pub mention_prefix: Option<String>,
}

impl From<api::Comment> for RootComment {
    fn from(c: api::Comment) -> RootComment {
        RootComment {
            id: c.id,
            post_id: c.post_id,
            author: c.author,
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
            likes: c.likes,
            reply_count: c.reply_count,
            replies: Vec::new(),
            is_expanded: false,
            replies_loaded: false,
        }
    }
}

impl Reply {
    /// Returns None if the server sent something that cannot live under `root`
    pub fn from_api(c: api::Comment, root: CommentId) -> Option<Reply> {
        let parent_id = match (c.parent_id, c.root_id) {
            (Some(parent), Some(r)) if r == root && parent != c.id => parent,
            _ => {
                tracing::warn!(comment=?c.id, ?root, parent=?c.parent_id, got_root=?c.root_id, "dropping reply that does not belong to its root");
                return None;
            }
        };
        let mention_prefix = match c.mention_prefix {
            Some(p) if !p.is_empty() && c.content.starts_with(&p) => Some(p),
            Some(p) => {
                tracing::debug!(comment=?c.id, prefix=?p, "ignoring mention prefix that does not start the content");
                None
            }
            None => None,
        };
        Some(Reply {
            id: c.id,
            post_id: c.post_id,
            author: c.author,
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
            likes: c.likes,
            parent_id,
            root_id: root,
            mention_prefix,
        })
    }

    pub fn answers_root(&self) -> bool {
        self.parent_id == self.root_id
    }
}

impl RootComment {
    /// Refresh the server-owned fields, keeping what was loaded client-side
    pub fn refresh_from(&mut self, c: api::Comment) {
        self.author = c.author;
        self.content = c.content;
        self.updated_at = c.updated_at;
        self.likes = c.likes;
        self.reply_count = c.reply_count;
        self.recount();
    }

    pub fn reply(&self, id: CommentId) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == id)
    }

    pub fn reply_mut(&mut self, id: CommentId) -> Option<&mut Reply> {
        self.replies.iter_mut().find(|r| r.id == id)
    }

    pub fn has_reply(&self, id: CommentId) -> bool {
        self.replies.iter().any(|r| r.id == id)
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }
}

pub(crate) fn set_liked(likes: &mut HashSet<UserId>, viewer: UserId, liked: bool) {
    if liked {
        likes.insert(viewer);
    } else {
        likes.remove(&viewer);
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::collections::HashSet;

    use chrono::Utc;

    use crate::api::{self, Author, CommentId, PostId, UserId, Uuid};

    pub fn author(name: &str) -> Author {
        Author {
            id: UserId(Uuid::new_v4()),
            name: String::from(name),
        }
    }

    pub fn root(post: PostId, content: &str, reply_count: u32) -> api::Comment {
        api::Comment {
            id: CommentId(Uuid::new_v4()),
            post_id: post,
            author: author("Alice"),
            content: String::from(content),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            likes: HashSet::new(),
            reply_count,
            parent_id: None,
            root_id: None,
            mention_prefix: None,
        }
    }

    pub fn reply(post: PostId, root: CommentId, parent: CommentId, content: &str) -> api::Comment {
        api::Comment {
            parent_id: Some(parent),
            root_id: Some(root),
            ..self::root(post, content, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_util::*, *};
    use crate::api::Uuid;

    #[test]
    fn reply_must_belong_to_root() {
        let post = PostId::stub();
        let root_a = CommentId(Uuid::new_v4());
        let root_b = CommentId(Uuid::new_v4());
        assert!(Reply::from_api(reply(post, root_a, root_a, "hi"), root_a).is_some());
        assert!(Reply::from_api(reply(post, root_a, root_a, "hi"), root_b).is_none());

        let mut orphan = reply(post, root_a, root_a, "hi");
        orphan.parent_id = None;
        assert!(Reply::from_api(orphan, root_a).is_none());
    }

    #[test]
    fn mention_prefix_must_start_content() {
        let post = PostId::stub();
        let root = CommentId(Uuid::new_v4());
        let mut c = reply(post, root, root, "@Alice woof");
        c.mention_prefix = Some(String::from("@Alice "));
        let r = Reply::from_api(c.clone(), root).unwrap();
        assert_eq!(r.mention_prefix.as_deref(), Some("@Alice "));

        c.mention_prefix = Some(String::from("@Bob "));
        let r = Reply::from_api(c, root).unwrap();
        assert_eq!(r.mention_prefix, None);
    }

    #[test]
    fn refresh_keeps_loaded_replies() {
        let post = PostId::stub();
        let wire = root(post, "first", 1);
        let mut r = RootComment::from(wire.clone());
        r.replies
            .push(Reply::from_api(reply(post, r.id, r.id, "a"), r.id).unwrap());
        r.is_expanded = true;
        r.refresh_from(api::Comment {
            content: String::from("edited"),
            reply_count: 0,
            ..wire
        });
        assert_eq!(r.content, "edited");
        assert_eq!(r.replies.len(), 1);
        assert_eq!(r.reply_count, 1);
        assert!(r.is_expanded);
    }
}
