use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use petfeed_api::{
    Author, Comment, CommentId, Error, Gateway, LikeState, NewComment, PageWindow, PostId,
    ReplyPage, UserId, Uuid,
};

/// In-memory source of truth for comment threads
///
/// Root comments are listed newest first, replies oldest first.
#[derive(Debug, Default)]
pub struct MockServer {
    users: BTreeMap<UserId, String>,
    comments: BTreeMap<CommentId, Stored>,
    next_order: u64,
    failures: VecDeque<Error>,
}

#[derive(Debug)]
struct Stored {
    comment: Comment,
    // creation order, timestamps can collide
    order: u64,
}

fn bad_request(message: &str) -> Error {
    Error::Server {
        status: 400,
        message: String::from(message),
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    pub fn shared() -> Arc<Mutex<MockServer>> {
        Arc::new(Mutex::new(MockServer::new()))
    }

    pub fn admin_create_user(&mut self, name: &str) -> UserId {
        let id = UserId(Uuid::new_v4());
        self.users.insert(id, String::from(name));
        id
    }

    /// Make the next API call fail with `err`, calls after it are served again.
    /// Seeding and admin helpers are not affected.
    pub fn fail_next(&mut self, err: Error) {
        self.failures.push_back(err);
    }

    pub fn seed_root(&mut self, post: PostId, author: UserId, content: &str) -> Result<CommentId, Error> {
        self.insert(author, NewComment::root(post, String::from(content)))
            .map(|c| c.id)
    }

    /// Reply to `parent` the way clients do, quoting its author
    pub fn seed_reply(
        &mut self,
        parent: CommentId,
        author: UserId,
        text: &str,
    ) -> Result<CommentId, Error> {
        let p = &self
            .comments
            .get(&parent)
            .ok_or_else(|| Error::not_found("parent comment"))?
            .comment;
        let prefix = format!("@{} ", p.author.name);
        let req = NewComment {
            content: format!("{prefix}{text}"),
            post_id: p.post_id,
            parent_id: Some(parent),
            root_id: Some(p.root_id.unwrap_or(parent)),
            mention_prefix: Some(prefix),
        };
        self.insert(author, req).map(|c| c.id)
    }

    /// Delete as a moderator would, without going through failure injection
    pub fn admin_delete(&mut self, id: CommentId) -> Result<(), Error> {
        self.remove(id)
    }

    pub fn comment(&self, id: CommentId) -> Option<&Comment> {
        self.comments.get(&id).map(|s| &s.comment)
    }

    /// Root comments of `post`, newest first
    pub fn root_ids(&self, post: PostId) -> Vec<CommentId> {
        let mut roots = self
            .comments
            .values()
            .filter(|s| s.comment.post_id == post && !s.comment.is_reply())
            .collect::<Vec<_>>();
        roots.sort_unstable_by_key(|s| std::cmp::Reverse(s.order));
        roots.into_iter().map(|s| s.comment.id).collect()
    }

    /// Replies under `root`, oldest first
    pub fn reply_ids(&self, root: CommentId) -> Vec<CommentId> {
        let mut replies = self
            .comments
            .values()
            .filter(|s| s.comment.root_id == Some(root))
            .collect::<Vec<_>>();
        replies.sort_unstable_by_key(|s| s.order);
        replies.into_iter().map(|s| s.comment.id).collect()
    }

    fn take_failure(&mut self) -> Result<(), Error> {
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn page_of(&self, ids: Vec<CommentId>, page: u32, limit: u32) -> (Vec<Comment>, u64) {
        let total = ids.len() as u64;
        let limit = limit.max(1) as usize;
        let skip = (page.max(1) as usize - 1).saturating_mul(limit);
        let items = ids
            .into_iter()
            .skip(skip)
            .take(limit)
            .filter_map(|id| self.comment(id).cloned())
            .collect();
        (items, total)
    }

    pub fn fetch_root_comments(
        &mut self,
        post: PostId,
        page: u32,
        limit: u32,
    ) -> Result<PageWindow<Comment>, Error> {
        self.take_failure()?;
        let (items, total) = self.page_of(self.root_ids(post), page, limit);
        Ok(PageWindow {
            items,
            page,
            total,
            total_pages: PageWindow::<Comment>::total_pages_for(total, limit),
        })
    }

    pub fn fetch_replies(
        &mut self,
        root: CommentId,
        page: u32,
        limit: u32,
    ) -> Result<ReplyPage<Comment>, Error> {
        self.take_failure()?;
        if self.comment(root).map(|c| c.is_reply()) != Some(false) {
            return Err(Error::not_found("root comment"));
        }
        let (items, _) = self.page_of(self.reply_ids(root), page, limit);
        Ok(ReplyPage {
            items,
            page: None,
            total: None,
        })
    }

    pub fn post_comment(&mut self, user: UserId, c: NewComment) -> Result<Comment, Error> {
        self.take_failure()?;
        self.insert(user, c)
    }

    fn insert(&mut self, user: UserId, c: NewComment) -> Result<Comment, Error> {
        let name = self.users.get(&user).cloned().ok_or(Error::Server {
            status: 403,
            message: String::from("permission denied"),
        })?;
        c.validate().map_err(|e| bad_request(&e.message()))?;
        if let (Some(parent), Some(root)) = (c.parent_id, c.root_id) {
            let parent = self
                .comment(parent)
                .ok_or_else(|| Error::not_found("parent comment"))?;
            if parent.root_id.unwrap_or(parent.id) != root || parent.post_id != c.post_id {
                return Err(bad_request("reply root does not match its parent"));
            }
            if let Some(prefix) = &c.mention_prefix {
                if !c.content.starts_with(prefix.as_str()) {
                    return Err(bad_request("mention prefix does not start the content"));
                }
            }
            if let Some(root) = self.comments.get_mut(&root) {
                root.comment.reply_count += 1;
            }
        }
        let now = Utc::now();
        let comment = Comment {
            id: CommentId(Uuid::new_v4()),
            post_id: c.post_id,
            author: Author { id: user, name },
            content: c.content,
            created_at: now,
            updated_at: now,
            likes: HashSet::new(),
            reply_count: 0,
            parent_id: c.parent_id,
            root_id: c.root_id,
            mention_prefix: c.mention_prefix,
        };
        self.next_order += 1;
        self.comments.insert(
            comment.id,
            Stored {
                comment: comment.clone(),
                order: self.next_order,
            },
        );
        Ok(comment)
    }

    pub fn delete_comment(&mut self, id: CommentId) -> Result<(), Error> {
        self.take_failure()?;
        self.remove(id)
    }

    fn remove(&mut self, id: CommentId) -> Result<(), Error> {
        let removed = self
            .comments
            .remove(&id)
            .ok_or_else(|| Error::not_found("comment"))?
            .comment;
        match removed.root_id {
            None => self.comments.retain(|_, s| s.comment.root_id != Some(id)),
            Some(root) => {
                if let Some(root) = self.comments.get_mut(&root) {
                    root.comment.reply_count = root.comment.reply_count.saturating_sub(1);
                }
            }
        }
        Ok(())
    }

    pub fn toggle_like(&mut self, user: UserId, id: CommentId) -> Result<LikeState, Error> {
        self.take_failure()?;
        let likes = &mut self
            .comments
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("comment"))?
            .comment
            .likes;
        let liked_by_me = !likes.remove(&user);
        if liked_by_me {
            likes.insert(user);
        }
        Ok(LikeState {
            id,
            liked_by_me,
            total_likes: likes.len() as u64,
        })
    }
}

/// A user's connection to a shared `MockServer`
#[derive(Clone, Debug)]
pub struct MockGateway {
    server: Arc<Mutex<MockServer>>,
    user: UserId,
}

impl MockGateway {
    pub fn connect(server: Arc<Mutex<MockServer>>, user: UserId) -> MockGateway {
        MockGateway { server, user }
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn fetch_root_comments(
        &self,
        post: PostId,
        page: u32,
        limit: u32,
    ) -> Result<PageWindow<Comment>, Error> {
        self.server.lock().fetch_root_comments(post, page, limit)
    }

    async fn fetch_replies(
        &self,
        root: CommentId,
        page: u32,
        limit: u32,
    ) -> Result<ReplyPage<Comment>, Error> {
        self.server.lock().fetch_replies(root, page, limit)
    }

    async fn post_comment(&self, comment: NewComment) -> Result<Comment, Error> {
        self.server.lock().post_comment(self.user, comment)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), Error> {
        self.server.lock().delete_comment(id)
    }

    async fn toggle_like(&self, id: CommentId) -> Result<LikeState, Error> {
        self.server.lock().toggle_like(self.user, id)
    }
}
