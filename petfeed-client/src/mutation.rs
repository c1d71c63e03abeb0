use crate::{
    api::{self, CommentId, Error, Gateway, LikeState, NewComment},
    comment::set_liked,
    sequence::FetchKey,
    Completion, Discard, MentionPrefix, Reply, RootComment, ThreadSession, WindowExt,
};

/// The comment a new reply answers to
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParentRef {
    pub id: CommentId,
    /// Set when the parent is itself a reply
    pub root_id: Option<CommentId>,
    pub author_name: String,
}

impl ParentRef {
    pub fn of_root(root: &RootComment) -> ParentRef {
        ParentRef {
            id: root.id,
            root_id: None,
            author_name: root.author.name.clone(),
        }
    }

    pub fn of_reply(reply: &Reply) -> ParentRef {
        ParentRef {
            id: reply.id,
            root_id: Some(reply.root_id),
            author_name: reply.author.name.clone(),
        }
    }

    /// Replies to replies still hang off the root: threads are two levels deep
    pub fn owning_root(&self) -> CommentId {
        self.root_id.unwrap_or(self.id)
    }

    pub fn mention(&self) -> MentionPrefix {
        MentionPrefix::for_author(&self.author_name)
    }
}

#[derive(Clone, Debug)]
pub struct CreateRequest {
    epoch: u64,
    pub comment: NewComment,
}

impl CreateRequest {
    pub async fn send<G: Gateway + ?Sized>(&self, gw: &G) -> Result<api::Comment, Error> {
        gw.post_comment(self.comment.clone()).await
    }
}

#[derive(Clone, Debug)]
pub struct DeleteRequest {
    epoch: u64,
    pub id: CommentId,
}

impl DeleteRequest {
    pub async fn send<G: Gateway + ?Sized>(&self, gw: &G) -> Result<(), Error> {
        gw.delete_comment(self.id).await
    }
}

#[derive(Clone, Debug)]
pub struct LikeRequest {
    epoch: u64,
    pub id: CommentId,
}

impl LikeRequest {
    pub async fn send<G: Gateway + ?Sized>(&self, gw: &G) -> Result<LikeState, Error> {
        gw.toggle_like(self.id).await
    }
}

// Nothing below touches local state before the server confirmed the change.
impl ThreadSession {
    pub fn parent_ref(&self, id: CommentId) -> Option<ParentRef> {
        if let Some(root) = self.window.root(id) {
            return Some(ParentRef::of_root(root));
        }
        self.reply(id).map(ParentRef::of_reply)
    }

    pub fn begin_create_comment(
        &mut self,
        content: &str,
        parent: Option<&ParentRef>,
    ) -> Result<CreateRequest, Error> {
        self.error = None;
        let (comment, typed) = match parent {
            None => (NewComment::root(self.post, String::from(content)), content),
            Some(parent) => {
                let mention = parent.mention();
                // a mention alone is not a reply
                let typed = mention.strip(content);
                let comment = NewComment {
                    content: mention.compose(content),
                    post_id: self.post,
                    parent_id: Some(parent.id),
                    root_id: Some(parent.owning_root()),
                    mention_prefix: Some(mention.into_string()),
                };
                (comment, typed)
            }
        };
        if let Err(err) = api::validate_content(typed).and_then(|()| comment.validate()) {
            self.error = Some(err.message());
            return Err(err);
        }
        Ok(CreateRequest {
            epoch: self.sequencer.epoch(),
            comment,
        })
    }

    /// Start a reply to the loaded comment `parent`, root or reply
    pub fn begin_reply_to(&mut self, content: &str, parent: CommentId) -> Result<CreateRequest, Error> {
        match self.parent_ref(parent) {
            Some(parent) => self.begin_create_comment(content, Some(&parent)),
            None => {
                let err = Error::Validation(String::from("replying to a comment that is not loaded"));
                self.error = Some(err.message());
                Err(err)
            }
        }
    }

    pub fn finish_create_comment(
        &mut self,
        req: CreateRequest,
        res: Result<api::Comment, Error>,
    ) -> Result<Completion, Error> {
        if !self.is_current_epoch(req.epoch) {
            return Ok(Completion::Discarded(Discard::Abandoned));
        }
        let mut created = match res {
            Ok(created) => created,
            Err(err) => {
                self.record_failure("posting comment", &err);
                return Err(err);
            }
        };
        let root_id = match req.comment.root_id {
            None => {
                let id = created.id;
                self.window.prepend(RootComment::from(created));
                tracing::debug!(post=?self.post, comment=?id, "created root comment");
                // a first page fetched before the comment existed would drop it
                self.sequencer.supersede(FetchKey::Window);
                return Ok(Completion::Applied);
            }
            Some(root_id) => root_id,
        };
        // the server may answer with the bare comment: we already know where it goes
        created.parent_id = created.parent_id.or(req.comment.parent_id);
        created.root_id = created.root_id.or(req.comment.root_id);
        if created.mention_prefix.is_none() {
            created.mention_prefix = req.comment.mention_prefix;
        }
        if created.parent_id != req.comment.parent_id {
            tracing::warn!(comment=?created.id, expected=?req.comment.parent_id, got=?created.parent_id, "created reply answers another comment");
            return Ok(Completion::Discarded(Discard::Abandoned));
        }
        let reply = match Reply::from_api(created, root_id) {
            Some(reply) => reply,
            None => return Ok(Completion::Discarded(Discard::Abandoned)),
        };
        let root = match self.window.root_mut(root_id) {
            Some(root) => root,
            None => {
                tracing::debug!(root=?root_id, "created a reply under a root that is gone");
                return Ok(Completion::Discarded(Discard::Abandoned));
            }
        };
        let reply_id = reply.id;
        root.push_reply(reply);
        tracing::debug!(root=?root_id, reply=?reply_id, reply_count = root.reply_count, "created reply");
        // a fetch started before the reply existed would hide it again
        self.loading.remove(&root_id);
        self.sequencer.supersede(FetchKey::Replies(root_id));
        Ok(Completion::Applied)
    }

    pub async fn create_comment<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
        content: &str,
        parent: Option<&ParentRef>,
    ) -> Result<Completion, Error> {
        let req = self.begin_create_comment(content, parent)?;
        let res = req.send(gw).await;
        self.finish_create_comment(req, res)
    }

    pub async fn reply_to<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
        content: &str,
        parent: CommentId,
    ) -> Result<Completion, Error> {
        let req = self.begin_reply_to(content, parent)?;
        let res = req.send(gw).await;
        self.finish_create_comment(req, res)
    }

    pub fn begin_delete_comment(&mut self, id: CommentId) -> DeleteRequest {
        self.error = None;
        DeleteRequest {
            epoch: self.sequencer.epoch(),
            id,
        }
    }

    pub fn finish_delete_comment(
        &mut self,
        req: DeleteRequest,
        res: Result<(), Error>,
    ) -> Result<Completion, Error> {
        if !self.is_current_epoch(req.epoch) {
            return Ok(Completion::Discarded(Discard::Abandoned));
        }
        if let Err(err) = res {
            self.record_failure("deleting comment", &err);
            return Err(err);
        }
        self.deleted.insert(req.id);
        if self.window.remove_root(req.id).is_some() {
            self.loading.remove(&req.id);
            self.sequencer.supersede(FetchKey::Replies(req.id));
            tracing::debug!(comment=?req.id, "deleted root comment");
            return Ok(Completion::Applied);
        }
        match self.window.root_of_reply_mut(req.id) {
            Some(root) => {
                root.remove_reply(req.id);
                tracing::debug!(root=?root.id, reply=?req.id, reply_count = root.reply_count, "deleted reply");
                Ok(Completion::Applied)
            }
            None => {
                tracing::debug!(comment=?req.id, "deleted a comment that is not loaded");
                Ok(Completion::Discarded(Discard::Abandoned))
            }
        }
    }

    pub async fn delete_comment<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
        id: CommentId,
    ) -> Result<Completion, Error> {
        let req = self.begin_delete_comment(id);
        let res = req.send(gw).await;
        self.finish_delete_comment(req, res)
    }

    pub fn begin_toggle_like(&mut self, id: CommentId) -> LikeRequest {
        self.error = None;
        LikeRequest {
            epoch: self.sequencer.epoch(),
            id,
        }
    }

    pub fn finish_toggle_like(
        &mut self,
        req: LikeRequest,
        res: Result<LikeState, Error>,
    ) -> Result<Completion, Error> {
        if !self.is_current_epoch(req.epoch) {
            return Ok(Completion::Discarded(Discard::Abandoned));
        }
        let state = match res {
            Ok(state) => state,
            Err(err) => {
                self.record_failure("toggling like", &err);
                return Err(err);
            }
        };
        let viewer = self.viewer;
        let likes = if self.window.root(req.id).is_some() {
            self.window.root_mut(req.id).map(|root| &mut root.likes)
        } else {
            self.window
                .root_of_reply_mut(req.id)
                .and_then(|root| root.reply_mut(req.id))
                .map(|reply| &mut reply.likes)
        };
        let likes = match likes {
            Some(likes) => likes,
            None => return Ok(Completion::Discarded(Discard::Abandoned)),
        };
        set_liked(likes, viewer, state.liked_by_me);
        if likes.len() as u64 != state.total_likes {
            tracing::debug!(comment=?req.id, known = likes.len(), total = state.total_likes, "like count differs from server");
        }
        Ok(Completion::Applied)
    }

    pub async fn toggle_like<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
        id: CommentId,
    ) -> Result<Completion, Error> {
        let req = self.begin_toggle_like(id);
        let res = req.send(gw).await;
        self.finish_toggle_like(req, res)
    }
}
