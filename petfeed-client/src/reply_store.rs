use std::collections::HashSet;

use crate::{
    api::{self, CommentId, Error, Gateway, ReplyPage},
    page_cache::PageMode,
    sequence::{FetchKey, Ticket},
    Completion, Discard, Reply, RootComment, ThreadSession, WindowExt,
};

fn accept_replies(
    root: CommentId,
    items: Vec<api::Comment>,
    skip: &HashSet<CommentId>,
    seen: &mut HashSet<CommentId>,
) -> Vec<Reply> {
    items
        .into_iter()
        .filter(|c| !skip.contains(&c.id))
        .filter_map(|c| Reply::from_api(c, root))
        .filter(|r| seen.insert(r.id))
        .collect()
}

impl RootComment {
    /// Whether the server has replies that are not loaded yet
    pub fn has_more_replies(&self) -> bool {
        (self.replies.len() as u64) < u64::from(self.reply_count)
    }

    /// Page to ask for next, assuming every page so far was `limit` long
    pub fn next_reply_page(&self, limit: u32) -> u32 {
        let loaded = u32::try_from(self.replies.len()).unwrap_or(u32::MAX);
        loaded / limit.max(1) + 1
    }

    /// Never let the count drop under what is actually loaded
    pub(crate) fn recount(&mut self) {
        let loaded = u32::try_from(self.replies.len()).unwrap_or(u32::MAX);
        if loaded > self.reply_count {
            tracing::debug!(root=?self.id, loaded, reply_count = self.reply_count, "reply count behind loaded replies");
            self.reply_count = loaded;
        }
    }

    pub(crate) fn replace_replies(
        &mut self,
        items: Vec<api::Comment>,
        page: u32,
        skip: &HashSet<CommentId>,
    ) {
        self.replies = accept_replies(self.id, items, skip, &mut HashSet::new());
        self.replies_loaded = true;
        if self.replies.is_empty() {
            if page <= 1 {
                self.reply_count = 0;
            }
            self.is_expanded = false;
        } else {
            self.is_expanded = true;
            self.recount();
        }
    }

    pub(crate) fn append_replies(
        &mut self,
        items: Vec<api::Comment>,
        skip: &HashSet<CommentId>,
    ) -> usize {
        let mut seen = self.replies.iter().map(|r| r.id).collect::<HashSet<_>>();
        let new = accept_replies(self.id, items, skip, &mut seen);
        let added = new.len();
        self.replies.extend(new);
        self.recount();
        added
    }

    /// Add a reply the user just created, showing it right away
    pub(crate) fn push_reply(&mut self, reply: Reply) {
        if !self.has_reply(reply.id) {
            self.replies.push(reply);
            self.reply_count = self.reply_count.saturating_add(1);
        }
        self.is_expanded = true;
    }

    pub(crate) fn remove_reply(&mut self, id: CommentId) -> Option<Reply> {
        let pos = self.replies.iter().position(|r| r.id == id)?;
        let reply = self.replies.remove(pos);
        self.reply_count = self.reply_count.saturating_sub(1);
        if self.replies.is_empty() {
            self.is_expanded = false;
        }
        Some(reply)
    }
}

/// An in-flight fetch of one root's replies
#[derive(Clone, Debug)]
pub struct ReplyRequest {
    ticket: Ticket,
    pub root: CommentId,
    pub page: u32,
    pub limit: u32,
    pub mode: PageMode,
}

impl ReplyRequest {
    pub async fn send<G: Gateway + ?Sized>(
        &self,
        gw: &G,
    ) -> Result<ReplyPage<api::Comment>, Error> {
        gw.fetch_replies(self.root, self.page, self.limit).await
    }
}

impl ThreadSession {
    /// False for unknown roots
    pub fn has_more(&self, root: CommentId) -> bool {
        self.window
            .root(root)
            .map(|r| r.has_more_replies())
            .unwrap_or(false)
    }

    pub fn next_reply_page(&self, root: CommentId, limit: u32) -> Option<u32> {
        self.window.root(root).map(|r| r.next_reply_page(limit))
    }

    /// Start loading the replies of `root` from scratch
    ///
    /// Returns None when there is nothing to fetch: unknown root, no replies on
    /// the server, or a first-page fetch already running for it.
    pub fn begin_load_replies(
        &mut self,
        root: CommentId,
        page: u32,
        limit: u32,
    ) -> Option<ReplyRequest> {
        self.error = None;
        let r = self.window.root(root)?;
        if r.reply_count == 0 || self.loading.contains_key(&root) {
            return None;
        }
        let ticket = self.sequencer.issue(FetchKey::Replies(root));
        self.loading.insert(root, ticket);
        Some(ReplyRequest {
            ticket,
            root,
            page,
            limit: limit.max(1),
            mode: PageMode::Replace,
        })
    }

    /// Start loading one more page of replies for `root`
    pub fn begin_load_more_replies(
        &mut self,
        root: CommentId,
        page: u32,
        limit: u32,
    ) -> Option<ReplyRequest> {
        self.error = None;
        if !self.window.root(root)?.has_more_replies() {
            return None;
        }
        Some(ReplyRequest {
            ticket: self.sequencer.issue(FetchKey::Replies(root)),
            root,
            page,
            limit: limit.max(1),
            mode: PageMode::Append,
        })
    }

    pub fn finish_replies(
        &mut self,
        req: ReplyRequest,
        res: Result<ReplyPage<api::Comment>, Error>,
    ) -> Result<Completion, Error> {
        if self.loading.get(&req.root) == Some(&req.ticket) {
            self.loading.remove(&req.root);
        }
        if let Some(discard) = self.freshness("reply page", &req.ticket) {
            return Ok(Completion::Discarded(discard));
        }
        let page = match res {
            Ok(page) => page,
            Err(err) => {
                self.record_failure("loading replies", &err);
                return Err(err);
            }
        };
        let root = match self.window.root_mut(req.root) {
            Some(root) => root,
            None => {
                tracing::debug!(root=?req.root, "replies arrived for a root that is gone");
                return Ok(Completion::Discarded(Discard::Abandoned));
            }
        };
        match req.mode {
            PageMode::Replace => {
                root.replace_replies(page.items, req.page, &self.deleted);
                tracing::debug!(root=?req.root, num_replies = root.replies.len(), reply_count = root.reply_count, "loaded replies");
            }
            PageMode::Append => {
                let added = root.append_replies(page.items, &self.deleted);
                tracing::debug!(root=?req.root, page = req.page, added, "loaded more replies");
            }
        }
        Ok(Completion::Applied)
    }

    pub async fn load_replies<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
        root: CommentId,
        page: u32,
        limit: u32,
    ) -> Result<Completion, Error> {
        let req = match self.begin_load_replies(root, page, limit) {
            Some(req) => req,
            None => return Ok(Completion::Skipped),
        };
        let res = req.send(gw).await;
        self.finish_replies(req, res)
    }

    pub async fn load_more_replies<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
        root: CommentId,
        page: u32,
        limit: u32,
    ) -> Result<Completion, Error> {
        let req = match self.begin_load_more_replies(root, page, limit) {
            Some(req) => req,
            None => return Ok(Completion::Skipped),
        };
        let res = req.send(gw).await;
        self.finish_replies(req, res)
    }

    /// Load the next reply page of `root` with the configured page size
    pub async fn load_next_replies<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
        root: CommentId,
    ) -> Result<Completion, Error> {
        let limit = self.config.reply_page_size;
        let page = match self.next_reply_page(root, limit) {
            Some(page) => page,
            None => return Ok(Completion::Skipped),
        };
        self.load_more_replies(gw, root, page, limit).await
    }
}
