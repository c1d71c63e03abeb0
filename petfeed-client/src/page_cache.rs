use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    api::{self, CommentId, Error, Gateway, PageWindow, PostId},
    sequence::{FetchKey, Ticket},
    Completion, RootComment, ThreadSession,
};

/// Merging of fetched root comment pages into the window shown to the user
pub trait WindowExt {
    fn root(&self, id: CommentId) -> Option<&RootComment>;
    fn root_mut(&mut self, id: CommentId) -> Option<&mut RootComment>;

    /// The root whose loaded replies contain `reply`
    fn root_of_reply_mut(&mut self, reply: CommentId) -> Option<&mut RootComment>;

    /// Replace the window with `page`, keeping the client-side state of roots
    /// that are still there. Returns the ids of the roots that went away.
    fn replace_with(
        &mut self,
        page: PageWindow<api::Comment>,
        post: PostId,
        skip: &HashSet<CommentId>,
    ) -> Vec<CommentId>;

    /// Append the roots of `page` that are not in the window yet. Returns how
    /// many were added.
    fn append_page(
        &mut self,
        page: PageWindow<api::Comment>,
        post: PostId,
        skip: &HashSet<CommentId>,
    ) -> usize;

    /// Returns false if the root was already there
    fn prepend(&mut self, root: RootComment) -> bool;

    fn remove_root(&mut self, id: CommentId) -> Option<Arc<RootComment>>;

    fn has_more_roots(&self) -> bool;
    fn next_root_page(&self) -> u32;
}

fn accept_roots(
    items: Vec<api::Comment>,
    post: PostId,
    skip: &HashSet<CommentId>,
    seen: &mut HashSet<CommentId>,
) -> Vec<api::Comment> {
    items
        .into_iter()
        .filter(|c| {
            if c.is_reply() {
                tracing::warn!(comment=?c.id, "got a reply in a root comment page");
                return false;
            }
            if c.post_id != post {
                tracing::warn!(comment=?c.id, ?post, got_post=?c.post_id, "got a root comment for another post");
                return false;
            }
            !skip.contains(&c.id) && seen.insert(c.id)
        })
        .collect()
}

impl WindowExt for PageWindow<Arc<RootComment>> {
    fn root(&self, id: CommentId) -> Option<&RootComment> {
        self.items.iter().find(|r| r.id == id).map(|r| r.as_ref())
    }

    fn root_mut(&mut self, id: CommentId) -> Option<&mut RootComment> {
        self.items
            .iter_mut()
            .find(|r| r.id == id)
            .map(Arc::make_mut)
    }

    fn root_of_reply_mut(&mut self, reply: CommentId) -> Option<&mut RootComment> {
        self.items
            .iter_mut()
            .find(|r| r.has_reply(reply))
            .map(Arc::make_mut)
    }

    fn replace_with(
        &mut self,
        page: PageWindow<api::Comment>,
        post: PostId,
        skip: &HashSet<CommentId>,
    ) -> Vec<CommentId> {
        let mut previous = std::mem::take(&mut self.items)
            .into_iter()
            .map(|r| (r.id, r))
            .collect::<HashMap<_, _>>();
        let mut seen = HashSet::new();
        self.items = accept_roots(page.items, post, skip, &mut seen)
            .into_iter()
            .map(|c| match previous.remove(&c.id) {
                Some(mut kept) => {
                    Arc::make_mut(&mut kept).refresh_from(c);
                    kept
                }
                None => Arc::new(RootComment::from(c)),
            })
            .collect();
        self.page = page.page;
        self.total = page.total;
        self.total_pages = page.total_pages;
        previous.into_keys().collect()
    }

    fn append_page(
        &mut self,
        page: PageWindow<api::Comment>,
        post: PostId,
        skip: &HashSet<CommentId>,
    ) -> usize {
        let mut seen = self.items.iter().map(|r| r.id).collect::<HashSet<_>>();
        let before = self.items.len();
        self.items.extend(
            accept_roots(page.items, post, skip, &mut seen)
                .into_iter()
                .map(|c| Arc::new(RootComment::from(c))),
        );
        self.page = page.page;
        self.total = page.total;
        self.total_pages = page.total_pages;
        self.items.len() - before
    }

    fn prepend(&mut self, root: RootComment) -> bool {
        if self.items.iter().any(|r| r.id == root.id) {
            return false;
        }
        self.items.insert(0, Arc::new(root));
        true
    }

    fn remove_root(&mut self, id: CommentId) -> Option<Arc<RootComment>> {
        let pos = self.items.iter().position(|r| r.id == id)?;
        Some(self.items.remove(pos))
    }

    fn has_more_roots(&self) -> bool {
        self.page < self.total_pages
    }

    fn next_root_page(&self) -> u32 {
        self.page + 1
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageMode {
    Replace,
    Append,
}

/// An in-flight fetch of root comments
#[derive(Clone, Debug)]
pub struct RootPageRequest {
    ticket: Ticket,
    post: PostId,
    pub page: u32,
    pub limit: u32,
    pub mode: PageMode,
}

impl RootPageRequest {
    pub async fn send<G: Gateway + ?Sized>(
        &self,
        gw: &G,
    ) -> Result<PageWindow<api::Comment>, Error> {
        gw.fetch_root_comments(self.post, self.page, self.limit)
            .await
    }
}

impl ThreadSession {
    fn begin_root_page(&mut self, page: u32, limit: u32, mode: PageMode) -> RootPageRequest {
        self.error = None;
        RootPageRequest {
            ticket: self.sequencer.issue(FetchKey::Window),
            post: self.post,
            page,
            limit: limit.max(1),
            mode,
        }
    }

    pub fn begin_load_first_page(&mut self, limit: u32) -> RootPageRequest {
        self.begin_root_page(1, limit, PageMode::Replace)
    }

    /// Callers must not start this while another fetch for the window is
    /// pending: only the latest one would be applied.
    pub fn begin_load_next_page(&mut self, page: u32, limit: u32) -> RootPageRequest {
        self.begin_root_page(page, limit, PageMode::Append)
    }

    pub fn finish_root_page(
        &mut self,
        req: RootPageRequest,
        res: Result<PageWindow<api::Comment>, Error>,
    ) -> Result<Completion, Error> {
        if let Some(discard) = self.freshness("root page", &req.ticket) {
            return Ok(Completion::Discarded(discard));
        }
        let page = match res {
            Ok(page) => page,
            Err(err) => {
                self.record_failure("loading comments", &err);
                return Err(err);
            }
        };
        match req.mode {
            PageMode::Replace => {
                let dropped = self.window.replace_with(page, self.post, &self.deleted);
                for root in dropped {
                    self.loading.remove(&root);
                    self.sequencer.supersede(FetchKey::Replies(root));
                }
                tracing::debug!(post=?self.post, num_roots = self.window.items.len(), total = self.window.total, "replaced comment window");
            }
            PageMode::Append => {
                let added = self.window.append_page(page, self.post, &self.deleted);
                tracing::debug!(post=?self.post, page = req.page, added, "appended comment page");
            }
        }
        Ok(Completion::Applied)
    }

    pub async fn load_first_page<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
        limit: u32,
    ) -> Result<Completion, Error> {
        let req = self.begin_load_first_page(limit);
        let res = req.send(gw).await;
        self.finish_root_page(req, res)
    }

    pub async fn load_next_page<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
        page: u32,
        limit: u32,
    ) -> Result<Completion, Error> {
        let req = self.begin_load_next_page(page, limit);
        let res = req.send(gw).await;
        self.finish_root_page(req, res)
    }

    /// Reload the first page with the configured page size
    pub async fn refresh<G: Gateway + ?Sized>(&mut self, gw: &G) -> Result<Completion, Error> {
        let limit = self.config.root_page_size;
        self.load_first_page(gw, limit).await
    }

    /// Fetch the page after the last loaded one, if the server has more
    pub async fn load_more_roots<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
    ) -> Result<Completion, Error> {
        if self.window.page > 0 && !self.window.has_more_roots() {
            return Ok(Completion::Skipped);
        }
        let (page, limit) = (self.window.next_root_page(), self.config.root_page_size);
        self.load_next_page(gw, page, limit).await
    }
}
