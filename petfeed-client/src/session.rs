use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use crate::{
    api::{CommentId, Error, PageWindow, PostId, UserId},
    sequence::{Freshness, Sequencer, Ticket},
    Reply, RootComment, SessionConfig, WindowExt,
};

/// Discussion state for one post detail view
///
/// One session is built when the view opens and dropped (or `reset`) when it
/// closes. Requests still in flight at that point get discarded on completion.
#[derive(Clone, Debug)]
pub struct ThreadSession {
    pub(crate) post: PostId,
    pub(crate) viewer: UserId,
    pub(crate) config: SessionConfig,
    pub(crate) window: PageWindow<Arc<RootComment>>,

    /// Roots fetching their first reply page, with the request doing it
    pub(crate) loading: HashMap<CommentId, Ticket>,

    /// Comments deleted during this session, filtered out of later fetches
    pub(crate) deleted: HashSet<CommentId>,
    pub(crate) error: Option<String>,
    pub(crate) sequencer: Sequencer,
}

/// Read-only view handed to the UI layer
#[derive(Clone, Debug, PartialEq)]
pub struct ThreadSnapshot {
    pub root_window: PageWindow<Arc<RootComment>>,
    pub loading: BTreeSet<CommentId>,
    pub error_message: Option<String>,
}

/// What happened to a request's result
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Completion {
    Applied,
    /// Nothing needed fetching
    Skipped,
    Discarded(Discard),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Discard {
    /// A newer request for the same data was issued
    Stale,
    /// The session was reset, or the comment it was about is gone
    Abandoned,
}

impl ThreadSession {
    pub fn new(post: PostId, viewer: UserId, config: SessionConfig) -> Result<ThreadSession, Error> {
        config.validate()?;
        Ok(ThreadSession {
            post,
            viewer,
            config,
            window: PageWindow::empty(),
            loading: HashMap::new(),
            deleted: HashSet::new(),
            error: None,
            sequencer: Sequencer::default(),
        })
    }

    pub fn post(&self) -> PostId {
        self.post
    }

    pub fn viewer(&self) -> UserId {
        self.viewer
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn window(&self) -> &PageWindow<Arc<RootComment>> {
        &self.window
    }

    pub fn root(&self, id: CommentId) -> Option<&RootComment> {
        self.window.root(id)
    }

    /// Find a reply in any loaded reply list
    pub fn reply(&self, id: CommentId) -> Option<&Reply> {
        self.window.items.iter().find_map(|r| r.reply(id))
    }

    pub fn is_loading(&self, root: CommentId) -> bool {
        self.loading.contains_key(&root)
    }

    pub fn loading_set(&self) -> BTreeSet<CommentId> {
        self.loading.keys().copied().collect()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        ThreadSnapshot {
            root_window: self.window.clone(),
            loading: self.loading_set(),
            error_message: self.error.clone(),
        }
    }

    /// Drop everything, as when leaving the post view. Requests still in flight
    /// will be discarded when they complete.
    pub fn reset(&mut self) {
        tracing::debug!(post=?self.post, "resetting thread session");
        self.window = PageWindow::empty();
        self.loading.clear();
        self.deleted.clear();
        self.error = None;
        self.sequencer.reset();
    }

    pub(crate) fn record_failure(&mut self, what: &str, err: &Error) {
        tracing::warn!(post=?self.post, %err, "{what} failed");
        self.error = Some(err.message());
    }

    /// Check a request's ticket, logging why it gets dropped if it does
    pub(crate) fn freshness(&self, what: &str, ticket: &Ticket) -> Option<Discard> {
        match self.sequencer.check(ticket) {
            Freshness::Current => None,
            Freshness::Stale => {
                tracing::info!(post=?self.post, ?ticket, "discarding stale {what} response");
                Some(Discard::Stale)
            }
            Freshness::Abandoned => {
                tracing::debug!(post=?self.post, ?ticket, "discarding abandoned {what} response");
                Some(Discard::Abandoned)
            }
        }
    }

    pub(crate) fn is_current_epoch(&self, epoch: u64) -> bool {
        epoch == self.sequencer.epoch()
    }
}
