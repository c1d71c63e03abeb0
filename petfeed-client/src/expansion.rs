use crate::{
    api::{CommentId, Error, Gateway},
    ReplyRequest, ThreadSession, WindowExt,
};

/// Whether a root's replies are shown
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Expansion {
    Collapsed,
    /// Fetching the first reply page
    Loading,
    Expanded,
}

/// Outcome of the user toggling a root's replies
#[derive(Clone, Debug)]
pub enum Toggle {
    Collapsed,
    /// Replies were already loaded and are shown again
    Expanded,
    /// Replies need fetching first, send this request and finish it
    Fetch(ReplyRequest),
    /// A fetch is already running, nothing to do
    AlreadyLoading,
    /// The root has no replies
    Empty,
}

impl ThreadSession {
    pub fn expansion(&self, root: CommentId) -> Option<Expansion> {
        let r = self.window.root(root)?;
        Some(if self.loading.contains_key(&root) {
            Expansion::Loading
        } else if r.is_expanded {
            Expansion::Expanded
        } else {
            Expansion::Collapsed
        })
    }

    /// Returns None if `root` is not in the window
    pub fn toggle_expansion(&mut self, root: CommentId) -> Option<Toggle> {
        let toggle = match self.expansion(root)? {
            Expansion::Loading => Toggle::AlreadyLoading,
            Expansion::Expanded => {
                self.window.root_mut(root)?.is_expanded = false;
                Toggle::Collapsed
            }
            Expansion::Collapsed => {
                if !self.window.root(root)?.replies.is_empty() {
                    self.window.root_mut(root)?.is_expanded = true;
                    Toggle::Expanded
                } else {
                    let limit = self.config.reply_page_size;
                    match self.begin_load_replies(root, 1, limit) {
                        Some(req) => Toggle::Fetch(req),
                        None => Toggle::Empty,
                    }
                }
            }
        };
        tracing::debug!(?root, ?toggle, "toggled replies");
        Some(toggle)
    }

    /// Toggle and, if needed, fetch the replies. Returns the resulting state.
    pub async fn toggle<G: Gateway + ?Sized>(
        &mut self,
        gw: &G,
        root: CommentId,
    ) -> Result<Option<Expansion>, Error> {
        if let Some(Toggle::Fetch(req)) = self.toggle_expansion(root) {
            let res = req.send(gw).await;
            self.finish_replies(req, res)?;
        }
        Ok(self.expansion(root))
    }
}
