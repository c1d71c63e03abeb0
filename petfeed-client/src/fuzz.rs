#![cfg(test)]

use std::{cmp, collections::HashSet, iter, ops::RangeTo, panic::AssertUnwindSafe, sync::Arc};

use bolero::generator::TypeGenerator;
use parking_lot::Mutex;
use petfeed_mock_server::{MockGateway, MockServer};

use crate::{
    api::{self, CommentId, Error, PageWindow, PostId, ReplyPage, UserId, Uuid},
    Completion, Discard, Expansion, ReplyRequest, RootPageRequest, SessionConfig, ThreadSession,
    WindowExt,
};

macro_rules! do_tokio_test {
    ( $name:ident, $gen:expr, $fn:expr ) => {
        #[test]
        fn $name() {
            if std::env::var("RUST_LOG").is_ok() {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                    .with_test_writer()
                    .try_init();
            }
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_generator($gen)
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    // Changes made by other users, straight on the server
    SeedRoot,
    SeedReply {
        parent: usize,
    },
    ServerDelete {
        comment: usize,
    },
    FailNext,

    // Whole operations of the session
    Refresh,
    LoadMoreRoots,
    Toggle {
        root: usize,
    },
    LoadNextReplies {
        root: usize,
    },
    CreateRoot {
        #[generator(bolero::generator::gen_with::<String>().len(0..20usize))]
        text: String,
    },
    CreateReply {
        target: usize,
        #[generator(bolero::generator::gen_with::<String>().len(0..20usize))]
        text: String,
    },
    Delete {
        target: usize,
    },
    Like {
        target: usize,
    },

    // Requests whose completion gets delayed and reordered
    StartRefresh,
    StartReplies {
        root: usize,
    },
    Finish {
        pending: usize,
    },
    Reset,
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end); // in case we rounded to 0
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1)) // in case id was actually over end - 1 due to rounding
}

fn pick<T: Copy>(fuzz_id: usize, from: &[T]) -> Option<T> {
    resize_int(fuzz_id, ..from.len()).map(|i| from[i])
}

enum PendingOp {
    Page(RootPageRequest, Result<PageWindow<api::Comment>, Error>),
    Replies(ReplyRequest, Result<ReplyPage<api::Comment>, Error>),
}

struct Pending {
    op: PendingOp,
    before_reset: bool,
}

struct Fuzzer {
    server: Arc<Mutex<MockServer>>,
    alice: UserId,
    post: PostId,
    gw: MockGateway,
    session: ThreadSession,
    pending: Vec<Pending>,
}

impl Fuzzer {
    fn new() -> Fuzzer {
        let server = MockServer::shared();
        let (alice, bob) = {
            let mut s = server.lock();
            (s.admin_create_user("Alice"), s.admin_create_user("Bob"))
        };
        let post = PostId(Uuid::new_v4());
        let gw = MockGateway::connect(server.clone(), bob);
        // small pages so that paging actually happens
        let config = SessionConfig {
            root_page_size: 3,
            reply_page_size: 2,
        };
        let session = ThreadSession::new(post, bob, config).expect("config is valid");
        Fuzzer {
            server,
            alice,
            post,
            gw,
            session,
            pending: Vec::new(),
        }
    }

    fn server_comments(&self) -> Vec<CommentId> {
        let s = self.server.lock();
        s.root_ids(self.post)
            .into_iter()
            .flat_map(|root| iter::once(root).chain(s.reply_ids(root)))
            .collect()
    }

    fn loaded_roots(&self) -> Vec<CommentId> {
        self.session.window().items.iter().map(|r| r.id).collect()
    }

    fn loaded_comments(&self) -> Vec<CommentId> {
        self.session
            .window()
            .items
            .iter()
            .flat_map(|r| iter::once(r.id).chain(r.replies.iter().map(|reply| reply.id)))
            .collect()
    }

    async fn execute_fuzz_op(&mut self, op: FuzzOp) {
        match op {
            FuzzOp::SeedRoot => {
                let mut s = self.server.lock();
                s.seed_root(self.post, self.alice, "hello")
                    .expect("seeding root");
            }
            FuzzOp::SeedReply { parent } => {
                if let Some(parent) = pick(parent, &self.server_comments()) {
                    let mut s = self.server.lock();
                    s.seed_reply(parent, self.alice, "woof")
                        .expect("seeding reply");
                }
            }
            FuzzOp::ServerDelete { comment } => {
                if let Some(comment) = pick(comment, &self.server_comments()) {
                    self.server
                        .lock()
                        .admin_delete(comment)
                        .expect("deleting comment");
                }
            }
            FuzzOp::FailNext => self
                .server
                .lock()
                .fail_next(Error::Network(String::from("connection reset"))),
            FuzzOp::Refresh => {
                if let Ok(Completion::Applied) = self.session.refresh(&self.gw).await {
                    let window = self.session.window().clone();
                    assert_eq!(
                        self.session.refresh(&self.gw).await,
                        Ok(Completion::Applied)
                    );
                    assert_eq!(
                        self.session.window(),
                        &window,
                        "refreshing twice changed the window"
                    );
                }
            }
            FuzzOp::LoadMoreRoots => {
                let _ = self.session.load_more_roots(&self.gw).await;
            }
            FuzzOp::Toggle { root } => {
                if let Some(root) = pick(root, &self.loaded_roots()) {
                    let before = self.session.expansion(root);
                    let res = self.session.toggle(&self.gw, root).await;
                    match (before, res) {
                        (Some(Expansion::Expanded), res) => {
                            assert_eq!(res, Ok(Some(Expansion::Collapsed)))
                        }
                        (_, Ok(Some(Expansion::Expanded))) => {
                            assert!(!self.session.root(root).unwrap().replies.is_empty())
                        }
                        (_, Err(_)) => {
                            assert_eq!(self.session.expansion(root), Some(Expansion::Collapsed))
                        }
                        _ => (),
                    }
                }
            }
            FuzzOp::LoadNextReplies { root } => {
                if let Some(root) = pick(root, &self.loaded_roots()) {
                    let _ = self.session.load_next_replies(&self.gw, root).await;
                }
            }
            FuzzOp::CreateRoot { text } => {
                let res = self.session.create_comment(&self.gw, &text, None).await;
                if api::validate_content(&text).is_err() {
                    assert!(matches!(res, Err(Error::Validation(_))));
                }
            }
            FuzzOp::CreateReply { target, text } => {
                let parent = pick(target, &self.loaded_comments())
                    .and_then(|id| self.session.parent_ref(id));
                if let Some(parent) = parent {
                    let root = parent.owning_root();
                    let count = self.session.root(root).map(|r| r.reply_count);
                    let res = self
                        .session
                        .create_comment(&self.gw, &text, Some(&parent))
                        .await;
                    if res == Ok(Completion::Applied) {
                        let r = self.session.root(root).unwrap();
                        assert!(r.is_expanded);
                        assert_eq!(Some(r.reply_count), count.map(|c| c + 1));
                    }
                }
            }
            FuzzOp::Delete { target } => {
                if let Some(id) = pick(target, &self.loaded_comments()) {
                    if self.session.delete_comment(&self.gw, id).await.is_ok() {
                        assert!(!self.loaded_comments().contains(&id));
                    }
                }
            }
            FuzzOp::Like { target } => {
                if let Some(id) = pick(target, &self.loaded_comments()) {
                    let _ = self.session.toggle_like(&self.gw, id).await;
                }
            }
            FuzzOp::StartRefresh => {
                let limit = self.session.config().root_page_size;
                let req = self.session.begin_load_first_page(limit);
                let res = req.send(&self.gw).await;
                self.pending.push(Pending {
                    op: PendingOp::Page(req, res),
                    before_reset: false,
                });
            }
            FuzzOp::StartReplies { root } => {
                if let Some(root) = pick(root, &self.loaded_roots()) {
                    let limit = self.session.config().reply_page_size;
                    if let Some(req) = self.session.begin_load_replies(root, 1, limit) {
                        let res = req.send(&self.gw).await;
                        self.pending.push(Pending {
                            op: PendingOp::Replies(req, res),
                            before_reset: false,
                        });
                    }
                }
            }
            FuzzOp::Finish { pending } => {
                if let Some(i) = resize_int(pending, ..self.pending.len()) {
                    let Pending { op, before_reset } = self.pending.remove(i);
                    let res = match op {
                        PendingOp::Page(req, res) => self.session.finish_root_page(req, res),
                        PendingOp::Replies(req, res) => self.session.finish_replies(req, res),
                    };
                    if before_reset {
                        assert_eq!(res, Ok(Completion::Discarded(Discard::Abandoned)));
                    }
                }
            }
            FuzzOp::Reset => {
                self.session.reset();
                for p in self.pending.iter_mut() {
                    p.before_reset = true;
                }
                assert!(self.session.window().items.is_empty());
            }
        }
    }

    fn check_invariants(&self) {
        let s = &self.session;
        let mut seen = HashSet::new();
        for root in &s.window.items {
            assert!(seen.insert(root.id), "root {:?} shown twice", root.id);
            assert!(!s.deleted.contains(&root.id));
            assert_eq!(root.post_id, s.post);
            assert!(
                root.replies.len() as u64 <= u64::from(root.reply_count),
                "root {:?} has {} replies loaded but a count of {}",
                root.id,
                root.replies.len(),
                root.reply_count
            );
            assert!(!root.is_expanded || !root.replies.is_empty() || s.is_loading(root.id));
            for reply in &root.replies {
                assert!(seen.insert(reply.id), "reply {:?} shown twice", reply.id);
                assert!(!s.deleted.contains(&reply.id));
                assert_eq!(reply.root_id, root.id);
                assert_ne!(reply.parent_id, reply.id);
                if let Some(prefix) = &reply.mention_prefix {
                    assert!(reply.content.starts_with(prefix.as_str()));
                    assert_eq!(reply.render().body, &reply.content[prefix.len()..]);
                }
            }
        }
        for root in s.loading.keys() {
            assert!(s.window.root(*root).is_some(), "loading a root that is gone");
        }
    }
}

do_tokio_test!(
    session_invariants,
    bolero::generator::gen_with::<Vec<FuzzOp>>().len(1..60usize),
    |ops: Vec<FuzzOp>| async move {
        let mut fuzzer = Fuzzer::new();
        for op in ops {
            fuzzer.execute_fuzz_op(op).await;
            fuzzer.check_invariants();
        }
    }
);
