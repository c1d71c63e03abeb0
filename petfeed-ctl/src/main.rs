use std::path::PathBuf;

use anyhow::Context;
use petfeed_client::{
    api::{AuthToken, CommentId, Gateway, PostId, UserId, Uuid},
    prelude::*,
    Reply, RootComment, SessionConfig, ThreadSession,
};

mod api;

use api::HttpGateway;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, env = "PETFEED_HOST")]
    host: String,

    /// Auth token to send the API calls with
    #[structopt(short, long, env = "PETFEED_TOKEN")]
    token: Uuid,

    /// User id of the token's owner, used to know which likes are ours
    #[structopt(short, long, env = "PETFEED_VIEWER")]
    viewer: Uuid,

    /// JSON file with the session configuration
    #[structopt(long, env = "PETFEED_CONFIG", parse(from_os_str))]
    config: Option<PathBuf>,

    #[structopt(long, env = "PETFEED_ROOT_PAGE_SIZE")]
    root_page_size: Option<u32>,

    #[structopt(long, env = "PETFEED_REPLY_PAGE_SIZE")]
    reply_page_size: Option<u32>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// List the root comments of a post
    Comments {
        post: Uuid,

        /// Number of pages to load
        #[structopt(long, default_value = "1")]
        pages: u32,
    },

    /// Show all the replies under a root comment
    Replies { post: Uuid, root: Uuid },

    /// Comment on a post, or reply to a comment
    Post {
        post: Uuid,

        text: String,

        #[structopt(long)]
        reply_to: Option<Uuid>,
    },

    /// Delete a comment
    Delete { post: Uuid, id: Uuid },

    /// Like or unlike a comment
    Like { post: Uuid, id: Uuid },
}

impl Command {
    fn post(&self) -> PostId {
        match self {
            Command::Comments { post, .. }
            | Command::Replies { post, .. }
            | Command::Post { post, .. }
            | Command::Delete { post, .. }
            | Command::Like { post, .. } => PostId(*post),
        }
    }
}

fn session_config(opt: &Opt) -> anyhow::Result<SessionConfig> {
    let mut config = match &opt.config {
        None => SessionConfig::default(),
        Some(path) => {
            let data = std::fs::read(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_slice(&data)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
    };
    if let Some(size) = opt.root_page_size {
        config.root_page_size = size;
    }
    if let Some(size) = opt.reply_page_size {
        config.reply_page_size = size;
    }
    config.validate().context("validating session config")?;
    Ok(config)
}

/// Load the replies of `root` that are still missing, page after page
async fn load_remaining_replies<G: Gateway>(
    session: &mut ThreadSession,
    gw: &G,
    root: CommentId,
) -> anyhow::Result<()> {
    while session.has_more(root) {
        let loaded = session.root(root).map(|r| r.replies.len());
        session
            .load_next_replies(gw, root)
            .await
            .context("loading more replies")?;
        if session.root(root).map(|r| r.replies.len()) == loaded {
            // the server has fewer replies than it counts
            break;
        }
    }
    Ok(())
}

async fn load_all_replies<G: Gateway>(
    session: &mut ThreadSession,
    gw: &G,
    root: CommentId,
) -> anyhow::Result<()> {
    let limit = session.config().reply_page_size;
    session
        .load_replies(gw, root, 1, limit)
        .await
        .context("loading replies")?;
    load_remaining_replies(session, gw, root).await
}

/// Page through the thread until comment `id` is loaded
async fn locate<G: Gateway>(
    session: &mut ThreadSession,
    gw: &G,
    id: CommentId,
) -> anyhow::Result<()> {
    session.refresh(gw).await.context("loading comments")?;
    let limit = session.config().reply_page_size;
    loop {
        if session.root(id).is_some() {
            return Ok(());
        }
        let roots = session
            .window()
            .items
            .iter()
            .filter(|r| r.reply_count > 0 && !r.replies_loaded)
            .map(|r| r.id)
            .collect::<Vec<_>>();
        let reqs = roots
            .into_iter()
            .filter_map(|root| session.begin_load_replies(root, 1, limit))
            .collect::<Vec<_>>();
        let results = futures::future::join_all(reqs.iter().map(|req| req.send(gw))).await;
        for (req, res) in reqs.into_iter().zip(results) {
            let root = req.root;
            session
                .finish_replies(req, res)
                .context("loading replies")?;
            load_remaining_replies(session, gw, root).await?;
            if session.reply(id).is_some() {
                return Ok(());
            }
        }
        if !session.window().has_more_roots() {
            anyhow::bail!("comment {} is not in this post", id.0);
        }
        session
            .load_more_roots(gw)
            .await
            .context("loading more comments")?;
    }
}

fn print_reply(reply: &Reply) {
    let rendered = reply.render();
    println!(
        "    [{}] {} ({} likes): {}{}",
        reply.id.0,
        reply.author.name,
        reply.likes.len(),
        rendered.mention.unwrap_or(""),
        rendered.body,
    );
}

fn print_root(root: &RootComment) {
    println!(
        "[{}] {} ({} likes, {} replies): {}",
        root.id.0,
        root.author.name,
        root.like_count(),
        root.reply_count,
        root.content,
    );
    if root.is_expanded {
        root.replies.iter().for_each(print_reply);
        if root.has_more_replies() {
            println!("    ...");
        }
    }
}

fn print_thread(session: &ThreadSession) {
    let w = session.window();
    for root in &w.items {
        print_root(root);
    }
    println!(
        "-- page {}/{}, {} comments in total",
        w.page, w.total_pages, w.total
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let config = session_config(&opt)?;
    let gw = HttpGateway::new(opt.host.clone(), AuthToken(opt.token));
    let mut session = ThreadSession::new(opt.cmd.post(), UserId(opt.viewer), config)
        .context("creating thread session")?;

    match opt.cmd {
        Command::Comments { pages, .. } => {
            session.refresh(&gw).await.context("loading comments")?;
            for _ in 1..pages {
                if !session.window().has_more_roots() {
                    break;
                }
                session
                    .load_more_roots(&gw)
                    .await
                    .context("loading more comments")?;
            }
            print_thread(&session);
        }
        Command::Replies { root, .. } => {
            let root = CommentId(root);
            locate(&mut session, &gw, root).await?;
            if session.root(root).is_none() {
                anyhow::bail!("comment {} is a reply, not a root comment", root.0);
            }
            load_all_replies(&mut session, &gw, root).await?;
            if let Some(r) = session.root(root) {
                print_root(r);
            }
        }
        Command::Post { text, reply_to, .. } => {
            let res = match reply_to {
                None => {
                    session.refresh(&gw).await.context("loading comments")?;
                    session.create_comment(&gw, &text, None).await
                }
                Some(id) => {
                    let id = CommentId(id);
                    locate(&mut session, &gw, id).await?;
                    session.reply_to(&gw, &text, id).await
                }
            };
            res.context("posting comment")?;
            print_thread(&session);
        }
        Command::Delete { id, .. } => {
            let id = CommentId(id);
            locate(&mut session, &gw, id).await?;
            session
                .delete_comment(&gw, id)
                .await
                .context("deleting comment")?;
            print_thread(&session);
        }
        Command::Like { id, .. } => {
            let id = CommentId(id);
            locate(&mut session, &gw, id).await?;
            session
                .toggle_like(&gw, id)
                .await
                .context("toggling like")?;
            let liked = match session.root(id) {
                Some(root) => root.likes.contains(&session.viewer()),
                None => session
                    .reply(id)
                    .map(|r| r.likes.contains(&session.viewer()))
                    .unwrap_or(false),
            };
            println!("{} comment {}", if liked { "liked" } else { "unliked" }, id.0);
        }
    }

    Ok(())
}
