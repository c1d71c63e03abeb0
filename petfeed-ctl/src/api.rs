use async_trait::async_trait;
use petfeed_client::api::{
    AuthToken, Comment, CommentId, Error, Gateway, LikeState, NewComment, PageWindow, PostId,
    ReplyPage,
};

/// `Gateway` talking to the comment REST API over HTTP
pub struct HttpGateway {
    client: reqwest::Client,
    host: String,
    token: AuthToken,
}

fn network(err: reqwest::Error) -> Error {
    Error::Network(err.to_string())
}

async fn check(resp: Result<reqwest::Response, reqwest::Error>) -> Result<reqwest::Response, Error> {
    let resp = resp.map_err(network)?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.bytes().await.map_err(network)?;
    let err = Error::from_response(status.as_u16(), &body);
    tracing::debug!(%status, %err, "request failed");
    Err(err)
}

async fn json<R>(resp: Result<reqwest::Response, reqwest::Error>) -> Result<R, Error>
where
    R: for<'de> serde::Deserialize<'de>,
{
    check(resp)
        .await?
        .json()
        .await
        .map_err(|e| Error::Network(format!("failed parsing response: {e}")))
}

impl HttpGateway {
    pub fn new(host: String, token: AuthToken) -> HttpGateway {
        HttpGateway {
            client: reqwest::Client::new(),
            host: String::from(host.trim_end_matches('/')),
            token,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/api/{path}", self.host))
            .bearer_auth(self.token.0)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/api/{path}", self.host))
            .bearer_auth(self.token.0)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn fetch_root_comments(
        &self,
        post: PostId,
        page: u32,
        limit: u32,
    ) -> Result<PageWindow<Comment>, Error> {
        json(
            self.get(&format!("posts/{}/comments", post.0))
                .query(&[("page", page), ("limit", limit)])
                .send()
                .await,
        )
        .await
    }

    async fn fetch_replies(
        &self,
        root: CommentId,
        page: u32,
        limit: u32,
    ) -> Result<ReplyPage<Comment>, Error> {
        json(
            self.get(&format!("comments/{}/replies", root.0))
                .query(&[("page", page), ("limit", limit)])
                .send()
                .await,
        )
        .await
    }

    async fn post_comment(&self, comment: NewComment) -> Result<Comment, Error> {
        json(self.post("comments").json(&comment).send().await).await
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), Error> {
        let resp = self
            .client
            .delete(format!("{}/api/comments/{}", self.host, id.0))
            .bearer_auth(self.token.0)
            .send()
            .await;
        check(resp).await.map(|_| ())
    }

    async fn toggle_like(&self, id: CommentId) -> Result<LikeState, Error> {
        json(self.post(&format!("comments/{}/like", id.0)).send().await).await
    }
}
