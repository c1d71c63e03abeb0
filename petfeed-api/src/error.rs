use anyhow::{anyhow, Context};
use serde_json::json;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("{0}")]
    Validation(String),
}

impl Error {
    pub fn not_found(what: &str) -> Error {
        Error::Server {
            status: 404,
            message: format!("{what} not found"),
        }
    }

    /// Human-readable message, as displayed to the user
    pub fn message(&self) -> String {
        match self {
            Error::Network(msg) => format!("Network error: {msg}"),
            Error::Server { message, .. } => message.clone(),
            Error::Validation(msg) => msg.clone(),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Network(msg) => json!({
                "message": msg,
                "type": "network",
            }),
            Error::Server { status, message } => json!({
                "message": message,
                "type": "server",
                "status": status,
            }),
            Error::Validation(msg) => json!({
                "message": msg,
                "type": "validation",
            }),
        })
        .expect("serializing json values cannot fail")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let message = String::from(
            data.get("message")
                .and_then(|msg| msg.as_str())
                .unwrap_or(""),
        );
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "network" => Error::Network(message),
                "server" => Error::Server {
                    status: data
                        .get("status")
                        .and_then(|s| s.as_u64())
                        .and_then(|s| u16::try_from(s).ok())
                        .ok_or_else(|| anyhow!("server error without a proper status"))?,
                    message,
                },
                "validation" => Error::Validation(message),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }

    /// Build the error for a non-success HTTP answer, using the body's message
    /// when the server sent one
    pub fn from_response(status: u16, body: &[u8]) -> Error {
        match Error::parse(body) {
            Ok(Error::Server { message, .. }) | Ok(Error::Validation(message)) => {
                Error::Server { status, message }
            }
            _ => {
                let message = serde_json::from_slice::<serde_json::Value>(body)
                    .ok()
                    .and_then(|v| v.get("message")?.as_str().map(String::from))
                    .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
                Error::Server { status, message }
            }
        }
    }
}
