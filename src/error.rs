use thiserror::Error;

/// Failures this crate can surface to its embedder. Degrading paths
/// (history load, channel handshake) log and recover instead of returning
/// these; only user-initiated calls propagate.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Status(reqwest::StatusCode),

    #[error("websocket failure: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("channel closed during handshake")]
    HandshakeClosed,

    #[error("could not encode channel frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error("no bearer token available")]
    MissingToken,

    #[error("malformed bearer token: {0}")]
    BadToken(String),
}
