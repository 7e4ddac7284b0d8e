//! Error taxonomy for the chat client.
//!
//! Nothing here is fatal to a host process: transport errors are surfaced
//! and retried only at socket-reconnect level, validation errors fail
//! before any network call, upload errors abort the send, and a 401 maps
//! to [`ClientError::Unauthorized`] so the host can force a re-login.

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("socket error: {0}")]
    Socket(String),
    #[error("session expired, re-login required")]
    Unauthorized,
    #[error("backend rejected request: {0}")]
    Api(String),
    #[error("{0}")]
    Validation(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal task failure: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
