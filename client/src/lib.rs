//! Realtime chat client for the HealthLink telehealth platform.
//!
//! The subsystem is assembled from small parts: a socket connection
//! manager, a room registry, a per-conversation message store, an unread
//! tracker, an attachment uploader, and a notification surface, all owned
//! by a [`ChatSession`] created at login and torn down at logout.

pub mod api;
pub mod config;
pub mod error;
pub mod notify;
pub mod rooms;
pub mod session;
pub mod socket;
pub mod storage;
pub mod store;
pub mod unread;
pub mod upload;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use session::ChatSession;
pub use socket::{SocketEvent, SocketHandle};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
