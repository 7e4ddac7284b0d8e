//! Headless chat client: logs in, joins this user's rooms, prints live
//! traffic, and keeps unread badges current. Intended for backend smoke
//! testing and as a reference host for the library.

use healthlink_client::notify::LogSink;
use healthlink_client::{init_tracing, ChatSession, ClientConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::from_env();
    let email = std::env::var("HEALTHLINK_EMAIL")?;
    let password = std::env::var("HEALTHLINK_PASSWORD")?;

    let (mut session, mut events) =
        ChatSession::login(&config, &email, &password, Box::new(LogSink)).await?;
    info!(
        user = %session.profile().id,
        rooms = session.rooms().count(),
        "logged in to {}",
        config.server_url
    );

    while let Some(event) = events.recv().await {
        session.handle_event(event);
    }
    session.logout();
    Ok(())
}
