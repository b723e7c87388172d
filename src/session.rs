// =============================================================================
// Connection Bootstrapper
// =============================================================================

use std::time::Duration;

use tracing::{error, info, instrument};

use crate::error::BotError;
use crate::feed::{Handshake, MarketFeed};

/// Start `feed` and wait for its handshake, bounded by `timeout`.
///
/// The feed receives one [`Handshake`]; only its first `connected`/`failed`
/// call counts, so this resolves exactly once.
#[instrument(skip(feed), name = "session::connect")]
pub async fn connect<F: MarketFeed>(feed: &mut F, timeout: Duration) -> Result<(), BotError> {
    let (handshake, rx) = Handshake::new();
    feed.start(handshake);

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(Ok(()))) => {
            info!("connected to market feed");
            Ok(())
        }
        Ok(Ok(Err(cause))) => {
            error!(error = %cause, "connection error");
            Err(BotError::Connection(cause))
        }
        Ok(Err(_)) => Err(BotError::Connection(
            "feed dropped the handshake without settling it".to_string(),
        )),
        Err(_) => Err(BotError::ConnectionTimeout(timeout)),
    }
}
