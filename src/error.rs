// =============================================================================
// Error taxonomy for the bot pipeline
// =============================================================================

use std::time::Duration;

use thiserror::Error;

use crate::feed::FeedError;

/// Failures of the primary flow. Each phase produces exactly one variant.
#[derive(Debug, Error)]
pub enum BotError {
    /// The feed did not report a connection within the handshake timeout.
    #[error("connection timeout after {0:?}")]
    ConnectionTimeout(Duration),

    /// The feed reported a transport failure during the handshake.
    #[error("connection error: {0}")]
    Connection(String),

    /// Every candidate symbol and both reduced call shapes were rejected.
    #[error("failed to set market with any method; last error: {0}")]
    MarketResolutionFailed(String),

    /// The bar buffer never reached the required size.
    #[error("failed to load candle data after {attempts} attempts")]
    DataTimeout { attempts: u32 },

    /// The report sink rejected a write.
    #[error("failed to write report: {0}")]
    Reporting(#[from] std::io::Error),

    /// The feed refused an operation outside the phases above (e.g. chart creation).
    #[error(transparent)]
    Feed(#[from] FeedError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = BotError::DataTimeout { attempts: 10 };
        assert_eq!(e.to_string(), "failed to load candle data after 10 attempts");

        let e = BotError::MarketResolutionFailed("symbol_error: invalid".into());
        assert!(e.to_string().contains("symbol_error: invalid"));
    }

    #[test]
    fn io_errors_become_reporting_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let e: BotError = io.into();
        assert!(matches!(e, BotError::Reporting(_)));
    }
}
