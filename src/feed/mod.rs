// =============================================================================
// Market Feed Abstraction
// =============================================================================
//
// The bot never speaks a wire protocol directly. It drives a `MarketFeed`
// (session lifecycle) and the `ChartSession` it creates (one instrument
// subscription plus its live bar buffer). `tradingview` is the production
// implementation; tests plug in scripted feeds.
// =============================================================================

pub mod tradingview;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::market_data::BarSeries;

/// Failures reported by a feed implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The feed refused the request (unknown symbol, bad timeframe, ...).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The underlying connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The session is already closed.
    #[error("session closed")]
    Closed,

    /// The feed did not answer in time.
    #[error("timed out waiting for {0}")]
    Timeout(String),
}

/// Callback registered on a chart's error channel.
pub type ErrorHandler = Box<dyn Fn(&FeedError) + Send + Sync>;

// ---------------------------------------------------------------------------
// Subscription call shapes
// ---------------------------------------------------------------------------

/// Options object for the reduced subscription shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOptions {
    pub timeframe: String,
    /// Instrument-type hint, e.g. `"index"`.
    pub instrument_type: String,
}

/// The three ways a chart can be pointed at an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketRequest {
    /// Fully-qualified `(symbol, timeframe)` subscription.
    Qualified { symbol: String, timeframe: String },
    /// Symbol plus an options object.
    WithOptions { symbol: String, options: MarketOptions },
    /// Symbol only; the feed picks its default timeframe.
    Basic { symbol: String },
}

impl MarketRequest {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Qualified { symbol, .. }
            | Self::WithOptions { symbol, .. }
            | Self::Basic { symbol } => symbol,
        }
    }

    pub fn timeframe(&self) -> Option<&str> {
        match self {
            Self::Qualified { timeframe, .. } => Some(timeframe),
            Self::WithOptions { options, .. } => Some(&options.timeframe),
            Self::Basic { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Handshake -- single-resolution connect signal
// ---------------------------------------------------------------------------

/// Outcome of a connection handshake: `Err` carries the transport cause.
pub type HandshakeOutcome = Result<(), String>;

/// Connect/error signal handed to [`MarketFeed::start`].
///
/// Clones share one slot: whichever of [`connected`](Self::connected) or
/// [`failed`](Self::failed) runs first settles the handshake, later calls are
/// no-ops.
#[derive(Clone)]
pub struct Handshake {
    slot: Arc<Mutex<Option<oneshot::Sender<HandshakeOutcome>>>>,
}

impl Handshake {
    pub fn new() -> (Self, oneshot::Receiver<HandshakeOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Report a successful connection. Returns `true` if this call settled
    /// the handshake.
    pub fn connected(&self) -> bool {
        self.settle(Ok(()))
    }

    /// Report a connection failure. Returns `true` if this call settled the
    /// handshake.
    pub fn failed(&self, cause: impl Into<String>) -> bool {
        self.settle(Err(cause.into()))
    }

    pub fn is_settled(&self) -> bool {
        self.slot.lock().is_none()
    }

    fn settle(&self, outcome: HandshakeOutcome) -> bool {
        match self.slot.lock().take() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Read access to a live bar buffer.
pub trait BarSource {
    /// Number of bars currently buffered.
    fn bar_count(&self) -> usize;

    /// Frozen copy of the buffered bars.
    fn snapshot(&self) -> BarSeries;
}

/// One instrument subscription on an open session.
#[async_trait]
pub trait ChartSession: BarSource + Send {
    /// Register the error callback for this subscription.
    fn on_error(&mut self, handler: ErrorHandler);

    /// Point the chart at an instrument.
    async fn set_market(&mut self, request: &MarketRequest) -> Result<(), FeedError>;
}

/// A market-data session.
#[async_trait]
pub trait MarketFeed: Send {
    type Chart: ChartSession;

    /// Begin connecting. The feed settles `handshake` exactly once.
    fn start(&mut self, handshake: Handshake);

    /// Create a chart subscription handle.
    fn chart(&mut self) -> Result<Self::Chart, FeedError>;

    /// Terminate the session. Safe to call on a session that never connected.
    async fn end(&mut self) -> Result<(), FeedError>;
}
