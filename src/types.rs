// =============================================================================
// Shared types used across the moving-average bot
// =============================================================================

use serde::{Deserialize, Serialize};

/// Direction derived from the short/long moving-average crossover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
    #[default]
    InsufficientData,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
        }
    }
}

/// Which subscription call shape the feed accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionTier {
    /// A candidate from the ordered list, subscribed as `(symbol, timeframe)`.
    Candidate,
    /// Primary symbol with an options object (timeframe + instrument type).
    WithOptions,
    /// Primary symbol only, feed default timeframe.
    Basic,
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Candidate => write!(f, "candidate"),
            Self::WithOptions => write!(f, "with-options"),
            Self::Basic => write!(f, "basic"),
        }
    }
}

/// The symbol the feed accepted, kept for downstream reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSymbol {
    pub symbol: String,
    pub tier: ResolutionTier,
}
