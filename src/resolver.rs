// =============================================================================
// Symbol Resolver
// =============================================================================
//
// Feed symbol spellings for the same instrument vary (`NSE:NIFTY`,
// `INDEXNSE:NIFTY_50`, ...). Candidates are tried strictly in order with the
// fully-qualified call shape; the first accepted one wins. When every
// candidate is rejected the primary symbol is retried with two reduced call
// shapes before giving up.
// =============================================================================

use tracing::{info, warn};

use crate::error::BotError;
use crate::feed::{ChartSession, FeedError, MarketOptions, MarketRequest};
use crate::types::{ResolutionTier, ResolvedSymbol};

/// Everything the resolver needs to know about the target instrument.
#[derive(Debug, Clone)]
pub struct ResolutionPlan {
    /// Ordered candidate spellings; order is significant.
    pub candidates: Vec<String>,
    /// Symbol used by the reduced call shapes.
    pub primary: String,
    pub timeframe: String,
    pub instrument_type: String,
}

/// Point `chart` at the first symbol the feed accepts.
pub async fn resolve_market<C: ChartSession + ?Sized>(
    chart: &mut C,
    plan: &ResolutionPlan,
) -> Result<ResolvedSymbol, BotError> {
    let mut last_error: Option<FeedError> = None;

    for candidate in &plan.candidates {
        let request = MarketRequest::Qualified {
            symbol: candidate.clone(),
            timeframe: plan.timeframe.clone(),
        };
        match chart.set_market(&request).await {
            Ok(()) => {
                info!(symbol = %candidate, "market set successfully");
                return Ok(ResolvedSymbol {
                    symbol: candidate.clone(),
                    tier: ResolutionTier::Candidate,
                });
            }
            Err(e) => {
                warn!(symbol = %candidate, error = %e, "symbol rejected");
                last_error = Some(e);
            }
        }
    }

    warn!(
        tried = plan.candidates.len(),
        "all symbol formats failed, trying reduced call shapes"
    );

    let reduced = [
        (
            ResolutionTier::WithOptions,
            MarketRequest::WithOptions {
                symbol: plan.primary.clone(),
                options: MarketOptions {
                    timeframe: plan.timeframe.clone(),
                    instrument_type: plan.instrument_type.clone(),
                },
            },
        ),
        (
            ResolutionTier::Basic,
            MarketRequest::Basic {
                symbol: plan.primary.clone(),
            },
        ),
    ];

    for (tier, request) in reduced {
        match chart.set_market(&request).await {
            Ok(()) => {
                info!(symbol = %plan.primary, tier = %tier, "market set with reduced call shape");
                return Ok(ResolvedSymbol {
                    symbol: plan.primary.clone(),
                    tier,
                });
            }
            Err(e) => {
                warn!(symbol = %plan.primary, tier = %tier, error = %e, "reduced call shape failed");
                last_error = Some(e);
            }
        }
    }

    let cause = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempt made".to_string());
    Err(BotError::MarketResolutionFailed(cause))
}
