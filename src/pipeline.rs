// =============================================================================
// Bot Pipeline — primary flow with a reduced fallback
// =============================================================================
//
//   primary:  connect -> resolve -> poll -> analyze -> report
//   simple:   connect -> basic subscribe -> fixed wait -> last price
//
// Any primary failure triggers the simple flow on a fresh session. Simple-flow
// failures are logged and swallowed. Each session is closed exactly once,
// after its flow finishes, whatever the outcome.
// =============================================================================

use std::io::Write;

use tracing::{debug, error, info, warn};

use crate::analysis::analyze;
use crate::error::BotError;
use crate::feed::{BarSource, ChartSession, FeedError, MarketFeed, MarketRequest};
use crate::poller::await_bars;
use crate::report::{write_report, Report};
use crate::resolver::resolve_market;
use crate::runtime_config::RuntimeConfig;
use crate::session::connect;
use crate::types::{ResolutionTier, ResolvedSymbol};

/// Which flow a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Primary,
    Simple,
}

/// Phase the flow is in (or failed in).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Resolve,
    Poll,
    Analyze,
    Report,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Resolve => write!(f, "resolve"),
            Self::Poll => write!(f, "poll"),
            Self::Analyze => write!(f, "analyze"),
            Self::Report => write!(f, "report"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Orchestration state threaded through one flow.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub mode: RunMode,
    pub phase: Phase,
    pub resolved: Option<ResolvedSymbol>,
    pub bars_loaded: usize,
}

impl RunContext {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            phase: Phase::Connect,
            resolved: None,
            bars_loaded: 0,
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!(mode = ?self.mode, phase = %phase, "entering phase");
        self.phase = phase;
    }
}

/// How the run ended. The process exits normally in every case.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The primary flow produced a full report.
    Primary(Report),
    /// The primary flow failed; the simple flow finished.
    Simple { last_price: Option<f64> },
    /// Both flows failed.
    Failed,
}

/// Full analysis flow on an unopened `feed`.
pub async fn run_primary<F, W>(
    feed: &mut F,
    config: &RuntimeConfig,
    out: &mut W,
    ctx: &mut RunContext,
) -> Result<Report, BotError>
where
    F: MarketFeed,
    W: Write + ?Sized,
{
    ctx.enter(Phase::Connect);
    connect(feed, config.connect_timeout()).await?;

    let mut chart = feed.chart()?;
    chart.on_error(Box::new(|e: &FeedError| error!(error = %e, "chart error")));
    info!(
        symbol = %config.primary_symbol,
        timeframe = %config.timeframe,
        "loading market"
    );

    ctx.enter(Phase::Resolve);
    let resolved = resolve_market(&mut chart, &config.resolution_plan()).await?;
    ctx.resolved = Some(resolved.clone());

    ctx.enter(Phase::Poll);
    let series = await_bars(&chart, config.poll_settings()).await?;
    ctx.bars_loaded = series.len();
    if let Some(last) = series.last() {
        debug!(bar = ?last, timestamp = ?last.timestamp(), "most recent candle");
    }

    ctx.enter(Phase::Analyze);
    let analysis = analyze(&series, config.windows());
    info!(
        closes = analysis.closes,
        highs = analysis.highs,
        lows = analysis.lows,
        signal = %analysis.signal,
        "analysis complete"
    );

    let report = Report {
        resolved,
        analysis,
        last_bar: series.last().cloned(),
    };

    ctx.enter(Phase::Report);
    write_report(out, &report)?;

    ctx.enter(Phase::Done);
    Ok(report)
}

/// Reduced flow: first accepted basic subscription, one fixed wait, last price.
pub async fn run_simple<F, W>(
    feed: &mut F,
    config: &RuntimeConfig,
    out: &mut W,
    ctx: &mut RunContext,
) -> Result<Option<f64>, BotError>
where
    F: MarketFeed,
    W: Write + ?Sized,
{
    ctx.enter(Phase::Connect);
    connect(feed, config.connect_timeout()).await?;
    let mut chart = feed.chart()?;

    ctx.enter(Phase::Resolve);
    for symbol in &config.simple_candidates {
        let request = MarketRequest::Basic {
            symbol: symbol.clone(),
        };
        match chart.set_market(&request).await {
            Ok(()) => {
                info!(symbol = %symbol, "simple method subscribed");
                ctx.resolved = Some(ResolvedSymbol {
                    symbol: symbol.clone(),
                    tier: ResolutionTier::Basic,
                });
                break;
            }
            Err(e) => warn!(symbol = %symbol, error = %e, "simple method failed"),
        }
    }

    ctx.enter(Phase::Poll);
    tokio::time::sleep(config.simple_wait()).await;

    let series = chart.snapshot();
    ctx.bars_loaded = series.len();
    if series.is_empty() {
        warn!("simple method failed to load data");
        ctx.enter(Phase::Done);
        return Ok(None);
    }
    info!(candles = series.len(), "simple method loaded candles");

    ctx.enter(Phase::Report);
    let last_price = series.last().and_then(|bar| bar.close);
    match last_price {
        Some(price) => {
            let symbol = ctx
                .resolved
                .as_ref()
                .map_or(config.primary_symbol.as_str(), |r| r.symbol.as_str());
            writeln!(out, "Current {symbol} price: {price:.2}")?;
        }
        None => warn!("could not extract price from candle data"),
    }

    ctx.enter(Phase::Done);
    Ok(last_price)
}

/// Terminate a session; failures are logged, never propagated.
async fn close_session<F: MarketFeed>(feed: &mut F) {
    info!("closing connection");
    match feed.end().await {
        Ok(()) => info!("connection closed"),
        Err(e) => error!(error = %e, "error closing connection"),
    }
}

/// Run the primary flow and, if it fails, the simple flow on a new session
/// from `make_feed`.
pub async fn run<F, M, W>(mut make_feed: M, config: &RuntimeConfig, out: &mut W) -> RunOutcome
where
    F: MarketFeed,
    M: FnMut() -> F,
    W: Write + ?Sized,
{
    let mut ctx = RunContext::new(RunMode::Primary);
    let mut feed = make_feed();
    let primary = run_primary(&mut feed, config, out, &mut ctx).await;
    close_session(&mut feed).await;

    let err = match primary {
        Ok(report) => {
            info!(symbol = %report.resolved.symbol, "bot completed successfully");
            return RunOutcome::Primary(report);
        }
        Err(e) => e,
    };

    error!(
        error = %err,
        phase = %ctx.phase,
        bars_loaded = ctx.bars_loaded,
        "bot failed, trying simple approach"
    );

    let mut ctx = RunContext::new(RunMode::Simple);
    let mut feed = make_feed();
    let simple = run_simple(&mut feed, config, out, &mut ctx).await;
    close_session(&mut feed).await;

    match simple {
        Ok(last_price) => RunOutcome::Simple { last_price },
        Err(e) => {
            error!(error = %e, phase = %ctx.phase, "simple bot error");
            RunOutcome::Failed
        }
    }
}
