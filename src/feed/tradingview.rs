// =============================================================================
// TradingView chart websocket feed
// =============================================================================
//
// Wire format: every websocket text frame carries one or more packets
//   ~m~<len>~m~<payload>
// where payload is either a heartbeat `~h~<n>` (echoed back verbatim) or JSON.
// The first JSON packet without an `m` key is the server hello; after that,
// messages look like `{"m": "<method>", "p": [<chart session>, ...]}`.
//
// Only what the bot needs is implemented: auth token, chart sessions, symbol
// resolution and the `$prices` series.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    BarSource, ChartSession, ErrorHandler, FeedError, Handshake, MarketFeed, MarketRequest,
};
use crate::market_data::{Bar, BarBuffer, BarSeries};
use crate::runtime_config::RuntimeConfig;

const ORIGIN: &str = "https://www.tradingview.com";

/// Series id under which price updates arrive.
const PRICE_SERIES: &str = "$prices";

/// Resolution used when a request carries no timeframe.
const DEFAULT_RESOLUTION: &str = "240";

/// How long `end` waits for the socket task before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Wrap `payload` in a `~m~<len>~m~` envelope.
pub fn encode_packet(payload: &str) -> String {
    format!("~m~{}~m~{}", payload.len(), payload)
}

/// Split a websocket frame into packet payloads. Stops at the first malformed
/// envelope.
///
/// The declared length is only a hint: a payload ends where the length says
/// if another envelope (or the end of the frame) starts there, otherwise at
/// the next envelope marker.
pub fn decode_packets(frame: &str) -> Vec<&str> {
    let mut packets = Vec::new();
    let mut rest = frame;

    while let Some((len, body)) = split_envelope(rest) {
        let end = payload_end(body, len);
        packets.push(&body[..end]);
        rest = &body[end..];
    }

    packets
}

/// Strip a leading `~m~<digits>~m~`, returning the declared length and the rest.
fn split_envelope(s: &str) -> Option<(usize, &str)> {
    let after = s.strip_prefix("~m~")?;
    let sep = after.find("~m~")?;
    let digits = &after[..sep];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Oversized lengths are kept as a hint that never fits.
    let len = digits.parse::<usize>().unwrap_or(usize::MAX);
    Some((len, &after[sep + 3..]))
}

fn payload_end(body: &str, len: usize) -> usize {
    if len <= body.len() && body.is_char_boundary(len) {
        let tail = &body[len..];
        if tail.is_empty() || split_envelope(tail).is_some() {
            return len;
        }
    }
    body.match_indices("~m~")
        .map(|(i, _)| i)
        .find(|&i| split_envelope(&body[i..]).is_some())
        .unwrap_or(body.len())
}

/// A decoded packet payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Heartbeat,
    /// Server hello; carries `session_id`.
    Hello(Value),
    Message { method: String, params: Vec<Value> },
    Other(Value),
}

pub fn parse_packet(payload: &str) -> Result<Packet> {
    if payload.starts_with("~h~") {
        return Ok(Packet::Heartbeat);
    }

    let root: Value = serde_json::from_str(payload).context("failed to parse feed packet JSON")?;

    if let Some(method) = root.get("m").and_then(Value::as_str) {
        let params = root
            .get("p")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        return Ok(Packet::Message {
            method: method.to_string(),
            params,
        });
    }

    if root.get("session_id").is_some() {
        return Ok(Packet::Hello(root));
    }

    Ok(Packet::Other(root))
}

/// Encode a client command.
fn command(method: &str, params: Value) -> String {
    encode_packet(&json!({ "m": method, "p": params }).to_string())
}

/// Convert a human timeframe (`1H`, `15m`, `1D`) into a TradingView resolution.
///
/// Minutes are plain numbers, hours become minutes, days/weeks/months keep
/// their unit letter. Anything unrecognised is passed through.
pub fn normalize_timeframe(timeframe: &str) -> String {
    let tf = timeframe.trim();
    let split = tf.find(|c: char| !c.is_ascii_digit()).unwrap_or(tf.len());
    let (digits, unit) = tf.split_at(split);
    let n: u32 = if digits.is_empty() {
        1
    } else {
        match digits.parse() {
            Ok(n) => n,
            Err(_) => return tf.to_string(),
        }
    };

    match unit {
        "" | "m" => n.to_string(),
        "h" | "H" => match n.checked_mul(60) {
            Some(minutes) => minutes.to_string(),
            None => tf.to_string(),
        },
        "d" | "D" => format!("{n}D"),
        "w" | "W" => format!("{n}W"),
        "M" => format!("{n}M"),
        _ => tf.to_string(),
    }
}

/// Extract bars from a `timescale_update` / `du` payload.
///
/// Expected shape:
/// ```json
/// { "$prices": { "s": [ { "i": 0, "v": [1700000000, 1.0, 2.0, 0.5, 1.5, 10.0] } ] } }
/// ```
pub fn parse_series_bars(update: &Value) -> Vec<Bar> {
    update
        .get(PRICE_SERIES)
        .and_then(|series| series.get("s"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("v"))
                .map(Bar::from_value)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Per-chart shared state
// ---------------------------------------------------------------------------

/// An outstanding `set_market`, keyed by the series id it resolves.
struct PendingResolve {
    series: String,
    tx: oneshot::Sender<Result<(), FeedError>>,
}

/// State shared between a chart handle and the socket task.
#[derive(Default)]
struct ChartState {
    bars: BarBuffer,
    pending: Mutex<Option<PendingResolve>>,
    on_error: Mutex<Option<ErrorHandler>>,
}

impl ChartState {
    /// Register `series` as the one whose resolution `set_market` awaits.
    fn expect_series(&self, series: &str) -> oneshot::Receiver<Result<(), FeedError>> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock() = Some(PendingResolve {
            series: series.to_string(),
            tx,
        });
        rx
    }

    /// Answer the outstanding `set_market`, if any, whatever its series.
    fn settle_pending(&self, outcome: Result<(), FeedError>) {
        if let Some(pending) = self.pending.lock().take() {
            let _ = pending.tx.send(outcome);
        }
    }

    /// Answer the outstanding `set_market` only if it waits on `series`.
    /// Late answers for an abandoned series are dropped.
    fn settle_series(&self, series: Option<&str>, outcome: Result<(), FeedError>) {
        let mut pending = self.pending.lock();
        let expected = pending.as_ref().map(|p| p.series.clone());
        if expected.as_deref() == series {
            if let Some(p) = pending.take() {
                let _ = p.tx.send(outcome);
            }
        } else {
            debug!(?expected, ?series, "stale symbol answer ignored");
        }
    }

    fn report_error(&self, err: &FeedError) {
        match self.on_error.lock().as_ref() {
            Some(handler) => handler(err),
            None => warn!(error = %err, "chart error"),
        }
    }
}

type Routes = Arc<Mutex<HashMap<String, Arc<ChartState>>>>;

/// Join error parameters into one human-readable reason.
fn reason(params: &[Value]) -> String {
    let parts: Vec<String> = params
        .iter()
        .map(|p| match p {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    if parts.is_empty() {
        "unspecified".to_string()
    } else {
        parts.join(": ")
    }
}

/// Route a chart-session message to its chart.
fn dispatch(routes: &Routes, method: &str, params: &[Value]) {
    let Some(session) = params.first().and_then(Value::as_str) else {
        debug!(method, "message without chart session");
        return;
    };
    let Some(chart) = routes.lock().get(session).cloned() else {
        debug!(method, session, "message for unknown chart session");
        return;
    };

    let series = params.get(1).and_then(Value::as_str);

    match method {
        "symbol_resolved" => chart.settle_series(series, Ok(())),
        "timescale_update" | "du" => {
            if let Some(update) = params.get(1) {
                let bars = parse_series_bars(update);
                debug!(session, count = bars.len(), "series update");
                chart.bars.extend(bars);
            }
        }
        "symbol_error" => {
            let err = FeedError::Rejected(format!("{method}: {}", reason(&params[1..])));
            chart.settle_series(series, Err(err.clone()));
            chart.report_error(&err);
        }
        "series_error" | "critical_error" => {
            let err = FeedError::Rejected(format!("{method}: {}", reason(&params[1..])));
            chart.settle_pending(Err(err.clone()));
            chart.report_error(&err);
        }
        _ => debug!(method, session, "unhandled chart message"),
    }
}

// ---------------------------------------------------------------------------
// Socket task
// ---------------------------------------------------------------------------

enum Outbound {
    Text(String),
    Close,
}

fn handle_frame(
    text: &str,
    handshake: &Handshake,
    routes: &Routes,
    outbound: &mpsc::UnboundedSender<Outbound>,
) {
    for payload in decode_packets(text) {
        match parse_packet(payload) {
            Ok(Packet::Heartbeat) => {
                let _ = outbound.send(Outbound::Text(encode_packet(payload)));
            }
            Ok(Packet::Hello(hello)) => {
                info!(session = %hello["session_id"], "chart feed hello received");
                handshake.connected();
            }
            Ok(Packet::Message { method, params }) => {
                if matches!(method.as_str(), "critical_error" | "protocol_error")
                    && !handshake.is_settled()
                {
                    handshake.failed(format!("{method}: {}", reason(&params)));
                }
                dispatch(routes, &method, &params);
            }
            Ok(Packet::Other(value)) => debug!(packet = %value, "ignored feed packet"),
            Err(e) => warn!(error = %e, "failed to parse feed packet"),
        }
    }
}

/// Connect, authenticate, then pump frames until closed or failed.
async fn run_socket(
    url: &str,
    auth_token: &str,
    handshake: &Handshake,
    routes: &Routes,
    outbound_tx: &mpsc::UnboundedSender<Outbound>,
    outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>,
) -> Result<()> {
    let mut request = url.into_client_request().context("invalid feed url")?;
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static(ORIGIN));

    info!(url = %url, "connecting to chart websocket");
    let (ws_stream, _response) = connect_async(request)
        .await
        .context("failed to connect to chart websocket")?;

    let (mut write, mut read) = ws_stream.split();
    write
        .send(Message::Text(command("set_auth_token", json!([auth_token]))))
        .await
        .context("failed to send auth token")?;

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => match outgoing {
                Some(Outbound::Text(text)) => {
                    write.send(Message::Text(text)).await.context("websocket send failed")?;
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    info!("chart websocket closed by client");
                    return Ok(());
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_frame(&text, handshake, routes, outbound_tx),
                Some(Ok(Message::Close(frame))) => {
                    warn!(frame = ?frame, "chart websocket closed by server");
                    return Ok(());
                }
                // Ping/Pong/Binary -- tungstenite answers pings itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "chart websocket read error");
                    return Err(e.into());
                }
                None => {
                    warn!("chart websocket stream ended");
                    return Ok(());
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// A TradingView chart session over one websocket.
pub struct TradingViewFeed {
    url: String,
    auth_token: String,
    resolve_timeout: Duration,
    bar_range: u32,
    routes: Routes,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    task: Option<JoinHandle<()>>,
}

impl TradingViewFeed {
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.into(),
            resolve_timeout: Duration::from_secs(10),
            bar_range: 300,
            routes: Arc::new(Mutex::new(HashMap::new())),
            outbound: None,
            task: None,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        let mut feed = Self::new(config.feed_url.clone(), config.auth_token.clone());
        feed.resolve_timeout = config.resolve_timeout();
        feed.bar_range = config.bar_range;
        feed
    }
}

#[async_trait]
impl MarketFeed for TradingViewFeed {
    type Chart = TradingViewChart;

    fn start(&mut self, handshake: Handshake) {
        if self.task.is_some() {
            handshake.failed("feed already started");
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx.clone());

        let url = self.url.clone();
        let token = self.auth_token.clone();
        let routes = self.routes.clone();

        self.task = Some(tokio::spawn(async move {
            let outcome = run_socket(&url, &token, &handshake, &routes, &tx, &mut rx).await;

            let cause = match &outcome {
                Ok(()) => FeedError::Closed,
                Err(e) => FeedError::Transport(format!("{e:#}")),
            };
            if !handshake.failed(cause.to_string()) {
                if let Err(e) = &outcome {
                    error!(error = %e, "chart websocket terminated");
                }
            }
            for chart in routes.lock().values() {
                chart.settle_pending(Err(cause.clone()));
            }
        }));
    }

    fn chart(&mut self) -> Result<TradingViewChart, FeedError> {
        let outbound = self.outbound.clone().ok_or(FeedError::Closed)?;

        let id = Uuid::new_v4().simple().to_string();
        let session_id = format!("cs_{}", &id[..12]);
        let state = Arc::new(ChartState::default());
        self.routes.lock().insert(session_id.clone(), state.clone());

        let chart = TradingViewChart {
            session_id,
            outbound,
            state,
            series_count: 0,
            resolve_timeout: self.resolve_timeout,
            bar_range: self.bar_range,
        };
        chart.send("chart_create_session", json!([chart.session_id, ""]))?;
        info!(session = %chart.session_id, "chart session created");
        Ok(chart)
    }

    async fn end(&mut self) -> Result<(), FeedError> {
        if let Some(tx) = self.outbound.take() {
            let _ = tx.send(Outbound::Close);
        }
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(FeedError::Transport(format!("socket task failed: {e}"))),
            Err(_) => {
                task.abort();
                warn!("chart websocket did not close in time; task aborted");
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Chart
// ---------------------------------------------------------------------------

pub struct TradingViewChart {
    session_id: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    state: Arc<ChartState>,
    series_count: u32,
    resolve_timeout: Duration,
    bar_range: u32,
}

impl TradingViewChart {
    fn send(&self, method: &str, params: Value) -> Result<(), FeedError> {
        self.outbound
            .send(Outbound::Text(command(method, params)))
            .map_err(|_| FeedError::Closed)
    }
}

impl BarSource for TradingViewChart {
    fn bar_count(&self) -> usize {
        self.state.bars.len()
    }

    fn snapshot(&self) -> BarSeries {
        self.state.bars.snapshot()
    }
}

#[async_trait]
impl ChartSession for TradingViewChart {
    fn on_error(&mut self, handler: ErrorHandler) {
        *self.state.on_error.lock() = Some(handler);
    }

    async fn set_market(&mut self, request: &MarketRequest) -> Result<(), FeedError> {
        self.state.bars.clear();
        self.series_count += 1;
        let series = format!("ser_{}", self.series_count);
        let symbol_ref = format!(
            "={}",
            json!({ "symbol": request.symbol(), "adjustment": "splits" })
        );
        let resolution = request
            .timeframe()
            .map(normalize_timeframe)
            .unwrap_or_else(|| DEFAULT_RESOLUTION.to_string());

        if let MarketRequest::WithOptions { options, .. } = request {
            // TradingView infers the instrument type from the symbol itself.
            debug!(instrument_type = %options.instrument_type, "instrument type hint not sent");
        }

        let rx = self.state.expect_series(&series);

        self.send("resolve_symbol", json!([self.session_id, series, symbol_ref]))?;
        if self.series_count == 1 {
            self.send(
                "create_series",
                json!([self.session_id, PRICE_SERIES, "s1", series, resolution, self.bar_range]),
            )?;
        } else {
            self.send(
                "modify_series",
                json!([self.session_id, PRICE_SERIES, "s1", series, resolution, ""]),
            )?;
        }

        if matches!(request, MarketRequest::Basic { .. }) {
            // Fire-and-forget: a later symbol_error only reaches the error handler.
            debug!(symbol = %request.symbol(), "basic market request sent");
            return Ok(());
        }

        match tokio::time::timeout(self.resolve_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(FeedError::Closed),
            Err(_) => {
                self.state.pending.lock().take();
                Err(FeedError::Timeout(format!(
                    "symbol {} to resolve",
                    request.symbol()
                )))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
