// =============================================================================
// Bar — a single OHLCV candle resolved from a loosely-typed feed payload
// =============================================================================
//
// Feed versions disagree on field names: one sends `{"close": ..}`, another
// `{"c": ..}`, the TradingView client library uses `max`/`min` for high/low,
// and the raw series payload is a positional array `[t, o, h, l, c, v]`.
// Each field is resolved through an ordered alias table; the first alias that
// yields a finite number wins. Zero is a legitimate price and is kept.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One way a field may be spelled in a raw bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAlias {
    /// Object member name.
    Key(&'static str),
    /// Position inside an array-shaped bar.
    Index(usize),
}

use FieldAlias::{Index, Key};

pub const TIME_ALIASES: &[FieldAlias] = &[Key("time"), Key("timestamp"), Key("t"), Index(0)];
pub const OPEN_ALIASES: &[FieldAlias] = &[Key("open"), Key("o"), Index(1)];
pub const HIGH_ALIASES: &[FieldAlias] = &[Key("high"), Key("h"), Key("max"), Index(2)];
pub const LOW_ALIASES: &[FieldAlias] = &[Key("low"), Key("l"), Key("min"), Index(3)];
pub const CLOSE_ALIASES: &[FieldAlias] = &[Key("close"), Key("c"), Index(4)];
pub const VOLUME_ALIASES: &[FieldAlias] = &[Key("volume"), Key("vol"), Key("v"), Index(5)];

/// Timestamps at or above this value are milliseconds, below it seconds.
const MILLIS_THRESHOLD: f64 = 1e12;

/// A single candle. Every field is optional: a bar with a missing close is
/// still a bar, it just does not contribute to the close series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl Bar {
    /// Build a bar from a raw feed value (object or positional array).
    pub fn from_value(raw: &Value) -> Self {
        Self {
            time: resolve_field(raw, TIME_ALIASES),
            open: resolve_field(raw, OPEN_ALIASES),
            high: resolve_field(raw, HIGH_ALIASES),
            low: resolve_field(raw, LOW_ALIASES),
            close: resolve_field(raw, CLOSE_ALIASES),
            volume: resolve_field(raw, VOLUME_ALIASES),
        }
    }

    /// Candle open time in UTC, accepting either seconds or milliseconds.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let t = self.time?;
        let millis = if t >= MILLIS_THRESHOLD { t } else { t * 1000.0 };
        DateTime::from_timestamp_millis(millis as i64)
    }
}

/// Return the first alias of `aliases` that holds a finite number in `raw`.
pub fn resolve_field(raw: &Value, aliases: &[FieldAlias]) -> Option<f64> {
    aliases.iter().find_map(|alias| {
        let candidate = match alias {
            Key(name) => raw.get(*name)?,
            Index(i) => raw.get(*i)?,
        };
        as_finite_f64(candidate)
    })
}

/// Feeds send prices either as JSON numbers or as numeric strings.
fn as_finite_f64(val: &Value) -> Option<f64> {
    let n = match val {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
