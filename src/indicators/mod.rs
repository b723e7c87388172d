// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator functions. Every public function returns
// `Option<T>` (or a total enum) so callers are forced to handle
// insufficient-data and numerical-edge-case scenarios.

pub mod crossover;
pub mod position;
pub mod sma;

pub use crossover::derive_signal;
pub use position::{price_position, recent_range};
pub use sma::{ma_difference_pct, sma};
