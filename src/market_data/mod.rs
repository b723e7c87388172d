pub mod bar;
pub mod bar_buffer;
pub mod bar_series;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Bar`).
pub use bar::Bar;
pub use bar_buffer::BarBuffer;
pub use bar_series::BarSeries;
