//! Lazy time-series formulas over bar data (MA/EMA/SUM/MACD, CROSS, COUNT,
//! HHV/LLV, IF, ...).
//!
//! Series index newest-first: offset 0 is the most recent value. Binary
//! operations align their inputs on the newest element (see [`fit_series`]).
//! Series handed out by a [`FormulaEngine`] are dynamic and re-derive their
//! values from the engine's bar history when read.

mod types;
pub use types::*;

pub mod error;
pub use error::{FormulaError, Result};

pub mod circular;
pub mod kline_buffer;
pub mod source;

pub mod kernels;
pub mod align;
pub use align::fit_series;

pub mod indicator;
pub mod series;
pub use series::{BoolSeries, NumericSeries, Operand};

pub mod functions;
pub mod formula;

pub mod config;
pub mod engine;
pub use config::EngineConfig;
pub use engine::FormulaEngine;
