use std::cell::RefCell;
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::formula::{Formula, Value};
use crate::indicator::IndicatorSpec;
use crate::kline_buffer::KlineBuffer;
use crate::series::NumericSeries;
use crate::source::BarSource;
use crate::{Bar, Field};

/// Owns the bar history and hands out series bound to it.
///
/// Series obtained from the engine are dynamic: after `push_kline` or
/// `update_last` their next read sees the new data.
#[derive(Debug)]
pub struct FormulaEngine {
    config: EngineConfig,
    bars: Rc<RefCell<KlineBuffer>>,
}

impl FormulaEngine {
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_config(EngineConfig {
            capacity,
            ..EngineConfig::default()
        })
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            bars: Rc::new(RefCell::new(KlineBuffer::new(config.capacity))),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.bars.borrow().capacity()
    }

    pub fn len(&self) -> usize {
        self.bars.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.borrow().is_empty()
    }

    pub fn last_bar(&self) -> Option<Bar> {
        self.bars.borrow().last()
    }

    pub fn push_kline(&mut self, bar: Bar) {
        self.bars.borrow_mut().push(bar);
        tracing::trace!(ts = bar.timestamp, close = bar.close, "bar pushed");
    }

    /// Replaces the newest bar (e.g. a still-forming candle). Returns the
    /// replaced bar, or `None` if there was nothing to replace.
    pub fn update_last(&mut self, bar: Bar) -> Option<Bar> {
        let old = self.bars.borrow_mut().update_last(bar);
        tracing::trace!(ts = bar.timestamp, close = bar.close, replaced = old.is_some(), "last bar updated");
        old
    }

    pub fn clear(&mut self) {
        self.bars.borrow_mut().clear();
    }

    /// The engine's bar history as an injectable source.
    pub fn source(&self) -> Rc<dyn BarSource> {
        self.bars.clone()
    }

    pub fn price(&self, field: Field) -> NumericSeries {
        NumericSeries::price(self.source(), field).memoized(self.config.memoize_dynamic)
    }

    pub fn open(&self) -> NumericSeries {
        self.price(Field::Open)
    }

    pub fn high(&self) -> NumericSeries {
        self.price(Field::High)
    }

    pub fn low(&self) -> NumericSeries {
        self.price(Field::Low)
    }

    pub fn close(&self) -> NumericSeries {
        self.price(Field::Close)
    }

    pub fn volume(&self) -> NumericSeries {
        self.price(Field::Volume)
    }

    /// Dynamic MACD oscillator over the close price.
    pub fn macd(&self, fast: usize, slow: usize, signal: usize) -> Result<NumericSeries> {
        self.close()
            .derive_dynamic(IndicatorSpec::Macd { fast, slow, signal })
    }

    pub fn compile(&self, text: &str) -> Result<Formula> {
        Formula::compile(text)
    }

    pub fn evaluate(&self, formula: &Formula) -> Result<Value> {
        formula.evaluate(&*self.bars)
    }

    /// Compiles and evaluates in one step.
    pub fn eval(&self, text: &str) -> Result<Value> {
        self.evaluate(&Formula::compile(text)?)
    }
}
