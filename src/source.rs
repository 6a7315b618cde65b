//! External bar-data accessor used by dynamic series.

use std::cell::RefCell;

use crate::types::Bars;

/// Error produced by a bar source. Formula code never inspects it.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Something that can hand out the current bar history on demand.
///
/// Dynamic series hold an `Rc<dyn BarSource>` and call [`BarSource::bars`]
/// synchronously whenever they are read.
pub trait BarSource {
    /// Current history, oldest first. An empty snapshot means "no data yet".
    fn bars(&self) -> Result<Bars, SourceError>;

    /// Monotonic counter bumped on every data change, if the source tracks one.
    ///
    /// Sources returning `None` force a refresh on every read.
    fn version(&self) -> Option<u64> {
        None
    }
}

/// A fixed snapshot never changes, so its version is constant.
impl BarSource for Bars {
    fn bars(&self) -> Result<Bars, SourceError> {
        Ok(self.clone())
    }

    fn version(&self) -> Option<u64> {
        Some(0)
    }
}

/// Swappable snapshot: replace the inner `Bars` to simulate a feed update.
impl BarSource for RefCell<Bars> {
    fn bars(&self) -> Result<Bars, SourceError> {
        Ok(self.borrow().clone())
    }
}
