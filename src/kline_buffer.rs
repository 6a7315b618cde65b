use std::cell::RefCell;

use crate::circular::CircularColumn;
use crate::source::{BarSource, SourceError};
use crate::types::{Bar, Bars, Field};

/// Columnar ring-buffer of OHLCV bars with a data-version counter.
///
/// Every mutation bumps `version`, which is how dynamic series learn that
/// their cached values went stale.
#[derive(Debug, Clone)]
pub struct KlineBuffer {
    ts: CircularColumn<i64>,
    open: CircularColumn<f64>,
    high: CircularColumn<f64>,
    low: CircularColumn<f64>,
    close: CircularColumn<f64>,
    volume: CircularColumn<f64>,
    version: u64,
}

impl KlineBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ts: CircularColumn::new(capacity),
            open: CircularColumn::new(capacity),
            high: CircularColumn::new(capacity),
            low: CircularColumn::new(capacity),
            close: CircularColumn::new(capacity),
            volume: CircularColumn::new(capacity),
            version: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.close.capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.close.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn push(&mut self, bar: Bar) {
        self.ts.push(bar.timestamp);
        self.open.push(bar.open);
        self.high.push(bar.high);
        self.low.push(bar.low);
        self.close.push(bar.close);
        self.volume.push(bar.volume);
        self.version += 1;
    }

    /// Replaces the newest bar and returns the one it replaced.
    ///
    /// On an empty buffer nothing changes and `None` is returned.
    pub fn update_last(&mut self, bar: Bar) -> Option<Bar> {
        let old = self.last()?;
        self.ts.update_last(bar.timestamp);
        self.open.update_last(bar.open);
        self.high.update_last(bar.high);
        self.low.update_last(bar.low);
        self.close.update_last(bar.close);
        self.volume.update_last(bar.volume);
        self.version += 1;
        Some(old)
    }

    pub fn clear(&mut self) {
        self.ts.clear();
        self.open.clear();
        self.high.clear();
        self.low.clear();
        self.close.clear();
        self.volume.clear();
        self.version += 1;
    }

    /// Bar `n` steps back from the newest (0 = newest).
    pub fn get_from_end(&self, n: usize) -> Option<Bar> {
        Some(Bar {
            timestamp: self.ts.get_from_end(n)?,
            open: self.open.get_from_end(n)?,
            high: self.high.get_from_end(n)?,
            low: self.low.get_from_end(n)?,
            close: self.close.get_from_end(n)?,
            volume: self.volume.get_from_end(n)?,
        })
    }

    #[inline]
    pub fn last(&self) -> Option<Bar> {
        self.get_from_end(0)
    }

    pub fn last_f64(&self, field: Field) -> Option<f64> {
        self.last().map(|b| b.field(field))
    }

    /// Copies the retained history out, oldest first.
    pub fn snapshot(&self) -> Bars {
        let mut bars = Bars::with_capacity(self.len());
        self.ts.extend_ordered(&mut bars.timestamp);
        self.open.extend_ordered(&mut bars.open);
        self.high.extend_ordered(&mut bars.high);
        self.low.extend_ordered(&mut bars.low);
        self.close.extend_ordered(&mut bars.close);
        self.volume.extend_ordered(&mut bars.volume);
        bars
    }
}

impl BarSource for RefCell<KlineBuffer> {
    fn bars(&self) -> Result<Bars, SourceError> {
        Ok(self.borrow().snapshot())
    }

    fn version(&self) -> Option<u64> {
        Some(self.borrow().version())
    }
}

#[cfg(test)]
mod tests {
    use super::KlineBuffer;
    use crate::types::{Bar, Field};

    #[test]
    fn push_update_last_and_snapshot() {
        let mut kb = KlineBuffer::new(2);
        assert!(kb.update_last(Bar::flat(0, 1.0)).is_none());
        assert_eq!(kb.version(), 0);

        kb.push(Bar::new(1, 1.0, 2.0, 0.5, 1.5, 10.0));
        kb.push(Bar::new(2, 2.0, 3.0, 1.5, 2.5, 11.0));
        let old = kb.update_last(Bar::new(2, 20.0, 30.0, 15.0, 25.0, 110.0));
        assert_eq!(old.map(|b| b.close), Some(2.5));
        assert_eq!(kb.last_f64(Field::Close), Some(25.0));

        kb.push(Bar::new(3, 3.0, 4.0, 2.5, 3.5, 12.0));
        assert_eq!(kb.len(), 2);
        assert_eq!(kb.version(), 4);

        let snap = kb.snapshot();
        assert_eq!(snap.timestamp, vec![2, 3]);
        assert_eq!(snap.close, vec![25.0, 3.5]);
        assert_eq!(snap.volume, vec![110.0, 12.0]);
    }

    #[test]
    fn clear_bumps_version() {
        let mut kb = KlineBuffer::new(4);
        kb.push(Bar::flat(1, 1.0));
        let v = kb.version();
        kb.clear();
        assert!(kb.is_empty());
        assert!(kb.version() > v);
        assert!(kb.snapshot().is_empty());
    }
}
