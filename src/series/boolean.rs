use core::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::rc::Rc;

use crate::align::fit_slices;
use crate::error::{FormulaError, Result};

use super::NumericSeries;

/// Static boolean series (oldest first), the result of comparisons and
/// logical combinators.
#[derive(Clone, PartialEq, Eq)]
pub struct BoolSeries {
    values: Rc<[bool]>,
}

impl fmt::Debug for BoolSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoolSeries")
            .field("len", &self.values.len())
            .field("current", &self.values.last())
            .finish()
    }
}

impl BoolSeries {
    pub fn new(values: Vec<bool>) -> Self {
        Self {
            values: Rc::from(values),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[bool] {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<bool> {
        self.values.to_vec()
    }

    /// Value `n` periods before the most recent one.
    pub fn value(&self, n: usize) -> Result<bool> {
        let len = self.values.len();
        if n >= len {
            return Err(FormulaError::IndexOutOfRange { offset: n, len });
        }
        Ok(self.values[len - 1 - n])
    }

    #[inline]
    pub fn current(&self) -> Result<bool> {
        self.value(0)
    }

    /// Same rules as [`NumericSeries::shift`].
    pub fn shift(&self, n: usize) -> Result<BoolSeries> {
        let len = self.values.len();
        if len == 0 {
            return Ok(BoolSeries::new(Vec::new()));
        }
        if n > len {
            return Err(FormulaError::IndexOutOfRange { offset: n, len });
        }
        Ok(BoolSeries::new(self.values[..len - n].to_vec()))
    }

    /// `1.0` for true, `0.0` for false.
    pub fn to_numeric(&self) -> NumericSeries {
        self.values.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()
    }

    fn zip(&self, rhs: &BoolSeries, f: impl Fn(bool, bool) -> bool) -> BoolSeries {
        let (a, b) = fit_slices(&self.values, &rhs.values);
        a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
    }
}

impl From<Vec<bool>> for BoolSeries {
    fn from(values: Vec<bool>) -> Self {
        BoolSeries::new(values)
    }
}

impl FromIterator<bool> for BoolSeries {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        BoolSeries::new(iter.into_iter().collect())
    }
}

impl BitAnd for &BoolSeries {
    type Output = BoolSeries;

    fn bitand(self, rhs: &BoolSeries) -> BoolSeries {
        self.zip(rhs, |a, b| a && b)
    }
}

impl BitOr for &BoolSeries {
    type Output = BoolSeries;

    fn bitor(self, rhs: &BoolSeries) -> BoolSeries {
        self.zip(rhs, |a, b| a || b)
    }
}

impl Not for &BoolSeries {
    type Output = BoolSeries;

    fn not(self) -> BoolSeries {
        self.values.iter().map(|b| !b).collect()
    }
}
