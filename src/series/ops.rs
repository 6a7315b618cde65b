//! Element-wise arithmetic and comparisons. Both sides are aligned on their
//! newest element; the result is static.
//!
//! Arithmetic operators return `Result` because reading a dynamic operand can
//! fail.

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::error::Result;

use super::{zip_operands, BoolSeries, NumericSeries, Operand};

fn arith(a: &NumericSeries, b: Operand, f: fn(f64, f64) -> f64) -> Result<NumericSeries> {
    zip_operands(&Operand::from(a), &b, f).map(NumericSeries::new)
}

macro_rules! impl_arith {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&NumericSeries> for &NumericSeries {
            type Output = Result<NumericSeries>;

            fn $method(self, rhs: &NumericSeries) -> Self::Output {
                arith(self, Operand::from(rhs), |a, b| a $op b)
            }
        }

        impl $trait<f64> for &NumericSeries {
            type Output = Result<NumericSeries>;

            fn $method(self, rhs: f64) -> Self::Output {
                arith(self, Operand::Scalar(rhs), |a, b| a $op b)
            }
        }

        impl $trait<&NumericSeries> for f64 {
            type Output = Result<NumericSeries>;

            fn $method(self, rhs: &NumericSeries) -> Self::Output {
                zip_operands(&Operand::Scalar(self), &Operand::from(rhs), |a, b| a $op b)
                    .map(NumericSeries::new)
            }
        }
    };
}

impl_arith!(Add, add, +);
impl_arith!(Sub, sub, -);
impl_arith!(Mul, mul, *);
impl_arith!(Div, div, /);

impl Neg for &NumericSeries {
    type Output = Result<NumericSeries>;

    fn neg(self) -> Self::Output {
        Ok(self.values()?.iter().map(|v| -v).collect())
    }
}

impl NumericSeries {
    fn compare(&self, rhs: Operand, f: fn(f64, f64) -> bool) -> Result<BoolSeries> {
        zip_operands(&Operand::from(self), &rhs, f).map(BoolSeries::new)
    }

    pub fn gt(&self, rhs: impl Into<Operand>) -> Result<BoolSeries> {
        self.compare(rhs.into(), |a, b| a > b)
    }

    pub fn ge(&self, rhs: impl Into<Operand>) -> Result<BoolSeries> {
        self.compare(rhs.into(), |a, b| a >= b)
    }

    pub fn lt(&self, rhs: impl Into<Operand>) -> Result<BoolSeries> {
        self.compare(rhs.into(), |a, b| a < b)
    }

    pub fn le(&self, rhs: impl Into<Operand>) -> Result<BoolSeries> {
        self.compare(rhs.into(), |a, b| a <= b)
    }

    pub fn equals(&self, rhs: impl Into<Operand>) -> Result<BoolSeries> {
        self.compare(rhs.into(), |a, b| a == b)
    }

    pub fn not_equals(&self, rhs: impl Into<Operand>) -> Result<BoolSeries> {
        self.compare(rhs.into(), |a, b| a != b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_aligns_on_newest() {
        let a = NumericSeries::new(vec![1.0, 2.0, 3.0]);
        let b = NumericSeries::new(vec![10.0, 20.0]);
        assert_eq!((&a + &b).unwrap().to_vec().unwrap(), vec![12.0, 23.0]);
        assert_eq!((&a - 1.0).unwrap().to_vec().unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!((2.0 * &a).unwrap().to_vec().unwrap(), vec![2.0, 4.0, 6.0]);
        assert_eq!((-&b).unwrap().to_vec().unwrap(), vec![-10.0, -20.0]);
    }

    #[test]
    fn division_by_zero_is_inf_not_error() {
        let a = NumericSeries::new(vec![1.0, 0.0]);
        let q = (&a / 0.0).unwrap().to_vec().unwrap();
        assert!(q[0].is_infinite());
        assert!(q[1].is_nan());
    }

    #[test]
    fn comparisons_with_nan_are_false() {
        let a = NumericSeries::new(vec![f64::NAN, 2.0, 3.0]);
        assert_eq!(a.gt(2.0).unwrap().to_vec(), vec![false, false, true]);
        assert_eq!(a.ge(2.0).unwrap().to_vec(), vec![false, true, true]);
        assert_eq!(a.lt(3.0).unwrap().to_vec(), vec![false, true, false]);
        assert_eq!(a.equals(2.0).unwrap().to_vec(), vec![false, true, false]);
        assert_eq!(a.not_equals(2.0).unwrap().to_vec(), vec![true, false, true]);
    }

    #[test]
    fn series_against_series() {
        let a = NumericSeries::new(vec![1.0, 5.0, 3.0]);
        let b = NumericSeries::new(vec![4.0, 4.0]);
        assert_eq!(a.le(&b).unwrap().to_vec(), vec![false, true]);
    }
}
