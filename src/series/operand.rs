use std::rc::Rc;

use crate::align::fit_slices;
use crate::error::Result;

use super::NumericSeries;

/// A series or a plain number. Numbers broadcast to any length.
#[derive(Debug, Clone)]
pub enum Operand {
    Series(NumericSeries),
    Scalar(f64),
}

impl Operand {
    /// Shifted view; a scalar is the same at every offset.
    pub fn shift(&self, n: usize) -> Result<Operand> {
        match self {
            Operand::Series(s) => Ok(Operand::Series(s.shift(n)?)),
            Operand::Scalar(v) => Ok(Operand::Scalar(*v)),
        }
    }

    fn resolve(&self) -> Result<Resolved> {
        Ok(match self {
            Operand::Series(s) => Resolved::Values(s.values()?),
            Operand::Scalar(v) => Resolved::Scalar(*v),
        })
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Scalar(v)
    }
}

impl From<NumericSeries> for Operand {
    fn from(s: NumericSeries) -> Self {
        Operand::Series(s)
    }
}

impl From<&NumericSeries> for Operand {
    fn from(s: &NumericSeries) -> Self {
        Operand::Series(s.clone())
    }
}

enum Resolved {
    Values(Rc<[f64]>),
    Scalar(f64),
}

/// Element-wise `f` over the common trailing window of `a` and `b`.
/// Two scalars produce a single element.
pub(crate) fn zip_operands<T>(a: &Operand, b: &Operand, f: impl Fn(f64, f64) -> T) -> Result<Vec<T>> {
    Ok(match (a.resolve()?, b.resolve()?) {
        (Resolved::Values(x), Resolved::Values(y)) => {
            let (x, y) = fit_slices(&x, &y);
            x.iter().zip(y).map(|(&u, &v)| f(u, v)).collect()
        }
        (Resolved::Values(x), Resolved::Scalar(v)) => x.iter().map(|&u| f(u, v)).collect(),
        (Resolved::Scalar(u), Resolved::Values(y)) => y.iter().map(|&v| f(u, v)).collect(),
        (Resolved::Scalar(u), Resolved::Scalar(v)) => vec![f(u, v)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_broadcasts() {
        let s = Operand::from(NumericSeries::new(vec![1.0, 2.0, 3.0]));
        let out = zip_operands(&s, &Operand::Scalar(10.0), |a, b| a + b).unwrap();
        assert_eq!(out, vec![11.0, 12.0, 13.0]);

        let out = zip_operands(&Operand::Scalar(1.0), &Operand::Scalar(2.0), |a, b| a < b).unwrap();
        assert_eq!(out, vec![true]);
    }

    #[test]
    fn series_pair_is_trimmed_to_shorter() {
        let a = Operand::from(NumericSeries::new(vec![1.0, 2.0, 3.0]));
        let b = Operand::from(NumericSeries::new(vec![5.0]));
        assert_eq!(zip_operands(&a, &b, |x, y| x * y).unwrap(), vec![15.0]);
    }

    #[test]
    fn scalar_ignores_shift() {
        let op = Operand::Scalar(4.0).shift(100).unwrap();
        assert!(matches!(op, Operand::Scalar(v) if v == 4.0));
    }
}
