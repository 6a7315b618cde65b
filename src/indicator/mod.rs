//! Derived-series kinds: each variant binds one kernel to its parameters.

use crate::error::{FormulaError, Result};
use crate::kernels::{self, InfPolicy, Kernel, KernelResult};
use crate::series::NumericSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorSpec {
    Ma { period: usize },
    Wma { period: usize },
    Ema { period: usize },
    Std { period: usize },
    /// `Y = (m·X + (n−m)·Y') / n`
    Sma { n: usize, m: usize },
    Sum { period: usize },
    Abs,
    /// Publishes `2 × (dif − dea)`.
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

pub const MACD_DEFAULT: (usize, usize, usize) = (12, 26, 9);

impl IndicatorSpec {
    pub fn macd_default() -> Self {
        let (fast, slow, signal) = MACD_DEFAULT;
        IndicatorSpec::Macd { fast, slow, signal }
    }

    /// Replacement applied to infinite inputs before the kernel runs.
    pub fn inf_policy(&self) -> InfPolicy {
        match self {
            IndicatorSpec::Sum { .. } | IndicatorSpec::Abs => InfPolicy::Zero,
            _ => InfPolicy::Nan,
        }
    }

    /// Creation parameters by name, in declaration order.
    pub fn params(&self) -> Vec<(&'static str, usize)> {
        match *self {
            IndicatorSpec::Ma { period }
            | IndicatorSpec::Wma { period }
            | IndicatorSpec::Ema { period }
            | IndicatorSpec::Std { period } => vec![("arg", period)],
            IndicatorSpec::Sum { period } => vec![("period", period)],
            IndicatorSpec::Sma { n, m } => vec![("n", n), ("m", m)],
            IndicatorSpec::Abs => Vec::new(),
            IndicatorSpec::Macd { fast, slow, signal } => vec![
                ("fastperiod", fast),
                ("slowperiod", slow),
                ("signalperiod", signal),
            ],
        }
    }

    /// Same kind, new parameters. MACD accepts up to three and falls back to
    /// 12/26/9 for the missing ones; every other kind needs an exact count.
    pub fn with_params(&self, params: &[usize]) -> Result<Self> {
        let expect = |n: usize| -> Result<()> {
            if params.len() != n {
                return Err(FormulaError::Params(format!(
                    "{} takes {n} parameter(s), got {}",
                    self.name(),
                    params.len()
                )));
            }
            Ok(())
        };
        let spec = match self {
            IndicatorSpec::Ma { .. } => {
                expect(1)?;
                IndicatorSpec::Ma { period: params[0] }
            }
            IndicatorSpec::Wma { .. } => {
                expect(1)?;
                IndicatorSpec::Wma { period: params[0] }
            }
            IndicatorSpec::Ema { .. } => {
                expect(1)?;
                IndicatorSpec::Ema { period: params[0] }
            }
            IndicatorSpec::Std { .. } => {
                expect(1)?;
                IndicatorSpec::Std { period: params[0] }
            }
            IndicatorSpec::Sum { .. } => {
                expect(1)?;
                IndicatorSpec::Sum { period: params[0] }
            }
            IndicatorSpec::Sma { .. } => {
                expect(2)?;
                IndicatorSpec::Sma {
                    n: params[0],
                    m: params[1],
                }
            }
            IndicatorSpec::Abs => {
                expect(0)?;
                IndicatorSpec::Abs
            }
            IndicatorSpec::Macd { .. } => {
                if params.len() > 3 {
                    return Err(FormulaError::Params(format!(
                        "MACD takes at most 3 parameters, got {}",
                        params.len()
                    )));
                }
                let (fast, slow, signal) = MACD_DEFAULT;
                IndicatorSpec::Macd {
                    fast: params.first().copied().unwrap_or(fast),
                    slow: params.get(1).copied().unwrap_or(slow),
                    signal: params.get(2).copied().unwrap_or(signal),
                }
            }
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Checks parameters without data: kernels validate before reading input.
    pub fn validate(&self) -> Result<()> {
        self.compute(&[])
            .map(|_| ())
            .map_err(|e| FormulaError::kernel(self.name(), e))
    }
}

impl Kernel for IndicatorSpec {
    fn name(&self) -> &'static str {
        match self {
            IndicatorSpec::Ma { .. } => "MA",
            IndicatorSpec::Wma { .. } => "WMA",
            IndicatorSpec::Ema { .. } => "EMA",
            IndicatorSpec::Std { .. } => "STD",
            IndicatorSpec::Sma { .. } => "SMA",
            IndicatorSpec::Sum { .. } => "SUM",
            IndicatorSpec::Abs => "ABS",
            IndicatorSpec::Macd { .. } => "MACD",
        }
    }

    fn compute(&self, input: &[f64]) -> KernelResult<Vec<f64>> {
        match *self {
            IndicatorSpec::Ma { period } => kernels::ma(input, period),
            IndicatorSpec::Wma { period } => kernels::wma(input, period),
            IndicatorSpec::Ema { period } => kernels::ema(input, period),
            IndicatorSpec::Std { period } => kernels::stddev(input, period),
            IndicatorSpec::Sma { n, m } => kernels::sma(input, n, m),
            IndicatorSpec::Sum { period } => kernels::sum(input, period),
            IndicatorSpec::Abs => Ok(kernels::abs(input)),
            IndicatorSpec::Macd { fast, slow, signal } => {
                let out = kernels::macd(input, fast, slow, signal)?;
                Ok(out.macd.iter().zip(&out.signal).map(|(d, e)| 2.0 * (d - e)).collect())
            }
        }
    }
}

// ===== constructors =====

pub fn ma(s: &NumericSeries, period: usize) -> Result<NumericSeries> {
    s.derive(IndicatorSpec::Ma { period })
}

pub fn wma(s: &NumericSeries, period: usize) -> Result<NumericSeries> {
    s.derive(IndicatorSpec::Wma { period })
}

pub fn ema(s: &NumericSeries, period: usize) -> Result<NumericSeries> {
    s.derive(IndicatorSpec::Ema { period })
}

pub fn std(s: &NumericSeries, period: usize) -> Result<NumericSeries> {
    s.derive(IndicatorSpec::Std { period })
}

pub fn sma(s: &NumericSeries, n: usize, m: usize) -> Result<NumericSeries> {
    s.derive(IndicatorSpec::Sma { n, m })
}

pub fn sum(s: &NumericSeries, period: usize) -> Result<NumericSeries> {
    s.derive(IndicatorSpec::Sum { period })
}

pub fn abs(s: &NumericSeries) -> Result<NumericSeries> {
    s.derive(IndicatorSpec::Abs)
}

pub fn macd(s: &NumericSeries, fast: usize, slow: usize, signal: usize) -> Result<NumericSeries> {
    s.derive(IndicatorSpec::Macd { fast, slow, signal })
}

/// All three MACD lines as static series.
#[derive(Debug, Clone)]
pub struct MacdLines {
    pub dif: NumericSeries,
    pub dea: NumericSeries,
    /// `2 × (dif − dea)`
    pub macd: NumericSeries,
}

pub fn macd_lines(s: &NumericSeries, fast: usize, slow: usize, signal: usize) -> Result<MacdLines> {
    let input = InfPolicy::Nan.clean(&s.values()?);
    let out = kernels::macd(&input, fast, slow, signal)
        .map_err(|e| FormulaError::kernel("MACD", e))?;
    let osc = out.hist.iter().map(|h| 2.0 * h).collect();
    Ok(MacdLines {
        dif: NumericSeries::new(out.macd),
        dea: NumericSeries::new(out.signal),
        macd: NumericSeries::new(osc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_argument_kinds_replace_inf_with_nan() {
        let s = NumericSeries::new(vec![1.0, f64::INFINITY, 3.0, 5.0]);
        let m = ma(&s, 2).unwrap().to_vec().unwrap();
        assert!(m[1].is_nan() && m[2].is_nan());
        assert_eq!(m[3], 4.0);
        // input left alone
        assert!(s.value(2).unwrap().is_infinite());
    }

    #[test]
    fn sum_and_abs_never_emit_inf() {
        let s = NumericSeries::new(vec![1.0, f64::INFINITY, -2.0, f64::NEG_INFINITY, 4.0]);
        let total = sum(&s, 2).unwrap().to_vec().unwrap();
        assert!(total.iter().all(|v| !v.is_infinite()));
        assert_eq!(&total[1..], &[1.0, -2.0, -2.0, 4.0]);

        let a = abs(&s).unwrap().to_vec().unwrap();
        assert_eq!(a, vec![1.0, 0.0, 2.0, 0.0, 4.0]);
    }

    #[test]
    fn kernel_failure_is_wrapped() {
        let s = NumericSeries::new(vec![1.0, 2.0]);
        match ema(&s, 0) {
            Err(FormulaError::Kernel { kernel, .. }) => assert_eq!(kernel, "EMA"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn params_are_recorded() {
        let s = NumericSeries::new(vec![1.0, 2.0, 3.0]);
        let m = ma(&s, 2).unwrap();
        assert_eq!(m.spec(), Some(IndicatorSpec::Ma { period: 2 }));
        assert_eq!(m.spec().unwrap().params(), vec![("arg", 2)]);
        assert!(s.spec().is_none());
    }

    #[test]
    fn with_params_checks_count_and_values() {
        let spec = IndicatorSpec::Ma { period: 5 };
        assert_eq!(spec.with_params(&[10]).unwrap(), IndicatorSpec::Ma { period: 10 });
        assert!(matches!(spec.with_params(&[1, 2]), Err(FormulaError::Params(_))));
        assert!(matches!(spec.with_params(&[0]), Err(FormulaError::Kernel { .. })));

        let m = IndicatorSpec::macd_default().with_params(&[5]).unwrap();
        assert_eq!(m, IndicatorSpec::Macd { fast: 5, slow: 26, signal: 9 });
    }

    #[test]
    fn macd_lines_match_published_value() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let s = NumericSeries::new(closes);
        let lines = macd_lines(&s, 12, 26, 9).unwrap();
        let osc = macd(&s, 12, 26, 9).unwrap();
        let (dif, dea, m) = (
            lines.dif.current().unwrap(),
            lines.dea.current().unwrap(),
            osc.current().unwrap(),
        );
        assert!((m - 2.0 * (dif - dea)).abs() < 1e-9);
        assert!((lines.macd.current().unwrap() - m).abs() < 1e-9);
    }
}
