//! Free functions over series: crossover, lag, element-wise min/max,
//! conditional counting, rolling extrema and conditional select.
//!
//! Series arguments also accept plain numbers (see [`Operand`]). Comparisons
//! involving NaN are simply `false`; nothing here warns or fails on NaN.

use crate::align::fit_slices;
use crate::error::{FormulaError, Result};
use crate::kernels::{self, InfPolicy, KernelResult};
use crate::series::{zip_operands, BoolSeries, NumericSeries, Operand};

/// Strict upward cross: `a > b` now and `a <= b` one period earlier.
///
/// The current and lagged comparisons are aligned separately, then combined,
/// so the output is one element shorter than the aligned inputs.
pub fn cross_over(a: impl Into<Operand>, b: impl Into<Operand>) -> Result<BoolSeries> {
    let (a, b) = (a.into(), b.into());
    let above = zip_operands(&a, &b, |x, y| x > y)?;
    let was_below = zip_operands(&a.shift(1)?, &b.shift(1)?, |x, y| x <= y)?;
    let (now, prev) = fit_slices(&above, &was_below);
    Ok(now.iter().zip(prev).map(|(&n, &p)| n && p).collect())
}

/// `s` as it was `n` periods ago.
#[inline]
pub fn ref_(s: &NumericSeries, n: usize) -> Result<NumericSeries> {
    s.shift(n)
}

fn require_data(op: &Operand, what: &str) -> Result<()> {
    if let Operand::Series(s) = op {
        if s.is_empty()? {
            return Err(FormulaError::precondition(format!("{what}: empty series")));
        }
    }
    Ok(())
}

fn nan_aware(x: f64, y: f64, pick: fn(f64, f64) -> f64) -> f64 {
    if x.is_nan() || y.is_nan() {
        f64::NAN
    } else {
        pick(x, y)
    }
}

/// Element-wise minimum of the aligned inputs. Fails if either is empty.
pub fn minimum(a: impl Into<Operand>, b: impl Into<Operand>) -> Result<NumericSeries> {
    let (a, b) = (a.into(), b.into());
    require_data(&a, "minimum")?;
    require_data(&b, "minimum")?;
    zip_operands(&a, &b, |x, y| nan_aware(x, y, f64::min)).map(NumericSeries::new)
}

/// Element-wise maximum of the aligned inputs. Fails if either is empty.
pub fn maximum(a: impl Into<Operand>, b: impl Into<Operand>) -> Result<NumericSeries> {
    let (a, b) = (a.into(), b.into());
    require_data(&a, "maximum")?;
    require_data(&b, "maximum")?;
    zip_operands(&a, &b, |x, y| nan_aware(x, y, f64::max)).map(NumericSeries::new)
}

/// Number of `true` values in each trailing window of `n`.
///
/// Output element `j` counts the window `cond[j + 1 ..= j + n]`, so there are
/// `len - n` outputs and the last one covers the newest `n` values.
pub fn count(cond: &BoolSeries, n: usize) -> Result<NumericSeries> {
    let values = cond.values();
    if n == 0 {
        return Err(FormulaError::precondition("count: window must be > 0"));
    }
    if values.len() < n {
        return Err(FormulaError::precondition(format!(
            "count: window {n} longer than series ({})",
            values.len()
        )));
    }
    let size = values.len() - n;
    if size == 0 {
        return Ok(NumericSeries::new(Vec::new()));
    }
    let mut out = Vec::with_capacity(size);
    let mut hits = values[1..=n].iter().filter(|&&b| b).count();
    for j in 0..size {
        if j > 0 {
            if values[j] {
                hits -= 1;
            }
            if values[j + n] {
                hits += 1;
            }
        }
        out.push(hits as f64);
    }
    Ok(NumericSeries::new(out))
}

/// `true` where the whole trailing window of `n` values is `true`.
pub fn every(cond: &BoolSeries, n: usize) -> Result<BoolSeries> {
    let counts = count(cond, n)?;
    counts.equals(n as f64)
}

type WindowKernel = fn(&[f64], usize) -> KernelResult<Vec<f64>>;

fn rolling(s: &NumericSeries, n: usize, name: &'static str, f: WindowKernel) -> Result<NumericSeries> {
    let values = s.values()?;
    if n > 0 && values.len() < n {
        return Err(FormulaError::precondition(format!(
            "{name}: window {n} longer than series ({})",
            values.len()
        )));
    }
    let input = InfPolicy::Nan.clean(&values);
    f(&input, n)
        .map(NumericSeries::new)
        .map_err(|e| FormulaError::kernel(name, e))
}

/// Highest value of each full window of `n`; `len - n + 1` outputs.
pub fn hhv(s: &NumericSeries, n: usize) -> Result<NumericSeries> {
    rolling(s, n, "HHV", kernels::rolling_max)
}

/// Lowest value of each full window of `n`; `len - n + 1` outputs.
pub fn llv(s: &NumericSeries, n: usize) -> Result<NumericSeries> {
    rolling(s, n, "LLV", kernels::rolling_min)
}

/// Element-wise select: `a` where `cond` holds, `b` elsewhere. All three are
/// aligned on their newest element first; two scalar branches take the
/// condition's length.
pub fn iif(cond: &BoolSeries, a: impl Into<Operand>, b: impl Into<Operand>) -> Result<NumericSeries> {
    let (a, b) = (a.into(), b.into());
    if let (Operand::Scalar(x), Operand::Scalar(y)) = (&a, &b) {
        return Ok(cond.values().iter().map(|&c| if c { *x } else { *y }).collect());
    }
    let pairs = zip_operands(&a, &b, |x, y| (x, y))?;
    let (cond, pairs) = fit_slices(cond.values(), &pairs);
    Ok(cond
        .iter()
        .zip(pairs)
        .map(|(&c, &(x, y))| if c { x } else { y })
        .collect())
}

/// Bars elapsed since `cond` was last `true` (0 on a `true` bar), NaN before
/// the first `true`.
pub fn barslast(cond: &BoolSeries) -> NumericSeries {
    let mut last: Option<usize> = None;
    cond.values()
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if c {
                last = Some(i);
            }
            last.map_or(f64::NAN, |l| (i - l) as f64)
        })
        .collect()
}
