//! Vectorized numeric kernels.
//!
//! Every kernel is a pure function from a buffer (oldest first) plus integer
//! parameters to a new buffer. Full-length kernels return one output per input
//! with `NaN` during the warm-up ("lookback") region, the TA-Lib convention.
//! Windowed kernels (`rolling_max`/`rolling_min`) return one output per full
//! window instead.
//!
//! Moving-average kernels tolerate `NaN`: a window that contains `NaN` yields
//! `NaN`, and the output recovers once the `NaN` leaves the window.

use core::fmt;
use std::collections::VecDeque;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("invalid period {period}")]
    InvalidPeriod { period: usize },

    #[error("invalid parameter {name}={value}: {reason}")]
    InvalidParam {
        name: &'static str,
        value: usize,
        reason: &'static str,
    },
}

pub type KernelResult<T> = Result<T, KernelError>;

/// Pluggable single-output kernel.
pub trait Kernel: fmt::Debug {
    fn name(&self) -> &'static str;
    fn compute(&self, input: &[f64]) -> KernelResult<Vec<f64>>;
}

/// Adapts a closure into a [`Kernel`].
pub struct FnKernel<F> {
    name: &'static str,
    f: F,
}

impl<F> FnKernel<F>
where
    F: Fn(&[f64]) -> KernelResult<Vec<f64>>,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> fmt::Debug for FnKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnKernel").field("name", &self.name).finish()
    }
}

impl<F> Kernel for FnKernel<F>
where
    F: Fn(&[f64]) -> KernelResult<Vec<f64>>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn compute(&self, input: &[f64]) -> KernelResult<Vec<f64>> {
        (self.f)(input)
    }
}

/// What infinite inputs are replaced with before a kernel sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfPolicy {
    /// For NaN-tolerant kernels (moving averages, std-dev, MACD).
    Nan,
    /// For summation-style kernels; zero is the identity of `+`.
    Zero,
}

impl InfPolicy {
    /// Returns a copy of `input` without infinities. The input is never mutated.
    pub fn clean(self, input: &[f64]) -> Vec<f64> {
        let fill = match self {
            InfPolicy::Nan => f64::NAN,
            InfPolicy::Zero => 0.0,
        };
        input
            .iter()
            .map(|&v| if v.is_infinite() { fill } else { v })
            .collect()
    }
}

#[inline]
fn check_period(period: usize) -> KernelResult<()> {
    if period == 0 {
        return Err(KernelError::InvalidPeriod { period });
    }
    Ok(())
}

fn check_param(name: &'static str, value: usize) -> KernelResult<()> {
    if value == 0 {
        return Err(KernelError::InvalidParam {
            name,
            value,
            reason: "must be > 0",
        });
    }
    Ok(())
}

/// Running window sums of `x` and `x²`, skipping windows that hold a NaN.
///
/// Calls `emit(i, sum, sumsq)` for each index whose trailing window is full and
/// NaN-free.
fn rolling_sums(x: &[f64], period: usize, mut emit: impl FnMut(usize, f64, f64)) {
    let mut sum = 0.0;
    let mut sumsq = 0.0;
    let mut nans = 0usize;
    for (i, &v) in x.iter().enumerate() {
        if v.is_nan() {
            nans += 1;
        } else {
            sum += v;
            sumsq += v * v;
        }
        if i >= period {
            let old = x[i - period];
            if old.is_nan() {
                nans -= 1;
            } else {
                sum -= old;
                sumsq -= old * old;
            }
        }
        if i + 1 >= period && nans == 0 {
            emit(i, sum, sumsq);
        }
    }
}

/// Simple moving average.
pub fn ma(x: &[f64], period: usize) -> KernelResult<Vec<f64>> {
    check_period(period)?;
    let mut out = vec![f64::NAN; x.len()];
    let p = period as f64;
    rolling_sums(x, period, |i, sum, _| out[i] = sum / p);
    Ok(out)
}

/// Rolling sum over `period` values.
pub fn sum(x: &[f64], period: usize) -> KernelResult<Vec<f64>> {
    check_period(period)?;
    let mut out = vec![f64::NAN; x.len()];
    rolling_sums(x, period, |i, sum, _| out[i] = sum);
    Ok(out)
}

/// Population standard deviation over `period` values.
pub fn stddev(x: &[f64], period: usize) -> KernelResult<Vec<f64>> {
    check_period(period)?;
    let mut out = vec![f64::NAN; x.len()];
    let p = period as f64;
    rolling_sums(x, period, |i, sum, sumsq| {
        let mean = sum / p;
        let var = sumsq / p - mean * mean;
        out[i] = var.max(0.0).sqrt();
    });
    Ok(out)
}

/// Linearly weighted moving average; the newest value weighs `period`.
pub fn wma(x: &[f64], period: usize) -> KernelResult<Vec<f64>> {
    check_period(period)?;
    let mut out = vec![f64::NAN; x.len()];
    if x.len() < period {
        return Ok(out);
    }
    let denom = (period * (period + 1)) as f64 / 2.0;
    for (end, slot) in out.iter_mut().enumerate().skip(period - 1) {
        let window = &x[end + 1 - period..=end];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let num: f64 = window
            .iter()
            .enumerate()
            .map(|(k, v)| (k + 1) as f64 * v)
            .sum();
        *slot = num / denom;
    }
    Ok(out)
}

/// Exponential moving average, seeded with the mean of the first `period`
/// valid values. NaN inputs produce NaN and leave the state untouched.
pub fn ema(x: &[f64], period: usize) -> KernelResult<Vec<f64>> {
    check_period(period)?;
    Ok(ema_after(x, period, 0))
}

/// EMA that ignores the first `skip` valid values, so the seed window ends
/// `skip` valid values later than plain [`ema`].
fn ema_after(x: &[f64], period: usize, mut skip: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = vec![f64::NAN; x.len()];
    let mut seed_sum = 0.0;
    let mut seen = 0usize;
    let mut prev: Option<f64> = None;
    for (i, &v) in x.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if skip > 0 {
            skip -= 1;
            continue;
        }
        let next = match prev {
            Some(p) => p + alpha * (v - p),
            None => {
                seed_sum += v;
                seen += 1;
                if seen < period {
                    continue;
                }
                seed_sum / period as f64
            }
        };
        prev = Some(next);
        out[i] = next;
    }
    out
}

/// Weighted smoothing `Y = (m·X + (n−m)·Y') / n`, seeded with the first valid X.
pub fn sma(x: &[f64], n: usize, m: usize) -> KernelResult<Vec<f64>> {
    check_param("n", n)?;
    check_param("m", m)?;
    if m > n {
        return Err(KernelError::InvalidParam {
            name: "m",
            value: m,
            reason: "must not exceed n",
        });
    }
    let (nf, mf) = (n as f64, m as f64);
    let mut out = vec![f64::NAN; x.len()];
    let mut prev: Option<f64> = None;
    for (i, &v) in x.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        let y = match prev {
            Some(p) => (mf * v + (nf - mf) * p) / nf,
            None => v,
        };
        prev = Some(y);
        out[i] = y;
    }
    Ok(out)
}

pub fn abs(x: &[f64]) -> Vec<f64> {
    x.iter().map(|v| v.abs()).collect()
}

/// The three aligned MACD outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    /// Fast EMA minus slow EMA (DIF).
    pub macd: Vec<f64>,
    /// EMA of `macd` (DEA).
    pub signal: Vec<f64>,
    /// `macd - signal`.
    pub hist: Vec<f64>,
}

/// MACD. If `slow < fast` the two periods are swapped. Both EMAs start at
/// the slow lookback, each seeded with the mean of its own window ending
/// there. All three outputs start at the same index (where `signal` first
/// becomes valid).
pub fn macd(x: &[f64], fast: usize, slow: usize, signal: usize) -> KernelResult<MacdOutput> {
    check_param("fastperiod", fast)?;
    check_param("slowperiod", slow)?;
    check_param("signalperiod", signal)?;
    let (fast, slow) = if slow < fast { (slow, fast) } else { (fast, slow) };

    let ema_fast = ema_after(x, fast, slow - fast);
    let ema_slow = ema_after(x, slow, 0);
    let mut line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let sig = ema(&line, signal)?;
    for (l, s) in line.iter_mut().zip(&sig) {
        if s.is_nan() {
            *l = f64::NAN;
        }
    }
    let hist = line.iter().zip(&sig).map(|(l, s)| l - s).collect();
    Ok(MacdOutput {
        macd: line,
        signal: sig,
        hist,
    })
}

/// Rolling maximum over full windows: `len - period + 1` outputs (empty if
/// the input is shorter than `period`). A window holding NaN yields NaN.
pub fn rolling_max(x: &[f64], period: usize) -> KernelResult<Vec<f64>> {
    rolling_extreme(x, period, |a, b| a >= b)
}

/// Rolling minimum; see [`rolling_max`].
pub fn rolling_min(x: &[f64], period: usize) -> KernelResult<Vec<f64>> {
    rolling_extreme(x, period, |a, b| a <= b)
}

/// Monotonic-deque sliding extreme. `dominates(new, old)` decides whether a
/// newer value makes an older candidate irrelevant.
fn rolling_extreme(
    x: &[f64],
    period: usize,
    dominates: fn(f64, f64) -> bool,
) -> KernelResult<Vec<f64>> {
    check_period(period)?;
    if x.len() < period {
        return Ok(Vec::new());
    }
    let mut out = Vec::with_capacity(x.len() - period + 1);
    let mut deque: VecDeque<usize> = VecDeque::with_capacity(period);
    let mut last_nan: Option<usize> = None;

    for (i, &v) in x.iter().enumerate() {
        if v.is_nan() {
            last_nan = Some(i);
        } else {
            while let Some(&back) = deque.back() {
                if dominates(v, x[back]) {
                    deque.pop_back();
                } else {
                    break;
                }
            }
            deque.push_back(i);
        }
        while let Some(&front) = deque.front() {
            if front + period <= i {
                deque.pop_front();
            } else {
                break;
            }
        }
        if i + 1 >= period {
            let start = i + 1 - period;
            let poisoned = last_nan.map_or(false, |j| j >= start);
            let v = match deque.front() {
                Some(&j) if !poisoned => x[j],
                _ => f64::NAN,
            };
            out.push(v);
        }
    }
    Ok(out)
}
