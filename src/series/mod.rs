//! Time series with newest-first offset indexing.
//!
//! A [`NumericSeries`] is either *static* (values computed once at
//! construction) or *dynamic* (values re-derived from a [`BarSource`] when
//! read). Dynamic series follow a two-state machine:
//!
//! ```text
//!            bar data changes
//!   CLEAN ───────────────────────▶ STALE
//!     ▲                              │
//!     └──── any read (len/value/…) ──┘  refresh: fetch bars, rerun recipe
//! ```
//!
//! There is no explicit invalidation. Without memoization every read counts
//! as "possibly stale" and refreshes; with memoization the source's data
//! version decides.

mod boolean;
mod operand;
mod ops;
mod recipe;

pub use boolean::BoolSeries;
pub use operand::Operand;

pub(crate) use operand::zip_operands;

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{FormulaError, Result};
use crate::indicator::IndicatorSpec;
use crate::kernels::{InfPolicy, Kernel};
use crate::source::BarSource;
use crate::types::{Bars, Field};

use self::recipe::{run_kernel, Recipe};

#[derive(Debug, Clone)]
enum SeriesState {
    Stale,
    Clean {
        /// Source data version the values were computed against.
        version: Option<u64>,
        values: Rc<[f64]>,
    },
}

#[derive(Clone)]
pub struct NumericSeries {
    recipe: Rc<Recipe>,
    source: Option<Rc<dyn BarSource>>,
    dynamic: bool,
    memoize: bool,
    state: RefCell<SeriesState>,
}

impl fmt::Debug for NumericSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = match &*self.state.borrow() {
            SeriesState::Stale => None,
            SeriesState::Clean { values, .. } => Some(values.len()),
        };
        f.debug_struct("NumericSeries")
            .field("spec", &self.recipe.spec())
            .field("dynamic", &self.dynamic)
            .field("memoize", &self.memoize)
            .field("cached_len", &cached)
            .finish_non_exhaustive()
    }
}

impl NumericSeries {
    /// Static series over `values` (oldest first).
    pub fn new(values: Vec<f64>) -> Self {
        Self::from_rc(Rc::from(values))
    }

    pub(crate) fn from_rc(values: Rc<[f64]>) -> Self {
        Self {
            recipe: Rc::new(Recipe::Raw(Rc::clone(&values))),
            source: None,
            dynamic: false,
            memoize: false,
            state: RefCell::new(SeriesState::Clean {
                version: None,
                values,
            }),
        }
    }

    /// Dynamic series reading one bar column from `source` on every access.
    pub fn price(source: Rc<dyn BarSource>, field: Field) -> Self {
        Self {
            recipe: Rc::new(Recipe::Price(field)),
            source: Some(source),
            dynamic: true,
            memoize: false,
            state: RefCell::new(SeriesState::Stale),
        }
    }

    /// Lets a dynamic series skip refreshes while the source's data version
    /// is unchanged. Has no effect on static series.
    pub fn memoized(mut self, on: bool) -> Self {
        self.memoize = on;
        self
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Kernel kind and parameters this series was derived with, if any.
    pub fn spec(&self) -> Option<IndicatorSpec> {
        self.recipe.spec()
    }

    // ===== reads (each one resolves STALE -> CLEAN first) =====

    /// Current values, oldest first.
    pub fn values(&self) -> Result<Rc<[f64]>> {
        self.ensure_series_update()
    }

    pub fn to_vec(&self) -> Result<Vec<f64>> {
        Ok(self.values()?.to_vec())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.values()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.values()?.is_empty())
    }

    /// Value `n` periods before the most recent one (0 = most recent).
    pub fn value(&self, n: usize) -> Result<f64> {
        let values = self.values()?;
        let len = values.len();
        if n >= len {
            return Err(FormulaError::IndexOutOfRange { offset: n, len });
        }
        Ok(values[len - 1 - n])
    }

    #[inline]
    pub fn current(&self) -> Result<f64> {
        self.value(0)
    }

    /// The series as seen `n` periods ago: a static copy without the newest
    /// `n` values.
    ///
    /// `n == len` gives an empty series; `n > len` fails. A series with no
    /// data at all (e.g. a dynamic series before the first bar) shifts to an
    /// empty series for any `n`.
    pub fn shift(&self, n: usize) -> Result<NumericSeries> {
        let values = self.values()?;
        let len = values.len();
        if len == 0 {
            return Ok(NumericSeries::new(Vec::new()));
        }
        if n > len {
            return Err(FormulaError::IndexOutOfRange { offset: n, len });
        }
        Ok(NumericSeries::new(values[..len - n].to_vec()))
    }

    // ===== derivation =====

    /// Applies `spec`'s kernel once and returns a static series. The recipe is
    /// kept so the result can later be re-parametrized.
    pub fn derive(&self, spec: IndicatorSpec) -> Result<NumericSeries> {
        let input = self.values()?;
        let out = run_kernel(&spec, spec.inf_policy(), &input)?;
        Ok(self.child(Recipe::Derived {
            spec,
            input: Rc::clone(&self.recipe),
        })
        .with_values(Rc::from(out)))
    }

    /// Like [`derive`](Self::derive) but the result re-runs the kernel on
    /// every read against fresh input.
    pub fn derive_dynamic(&self, spec: IndicatorSpec) -> Result<NumericSeries> {
        spec.validate()?;
        let mut child = self.child(Recipe::Derived {
            spec,
            input: Rc::clone(&self.recipe),
        });
        child.dynamic = true;
        Ok(child)
    }

    /// New dynamic series of the same kind with new parameters. `self` is
    /// left untouched.
    pub fn with_params(&self, params: &[usize]) -> Result<NumericSeries> {
        let Recipe::Derived { spec, input } = &*self.recipe else {
            return Err(FormulaError::NotDerived);
        };
        let spec = spec.with_params(params)?;
        tracing::debug!(kernel = spec.name(), ?params, "re-parametrized series");
        let mut child = self.child(Recipe::Derived {
            spec,
            input: Rc::clone(input),
        });
        child.dynamic = true;
        Ok(child)
    }

    pub fn with_period(&self, period: usize) -> Result<NumericSeries> {
        self.with_params(&[period])
    }

    /// Runs a caller-supplied kernel once (static result).
    pub fn apply_kernel(&self, kernel: Rc<dyn Kernel>, policy: InfPolicy) -> Result<NumericSeries> {
        let input = self.values()?;
        let out = run_kernel(kernel.as_ref(), policy, &input)?;
        Ok(self
            .child(Recipe::Custom {
                kernel,
                policy,
                input: Rc::clone(&self.recipe),
            })
            .with_values(Rc::from(out)))
    }

    /// Stale, static child sharing this series' source.
    fn child(&self, recipe: Recipe) -> NumericSeries {
        NumericSeries {
            recipe: Rc::new(recipe),
            source: self.source.clone(),
            dynamic: false,
            memoize: self.memoize,
            state: RefCell::new(SeriesState::Stale),
        }
    }

    fn with_values(self, values: Rc<[f64]>) -> NumericSeries {
        *self.state.borrow_mut() = SeriesState::Clean {
            version: None,
            values,
        };
        self
    }

    // ===== state machine =====

    fn ensure_series_update(&self) -> Result<Rc<[f64]>> {
        let version = if self.dynamic {
            self.source.as_ref().and_then(|s| s.version())
        } else {
            None
        };
        if let SeriesState::Clean { version: seen, values } = &*self.state.borrow() {
            let fresh = !self.dynamic || (self.memoize && version.is_some() && *seen == version);
            if fresh {
                return Ok(Rc::clone(values));
            }
        }

        let values = self.refresh(version)?;
        *self.state.borrow_mut() = SeriesState::Clean {
            version,
            values: Rc::clone(&values),
        };
        Ok(values)
    }

    fn refresh(&self, version: Option<u64>) -> Result<Rc<[f64]>> {
        let bars = match &self.source {
            Some(source) => source.bars()?,
            None => Bars::default(),
        };
        if bars.is_empty() && self.recipe.reads_bars() {
            tracing::debug!("no bar data yet; series is empty");
            return Ok(Rc::from(Vec::new()));
        }
        let values = self.recipe.evaluate(&bars)?;
        tracing::trace!(
            field = self.recipe.field().map(Field::name),
            bars = bars.len(),
            version = ?version,
            len = values.len(),
            "series refreshed"
        );
        Ok(values)
    }
}

impl From<Vec<f64>> for NumericSeries {
    fn from(values: Vec<f64>) -> Self {
        NumericSeries::new(values)
    }
}

impl From<&[f64]> for NumericSeries {
    fn from(values: &[f64]) -> Self {
        NumericSeries::from_rc(Rc::from(values))
    }
}

impl FromIterator<f64> for NumericSeries {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        NumericSeries::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::{ma, macd};
    use crate::kernels::FnKernel;
    use crate::source::SourceError;
    use crate::types::Bar;
    use std::cell::Cell;

    /// Source that counts how often it was asked for bars.
    struct CountingSource {
        bars: RefCell<Bars>,
        version: Cell<u64>,
        fetches: Cell<usize>,
    }

    impl CountingSource {
        fn new(closes: &[f64]) -> Rc<Self> {
            Rc::new(Self {
                bars: RefCell::new(closes.iter().enumerate().map(|(i, c)| Bar::flat(i as i64, *c)).collect()),
                version: Cell::new(1),
                fetches: Cell::new(0),
            })
        }

        fn push(&self, close: f64) {
            let ts = self.bars.borrow().len() as i64;
            self.bars.borrow_mut().push(Bar::flat(ts, close));
            self.version.set(self.version.get() + 1);
        }
    }

    impl BarSource for CountingSource {
        fn bars(&self) -> std::result::Result<Bars, SourceError> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(self.bars.borrow().clone())
        }

        fn version(&self) -> Option<u64> {
            Some(self.version.get())
        }
    }

    struct FailingSource;

    impl BarSource for FailingSource {
        fn bars(&self) -> std::result::Result<Bars, SourceError> {
            Err("feed offline".into())
        }
    }

    #[test]
    fn offset_zero_is_most_recent() {
        let s = NumericSeries::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.current().unwrap(), 3.0);
        assert_eq!(s.value(2).unwrap(), 1.0);
        assert!(matches!(
            s.value(3),
            Err(FormulaError::IndexOutOfRange { offset: 3, len: 3 })
        ));
    }

    #[test]
    fn shift_drops_newest() {
        let s = NumericSeries::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.shift(1).unwrap().to_vec().unwrap(), vec![1.0, 2.0]);
        assert_eq!(s.shift(0).unwrap().to_vec().unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(s.shift(3).unwrap().is_empty().unwrap());
        assert!(s.shift(4).is_err());

        let empty = NumericSeries::new(Vec::new());
        assert!(empty.shift(10).unwrap().is_empty().unwrap());
    }

    #[test]
    fn dynamic_series_follows_source() {
        let src = CountingSource::new(&[1.0, 2.0]);
        let close = NumericSeries::price(src.clone(), Field::Close);
        assert_eq!(close.current().unwrap(), 2.0);
        src.push(5.0);
        assert_eq!(close.len().unwrap(), 3);
        assert_eq!(close.current().unwrap(), 5.0);
    }

    #[test]
    fn every_read_refreshes_without_memoization() {
        let src = CountingSource::new(&[1.0, 2.0]);
        let close = NumericSeries::price(src.clone(), Field::Close);
        close.len().unwrap();
        close.current().unwrap();
        close.value(1).unwrap();
        assert_eq!(src.fetches.get(), 3);
    }

    #[test]
    fn memoized_series_refreshes_only_on_new_version() {
        let src = CountingSource::new(&[1.0, 2.0]);
        let close = NumericSeries::price(src.clone(), Field::Close).memoized(true);
        close.len().unwrap();
        close.current().unwrap();
        assert_eq!(src.fetches.get(), 1);
        src.push(3.0);
        assert_eq!(close.current().unwrap(), 3.0);
        assert_eq!(src.fetches.get(), 2);
    }

    #[test]
    fn refresh_records_source_version_and_root_field() {
        let src = CountingSource::new(&[1.0, 2.0, 3.0]);
        let close = NumericSeries::price(src.clone(), Field::Close).memoized(true);
        let avg = ma(&close, 2).unwrap();
        assert_eq!(avg.recipe.field().map(Field::name), Some("close"));
        assert_eq!(NumericSeries::new(vec![1.0]).recipe.field(), None);

        src.push(4.0);
        close.current().unwrap();
        let SeriesState::Clean { version, .. } = &*close.state.borrow() else {
            panic!("series should be clean after a read");
        };
        assert_eq!(*version, Some(2));
    }

    #[test]
    fn empty_source_gives_empty_series() {
        let src = CountingSource::new(&[]);
        let close = NumericSeries::price(src.clone(), Field::Close);
        assert!(close.is_empty().unwrap());
        let osc = close.derive_dynamic(IndicatorSpec::macd_default()).unwrap();
        assert!(osc.is_empty().unwrap());
        assert!(osc.shift(1).unwrap().is_empty().unwrap());
    }

    #[test]
    fn source_failure_propagates_as_is() {
        let close = NumericSeries::price(Rc::new(FailingSource), Field::Close);
        let err = close.len().unwrap_err();
        assert!(matches!(err, FormulaError::Source(_)));
        assert_eq!(err.to_string(), "feed offline");
    }

    #[test]
    fn static_derivation_is_frozen() {
        let src = CountingSource::new(&[1.0, 2.0, 3.0]);
        let close = NumericSeries::price(src.clone(), Field::Close);
        let m = ma(&close, 2).unwrap();
        assert!(!m.is_dynamic());
        src.push(100.0);
        assert_eq!(m.len().unwrap(), 3);
        assert_eq!(m.current().unwrap(), 2.5);
    }

    #[test]
    fn reparametrized_series_is_new_and_dynamic() {
        let src = CountingSource::new(&[1.0, 2.0, 3.0, 4.0]);
        let close = NumericSeries::price(src.clone(), Field::Close);
        let m2 = ma(&close, 2).unwrap();
        let m3 = m2.with_period(3).unwrap();

        assert!(m3.is_dynamic());
        assert_eq!(m3.spec(), Some(IndicatorSpec::Ma { period: 3 }));
        assert_eq!(m3.current().unwrap(), 3.0);

        // original keeps its buffer and parameters
        assert_eq!(m2.spec(), Some(IndicatorSpec::Ma { period: 2 }));
        assert!(!m2.is_dynamic());
        assert_eq!(m2.current().unwrap(), 3.5);

        src.push(8.0);
        assert_eq!(m3.current().unwrap(), 5.0);
        assert_eq!(m2.current().unwrap(), 3.5);
    }

    #[test]
    fn with_params_on_raw_series_fails() {
        let s = NumericSeries::new(vec![1.0]);
        assert!(matches!(s.with_period(2), Err(FormulaError::NotDerived)));
    }

    #[test]
    fn reparametrized_static_input_recomputes_from_recorded_values() {
        let s: NumericSeries = (0..12).map(|i| (i * i) as f64).collect();
        let osc = macd(&s, 2, 3, 2).unwrap();
        let again = osc.with_params(&[2, 3, 2]).unwrap();
        assert_eq!(
            osc.current().unwrap().to_bits(),
            again.current().unwrap().to_bits()
        );
    }

    #[test]
    fn custom_kernel_runs_on_cleaned_input() {
        let s = NumericSeries::new(vec![1.0, f64::INFINITY]);
        let double: Rc<dyn Kernel> = Rc::new(FnKernel::new("DOUBLE", |x: &[f64]| {
            Ok(x.iter().map(|v| v * 2.0).collect())
        }));
        let out = s.apply_kernel(double, InfPolicy::Zero).unwrap();
        assert_eq!(out.to_vec().unwrap(), vec![2.0, 0.0]);
    }
}
