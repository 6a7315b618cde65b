use std::rc::Rc;

use crate::error::{FormulaError, Result};
use crate::indicator::IndicatorSpec;
use crate::kernels::{InfPolicy, Kernel};
use crate::types::{Bars, Field};

/// How a series' values are produced. Kept so a series can be re-derived
/// (refresh, re-parametrization) without holding on to its inputs' buffers.
#[derive(Debug, Clone)]
pub(crate) enum Recipe {
    /// Literal values.
    Raw(Rc<[f64]>),
    /// One column of the bar history.
    Price(Field),
    Derived {
        spec: IndicatorSpec,
        input: Rc<Recipe>,
    },
    Custom {
        kernel: Rc<dyn Kernel>,
        policy: InfPolicy,
        input: Rc<Recipe>,
    },
}

impl Recipe {
    /// Whether evaluation depends on bar data.
    pub(crate) fn reads_bars(&self) -> bool {
        match self {
            Recipe::Raw(_) => false,
            Recipe::Price(_) => true,
            Recipe::Derived { input, .. } | Recipe::Custom { input, .. } => input.reads_bars(),
        }
    }

    /// Bar column at the root of the derivation chain, if any.
    pub(crate) fn field(&self) -> Option<Field> {
        match self {
            Recipe::Raw(_) => None,
            Recipe::Price(field) => Some(*field),
            Recipe::Derived { input, .. } | Recipe::Custom { input, .. } => input.field(),
        }
    }

    pub(crate) fn spec(&self) -> Option<IndicatorSpec> {
        match self {
            Recipe::Derived { spec, .. } => Some(*spec),
            _ => None,
        }
    }

    pub(crate) fn evaluate(&self, bars: &Bars) -> Result<Rc<[f64]>> {
        match self {
            Recipe::Raw(values) => Ok(Rc::clone(values)),
            Recipe::Price(field) => Ok(Rc::from(bars.column(*field))),
            Recipe::Derived { spec, input } => {
                let x = input.evaluate(bars)?;
                run_kernel(spec, spec.inf_policy(), &x).map(Rc::from)
            }
            Recipe::Custom {
                kernel,
                policy,
                input,
            } => {
                let x = input.evaluate(bars)?;
                run_kernel(kernel.as_ref(), *policy, &x).map(Rc::from)
            }
        }
    }
}

/// Cleans infinities per `policy`, runs the kernel, wraps its failure.
pub(crate) fn run_kernel(kernel: &dyn Kernel, policy: InfPolicy, input: &[f64]) -> Result<Vec<f64>> {
    let cleaned = policy.clean(input);
    kernel
        .compute(&cleaned)
        .map_err(|e| FormulaError::kernel(kernel.name(), e))
}
