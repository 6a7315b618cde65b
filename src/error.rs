//! Error type shared by every formula operation.

use thiserror::Error;

use crate::kernels::KernelError;
use crate::source::SourceError;

/// The single error kind surfaced by this crate.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// A numeric kernel rejected its input or parameters.
    #[error("kernel {kernel} failed: {source}")]
    Kernel {
        kernel: &'static str,
        #[source]
        source: KernelError,
    },

    /// An operation was called on data it cannot work with (e.g. empty input).
    #[error("{0}")]
    Precondition(String),

    /// Look-back offset past the start of the series.
    #[error("offset {offset} out of range for series of length {len}")]
    IndexOutOfRange { offset: usize, len: usize },

    /// The bar source failed; passed through untouched.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Re-parametrization requested on a series that was not built by a kernel.
    #[error("series has no kernel parameters to re-derive from")]
    NotDerived,

    #[error("invalid parameters: {0}")]
    Params(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown name: {0}")]
    UnknownName(String),

    #[error("{name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

impl FormulaError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        FormulaError::Precondition(msg.into())
    }

    pub(crate) fn kernel(kernel: &'static str, source: KernelError) -> Self {
        FormulaError::Kernel { kernel, source }
    }
}

pub type Result<T> = std::result::Result<T, FormulaError>;
