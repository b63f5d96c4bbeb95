use std::error::Error as StdError;
use std::fmt;

/// Which kind of model index was out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Parameter,
    Response,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter => f.write_str("parameter"),
            Self::Response => f.write_str("response"),
        }
    }
}

/// Errors that can occur when building or evaluating the adjoint equation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} index {index} is out of range: the model has {count}")]
    IndexOutOfRange {
        kind: IndexKind,
        index: usize,
        count: usize,
    },

    #[error("{name} has shape {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        name: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("adjoint sensitivities require a constant mass matrix")]
    MassMatrixNotConstant,

    #[error("adjoint operators are not frozen at a forward steady state")]
    NotReady,

    #[error("model error: {0}")]
    Model(#[source] Box<dyn StdError + Send + Sync>),

    #[error("adjoint model error: {0}")]
    AdjointModel(#[source] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn model<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Model(Box::new(err))
    }

    pub(crate) fn adjoint_model<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::AdjointModel(Box::new(err))
    }
}
