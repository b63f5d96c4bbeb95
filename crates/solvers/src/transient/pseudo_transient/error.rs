use std::error::Error as StdError;

/// Errors that can occur during pseudo-transient integration.
///
/// Failing to reach a steady state is not an error; see
/// [`Termination`](super::Termination).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("solution history has not been initialized")]
    NotInitialized,

    #[error("{name} has shape {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        name: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("problem error: {0}")]
    Problem(#[source] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn problem<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Problem(Box::new(err))
    }
}
