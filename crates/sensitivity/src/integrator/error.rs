use std::error::Error as StdError;

use ptc_solvers::transient::pseudo_transient::Error as SolverError;

use crate::{ConfigError, adjoint};

use super::{Phase, Stage};

/// Errors that can occur while building or running a sensitivity integrator.
///
/// Failing to reach a steady state in either phase is not an error; it is
/// reported as `Ok(false)` from the advance methods.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("adjoint equation error: {0}")]
    Adjoint(#[from] adjoint::Error),

    #[error("{phase} integration error: {source}")]
    Integration {
        phase: Phase,
        #[source]
        source: SolverError,
    },

    #[error("model error: {0}")]
    Model(#[source] Box<dyn StdError + Send + Sync>),

    #[error("no residual model was provided")]
    MissingModel,

    #[error("result is not available at stage '{stage}'")]
    NotReady { stage: Stage },
}

impl Error {
    pub(super) fn integration(phase: Phase) -> impl FnOnce(SolverError) -> Self {
        move |source| Self::Integration { phase, source }
    }

    pub(super) fn model<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Model(Box::new(err))
    }
}
