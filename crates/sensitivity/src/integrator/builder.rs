use std::sync::Arc;

use ptc_core::{AdjointModel, ResidualModel, Transposed};
use ptc_solvers::transient::pseudo_transient::StepperKind;

use crate::Config;

use super::{Error, PseudoTransientAdjointSensitivity};

/// Assembles a [`PseudoTransientAdjointSensitivity`] piece by piece.
///
/// Setters apply in call order, so a [`stepper`](Self::stepper) set before
/// [`config`](Self::config) is overwritten by the config's steppers.
///
/// ```ignore
/// let integrator = PseudoTransientAdjointSensitivity::builder()
///     .model(model)
///     .stepper(StepperKind::ForwardEuler)
///     .build()?;
/// ```
#[derive(Debug)]
pub struct Builder<M, A = Transposed> {
    config: Config,
    model: Option<Arc<M>>,
    adjoint_model: Option<Arc<A>>,
}

impl<M> Builder<M, Transposed> {
    /// Creates a builder with the default config and no models.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            model: None,
            adjoint_model: None,
        }
    }
}

impl<M> Default for Builder<M, Transposed> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, A> Builder<M, A> {
    /// Replaces the whole config.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Uses `stepper` for both phases.
    #[must_use]
    pub fn stepper(mut self, stepper: StepperKind) -> Self {
        self.config.forward.stepper = stepper;
        self.config.adjoint.stepper = stepper;
        self
    }

    /// Sets the forward model.
    #[must_use]
    pub fn model(mut self, model: Arc<M>) -> Self {
        self.model = Some(model);
        self
    }

    /// Sets an explicit adjoint model for the adjoint phase.
    #[must_use]
    pub fn adjoint_model<B>(self, adjoint_model: Arc<B>) -> Builder<M, B> {
        Builder {
            config: self.config,
            model: self.model,
            adjoint_model: Some(adjoint_model),
        }
    }
}

impl<M: ResidualModel, A: AdjointModel> Builder<M, A> {
    /// Builds the integrator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingModel`] if no forward model was set, or any
    /// error from [`PseudoTransientAdjointSensitivity::new`].
    pub fn build(self) -> Result<PseudoTransientAdjointSensitivity<M, A>, Error> {
        let model = self.model.ok_or(Error::MissingModel)?;
        PseudoTransientAdjointSensitivity::new(self.config, model, self.adjoint_model)
    }
}
