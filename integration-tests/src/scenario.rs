use std::sync::Arc;

use nalgebra::DVector;
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;

use ptc_core::{AdjointModel, ResidualModel};
use ptc_sensitivity::{Config, ConfigError, Error, PseudoTransientAdjointSensitivity};

/// A model, its initial state, and solver settings read from one document.
///
/// ```toml
/// InitialState = [1.0]
///
/// [Model]
/// Source = 10.0
///
/// [Solver.Sensitivities]
/// MassMatrixIsIdentity = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Scenario<P> {
    pub model: P,
    pub initial_state: Vec<f64>,
    #[serde(default)]
    pub solver: Config,
}

/// Errors that can occur when reading a [`Scenario`].
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to parse TOML scenario: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON scenario: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid solver settings: {0}")]
    Solver(#[from] ConfigError),
}

impl<P: DeserializeOwned> Scenario<P> {
    /// Parses and validates a TOML scenario.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if the document is malformed or its solver
    /// settings are invalid.
    pub fn from_toml_str(document: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = toml::from_str(document)?;
        scenario.solver.validate()?;
        Ok(scenario)
    }

    /// Parses and validates a JSON scenario.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if the document is malformed or its solver
    /// settings are invalid.
    pub fn from_json_str(document: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = serde_json::from_str(document)?;
        scenario.solver.validate()?;
        Ok(scenario)
    }
}

impl<P: ResidualModel> Scenario<P> {
    /// Builds an integrator seeded with the scenario's initial state at `t = 0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the integrator cannot be built or the initial
    /// state has the wrong dimension.
    pub fn integrator(&self) -> Result<PseudoTransientAdjointSensitivity<P>, Error>
    where
        P: Clone,
    {
        let model = Arc::new(self.model.clone());
        let integrator = PseudoTransientAdjointSensitivity::transposed(self.solver.clone(), model)?;
        self.seed(integrator)
    }

    /// Builds an integrator that uses `adjoint_model` for the adjoint phase.
    ///
    /// # Errors
    ///
    /// See [`integrator`](Self::integrator).
    pub fn integrator_with_adjoint<A: AdjointModel>(
        &self,
        model: Arc<P>,
        adjoint_model: Arc<A>,
    ) -> Result<PseudoTransientAdjointSensitivity<P, A>, Error> {
        let integrator = PseudoTransientAdjointSensitivity::with_adjoint_model(
            self.solver.clone(),
            model,
            adjoint_model,
        )?;
        self.seed(integrator)
    }

    fn seed<A: AdjointModel>(
        &self,
        mut integrator: PseudoTransientAdjointSensitivity<P, A>,
    ) -> Result<PseudoTransientAdjointSensitivity<P, A>, Error> {
        let x0 = DVector::from_column_slice(&self.initial_state);
        integrator.initialize_solution_history(0.0, x0, None, None)?;
        Ok(integrator)
    }
}
