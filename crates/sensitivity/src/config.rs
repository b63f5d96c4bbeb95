use serde::{Deserialize, Serialize};
use thiserror::Error;

use ptc_solvers::transient::pseudo_transient::{
    Config as IntegratorConfig, ConfigError as IntegratorConfigError, StepperKind,
};

/// Configuration for a pseudo-transient adjoint sensitivity run.
///
/// The forward and adjoint integrations are configured independently, since
/// they may need different step sizes, tolerances, or steppers.
///
/// ```toml
/// [Forward]
/// Stepper = "BackwardEuler"
///
/// [Adjoint.SteadyState]
/// AbsTol = 1e-12
///
/// [Sensitivities]
/// ResponseFunctionIndex = 1
/// MassMatrixIsIdentity = true
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase", deny_unknown_fields)]
pub struct Config {
    pub forward: IntegratorConfig,
    pub adjoint: IntegratorConfig,
    pub sensitivities: SensitivityConfig,
}

/// Options for the adjoint sensitivity equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase", deny_unknown_fields)]
pub struct SensitivityConfig {
    /// Parameter block to differentiate against.
    pub sensitivity_parameter_index: usize,

    /// Response function to differentiate.
    pub response_function_index: usize,

    /// Whether `df/dx_dot` is constant. Must be `true`.
    pub mass_matrix_is_constant: bool,

    /// Whether `df/dx_dot` is the identity, which skips applying it.
    pub mass_matrix_is_identity: bool,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            sensitivity_parameter_index: 0,
            response_function_index: 0,
            mass_matrix_is_constant: true,
            mass_matrix_is_identity: false,
        }
    }
}

/// Errors that can occur when reading or validating a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("adjoint sensitivities require MassMatrixIsConstant = true")]
    MassMatrixNotConstant,

    #[error("invalid forward integrator config: {0}")]
    Forward(#[source] IntegratorConfigError),

    #[error("invalid adjoint integrator config: {0}")]
    Adjoint(#[source] IntegratorConfigError),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

impl Config {
    /// Returns the default config with `stepper` used for both integrations.
    #[must_use]
    pub fn with_stepper(stepper: StepperKind) -> Self {
        Self {
            forward: IntegratorConfig::with_stepper(stepper),
            adjoint: IntegratorConfig::with_stepper(stepper),
            sensitivities: SensitivityConfig::default(),
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document is malformed or invalid.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document is malformed or invalid.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates both integrator configs and the sensitivity options.
    ///
    /// Parameter and response indices are checked against a model when the
    /// adjoint model is built.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sensitivities.mass_matrix_is_constant {
            return Err(ConfigError::MassMatrixNotConstant);
        }
        self.forward.validate().map_err(ConfigError::Forward)?;
        self.adjoint.validate().map_err(ConfigError::Adjoint)?;
        Ok(())
    }
}
