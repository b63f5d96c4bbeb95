use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the pseudo-transient integrator.
///
/// Every field has a default, so a document only needs to name the settings
/// it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase", deny_unknown_fields)]
pub struct Config {
    pub stepper: StepperKind,
    pub final_time: f64,
    pub max_steps: usize,
    pub storage_limit: Option<usize>,
    pub time_step_control: StepControlConfig,
    pub newton: NewtonConfig,
    pub steady_state: SteadyStateConfig,
}

/// The time stepping scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepperKind {
    /// Implicit Euler with a Newton iteration per step.
    #[default]
    BackwardEuler,

    /// Explicit Euler, `X_dot = -M^{-1} F(0, X, t)`.
    ForwardEuler,
}

impl StepperKind {
    /// Returns `true` for schemes that solve a linear system every step.
    #[must_use]
    pub fn is_implicit(self) -> bool {
        matches!(self, Self::BackwardEuler)
    }
}

impl fmt::Display for StepperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BackwardEuler => "Backward Euler",
            Self::ForwardEuler => "Forward Euler",
        };
        f.write_str(name)
    }
}

/// How the time step evolves between accepted steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepStrategy {
    /// Keep the time step fixed.
    Constant,

    /// Switched evolution relaxation: scale the step by the ratio of the
    /// previous and current rates of change.
    #[default]
    Ser,
}

/// Time step bounds and adaptation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase", deny_unknown_fields)]
pub struct StepControlConfig {
    pub initial_time_step: f64,
    pub min_time_step: f64,
    pub max_time_step: f64,
    pub strategy: StepStrategy,
    pub max_growth_factor: f64,
    pub failure_reduction_factor: f64,
    pub max_consecutive_failures: usize,
}

/// Newton iteration settings for implicit steppers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase", deny_unknown_fields)]
pub struct NewtonConfig {
    pub max_iters: usize,
    pub abs_tol: f64,
    pub rel_tol: f64,
}

/// The steady-state criterion `|X_dot| <= abs_tol + rel_tol * |X|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase", deny_unknown_fields)]
pub struct SteadyStateConfig {
    pub abs_tol: f64,
    pub rel_tol: f64,
}

/// Errors that can occur when validating an integrator config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("final_time must not be NaN")]
    FinalTime,

    #[error("max_steps must be positive")]
    MaxSteps,

    #[error("storage_limit must be at least 2")]
    StorageLimit,

    #[error("time steps must be finite, positive, and satisfy min <= initial <= max")]
    TimeStepBounds,

    #[error("max_growth_factor must be finite and at least 1")]
    GrowthFactor,

    #[error("failure_reduction_factor must lie strictly between 0 and 1")]
    ReductionFactor,

    #[error("newton max_iters must be positive")]
    NewtonIters,

    #[error("newton tolerances must be finite and non-negative")]
    NewtonTolerance,

    #[error("steady-state tolerances must be finite and non-negative")]
    SteadyStateTolerance,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stepper: StepperKind::default(),
            final_time: 1.0e12,
            max_steps: 1000,
            storage_limit: None,
            time_step_control: StepControlConfig::default(),
            newton: NewtonConfig::default(),
            steady_state: SteadyStateConfig::default(),
        }
    }
}

impl Default for StepControlConfig {
    fn default() -> Self {
        Self {
            initial_time_step: 1.0e-2,
            min_time_step: 1.0e-12,
            max_time_step: 1.0e6,
            strategy: StepStrategy::default(),
            max_growth_factor: 10.0,
            failure_reduction_factor: 0.5,
            max_consecutive_failures: 10,
        }
    }
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iters: 20,
            abs_tol: 1.0e-12,
            rel_tol: 1.0e-10,
        }
    }
}

impl Default for SteadyStateConfig {
    fn default() -> Self {
        Self {
            abs_tol: 1.0e-10,
            rel_tol: 1.0e-12,
        }
    }
}

fn is_tolerance(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

impl Config {
    /// Returns the default config with a different stepper.
    #[must_use]
    pub fn with_stepper(stepper: StepperKind) -> Self {
        Self {
            stepper,
            ..Self::default()
        }
    }

    /// Validates every setting.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.final_time.is_nan() {
            return Err(ConfigError::FinalTime);
        }
        if self.max_steps == 0 {
            return Err(ConfigError::MaxSteps);
        }
        if matches!(self.storage_limit, Some(limit) if limit < 2) {
            return Err(ConfigError::StorageLimit);
        }
        self.time_step_control.validate()?;
        self.newton.validate()?;
        self.steady_state.validate()
    }
}

impl StepControlConfig {
    /// Validates the step bounds and adaptation factors.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self {
            initial_time_step: initial,
            min_time_step: min,
            max_time_step: max,
            ..
        } = *self;

        if !(min.is_finite() && initial.is_finite() && max.is_finite()) {
            return Err(ConfigError::TimeStepBounds);
        }
        if min <= 0.0 || min > initial || initial > max {
            return Err(ConfigError::TimeStepBounds);
        }
        if !self.max_growth_factor.is_finite() || self.max_growth_factor < 1.0 {
            return Err(ConfigError::GrowthFactor);
        }
        if !(self.failure_reduction_factor > 0.0 && self.failure_reduction_factor < 1.0) {
            return Err(ConfigError::ReductionFactor);
        }
        Ok(())
    }
}

impl NewtonConfig {
    /// Validates the iteration limit and tolerances.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iters == 0 {
            return Err(ConfigError::NewtonIters);
        }
        if !is_tolerance(self.abs_tol) || !is_tolerance(self.rel_tol) {
            return Err(ConfigError::NewtonTolerance);
        }
        Ok(())
    }
}

impl SteadyStateConfig {
    /// Validates the tolerances.
    ///
    /// # Errors
    ///
    /// Returns an error if a tolerance is negative or non-finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_tolerance(self.abs_tol) || !is_tolerance(self.rel_tol) {
            return Err(ConfigError::SteadyStateTolerance);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_time_step_bounds() {
        let mut config = Config::default();
        config.time_step_control.min_time_step = 1.0;
        config.time_step_control.initial_time_step = 0.5;

        assert_eq!(config.validate(), Err(ConfigError::TimeStepBounds));
    }

    #[test]
    fn rejects_zero_max_steps() {
        let config = Config {
            max_steps: 0,
            ..Config::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::MaxSteps));
    }

    #[test]
    fn rejects_tiny_storage_limit() {
        let config = Config {
            storage_limit: Some(1),
            ..Config::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::StorageLimit));
    }

    #[test]
    fn rejects_negative_tolerances() {
        let mut config = Config::default();
        config.steady_state.abs_tol = -1.0;
        assert_eq!(config.validate(), Err(ConfigError::SteadyStateTolerance));

        let mut config = Config::default();
        config.newton.rel_tol = f64::NAN;
        assert_eq!(config.validate(), Err(ConfigError::NewtonTolerance));
    }

    #[test]
    fn rejects_reduction_factor_of_one() {
        let mut config = Config::default();
        config.time_step_control.failure_reduction_factor = 1.0;

        assert_eq!(config.validate(), Err(ConfigError::ReductionFactor));
    }

    #[test]
    fn parses_partial_toml_document() {
        let config: Config = toml::from_str(
            r#"
            Stepper = "ForwardEuler"
            MaxSteps = 50

            [TimeStepControl]
            InitialTimeStep = 0.5
            Strategy = "Constant"
            "#,
        )
        .expect("document should parse");

        assert_eq!(config.stepper, StepperKind::ForwardEuler);
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.time_step_control.strategy, StepStrategy::Constant);
        assert_eq!(config.time_step_control.initial_time_step, 0.5);
        assert_eq!(config.newton, NewtonConfig::default());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn only_backward_euler_is_implicit() {
        assert!(StepperKind::BackwardEuler.is_implicit());
        assert!(!StepperKind::ForwardEuler.is_implicit());
    }

    #[test]
    fn rejects_unknown_keys() {
        let result: Result<Config, _> = toml::from_str("MaxStep = 3");

        assert!(result.is_err());
    }
}
