use super::pseudo_transient::{SolutionHistory, Status, StepControlConfig, Stepper, Timer};

/// A stateful time integrator.
///
/// This is the surface shared by every integrator in the framework, so a
/// driver that composes several integrations can stand in wherever a single
/// integrator is expected.
pub trait Integrator {
    /// The error type returned for structural failures.
    ///
    /// Failing to converge is not an error: it is reported as `Ok(false)`
    /// from the advance methods.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Advances to the configured final time.
    ///
    /// Returns `Ok(true)` if the integration succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the integrator is misconfigured or a model
    /// evaluation fails.
    fn advance_time(&mut self) -> Result<bool, Self::Error>;

    /// Advances to `t_final`.
    ///
    /// Returns `Ok(true)` if the integration succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the integrator is misconfigured or a model
    /// evaluation fails.
    fn advance_time_to(&mut self, t_final: f64) -> Result<bool, Self::Error>;

    /// Returns the current time, or `NaN` before the history is initialized.
    fn time(&self) -> f64;

    /// Returns the number of accepted steps.
    fn index(&self) -> usize;

    /// Returns the current status.
    fn status(&self) -> Status;

    /// Overrides the current status.
    fn set_status(&mut self, status: Status);

    /// Returns the stepper.
    fn stepper(&self) -> &Stepper;

    /// Returns the time step control settings.
    fn time_step_control(&self) -> &StepControlConfig;

    /// Returns the solution history.
    fn solution_history(&self) -> &SolutionHistory;

    /// Returns the time spent in advance calls since initialization.
    fn integrator_timer(&self) -> &Timer;

    /// Returns the time spent in step attempts since initialization.
    fn stepper_timer(&self) -> &Timer;
}
