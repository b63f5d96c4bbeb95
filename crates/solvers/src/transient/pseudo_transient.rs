//! Pseudo-transient continuation for implicit ODE problems.
//!
//! # Algorithm
//!
//! Time integration is used as an iterative method for the steady problem
//! `F(0, X) = 0`. The integrator steps the implicit ODE `F(X_dot, X, t) = 0`
//! with growing time steps until the rate of change satisfies
//!
//! ```text
//! |X_dot| <= abs_tol + rel_tol * |X|
//! ```
//!
//! Transient accuracy is irrelevant, so the step size is driven by the rate of
//! change itself (switched evolution relaxation) rather than by an error
//! estimate.
//!
//! # Failure handling
//!
//! A rejected step (singular iteration matrix, Newton divergence, non-finite
//! values) is retried with a smaller time step. Running out of retries, steps,
//! or time ends the run with [`Status::Failed`] and a [`Termination`] naming
//! the cause. Only structural problems and model errors are returned as
//! [`Error`].
//!
//! # Example
//!
//! ```ignore
//! use ptc_solvers::transient::{Integrator, pseudo_transient::{Config, PseudoTransient}};
//!
//! let mut integrator = PseudoTransient::new(problem, Config::default())?;
//! integrator.initialize_solution_history(0.0, x0, None, None)?;
//!
//! if integrator.advance_time()? {
//!     if let Some(steady) = integrator.solution_history().current() {
//!         println!("steady state at t={}: {}", steady.time, steady.x);
//!     }
//! }
//! ```

mod action;
mod config;
mod error;
mod event;
mod history;
mod status;
mod stepper;
mod timer;

pub use action::Action;
pub use config::{
    Config, ConfigError, NewtonConfig, StepControlConfig, StepStrategy, StepperKind,
    SteadyStateConfig,
};
pub use error::Error;
pub use event::Event;
pub use history::{SolutionHistory, SolutionState};
pub use status::{Status, Termination};
pub use stepper::{StepFailure, Stepper};
pub use timer::Timer;

use std::sync::Arc;

use ptc_core::{ImplicitOde, MultiVector, Observer};

use stepper::{Step, StepError};

use super::Integrator;

/// A stateful integrator that drives an [`ImplicitOde`] to a steady state.
#[derive(Debug)]
pub struct PseudoTransient<P> {
    problem: P,
    config: Config,
    stepper: Stepper,
    history: SolutionHistory,
    status: Status,
    termination: Option<Termination>,
    dt: f64,
    prev_rate: Option<f64>,
    integrator_timer: Timer,
    stepper_timer: Timer,
}

impl<P: ImplicitOde> PseudoTransient<P> {
    /// Creates an integrator for `problem`.
    ///
    /// The solution history starts empty; call
    /// [`initialize_solution_history`](Self::initialize_solution_history)
    /// before advancing.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the config is invalid.
    pub fn new(problem: P, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            problem,
            stepper: Stepper::new(config.stepper, config.newton),
            history: SolutionHistory::new(config.storage_limit),
            status: Status::Working,
            termination: None,
            dt: config.time_step_control.initial_time_step,
            prev_rate: None,
            integrator_timer: Timer::default(),
            stepper_timer: Timer::default(),
            config,
        })
    }

    /// Returns the problem being integrated.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Returns the problem mutably.
    ///
    /// Changing the problem invalidates the current run; re-initialize the
    /// solution history afterwards.
    pub fn problem_mut(&mut self) -> &mut P {
        &mut self.problem
    }

    /// Returns the config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns why the last run stopped, if it has stopped.
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Returns the time step that the next step will attempt.
    pub fn time_step(&self) -> f64 {
        self.dt
    }

    /// Seeds the solution history with an initial state.
    ///
    /// Missing derivatives default to zero for `x_dot` and to unknown for
    /// `x_dot_dot`. Any previous run is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if a state does not have
    /// `dim() x directions()` entries.
    pub fn initialize_solution_history(
        &mut self,
        t0: f64,
        x0: MultiVector,
        x_dot0: Option<MultiVector>,
        x_dot_dot0: Option<MultiVector>,
    ) -> Result<(), Error> {
        let expected = (self.problem.dim(), self.problem.directions());
        let x_dot0 = x_dot0.unwrap_or_else(|| MultiVector::zeros(expected.0, expected.1));

        check_shape("x0", expected, &x0)?;
        check_shape("x_dot0", expected, &x_dot0)?;
        if let Some(x_dot_dot0) = &x_dot_dot0 {
            check_shape("x_dot_dot0", expected, x_dot_dot0)?;
        }

        self.history.clear();
        self.history.push(Arc::new(SolutionState {
            time: t0,
            index: 0,
            dt: 0.0,
            x: x0,
            x_dot: x_dot0,
            x_dot_dot: x_dot_dot0,
        }));
        self.stepper.reset();
        self.status = Status::Working;
        self.termination = None;
        self.dt = self.config.time_step_control.initial_time_step;
        self.prev_rate = None;
        self.integrator_timer.reset();
        self.stepper_timer.reset();

        Ok(())
    }

    /// Advances toward `t_final`, reporting each accepted step to `observer`.
    ///
    /// Returns `Ok(true)` once a steady state is reached. A run that has
    /// already finished is not resumed; its outcome is returned again.
    ///
    /// # Observer
    ///
    /// The observer receives an [`Event`] after every accepted step and may
    /// return [`Action::StopEarly`] to end the run as failed. A step that
    /// reaches the steady state ends the run as passed regardless.
    ///
    /// Each call is recorded by the [integrator timer](Integrator::integrator_timer)
    /// and each step attempt by the [stepper timer](Integrator::stepper_timer).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before the history is seeded, or
    /// [`Error::Problem`] if the problem fails to evaluate.
    pub fn advance_time_observed<Obs>(
        &mut self,
        t_final: f64,
        observer: Obs,
    ) -> Result<bool, Error>
    where
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        let mut timer = self.integrator_timer;
        let result = timer.time(|| self.advance(t_final, observer));
        self.integrator_timer = timer;
        result
    }

    fn advance<Obs>(&mut self, t_final: f64, mut observer: Obs) -> Result<bool, Error>
    where
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        let Some(mut current) = self.history.current().cloned() else {
            return Err(Error::NotInitialized);
        };
        if self.status != Status::Working {
            return Ok(self.status == Status::Passed);
        }

        let control = self.config.time_step_control;
        let mut failures = 0;

        loop {
            if current.time >= t_final {
                return Ok(self.finish(Termination::FinalTime, &current));
            }
            if current.index >= self.config.max_steps {
                return Ok(self.finish(Termination::MaxSteps, &current));
            }

            let dt = self.dt.min(t_final - current.time);

            let attempt = self
                .stepper_timer
                .time(|| self.stepper.take_step(&self.problem, &current, dt))
                .and_then(|step| self.screen(step));

            let step = match attempt {
                Ok(step) => step,
                Err(StepError::Problem(err)) => {
                    self.status = Status::Failed;
                    self.termination = Some(Termination::ProblemError);
                    return Err(Error::problem(err));
                }
                Err(StepError::Failure(failure)) => {
                    failures += 1;
                    log::debug!(
                        "step {} rejected at t={} with dt={dt}: {failure}",
                        current.index + 1,
                        current.time,
                    );
                    if failures > control.max_consecutive_failures {
                        return Ok(self.finish(Termination::StepFailures, &current));
                    }
                    let reduced = dt * control.failure_reduction_factor;
                    if reduced < control.min_time_step {
                        return Ok(self.finish(Termination::MinTimeStep, &current));
                    }
                    self.dt = reduced;
                    self.stepper.reset();
                    continue;
                }
            };
            failures = 0;

            let state = Arc::new(SolutionState {
                time: current.time + dt,
                index: current.index + 1,
                dt,
                x: step.x,
                x_dot: step.x_dot,
                x_dot_dot: None,
            });
            self.history.push(Arc::clone(&state));

            let rate = state.x_dot.norm();
            log::debug!(
                "step {} accepted: t={}, dt={dt}, |x_dot|={rate:e}, newton iterations={}",
                state.index,
                state.time,
                step.newton_iters,
            );

            let action = observer.observe(&Event {
                state: &state,
                rate,
            });

            if self.is_steady(&state.x, rate) {
                return Ok(self.finish(Termination::SteadyState, &state));
            }
            if let Some(Action::StopEarly) = action {
                return Ok(self.finish(Termination::StoppedByObserver, &state));
            }

            self.dt = self.next_time_step(rate);
            current = state;
        }
    }

    fn is_steady(&self, x: &MultiVector, rate: f64) -> bool {
        let steady = &self.config.steady_state;
        rate <= steady.abs_tol + steady.rel_tol * x.norm()
    }

    /// Rejects an explicit step that increased the rate of change while the
    /// step size adapts, since the step was past the stability limit.
    fn screen(&self, step: Step) -> Result<Step, StepError<P::Error>> {
        let adaptive = self.config.time_step_control.strategy == StepStrategy::Ser;
        if adaptive && !self.stepper.kind().is_implicit() {
            let rate = step.x_dot.norm();
            let grew = matches!(self.prev_rate, Some(prev) if rate > prev);
            if grew && !self.is_steady(&step.x, rate) {
                return Err(StepFailure::RateGrowth.into());
            }
        }
        Ok(step)
    }

    /// Proposes the next time step from the latest rate of change.
    fn next_time_step(&mut self, rate: f64) -> f64 {
        let control = &self.config.time_step_control;
        let proposed = match control.strategy {
            StepStrategy::Constant => self.dt,
            StepStrategy::Ser => {
                let max = control.max_growth_factor;
                let ratio = match self.prev_rate {
                    Some(prev) if rate > 0.0 => prev / rate,
                    Some(_) => max,
                    None => 1.0,
                };
                self.dt * ratio.clamp(1.0 / max, max)
            }
        };
        self.prev_rate = Some(rate);

        proposed.clamp(control.min_time_step, control.max_time_step)
    }

    /// Records the outcome of a run and returns whether it passed.
    fn finish(&mut self, termination: Termination, last: &SolutionState) -> bool {
        let passed = termination == Termination::SteadyState;
        self.termination = Some(termination);
        self.status = if passed {
            Status::Passed
        } else {
            Status::Failed
        };

        if passed {
            log::info!(
                "steady state reached after {} steps at t={}",
                last.index,
                last.time
            );
        } else {
            log::warn!(
                "integration failed after {} steps at t={}: {termination}",
                last.index,
                last.time
            );
        }
        passed
    }
}

fn check_shape(
    name: &'static str,
    expected: (usize, usize),
    value: &MultiVector,
) -> Result<(), Error> {
    if value.shape() == expected {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            name,
            expected,
            actual: value.shape(),
        })
    }
}

impl<P: ImplicitOde> Integrator for PseudoTransient<P> {
    type Error = Error;

    fn advance_time(&mut self) -> Result<bool, Self::Error> {
        self.advance_time_to(self.config.final_time)
    }

    fn advance_time_to(&mut self, t_final: f64) -> Result<bool, Self::Error> {
        self.advance_time_observed(t_final, ())
    }

    fn time(&self) -> f64 {
        self.history.current().map_or(f64::NAN, |state| state.time)
    }

    fn index(&self) -> usize {
        self.history.current().map_or(0, |state| state.index)
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn stepper(&self) -> &Stepper {
        &self.stepper
    }

    fn time_step_control(&self) -> &StepControlConfig {
        &self.config.time_step_control
    }

    fn solution_history(&self) -> &SolutionHistory {
        &self.history
    }

    fn integrator_timer(&self) -> &Timer {
        &self.integrator_timer
    }

    fn stepper_timer(&self) -> &Timer {
        &self.stepper_timer
    }
}

#[cfg(test)]
mod tests;
