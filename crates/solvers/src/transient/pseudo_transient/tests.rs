use std::cell::Cell;
use std::convert::Infallible;

use approx::assert_relative_eq;
use nalgebra::DMatrix;

use ptc_core::{ImplicitOde, MultiVector};

use crate::transient::Integrator;

use super::*;

/// `F = x_dot + k * x - c`, one direction per entry of `c`.
struct Relaxation {
    k: f64,
    c: Vec<f64>,
}

impl Relaxation {
    fn scalar(c: f64) -> Self {
        Self { k: 1.0, c: vec![c] }
    }
}

impl ImplicitOde for Relaxation {
    type Error = Infallible;

    fn dim(&self) -> usize {
        1
    }

    fn directions(&self) -> usize {
        self.c.len()
    }

    fn residual(
        &self,
        _t: f64,
        x: &MultiVector,
        x_dot: &MultiVector,
    ) -> Result<MultiVector, Self::Error> {
        let c = MultiVector::from_row_slice(1, self.c.len(), &self.c);
        Ok(x_dot + x * self.k - c)
    }

    fn jacobian(
        &self,
        _t: f64,
        _x: &MultiVector,
        _x_dot: &MultiVector,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        Ok(DMatrix::from_element(1, 1, alpha + beta * self.k))
    }
}

fn scalar(value: f64) -> MultiVector {
    MultiVector::from_element(1, 1, value)
}

fn constant_steps(dt: f64) -> Config {
    let mut config = Config::default();
    config.time_step_control.initial_time_step = dt;
    config.time_step_control.strategy = StepStrategy::Constant;
    config
}

#[test]
fn backward_euler_reaches_steady_state() {
    let mut integrator = PseudoTransient::new(Relaxation::scalar(3.0), Config::default()).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(0.0), None, None)
        .unwrap();

    let passed = integrator.advance_time().expect("should not error");

    assert!(passed);
    assert_eq!(integrator.status(), Status::Passed);
    assert_eq!(integrator.termination(), Some(Termination::SteadyState));

    let steady = integrator.solution_history().current().unwrap();
    assert_relative_eq!(steady.x[(0, 0)], 3.0, epsilon = 1e-9);
    assert!(steady.x_dot.norm() <= 1e-10 + 1e-12 * 3.0);
    assert_eq!(integrator.index(), steady.index);
    assert_eq!(integrator.solution_history().len(), steady.index + 1);
}

#[test]
fn forward_euler_reaches_steady_state() {
    let config = Config {
        stepper: StepperKind::ForwardEuler,
        ..constant_steps(0.5)
    };
    let mut integrator = PseudoTransient::new(Relaxation::scalar(3.0), config).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(0.0), None, None)
        .unwrap();

    assert!(integrator.advance_time().unwrap());
    assert_relative_eq!(
        integrator.solution_history().current().unwrap().x[(0, 0)],
        3.0,
        epsilon = 1e-9
    );
    assert_eq!(integrator.stepper().kind(), StepperKind::ForwardEuler);

    let steady = integrator.solution_history().current().unwrap();
    assert_relative_eq!(steady.x_dot[(0, 0)], 3.0 - steady.x[(0, 0)], epsilon = 1e-15);
}

#[test]
fn forward_euler_with_adaptive_steps_reaches_steady_state() {
    let config = Config::with_stepper(StepperKind::ForwardEuler);
    let mut integrator = PseudoTransient::new(Relaxation::scalar(3.0), config).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(0.0), None, None)
        .unwrap();

    assert!(integrator.advance_time().unwrap());
    assert_eq!(integrator.termination(), Some(Termination::SteadyState));
    assert_relative_eq!(
        integrator.solution_history().current().unwrap().x[(0, 0)],
        3.0,
        epsilon = 1e-9
    );
}

#[test]
fn explicit_steps_that_grow_the_rate_are_retried() {
    let problem = Relaxation {
        k: 10.0,
        c: vec![3.0],
    };
    let mut config = Config::with_stepper(StepperKind::ForwardEuler);
    config.time_step_control.initial_time_step = 0.5;
    let mut integrator = PseudoTransient::new(problem, config).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(0.0), None, None)
        .unwrap();

    assert!(integrator.advance_time().unwrap());

    // The first step has no previous rate to compare against.
    let history = integrator.solution_history();
    assert_relative_eq!(history.get(1).unwrap().dt, 0.5);
    assert_relative_eq!(history.get(2).unwrap().dt, 0.125);
    assert_relative_eq!(history.current().unwrap().x[(0, 0)], 0.3, epsilon = 1e-9);
    assert!(integrator.stepper_timer().count() > integrator.index());
}

#[test]
fn timers_record_calls_and_step_attempts() {
    let mut integrator = PseudoTransient::new(Relaxation::scalar(3.0), Config::default()).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(0.0), None, None)
        .unwrap();

    assert!(integrator.advance_time().unwrap());
    assert!(integrator.advance_time().unwrap());

    let (outer, inner) = (integrator.integrator_timer(), integrator.stepper_timer());
    assert_eq!(outer.count(), 2);
    assert_eq!(inner.count(), integrator.index());
    assert!(inner.elapsed() <= outer.elapsed());

    integrator
        .initialize_solution_history(0.0, scalar(0.0), None, None)
        .unwrap();
    assert_eq!(integrator.integrator_timer().count(), 0);
    assert_eq!(integrator.stepper_timer().count(), 0);
}

#[test]
fn integrates_every_direction() {
    let problem = Relaxation {
        k: 2.0,
        c: vec![4.0, -1.0],
    };
    let mut integrator = PseudoTransient::new(problem, Config::default()).unwrap();
    integrator
        .initialize_solution_history(0.0, MultiVector::zeros(1, 2), None, None)
        .unwrap();

    assert!(integrator.advance_time().unwrap());

    let steady = integrator.solution_history().current().unwrap();
    assert_relative_eq!(steady.x[(0, 0)], 2.0, epsilon = 1e-9);
    assert_relative_eq!(steady.x[(0, 1)], -0.5, epsilon = 1e-9);
}

#[test]
fn max_steps_fails_without_error() {
    let config = Config {
        max_steps: 3,
        ..constant_steps(1e-3)
    };
    let mut integrator = PseudoTransient::new(Relaxation::scalar(3.0), config).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(0.0), None, None)
        .unwrap();

    let passed = integrator.advance_time().expect("non-convergence is not an error");

    assert!(!passed);
    assert_eq!(integrator.status(), Status::Failed);
    assert_eq!(integrator.termination(), Some(Termination::MaxSteps));
    assert_eq!(integrator.index(), 3);
}

#[test]
fn final_time_reached_before_steady_state() {
    let mut integrator =
        PseudoTransient::new(Relaxation::scalar(3.0), constant_steps(0.01)).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(0.0), None, None)
        .unwrap();

    assert!(!integrator.advance_time_to(0.05).unwrap());
    assert_eq!(integrator.termination(), Some(Termination::FinalTime));
    assert_relative_eq!(integrator.time(), 0.05, epsilon = 1e-12);
}

#[test]
fn observer_can_stop_early() {
    let mut integrator =
        PseudoTransient::new(Relaxation::scalar(3.0), constant_steps(1e-3)).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(0.0), None, None)
        .unwrap();

    let mut rates = Vec::new();
    let observer = |event: &Event<'_>| {
        rates.push(event.rate);
        (event.state.index >= 2).then_some(Action::StopEarly)
    };

    let passed = integrator
        .advance_time_observed(1.0, observer)
        .expect("should stop cleanly");

    assert!(!passed);
    assert_eq!(integrator.termination(), Some(Termination::StoppedByObserver));
    assert_eq!(rates.len(), 2);
    assert!(rates[1] < rates[0]);
}

#[test]
fn finished_run_is_not_resumed() {
    let mut integrator = PseudoTransient::new(Relaxation::scalar(1.0), Config::default()).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(0.0), None, None)
        .unwrap();
    assert!(integrator.advance_time().unwrap());
    let index = integrator.index();

    assert!(integrator.advance_time().unwrap());
    assert_eq!(integrator.index(), index);
}

#[test]
fn requires_initialization() {
    let mut integrator = PseudoTransient::new(Relaxation::scalar(1.0), Config::default()).unwrap();

    assert!(matches!(integrator.advance_time(), Err(Error::NotInitialized)));
    assert!(integrator.time().is_nan());
}

#[test]
fn rejects_misshapen_initial_state() {
    let mut integrator = PseudoTransient::new(Relaxation::scalar(1.0), Config::default()).unwrap();

    let result = integrator.initialize_solution_history(0.0, MultiVector::zeros(2, 1), None, None);

    assert!(matches!(
        result,
        Err(Error::DimensionMismatch {
            name: "x0",
            expected: (1, 1),
            actual: (2, 1),
        })
    ));
}

#[test]
fn rejects_invalid_config() {
    let config = Config {
        max_steps: 0,
        ..Config::default()
    };

    assert!(matches!(
        PseudoTransient::new(Relaxation::scalar(1.0), config),
        Err(ConfigError::MaxSteps)
    ));
}

/// `F = x_dot + x` whose iteration matrix is singular for steps above 0.1.
struct StiffOnlyForSmallSteps;

impl ImplicitOde for StiffOnlyForSmallSteps {
    type Error = Infallible;

    fn dim(&self) -> usize {
        1
    }

    fn residual(
        &self,
        _t: f64,
        x: &MultiVector,
        x_dot: &MultiVector,
    ) -> Result<MultiVector, Self::Error> {
        Ok(x_dot + x)
    }

    fn jacobian(
        &self,
        _t: f64,
        _x: &MultiVector,
        _x_dot: &MultiVector,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        let value = if alpha < 10.0 { 0.0 } else { alpha + beta };
        Ok(DMatrix::from_element(1, 1, value))
    }
}

#[test]
fn failed_steps_are_retried_with_smaller_time_steps() {
    let mut integrator = PseudoTransient::new(StiffOnlyForSmallSteps, constant_steps(1.0)).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(1.0), None, None)
        .unwrap();

    assert!(integrator.advance_time().unwrap());

    let first = integrator.solution_history().get(1).unwrap();
    assert_relative_eq!(first.dt, 0.0625);
    assert_relative_eq!(integrator.time_step(), 0.0625);
}

#[test]
fn exhausting_retries_fails_the_run() {
    let mut config = constant_steps(1.0);
    config.time_step_control.max_consecutive_failures = 2;
    let mut integrator = PseudoTransient::new(StiffOnlyForSmallSteps, config).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(1.0), None, None)
        .unwrap();

    assert!(!integrator.advance_time().unwrap());
    assert_eq!(integrator.termination(), Some(Termination::StepFailures));
    assert_eq!(integrator.index(), 0);
}

#[derive(Debug, thiserror::Error)]
#[error("evaluation budget exhausted")]
struct Exhausted;

/// Fails after a fixed number of residual evaluations.
struct Budgeted {
    remaining: Cell<usize>,
}

impl ImplicitOde for Budgeted {
    type Error = Exhausted;

    fn dim(&self) -> usize {
        1
    }

    fn residual(
        &self,
        _t: f64,
        x: &MultiVector,
        x_dot: &MultiVector,
    ) -> Result<MultiVector, Self::Error> {
        let remaining = self.remaining.get().checked_sub(1).ok_or(Exhausted)?;
        self.remaining.set(remaining);
        Ok(x_dot + x)
    }

    fn jacobian(
        &self,
        _t: f64,
        _x: &MultiVector,
        _x_dot: &MultiVector,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        Ok(DMatrix::from_element(1, 1, alpha + beta))
    }
}

#[test]
fn problem_errors_are_surfaced() {
    let problem = Budgeted {
        remaining: Cell::new(3),
    };
    let mut integrator = PseudoTransient::new(problem, constant_steps(1e-3)).unwrap();
    integrator
        .initialize_solution_history(0.0, scalar(1.0), None, None)
        .unwrap();

    let result = integrator.advance_time();

    assert!(matches!(result, Err(Error::Problem(_))));
    assert_eq!(integrator.status(), Status::Failed);
    assert_eq!(integrator.termination(), Some(Termination::ProblemError));
}
