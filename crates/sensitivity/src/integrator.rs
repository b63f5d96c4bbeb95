//! The two-phase sensitivity integrator.
//!
//! [`PseudoTransientAdjointSensitivity`] drives a forward pseudo-transient
//! integration to a steady state, freezes the adjoint equation there,
//! integrates it from `y(0) = 0` to its own steady state, and combines the
//! result into `dg/dp`. It implements [`Integrator`], so it can stand in for
//! a plain forward integrator.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use ptc_sensitivity::{Config, PseudoTransientAdjointSensitivity};
//! use ptc_solvers::transient::Integrator;
//!
//! let mut integrator = PseudoTransientAdjointSensitivity::transposed(Config::default(), model)?;
//! integrator.initialize_solution_history(0.0, x0, None, None)?;
//!
//! if integrator.advance_time()? {
//!     println!("dg/dp = {}", integrator.dgdp()?);
//! }
//! ```

mod builder;
mod describe;
mod error;
mod event;
mod stage;

pub use builder::Builder;
pub use describe::Verbosity;
pub use error::Error;
pub use event::SensitivityEvent;
pub use stage::{Phase, Stage};

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use ptc_core::{
    AdjointModel, ForwardOde, ImplicitOde, MultiVector, Observer, Point, ResidualModel,
    Transposed,
};
use ptc_solvers::transient::{
    Integrator,
    pseudo_transient::{
        Action, Event, PseudoTransient, SolutionHistory, SolutionState, Status, StepControlConfig,
        Stepper, StepperKind, Timer,
    },
};

use crate::{AdjointSensitivityModel, Config, ConfigAcceptor, ConfigError};

type ForwardIntegrator<M> = PseudoTransient<ForwardOde<M>>;
type AdjointIntegrator<M, A> = PseudoTransient<AdjointSensitivityModel<M, A>>;

/// Computes steady-state sensitivities with a forward and an adjoint
/// pseudo-transient integration.
///
/// Results are available once [`stage`](Self::stage) is [`Stage::Complete`];
/// before that, the result getters return [`Error::NotReady`].
#[derive(Debug)]
pub struct PseudoTransientAdjointSensitivity<M, A = Transposed> {
    model: Arc<M>,
    adjoint_model: Option<Arc<A>>,
    config: Config,
    forward: ForwardIntegrator<M>,
    adjoint: AdjointIntegrator<M, A>,
    stage: Stage,
    status: Status,
    dgdp: Option<DMatrix<f64>>,
}

impl<M: ResidualModel> PseudoTransientAdjointSensitivity<M, Transposed> {
    /// Creates an integrator that transposes the forward operators for the
    /// adjoint phase.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn transposed(config: Config, model: Arc<M>) -> Result<Self, Error> {
        Self::new(config, model, None)
    }

    /// Creates an integrator with default settings and `stepper` for both
    /// phases.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_stepper(model: Arc<M>, stepper: StepperKind) -> Result<Self, Error> {
        Self::new(Config::with_stepper(stepper), model, None)
    }

    /// Returns a builder for setting the config, stepper, and models
    /// separately.
    #[must_use]
    pub fn builder() -> Builder<M> {
        Builder::new()
    }
}

impl<M: ResidualModel, A: AdjointModel> PseudoTransientAdjointSensitivity<M, A> {
    /// Creates an integrator for `model`.
    ///
    /// When `adjoint_model` is given, its operators are used for the adjoint
    /// phase as they are; otherwise the forward operators are transposed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the config is invalid, or
    /// [`Error::Adjoint`] if the model has no parameter block or response at
    /// the configured index.
    pub fn new(
        config: Config,
        model: Arc<M>,
        adjoint_model: Option<Arc<A>>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let forward = build_forward(&config, &model)?;
        let adjoint = build_adjoint(&config, &model, adjoint_model.as_ref())?;

        log::debug!(
            "configured sensitivity of response {} to parameter block {} ({} adjoint)",
            config.sensitivities.response_function_index,
            config.sensitivities.sensitivity_parameter_index,
            if adjoint_model.is_some() { "explicit" } else { "transposed" },
        );

        Ok(Self {
            model,
            adjoint_model,
            config,
            forward,
            adjoint,
            stage: Stage::Configured,
            status: Status::Working,
            dgdp: None,
        })
    }

    /// Creates an integrator that uses `adjoint_model` for the adjoint phase.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_adjoint_model(
        config: Config,
        model: Arc<M>,
        adjoint_model: Arc<A>,
    ) -> Result<Self, Error> {
        Self::new(config, model, Some(adjoint_model))
    }

    /// Creates an integrator with default settings, `stepper` for both
    /// phases, and `adjoint_model` for the adjoint phase.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_adjoint_model_and_stepper(
        model: Arc<M>,
        adjoint_model: Arc<A>,
        stepper: StepperKind,
    ) -> Result<Self, Error> {
        Self::new(Config::with_stepper(stepper), model, Some(adjoint_model))
    }

    /// Returns the forward model.
    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    /// Returns the explicit adjoint model, if one was supplied.
    pub fn adjoint_model(&self) -> Option<&Arc<A>> {
        self.adjoint_model.as_ref()
    }

    /// Returns how far the current run has progressed.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the forward integrator.
    pub fn forward_integrator(&self) -> &ForwardIntegrator<M> {
        &self.forward
    }

    /// Returns the adjoint integrator.
    pub fn adjoint_integrator(&self) -> &AdjointIntegrator<M, A> {
        &self.adjoint
    }

    /// Returns the forward solution history.
    pub fn forward_solution_history(&self) -> &SolutionHistory {
        self.forward.solution_history()
    }

    /// Returns the adjoint solution history of the current run.
    ///
    /// Adjoint states are indexed by the reversed time `tau` and have one
    /// column per response component.
    pub fn adjoint_solution_history(&self) -> &SolutionHistory {
        self.adjoint.solution_history()
    }

    /// Returns the adjoint phase's current pseudo-time `tau`, or `NaN` before
    /// the adjoint phase starts.
    pub fn adjoint_time(&self) -> f64 {
        self.adjoint.time()
    }

    /// Seeds the forward phase with an initial state.
    ///
    /// Any previous run is discarded, including its sensitivity and adjoint
    /// history. `x_dot_dot0` is kept on the initial state of the forward
    /// history only; the steppers do not track second derivatives, so
    /// [`x_dot_dot`](Self::x_dot_dot) is `None` once a step has been taken.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Integration`] if a state does not match the model's
    /// state dimension.
    pub fn initialize_solution_history(
        &mut self,
        t0: f64,
        x0: DVector<f64>,
        x_dot0: Option<DVector<f64>>,
        x_dot_dot0: Option<DVector<f64>>,
    ) -> Result<(), Error> {
        self.forward
            .initialize_solution_history(
                t0,
                into_column(&x0),
                x_dot0.as_ref().map(into_column),
                x_dot_dot0.as_ref().map(into_column),
            )
            .map_err(Error::integration(Phase::Forward))?;

        self.adjoint = build_adjoint(&self.config, &self.model, self.adjoint_model.as_ref())?;
        self.dgdp = None;
        self.stage = Stage::ForwardReady;
        self.status = Status::Working;

        Ok(())
    }

    /// Runs both phases, reporting each accepted step to `observer`.
    ///
    /// The forward phase runs until `t_final`; the adjoint phase runs until
    /// its own configured final time. Returns `Ok(true)` once the sensitivity
    /// has been assembled. A run that has already ended is not resumed; its
    /// outcome is returned again and the stored results are left unchanged.
    ///
    /// # Observer
    ///
    /// The observer receives a [`SensitivityEvent`] for every accepted step of
    /// either phase and may return [`Action::StopEarly`] to fail the run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] before
    /// [`initialize_solution_history`](Self::initialize_solution_history),
    /// or an error if a model evaluation fails. Either phase failing ends
    /// the run with [`Stage::Failed`].
    pub fn advance_time_observed<Obs>(
        &mut self,
        t_final: f64,
        mut observer: Obs,
    ) -> Result<bool, Error>
    where
        Obs: for<'a> Observer<SensitivityEvent<'a>, Action>,
    {
        if self.stage == Stage::Configured {
            return Err(Error::NotReady { stage: self.stage });
        }
        if self.stage.is_terminal() {
            return Ok(self.stage == Stage::Complete);
        }

        match self.run_phases(t_final, &mut observer) {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.fail();
                Ok(false)
            }
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Returns the forward steady state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless the run is complete.
    pub fn x(&self) -> Result<DVector<f64>, Error> {
        Ok(self.completed_forward_state()?.x.column(0).into_owned())
    }

    /// Returns the time derivative at the forward steady state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless the run is complete.
    pub fn x_dot(&self) -> Result<DVector<f64>, Error> {
        Ok(self.completed_forward_state()?.x_dot.column(0).into_owned())
    }

    /// Returns the second time derivative at the forward steady state, if the
    /// stepper tracks it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless the run is complete.
    pub fn x_dot_dot(&self) -> Result<Option<DVector<f64>>, Error> {
        let state = self.completed_forward_state()?;
        Ok(state
            .x_dot_dot
            .as_ref()
            .map(|x_dot_dot| x_dot_dot.column(0).into_owned()))
    }

    /// Evaluates the selected response function `g` at the forward steady
    /// state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless the run is complete, or
    /// [`Error::Model`] if the response cannot be evaluated.
    pub fn response(&self) -> Result<DVector<f64>, Error> {
        let state = self.completed_forward_state()?;
        let x = state.x.column(0).into_owned();
        let x_dot = state.x_dot.column(0).into_owned();
        let point = Point::new(state.time, &x, &x_dot, self.forward.problem().params());
        self.model
            .response(self.config.sensitivities.response_function_index, &point)
            .map_err(Error::model)
    }

    /// Returns the sensitivity `dg/dp`, one row per response component and
    /// one column per parameter in the selected block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless the run is complete.
    pub fn dgdp(&self) -> Result<&DMatrix<f64>, Error> {
        match (&self.dgdp, self.stage) {
            (Some(dgdp), Stage::Complete) => Ok(dgdp),
            _ => Err(Error::NotReady { stage: self.stage }),
        }
    }

    /// Returns the steady adjoint solution `y^s`, one column per response
    /// component.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless the run is complete.
    pub fn adjoint_solution(&self) -> Result<&MultiVector, Error> {
        self.require_complete()?;
        self.adjoint
            .solution_history()
            .current()
            .map(|state| &state.x)
            .ok_or(Error::NotReady { stage: self.stage })
    }

    fn run_phases<Obs>(&mut self, t_final: f64, observer: &mut Obs) -> Result<bool, Error>
    where
        Obs: for<'a> Observer<SensitivityEvent<'a>, Action>,
    {
        if self.stage == Stage::ForwardReady {
            let passed = self
                .forward
                .advance_time_observed(t_final, |event: &Event<'_>| {
                    observer.observe(&SensitivityEvent {
                        phase: Phase::Forward,
                        event: *event,
                    })
                })
                .map_err(Error::integration(Phase::Forward))?;
            if !passed {
                return Ok(false);
            }
            self.stage = Stage::ForwardDone;
        }

        if self.stage == Stage::ForwardDone {
            self.freeze_adjoint()?;

            let tau_final = self.config.adjoint.final_time;
            let passed = self
                .adjoint
                .advance_time_observed(tau_final, |event: &Event<'_>| {
                    observer.observe(&SensitivityEvent {
                        phase: Phase::Adjoint,
                        event: *event,
                    })
                })
                .map_err(Error::integration(Phase::Adjoint))?;
            if !passed {
                return Ok(false);
            }
            self.stage = Stage::AdjointDone;
        }

        if self.stage == Stage::AdjointDone {
            self.assemble()?;
            self.stage = Stage::Complete;
            self.status = Status::Passed;
        }

        Ok(true)
    }

    /// Freezes the adjoint equation at the forward steady state and seeds the
    /// adjoint phase with `y(0) = 0`.
    fn freeze_adjoint(&mut self) -> Result<(), Error> {
        let steady = self
            .forward
            .solution_history()
            .current()
            .cloned()
            .ok_or(Error::NotReady { stage: self.stage })?;
        let params = self.forward.problem().params().to_vec();

        self.adjoint.problem_mut().freeze(steady, params)?;

        let problem = self.adjoint.problem();
        let y0 = MultiVector::zeros(problem.dim(), problem.directions());
        self.adjoint
            .initialize_solution_history(0.0, y0, None, None)
            .map_err(Error::integration(Phase::Adjoint))
    }

    /// Combines the steady adjoint solution into `dg/dp`.
    fn assemble(&mut self) -> Result<(), Error> {
        let y = self
            .adjoint
            .solution_history()
            .current()
            .ok_or(Error::NotReady { stage: self.stage })?;
        let dgdp = self.adjoint.problem().sensitivity(&y.x)?;

        log::info!(
            "assembled {}x{} sensitivity of response {} to parameter block {}",
            dgdp.nrows(),
            dgdp.ncols(),
            self.config.sensitivities.response_function_index,
            self.config.sensitivities.sensitivity_parameter_index,
        );
        self.dgdp = Some(dgdp);
        Ok(())
    }

    /// Marks the phase in progress as failed.
    fn fail(&mut self) {
        let phase = match self.stage {
            Stage::ForwardReady => Phase::Forward,
            Stage::Failed(phase) => phase,
            _ => Phase::Adjoint,
        };
        log::warn!("sensitivity run failed in {phase} phase");
        self.stage = Stage::Failed(phase);
        self.status = Status::Failed;
    }

    fn require_complete(&self) -> Result<(), Error> {
        if self.stage == Stage::Complete {
            Ok(())
        } else {
            Err(Error::NotReady { stage: self.stage })
        }
    }

    fn completed_forward_state(&self) -> Result<&Arc<SolutionState>, Error> {
        self.require_complete()?;
        self.forward
            .solution_history()
            .current()
            .ok_or(Error::NotReady { stage: self.stage })
    }
}

fn into_column(v: &DVector<f64>) -> MultiVector {
    MultiVector::from_column_slice(v.len(), 1, v.as_slice())
}

fn build_forward<M: ResidualModel>(
    config: &Config,
    model: &Arc<M>,
) -> Result<ForwardIntegrator<M>, Error> {
    let problem = ForwardOde::new(Arc::clone(model))
        .with_identity_mass(config.sensitivities.mass_matrix_is_identity);
    let integrator =
        PseudoTransient::new(problem, config.forward.clone()).map_err(ConfigError::Forward)?;
    Ok(integrator)
}

fn build_adjoint<M: ResidualModel, A: AdjointModel>(
    config: &Config,
    model: &Arc<M>,
    adjoint_model: Option<&Arc<A>>,
) -> Result<AdjointIntegrator<M, A>, Error> {
    let problem = AdjointSensitivityModel::new(
        Arc::clone(model),
        adjoint_model.cloned(),
        &config.sensitivities,
    )?;
    let integrator =
        PseudoTransient::new(problem, config.adjoint.clone()).map_err(ConfigError::Adjoint)?;
    Ok(integrator)
}

impl<M: ResidualModel, A: AdjointModel> Integrator for PseudoTransientAdjointSensitivity<M, A> {
    type Error = Error;

    fn advance_time(&mut self) -> Result<bool, Self::Error> {
        self.advance_time_to(self.config.forward.final_time)
    }

    fn advance_time_to(&mut self, t_final: f64) -> Result<bool, Self::Error> {
        self.advance_time_observed(t_final, ())
    }

    /// Returns the current time in forward time units.
    ///
    /// Once the run is complete this is `T - tau`, where `T` is the forward
    /// steady-state time and `tau` the adjoint phase's final pseudo-time.
    /// Before that, it is the forward phase's current time.
    fn time(&self) -> f64 {
        if self.stage == Stage::Complete {
            self.forward.time() - self.adjoint.time()
        } else {
            self.forward.time()
        }
    }

    /// Returns the number of accepted steps across both phases.
    fn index(&self) -> usize {
        self.forward.index() + self.adjoint.index()
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    fn stepper(&self) -> &Stepper {
        self.forward.stepper()
    }

    fn time_step_control(&self) -> &StepControlConfig {
        self.forward.time_step_control()
    }

    fn solution_history(&self) -> &SolutionHistory {
        self.forward.solution_history()
    }

    /// Returns the forward integrator's timer; the adjoint phase keeps its
    /// own on [`adjoint_integrator`](Self::adjoint_integrator).
    fn integrator_timer(&self) -> &Timer {
        self.forward.integrator_timer()
    }

    fn stepper_timer(&self) -> &Timer {
        self.forward.stepper_timer()
    }
}

impl<M, A> ConfigAcceptor for PseudoTransientAdjointSensitivity<M, A>
where
    M: ResidualModel,
    A: AdjointModel,
{
    type Config = Config;
    type Error = Error;

    /// Replaces the config and rebuilds both integrators.
    ///
    /// The integrator returns to [`Stage::Configured`]; any run in progress
    /// and its results are discarded.
    fn set_config(&mut self, config: Config) -> Result<(), Error> {
        config.validate()?;
        let forward = build_forward(&config, &self.model)?;
        let adjoint = build_adjoint(&config, &self.model, self.adjoint_model.as_ref())?;

        self.config = config;
        self.forward = forward;
        self.adjoint = adjoint;
        self.stage = Stage::Configured;
        self.status = Status::Working;
        self.dgdp = None;

        Ok(())
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn unset_config(&mut self) -> Result<Config, Error> {
        let previous = self.config.clone();
        self.set_config(Config::default())?;
        Ok(previous)
    }

    fn valid_config(&self) -> Config {
        Config::default()
    }
}
