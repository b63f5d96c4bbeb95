use std::fmt::{self, Write};

use ptc_core::{AdjointModel, ImplicitOde, ResidualModel};
use ptc_solvers::transient::{
    Integrator,
    pseudo_transient::{Config as IntegratorConfig, PseudoTransient},
};

use super::{Phase, PseudoTransientAdjointSensitivity};

/// How much detail [`describe`](PseudoTransientAdjointSensitivity::describe)
/// writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Stage and overall status.
    Low,

    /// Adds the outcome of each phase.
    #[default]
    Medium,

    /// Adds the settings of each phase and the results.
    High,
}

impl<M: ResidualModel, A: AdjointModel> PseudoTransientAdjointSensitivity<M, A> {
    /// Writes a human-readable report of the run to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to `out` fails.
    pub fn describe<W: Write>(&self, out: &mut W, verbosity: Verbosity) -> fmt::Result {
        let sensitivities = &self.config.sensitivities;
        writeln!(out, "Pseudo-transient adjoint sensitivity")?;
        writeln!(
            out,
            "  response {} / parameter block {} ({} adjoint)",
            sensitivities.response_function_index,
            sensitivities.sensitivity_parameter_index,
            if self.adjoint_model.is_some() {
                "explicit"
            } else {
                "transposed"
            },
        )?;
        writeln!(out, "  stage: {}", self.stage)?;
        writeln!(out, "  status: {}", self.status)?;

        if verbosity == Verbosity::Low {
            return Ok(());
        }

        describe_phase(out, Phase::Forward, &self.forward, verbosity)?;
        describe_phase(out, Phase::Adjoint, &self.adjoint, verbosity)?;

        if verbosity == Verbosity::High {
            if let Ok(x) = self.x() {
                write!(out, "  x: {}", x.transpose())?;
            }
            if let Ok(g) = self.response() {
                write!(out, "  g: {}", g.transpose())?;
            }
            if let Ok(dgdp) = self.dgdp() {
                write!(out, "  dg/dp: {dgdp}")?;
            }
        }
        Ok(())
    }
}

fn describe_phase<W: Write, P: ImplicitOde>(
    out: &mut W,
    phase: Phase,
    integrator: &PseudoTransient<P>,
    verbosity: Verbosity,
) -> fmt::Result {
    write!(out, "  {phase}: {}", integrator.status())?;
    if let Some(termination) = integrator.termination() {
        write!(out, " ({termination})")?;
    }
    writeln!(
        out,
        ", {} steps, t = {}",
        integrator.index(),
        integrator.time()
    )?;

    if verbosity == Verbosity::High {
        describe_settings(out, integrator.config())?;
        let (outer, inner) = (integrator.integrator_timer(), integrator.stepper_timer());
        writeln!(
            out,
            "    timers: integrator {:?} over {} calls, stepper {:?} over {} attempts",
            outer.elapsed(),
            outer.count(),
            inner.elapsed(),
            inner.count()
        )?;
    }
    Ok(())
}

fn describe_settings<W: Write>(out: &mut W, config: &IntegratorConfig) -> fmt::Result {
    let control = &config.time_step_control;
    writeln!(
        out,
        "    stepper: {}, max steps: {}, final time: {}",
        config.stepper, config.max_steps, config.final_time
    )?;
    writeln!(
        out,
        "    time step: {} in [{}, {}], {:?} control",
        control.initial_time_step, control.min_time_step, control.max_time_step, control.strategy
    )?;
    writeln!(
        out,
        "    steady state: |x_dot| <= {} + {} * |x|",
        config.steady_state.abs_tol, config.steady_state.rel_tol
    )
}

impl<M: ResidualModel, A: AdjointModel> fmt::Display for PseudoTransientAdjointSensitivity<M, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(f, Verbosity::default())
    }
}
