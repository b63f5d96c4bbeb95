use std::fmt;

/// Progress of an integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Initialized or advancing; no final outcome yet.
    Working,

    /// Reached its goal.
    Passed,

    /// Stopped without reaching its goal.
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Working => "working",
            Self::Passed => "passed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Indicates why the integrator stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The state's rate of change dropped below the steady-state tolerance.
    SteadyState,

    /// The configured maximum number of steps was reached.
    MaxSteps,

    /// The final time was reached before a steady state.
    FinalTime,

    /// Too many consecutive stepper failures.
    StepFailures,

    /// A failed step could not be retried without going below the minimum
    /// time step.
    MinTimeStep,

    /// Stopped due to an observer action.
    StoppedByObserver,

    /// A problem evaluation returned an error.
    ProblemError,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::SteadyState => "steady state reached",
            Self::MaxSteps => "maximum number of steps reached",
            Self::FinalTime => "final time reached before steady state",
            Self::StepFailures => "too many consecutive step failures",
            Self::MinTimeStep => "time step fell below the minimum",
            Self::StoppedByObserver => "stopped by observer",
            Self::ProblemError => "problem evaluation failed",
        };
        f.write_str(reason)
    }
}
