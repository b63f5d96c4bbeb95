use super::SolutionState;

/// Event emitted by the pseudo-transient integrator after each accepted step.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// The state just added to the solution history.
    pub state: &'a SolutionState,

    /// Norm of the state's time derivative, the steady-state measure.
    pub rate: f64,
}
