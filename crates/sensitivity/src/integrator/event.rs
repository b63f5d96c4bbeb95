use ptc_solvers::transient::pseudo_transient::Event;

use super::Phase;

/// Event emitted after each accepted step of either phase.
///
/// Adjoint events carry states in the reversed time `tau`, with one column
/// per response component.
#[derive(Debug, Clone, Copy)]
pub struct SensitivityEvent<'a> {
    pub phase: Phase,
    pub event: Event<'a>,
}
