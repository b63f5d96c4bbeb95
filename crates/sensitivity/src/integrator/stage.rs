use std::fmt;

/// One of the two integrations a sensitivity run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Integration of the model to its steady state.
    Forward,

    /// Integration of the adjoint equation frozen at that steady state.
    Adjoint,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("forward"),
            Self::Adjoint => f.write_str("adjoint"),
        }
    }
}

/// How far a sensitivity run has progressed.
///
/// ```text
/// Configured -> ForwardReady -> ForwardDone -> AdjointDone -> Complete
///                    |               |              |
///                    +---------------+--------------+--> Failed(phase)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Built, but no initial condition has been given.
    Configured,

    /// The forward initial condition is set.
    ForwardReady,

    /// The forward integration reached a steady state.
    ForwardDone,

    /// The adjoint integration reached a steady state.
    AdjointDone,

    /// The sensitivity has been assembled.
    Complete,

    /// The named phase failed; results of this run are not available.
    Failed(Phase),
}

impl Stage {
    /// Returns `true` if the run has ended, successfully or not.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configured => f.write_str("configured"),
            Self::ForwardReady => f.write_str("forward ready"),
            Self::ForwardDone => f.write_str("forward done"),
            Self::AdjointDone => f.write_str("adjoint done"),
            Self::Complete => f.write_str("complete"),
            Self::Failed(phase) => write!(f, "failed in {phase} phase"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_complete_and_failed_are_terminal() {
        assert!(Stage::Complete.is_terminal());
        assert!(Stage::Failed(Phase::Forward).is_terminal());
        assert!(!Stage::Configured.is_terminal());
        assert!(!Stage::AdjointDone.is_terminal());
        assert_eq!(
            Stage::Failed(Phase::Adjoint).to_string(),
            "failed in adjoint phase"
        );
    }
}
