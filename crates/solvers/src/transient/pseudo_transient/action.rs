/// Control actions supported by the pseudo-transient integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the integrator and report the run as failed.
    StopEarly,
}
