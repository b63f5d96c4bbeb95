//! Time integrators for the pseudo-transient continuation framework.
//!
//! # Modules
//!
//! - [`transient`]: the [`Integrator`](transient::Integrator) contract and
//!   the [`PseudoTransient`](transient::pseudo_transient::PseudoTransient)
//!   integrator that drives an [`ImplicitOde`](ptc_core::ImplicitOde) to a
//!   steady state

pub mod transient;
