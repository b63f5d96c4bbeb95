//! Solvers for implicit ODE problems integrated in time.
//!
//! An [`ImplicitOde`] provides a residual `F(X_dot, X, t)` and its iteration
//! matrix. Integrators in this module advance the state in time and record
//! the visited states in a [`SolutionHistory`].
//!
//! # Integrators
//!
//! - [`pseudo_transient`]: integrates until the state stops changing
//!
//! [`ImplicitOde`]: ptc_core::ImplicitOde
//! [`SolutionHistory`]: pseudo_transient::SolutionHistory

mod integrator;

pub use integrator::Integrator;

pub mod pseudo_transient;
