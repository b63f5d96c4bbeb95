//! Steady-state adjoint sensitivities by pseudo-transient continuation.
//!
//! For an implicit ODE `f(x_dot, x, p) = 0` with a stable steady state `x^s`
//! and a response function `g(x, p)`, the sensitivity `dg/dp` at the steady
//! state does not require differentiating through the forward transient.
//! After the transformation `tau = T - t`, the adjoint equation
//!
//! ```text
//! df/dx_dot^T * y_dot + df/dx^T * y - dg/dx^T = 0
//! ```
//!
//! has frozen, constant coefficients, and its unique stable steady state is
//! `y^s = df/dx^{-T} * dg/dx^T`. Integrating it from `y(0) = 0` until `y_dot`
//! vanishes gives the total sensitivity of the response
//!
//! ```text
//! DgDp = dg/dp - (y^s)^T * df/dp
//! ```
//!
//! # Modules
//!
//! - [`adjoint`]: [`AdjointSensitivityModel`], the frozen adjoint equation
//!   presented as an [`ImplicitOde`](ptc_core::ImplicitOde)
//! - [`PseudoTransientAdjointSensitivity`]: runs the forward and adjoint
//!   integrations and assembles `dg/dp`
//! - [`Config`]: forward, adjoint, and sensitivity settings

pub mod adjoint;

mod acceptor;
mod config;
mod integrator;

pub use acceptor::ConfigAcceptor;
pub use adjoint::AdjointSensitivityModel;
pub use config::{Config, ConfigError, SensitivityConfig};
pub use integrator::{
    Builder, Error, Phase, PseudoTransientAdjointSensitivity, SensitivityEvent, Stage, Verbosity,
};
