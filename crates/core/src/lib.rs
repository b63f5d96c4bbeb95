//! Core traits and types for pseudo-transient continuation.
//!
//! This crate defines the shared abstractions that integrators, sensitivity
//! drivers, and application models build on:
//!
//! - [`ResidualModel`]: an implicit ODE `f(x_dot, x, p, t) = 0` with its
//!   Jacobians, parameter Jacobians, and response functions
//! - [`AdjointModel`]: an optional model that returns an already adjointed
//!   iteration operator
//! - [`ImplicitOde`]: the residual/Jacobian contract consumed by generic
//!   time integrators, over a [`MultiVector`] of simultaneous directions
//! - [`ForwardOde`]: adapts a [`ResidualModel`] to [`ImplicitOde`]
//! - [`Observer`]: receives solver events and optionally returns control actions

mod model;
mod observer;
mod problems;

pub use model::{AdjointModel, Point, ResidualModel, ResponseGradient, Transposed};
pub use observer::Observer;
pub use problems::{ForwardOde, ImplicitOde, MultiVector};
