use std::convert::Infallible;

use nalgebra::{DMatrix, DVector};

/// A point at which a [`ResidualModel`] is evaluated.
///
/// Parameters are grouped into blocks, indexed the same way as
/// [`ResidualModel::parameter_dim`] and [`ResidualModel::parameter_jacobian`].
#[derive(Debug, Clone, Copy)]
pub struct Point<'a> {
    pub time: f64,
    pub x: &'a DVector<f64>,
    pub x_dot: &'a DVector<f64>,
    pub params: &'a [DVector<f64>],
}

impl<'a> Point<'a> {
    /// Creates a new evaluation point.
    pub fn new(
        time: f64,
        x: &'a DVector<f64>,
        x_dot: &'a DVector<f64>,
        params: &'a [DVector<f64>],
    ) -> Self {
        Self {
            time,
            x,
            x_dot,
            params,
        }
    }
}

/// Derivatives of a response function `g(x, p)` at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseGradient {
    /// `dg/dx`, with one row per response component and one column per state.
    pub dg_dx: DMatrix<f64>,

    /// `dg/dp`, with one row per response component and one column per
    /// parameter in the requested block.
    pub dg_dp: DMatrix<f64>,
}

/// An implicit ODE `f(x_dot, x, p, t) = 0` with response functions `g(x, p)`.
///
/// Implementations must be deterministic: the same point always produces the
/// same values. Integrators and sensitivity drivers share models through
/// [`std::sync::Arc`] and never mutate them.
pub trait ResidualModel {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the length of the state vector `x`.
    fn state_dim(&self) -> usize;

    /// Returns the number of parameter blocks.
    fn num_parameters(&self) -> usize;

    /// Returns the length of parameter block `index`.
    fn parameter_dim(&self, index: usize) -> usize;

    /// Returns the number of response functions.
    fn num_responses(&self) -> usize;

    /// Returns the length of response function `index`.
    fn response_dim(&self, index: usize) -> usize;

    /// Returns the nominal value of every parameter block.
    fn nominal_parameters(&self) -> Vec<DVector<f64>>;

    /// Evaluates the residual `f(x_dot, x, p, t)`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the residual cannot be evaluated.
    fn residual(&self, point: &Point<'_>) -> Result<DVector<f64>, Self::Error>;

    /// Evaluates the iteration matrix `W = alpha * df/dx_dot + beta * df/dx`.
    ///
    /// With `alpha = 0, beta = 1` this is the state Jacobian, and with
    /// `alpha = 1, beta = 0` it is the mass matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the operator cannot be evaluated.
    fn jacobian(
        &self,
        point: &Point<'_>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error>;

    /// Evaluates `df/dp` for parameter block `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the operator cannot be evaluated.
    fn parameter_jacobian(
        &self,
        index: usize,
        point: &Point<'_>,
    ) -> Result<DMatrix<f64>, Self::Error>;

    /// Evaluates response function `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the response cannot be evaluated.
    fn response(&self, index: usize, point: &Point<'_>) -> Result<DVector<f64>, Self::Error>;

    /// Evaluates the derivatives of response `response` with respect to the
    /// state and to parameter block `parameter`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the derivatives cannot be evaluated.
    fn response_gradient(
        &self,
        response: usize,
        parameter: usize,
        point: &Point<'_>,
    ) -> Result<ResponseGradient, Self::Error>;
}

/// A model that directly provides the adjoint iteration operator.
///
/// The returned matrix is `alpha * df/dx_dot^* + beta * df/dx^*` and is used
/// as is, without transposition. It is evaluated at the same points as the
/// forward [`ResidualModel`] it accompanies.
pub trait AdjointModel {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Evaluates the adjoint iteration operator.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the operator cannot be evaluated.
    fn adjoint_jacobian(
        &self,
        point: &Point<'_>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error>;
}

/// Marker for "no explicit adjoint model".
///
/// The adjoint operator is then the conjugate transpose of the forward
/// model's operator. This type has no values, so it can only appear as a
/// type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transposed {}

impl AdjointModel for Transposed {
    type Error = Infallible;

    fn adjoint_jacobian(
        &self,
        _point: &Point<'_>,
        _alpha: f64,
        _beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        match *self {}
    }
}
