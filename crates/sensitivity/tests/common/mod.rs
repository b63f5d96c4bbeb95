#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use ptc_core::{AdjointModel, Point, ResidualModel, ResponseGradient};

/// A linear model with two parameter blocks and two responses.
///
/// ```text
/// f  = M * x_dot + A * x - B * p - E * q
/// g0 = C * x + D * p
/// g1 = w^T * x + 2 * q
/// ```
#[derive(Debug, Clone)]
pub struct Linear {
    pub m: DMatrix<f64>,
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>,
    pub e: DMatrix<f64>,
    pub c: DMatrix<f64>,
    pub d: DMatrix<f64>,
    pub w: DMatrix<f64>,
    pub p: DVector<f64>,
    pub q: DVector<f64>,
}

impl Linear {
    pub fn new() -> Self {
        Self {
            m: DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 1.0]),
            a: DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 0.5, 2.0]),
            b: DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 2.0]),
            e: DMatrix::from_row_slice(2, 1, &[0.5, -1.0]),
            c: DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 1.0]),
            d: DMatrix::from_row_slice(2, 2, &[0.5, 0.0, 0.0, -0.25]),
            w: DMatrix::from_row_slice(1, 2, &[1.0, -1.0]),
            p: DVector::from_vec(vec![1.0, -1.0]),
            q: DVector::from_vec(vec![2.0]),
        }
    }

    /// Returns the same model with an identity mass matrix.
    pub fn with_identity_mass() -> Self {
        Self {
            m: DMatrix::identity(2, 2),
            ..Self::new()
        }
    }

    /// Returns the steady state `A^{-1} (B p + E q)`.
    pub fn steady_state(&self) -> DVector<f64> {
        let rhs = &self.b * &self.p + &self.e * &self.q;
        self.a.clone().lu().solve(&rhs).expect("A is invertible")
    }

    /// Returns `dg/dp + dg/dx * A^{-1} * B` for the given response and block.
    pub fn exact_sensitivity(&self, response: usize, parameter: usize) -> DMatrix<f64> {
        let (dg_dx, dg_dp) = self.gradient(response, parameter);
        let forcing = if parameter == 0 { &self.b } else { &self.e };
        let dx_dp = self.a.clone().lu().solve(forcing).expect("A is invertible");
        dg_dp + dg_dx * dx_dp
    }

    fn gradient(&self, response: usize, parameter: usize) -> (DMatrix<f64>, DMatrix<f64>) {
        match (response, parameter) {
            (0, 0) => (self.c.clone(), self.d.clone()),
            (0, _) => (self.c.clone(), DMatrix::zeros(2, 1)),
            (_, 0) => (self.w.clone(), DMatrix::zeros(1, 2)),
            (_, _) => (self.w.clone(), DMatrix::from_element(1, 1, 2.0)),
        }
    }
}

impl ResidualModel for Linear {
    type Error = Infallible;

    fn state_dim(&self) -> usize {
        2
    }

    fn num_parameters(&self) -> usize {
        2
    }

    fn parameter_dim(&self, index: usize) -> usize {
        if index == 0 { 2 } else { 1 }
    }

    fn num_responses(&self) -> usize {
        2
    }

    fn response_dim(&self, index: usize) -> usize {
        if index == 0 { 2 } else { 1 }
    }

    fn nominal_parameters(&self) -> Vec<DVector<f64>> {
        vec![self.p.clone(), self.q.clone()]
    }

    fn residual(&self, point: &Point<'_>) -> Result<DVector<f64>, Self::Error> {
        let [p, q] = point.params else {
            unreachable!("two parameter blocks")
        };
        Ok(&self.m * point.x_dot + &self.a * point.x - &self.b * p - &self.e * q)
    }

    fn jacobian(
        &self,
        _point: &Point<'_>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        Ok(&self.m * alpha + &self.a * beta)
    }

    fn parameter_jacobian(
        &self,
        index: usize,
        _point: &Point<'_>,
    ) -> Result<DMatrix<f64>, Self::Error> {
        Ok(if index == 0 { -&self.b } else { -&self.e })
    }

    fn response(&self, index: usize, point: &Point<'_>) -> Result<DVector<f64>, Self::Error> {
        Ok(if index == 0 {
            &self.c * point.x + &self.d * &point.params[0]
        } else {
            &self.w * point.x + &point.params[1] * 2.0
        })
    }

    fn response_gradient(
        &self,
        response: usize,
        parameter: usize,
        _point: &Point<'_>,
    ) -> Result<ResponseGradient, Self::Error> {
        let (dg_dx, dg_dp) = self.gradient(response, parameter);
        Ok(ResponseGradient { dg_dx, dg_dp })
    }
}

/// Returns the adjoint operators of a [`Linear`] model directly.
#[derive(Debug)]
pub struct LinearAdjoint(pub Arc<Linear>);

impl AdjointModel for LinearAdjoint {
    type Error = Infallible;

    fn adjoint_jacobian(
        &self,
        _point: &Point<'_>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        Ok(self.0.m.transpose() * alpha + self.0.a.transpose() * beta)
    }
}
