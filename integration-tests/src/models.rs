//! Small steady-state models with known sensitivities.

use std::convert::Infallible;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use ptc_core::{AdjointModel, Point, ResidualModel, ResponseGradient};

/// `f = x_dot + x + x^3 - p` with response `g = x^2`.
///
/// At the steady state `x + x^3 = p`, so `dg/dp = 2x / (1 + 3x^2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Cubic {
    pub source: f64,
}

impl ResidualModel for Cubic {
    type Error = Infallible;

    fn state_dim(&self) -> usize {
        1
    }

    fn num_parameters(&self) -> usize {
        1
    }

    fn parameter_dim(&self, _index: usize) -> usize {
        1
    }

    fn num_responses(&self) -> usize {
        1
    }

    fn response_dim(&self, _index: usize) -> usize {
        1
    }

    fn nominal_parameters(&self) -> Vec<DVector<f64>> {
        vec![DVector::from_element(1, self.source)]
    }

    fn residual(&self, point: &Point<'_>) -> Result<DVector<f64>, Self::Error> {
        let x = point.x[0];
        Ok(DVector::from_element(
            1,
            point.x_dot[0] + x + x.powi(3) - point.params[0][0],
        ))
    }

    fn jacobian(
        &self,
        point: &Point<'_>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        let x = point.x[0];
        Ok(DMatrix::from_element(1, 1, alpha + beta * (1.0 + 3.0 * x * x)))
    }

    fn parameter_jacobian(
        &self,
        _index: usize,
        _point: &Point<'_>,
    ) -> Result<DMatrix<f64>, Self::Error> {
        Ok(DMatrix::from_element(1, 1, -1.0))
    }

    fn response(&self, _index: usize, point: &Point<'_>) -> Result<DVector<f64>, Self::Error> {
        Ok(DVector::from_element(1, point.x[0] * point.x[0]))
    }

    fn response_gradient(
        &self,
        _response: usize,
        _parameter: usize,
        point: &Point<'_>,
    ) -> Result<ResponseGradient, Self::Error> {
        Ok(ResponseGradient {
            dg_dx: DMatrix::from_element(1, 1, 2.0 * point.x[0]),
            dg_dp: DMatrix::zeros(1, 1),
        })
    }
}

/// Logistic growth with constant harvesting, `x_dot = r x (1 - x / K) - h`.
///
/// The single parameter block is `[r, K, h]` and the response is the
/// population `x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Logistic {
    pub growth_rate: f64,
    pub carrying_capacity: f64,
    pub harvest: f64,
}

impl Logistic {
    /// Returns the stable steady state.
    #[must_use]
    pub fn steady_state(&self) -> f64 {
        let (r, k, h) = (self.growth_rate, self.carrying_capacity, self.harvest);
        0.5 * k * (1.0 + (1.0 - 4.0 * h / (r * k)).sqrt())
    }
}

impl ResidualModel for Logistic {
    type Error = Infallible;

    fn state_dim(&self) -> usize {
        1
    }

    fn num_parameters(&self) -> usize {
        1
    }

    fn parameter_dim(&self, _index: usize) -> usize {
        3
    }

    fn num_responses(&self) -> usize {
        1
    }

    fn response_dim(&self, _index: usize) -> usize {
        1
    }

    fn nominal_parameters(&self) -> Vec<DVector<f64>> {
        vec![DVector::from_vec(vec![
            self.growth_rate,
            self.carrying_capacity,
            self.harvest,
        ])]
    }

    fn residual(&self, point: &Point<'_>) -> Result<DVector<f64>, Self::Error> {
        let x = point.x[0];
        let p = &point.params[0];
        let (r, k, h) = (p[0], p[1], p[2]);
        Ok(DVector::from_element(
            1,
            point.x_dot[0] - r * x * (1.0 - x / k) + h,
        ))
    }

    fn jacobian(
        &self,
        point: &Point<'_>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        let x = point.x[0];
        let p = &point.params[0];
        let (r, k) = (p[0], p[1]);
        Ok(DMatrix::from_element(
            1,
            1,
            alpha - beta * r * (1.0 - 2.0 * x / k),
        ))
    }

    fn parameter_jacobian(
        &self,
        _index: usize,
        point: &Point<'_>,
    ) -> Result<DMatrix<f64>, Self::Error> {
        let x = point.x[0];
        let p = &point.params[0];
        let (r, k) = (p[0], p[1]);
        Ok(DMatrix::from_row_slice(
            1,
            3,
            &[-x * (1.0 - x / k), -r * x * x / (k * k), 1.0],
        ))
    }

    fn response(&self, _index: usize, point: &Point<'_>) -> Result<DVector<f64>, Self::Error> {
        Ok(point.x.clone())
    }

    fn response_gradient(
        &self,
        _response: usize,
        _parameter: usize,
        _point: &Point<'_>,
    ) -> Result<ResponseGradient, Self::Error> {
        Ok(ResponseGradient {
            dg_dx: DMatrix::from_element(1, 1, 1.0),
            dg_dp: DMatrix::zeros(1, 3),
        })
    }
}

/// A reversible reaction `A <-> B` fed with `A` and drained of `B`:
///
/// ```text
/// a_dot = k_in - k_f a + k_r b
/// b_dot = k_f a - k_r b - k_out b^2
/// ```
///
/// The parameter block is `[k_in, k_f, k_r, k_out]`. Response 0 is the
/// product concentration `b`; response 1 is the total `a + b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Reactor {
    pub inflow_rate: f64,
    pub forward_rate: f64,
    pub reverse_rate: f64,
    pub outflow_rate: f64,
}

impl Reactor {
    /// Returns the steady concentrations `[a, b]`.
    #[must_use]
    pub fn steady_state(&self) -> [f64; 2] {
        let b = (self.inflow_rate / self.outflow_rate).sqrt();
        let a = (self.reverse_rate * b + self.inflow_rate) / self.forward_rate;
        [a, b]
    }

    /// Returns `df/dx`, the negated Jacobian of the reaction rates.
    fn state_jacobian(x: &DVector<f64>, p: &DVector<f64>) -> DMatrix<f64> {
        let (k_f, k_r, k_out) = (p[1], p[2], p[3]);
        DMatrix::from_row_slice(
            2,
            2,
            &[k_f, -k_r, -k_f, k_r + 2.0 * k_out * x[1]],
        )
    }
}

impl ResidualModel for Reactor {
    type Error = Infallible;

    fn state_dim(&self) -> usize {
        2
    }

    fn num_parameters(&self) -> usize {
        1
    }

    fn parameter_dim(&self, _index: usize) -> usize {
        4
    }

    fn num_responses(&self) -> usize {
        2
    }

    fn response_dim(&self, _index: usize) -> usize {
        1
    }

    fn nominal_parameters(&self) -> Vec<DVector<f64>> {
        vec![DVector::from_vec(vec![
            self.inflow_rate,
            self.forward_rate,
            self.reverse_rate,
            self.outflow_rate,
        ])]
    }

    fn residual(&self, point: &Point<'_>) -> Result<DVector<f64>, Self::Error> {
        let (x, p) = (point.x, &point.params[0]);
        let (k_in, k_f, k_r, k_out) = (p[0], p[1], p[2], p[3]);
        let forward = k_f * x[0] - k_r * x[1];
        Ok(point.x_dot
            - DVector::from_vec(vec![k_in - forward, forward - k_out * x[1] * x[1]]))
    }

    fn jacobian(
        &self,
        point: &Point<'_>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        let df_dx = Self::state_jacobian(point.x, &point.params[0]);
        Ok(DMatrix::identity(2, 2) * alpha + df_dx * beta)
    }

    fn parameter_jacobian(
        &self,
        _index: usize,
        point: &Point<'_>,
    ) -> Result<DMatrix<f64>, Self::Error> {
        let (a, b) = (point.x[0], point.x[1]);
        Ok(DMatrix::from_row_slice(
            2,
            4,
            &[
                -1.0, a, -b, 0.0, //
                0.0, -a, b, b * b,
            ],
        ))
    }

    fn response(&self, index: usize, point: &Point<'_>) -> Result<DVector<f64>, Self::Error> {
        let value = if index == 0 {
            point.x[1]
        } else {
            point.x[0] + point.x[1]
        };
        Ok(DVector::from_element(1, value))
    }

    fn response_gradient(
        &self,
        response: usize,
        _parameter: usize,
        _point: &Point<'_>,
    ) -> Result<ResponseGradient, Self::Error> {
        let dg_dx = if response == 0 { [0.0, 1.0] } else { [1.0, 1.0] };
        Ok(ResponseGradient {
            dg_dx: DMatrix::from_row_slice(1, 2, &dg_dx),
            dg_dp: DMatrix::zeros(1, 4),
        })
    }
}

/// Assembles the adjoint operators of a [`Reactor`] directly.
#[derive(Debug)]
pub struct ReactorAdjoint(pub Arc<Reactor>);

impl AdjointModel for ReactorAdjoint {
    type Error = Infallible;

    fn adjoint_jacobian(
        &self,
        point: &Point<'_>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        let (x, p) = (point.x, &point.params[0]);
        let (k_f, k_r, k_out) = (p[1], p[2], p[3]);
        let df_dx_t = DMatrix::from_row_slice(
            2,
            2,
            &[k_f, -k_f, -k_r, k_r + 2.0 * k_out * x[1]],
        );
        Ok(DMatrix::identity(2, 2) * alpha + df_dx_t * beta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn reactor_steady_state_zeroes_the_residual() {
        let reactor = Reactor {
            inflow_rate: 4.0,
            forward_rate: 2.0,
            reverse_rate: 1.0,
            outflow_rate: 1.0,
        };
        let x = DVector::from_row_slice(&reactor.steady_state());
        let x_dot = DVector::zeros(2);
        let params = reactor.nominal_parameters();

        let f = reactor
            .residual(&Point::new(0.0, &x, &x_dot, &params))
            .unwrap();

        assert_relative_eq!(f, DVector::zeros(2), epsilon = 1e-14);
    }

    #[test]
    fn reactor_adjoint_is_the_transposed_jacobian() {
        let reactor = Arc::new(Reactor {
            inflow_rate: 4.0,
            forward_rate: 2.0,
            reverse_rate: 1.0,
            outflow_rate: 1.0,
        });
        let x = DVector::from_vec(vec![0.7, 1.3]);
        let x_dot = DVector::zeros(2);
        let params = reactor.nominal_parameters();
        let point = Point::new(0.0, &x, &x_dot, &params);

        let forward = reactor.jacobian(&point, 3.0, 0.5).unwrap();
        let adjoint = ReactorAdjoint(Arc::clone(&reactor))
            .adjoint_jacobian(&point, 3.0, 0.5)
            .unwrap();

        assert_relative_eq!(adjoint, forward.transpose());
    }

    #[test]
    fn logistic_steady_state_is_the_stable_root() {
        let model = Logistic {
            growth_rate: 1.0,
            carrying_capacity: 10.0,
            harvest: 0.9,
        };

        assert_relative_eq!(model.steady_state(), 9.0, epsilon = 1e-12);
    }
}
