use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::{ImplicitOde, MultiVector, Point, ResidualModel};

/// Adapts a [`ResidualModel`] to the single-direction [`ImplicitOde`] contract.
///
/// The model's parameters are fixed for the lifetime of the adapter.
#[derive(Debug)]
pub struct ForwardOde<M> {
    model: Arc<M>,
    params: Vec<DVector<f64>>,
    identity_mass: bool,
}

impl<M: ResidualModel> ForwardOde<M> {
    /// Creates a forward problem at the model's nominal parameters.
    pub fn new(model: Arc<M>) -> Self {
        let params = model.nominal_parameters();
        Self {
            model,
            params,
            identity_mass: false,
        }
    }

    /// Declares that the model's mass matrix is the identity.
    #[must_use]
    pub fn with_identity_mass(mut self, identity_mass: bool) -> Self {
        self.identity_mass = identity_mass;
        self
    }

    /// Returns the wrapped model.
    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    /// Returns the parameter blocks used for every evaluation.
    pub fn params(&self) -> &[DVector<f64>] {
        &self.params
    }
}

fn first_column(x: &MultiVector) -> DVector<f64> {
    x.column(0).into_owned()
}

impl<M: ResidualModel> ImplicitOde for ForwardOde<M> {
    type Error = M::Error;

    fn dim(&self) -> usize {
        self.model.state_dim()
    }

    fn mass_matrix_is_identity(&self) -> bool {
        self.identity_mass
    }

    fn residual(
        &self,
        t: f64,
        x: &MultiVector,
        x_dot: &MultiVector,
    ) -> Result<MultiVector, Self::Error> {
        let (x, x_dot) = (first_column(x), first_column(x_dot));
        let f = self
            .model
            .residual(&Point::new(t, &x, &x_dot, &self.params))?;
        Ok(DMatrix::from_column_slice(f.len(), 1, f.as_slice()))
    }

    fn jacobian(
        &self,
        t: f64,
        x: &MultiVector,
        x_dot: &MultiVector,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        let (x, x_dot) = (first_column(x), first_column(x_dot));
        self.model
            .jacobian(&Point::new(t, &x, &x_dot, &self.params), alpha, beta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use approx::assert_relative_eq;

    use crate::ResponseGradient;

    /// `f = 2 * x_dot + x - p`, `g = x`.
    struct Relaxation {
        p: f64,
    }

    impl ResidualModel for Relaxation {
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
            vec![DVector::from_element(1, self.p)]
        }

        fn residual(&self, point: &Point<'_>) -> Result<DVector<f64>, Self::Error> {
            Ok(point.x_dot * 2.0 + point.x - &point.params[0])
        }

        fn jacobian(
            &self,
            _point: &Point<'_>,
            alpha: f64,
            beta: f64,
        ) -> Result<DMatrix<f64>, Self::Error> {
            Ok(DMatrix::from_element(1, 1, 2.0 * alpha + beta))
        }

        fn parameter_jacobian(
            &self,
            _index: usize,
            _point: &Point<'_>,
        ) -> Result<DMatrix<f64>, Self::Error> {
            Ok(DMatrix::from_element(1, 1, -1.0))
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
                dg_dp: DMatrix::zeros(1, 1),
            })
        }
    }

    #[test]
    fn residual_uses_nominal_parameters() {
        let ode = ForwardOde::new(Arc::new(Relaxation { p: 3.0 }));
        let x = DMatrix::from_element(1, 1, 1.0);
        let x_dot = DMatrix::from_element(1, 1, 0.5);

        let f = ode.residual(0.0, &x, &x_dot).unwrap();

        assert_eq!(f.shape(), (1, 1));
        assert_relative_eq!(f[(0, 0)], 2.0 * 0.5 + 1.0 - 3.0);
    }

    #[test]
    fn jacobian_combines_mass_and_state_terms() {
        let ode = ForwardOde::new(Arc::new(Relaxation { p: 3.0 }));
        let x = DMatrix::zeros(1, 1);

        let w = ode.jacobian(0.0, &x, &x, 10.0, 1.0).unwrap();

        assert_relative_eq!(w[(0, 0)], 21.0);
    }

    #[test]
    fn defaults_to_single_nonlinear_direction() {
        let ode = ForwardOde::new(Arc::new(Relaxation { p: 1.0 }));

        assert_eq!(ode.dim(), 1);
        assert_eq!(ode.directions(), 1);
        assert!(!ode.is_linear());
        assert!(!ode.mass_matrix_is_identity());
        assert!(ode.with_identity_mass(true).mass_matrix_is_identity());
    }
}
