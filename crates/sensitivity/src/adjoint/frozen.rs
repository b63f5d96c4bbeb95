use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use ptc_solvers::transient::pseudo_transient::SolutionState;

/// Operators of the adjoint equation, evaluated once at a frozen forward state.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenOperators {
    pub(crate) jacobian: DMatrix<f64>,
    pub(crate) mass: Option<DMatrix<f64>>,
    pub(crate) response_gradient: DMatrix<f64>,
    pub(crate) dg_dp: DMatrix<f64>,
}

impl FrozenOperators {
    /// Returns `df/dx^*`.
    #[must_use]
    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.jacobian
    }

    /// Returns `df/dx_dot^*`, or `None` when the mass matrix is the identity.
    #[must_use]
    pub fn mass(&self) -> Option<&DMatrix<f64>> {
        self.mass.as_ref()
    }

    /// Returns `dg/dx^*`, the constant forcing of the adjoint equation.
    #[must_use]
    pub fn response_gradient(&self) -> &DMatrix<f64> {
        &self.response_gradient
    }

    /// Returns the explicit parameter dependence `dg/dp` of the response.
    #[must_use]
    pub fn dg_dp(&self) -> &DMatrix<f64> {
        &self.dg_dp
    }
}

/// A forward steady state together with the operators evaluated there.
///
/// The state is shared with the forward solution history it came from.
#[derive(Debug)]
pub(super) struct Frozen {
    pub(super) state: Arc<SolutionState>,
    pub(super) params: Vec<DVector<f64>>,
    pub(super) operators: FrozenOperators,
}
