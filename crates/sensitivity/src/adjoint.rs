//! The adjoint sensitivity equation at a frozen steady state.
//!
//! [`AdjointSensitivityModel`] presents
//!
//! ```text
//! F(y_dot, y) = df/dx_dot^* * y_dot + df/dx^* * y - dg/dx^* = 0
//! ```
//!
//! as an [`ImplicitOde`] in the reversed time `tau = T - t`, with one column
//! of `y` per component of the selected response function. The operators are
//! evaluated once, when the adjoint model is [frozen](AdjointSensitivityModel::freeze)
//! at a forward steady state, and reused for every adjoint step.

mod error;
mod frozen;


pub use error::{Error, IndexKind};
pub use frozen::FrozenOperators;

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use ptc_core::{AdjointModel, ImplicitOde, MultiVector, Point, ResidualModel, Transposed};
use ptc_solvers::transient::pseudo_transient::SolutionState;

use crate::SensitivityConfig;

use frozen::Frozen;

/// The frozen-state adjoint sensitivity equation of a [`ResidualModel`].
///
/// When an explicit [`AdjointModel`] is supplied, its operators are used as
/// the adjoint operators directly; otherwise the forward model's operators
/// are conjugate transposed.
#[derive(Debug)]
pub struct AdjointSensitivityModel<M, A = Transposed> {
    model: Arc<M>,
    adjoint_model: Option<Arc<A>>,
    parameter_index: usize,
    response_index: usize,
    mass_matrix_is_identity: bool,
    frozen: Option<Frozen>,
}

impl<M: ResidualModel> AdjointSensitivityModel<M, Transposed> {
    /// Creates an adjoint model that transposes the forward operators.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn transposed(model: Arc<M>, config: &SensitivityConfig) -> Result<Self, Error> {
        Self::new(model, None, config)
    }
}

impl<M: ResidualModel, A: AdjointModel> AdjointSensitivityModel<M, A> {
    /// Creates an adjoint model for the response and parameter block named in
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MassMatrixNotConstant`] if the mass matrix is not
    /// declared constant, or [`Error::IndexOutOfRange`] if the model has no
    /// such parameter block or response.
    pub fn new(
        model: Arc<M>,
        adjoint_model: Option<Arc<A>>,
        config: &SensitivityConfig,
    ) -> Result<Self, Error> {
        if !config.mass_matrix_is_constant {
            return Err(Error::MassMatrixNotConstant);
        }
        check_index(
            IndexKind::Parameter,
            config.sensitivity_parameter_index,
            model.num_parameters(),
        )?;
        check_index(
            IndexKind::Response,
            config.response_function_index,
            model.num_responses(),
        )?;

        Ok(Self {
            model,
            adjoint_model,
            parameter_index: config.sensitivity_parameter_index,
            response_index: config.response_function_index,
            mass_matrix_is_identity: config.mass_matrix_is_identity,
            frozen: None,
        })
    }

    /// Returns the forward model.
    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    /// Returns the explicit adjoint model, if one was supplied.
    pub fn adjoint_model(&self) -> Option<&Arc<A>> {
        self.adjoint_model.as_ref()
    }

    /// Returns the parameter block being differentiated against.
    pub fn parameter_index(&self) -> usize {
        self.parameter_index
    }

    /// Returns the response function being differentiated.
    pub fn response_index(&self) -> usize {
        self.response_index
    }

    /// Returns `true` once operators have been frozen at a forward state.
    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Returns the forward state the operators were frozen at.
    pub fn frozen_state(&self) -> Option<&Arc<SolutionState>> {
        self.frozen.as_ref().map(|frozen| &frozen.state)
    }

    /// Returns the frozen operators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] before [`freeze`](Self::freeze).
    pub fn operators(&self) -> Result<&FrozenOperators, Error> {
        self.frozen
            .as_ref()
            .map(|frozen| &frozen.operators)
            .ok_or(Error::NotReady)
    }

    /// Evaluates and caches the adjoint operators at a forward steady state.
    ///
    /// `state` must be a single-direction state of the forward model and
    /// `params` the parameter blocks it was computed with. Any previously
    /// frozen operators are replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if a model evaluation fails or returns an operator of
    /// the wrong shape. The adjoint model is left unfrozen in that case.
    pub fn freeze(
        &mut self,
        state: Arc<SolutionState>,
        params: Vec<DVector<f64>>,
    ) -> Result<(), Error> {
        self.frozen = None;

        let n = self.model.state_dim();
        check_shape("frozen state", (n, 1), state.x.shape())?;

        let x = state.x.column(0).into_owned();
        let x_dot = state.x_dot.column(0).into_owned();
        let point = Point::new(state.time, &x, &x_dot, &params);

        let jacobian = self.adjoint_operator(&point, 0.0, 1.0)?;
        check_shape("df/dx", (n, n), jacobian.shape())?;

        let mass = if self.mass_matrix_is_identity {
            None
        } else {
            let mass = self.adjoint_operator(&point, 1.0, 0.0)?;
            check_shape("df/dx_dot", (n, n), mass.shape())?;
            Some(mass)
        };

        let gradient = self
            .model
            .response_gradient(self.response_index, self.parameter_index, &point)
            .map_err(Error::model)?;
        let ng = self.model.response_dim(self.response_index);
        let np = self.model.parameter_dim(self.parameter_index);
        check_shape("dg/dx", (ng, n), gradient.dg_dx.shape())?;
        check_shape("dg/dp", (ng, np), gradient.dg_dp.shape())?;

        log::debug!(
            "froze adjoint operators at t={} for response {} and parameter block {}",
            state.time,
            self.response_index,
            self.parameter_index,
        );

        self.frozen = Some(Frozen {
            state,
            params,
            operators: FrozenOperators {
                jacobian,
                mass,
                response_gradient: gradient.dg_dx.adjoint(),
                dg_dp: gradient.dg_dp,
            },
        });
        Ok(())
    }

    /// Discards the frozen operators.
    pub fn thaw(&mut self) {
        self.frozen = None;
    }

    /// Evaluates `df/dx_dot^* * y_dot + df/dx^* * y - dg/dx^*`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] before [`freeze`](Self::freeze), or
    /// [`Error::DimensionMismatch`] if `y` or `y_dot` is misshapen.
    pub fn evaluate_residual(
        &self,
        y: &MultiVector,
        y_dot: &MultiVector,
    ) -> Result<MultiVector, Error> {
        let ops = self.operators()?;
        let shape = ops.response_gradient.shape();
        check_shape("y", shape, y.shape())?;
        check_shape("y_dot", shape, y_dot.shape())?;

        let mut residual = &ops.jacobian * y - &ops.response_gradient;
        match &ops.mass {
            Some(mass) => residual += mass * y_dot,
            None => residual += y_dot,
        }
        Ok(residual)
    }

    /// Evaluates `alpha * df/dx_dot^* + beta * df/dx^*`.
    ///
    /// The adjoint equation is linear in `y`, so this operator does not depend
    /// on the adjoint state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] before [`freeze`](Self::freeze).
    pub fn evaluate_jacobian(&self, alpha: f64, beta: f64) -> Result<DMatrix<f64>, Error> {
        let ops = self.operators()?;
        let mut w = &ops.jacobian * beta;
        match &ops.mass {
            Some(mass) => w += mass * alpha,
            None => {
                for i in 0..w.nrows() {
                    w[(i, i)] += alpha;
                }
            }
        }
        Ok(w)
    }

    /// Combines a steady adjoint solution into `dg/dp - y^* * df/dp`.
    ///
    /// The result has one row per response component and one column per
    /// parameter in the selected block.
    ///
    /// # Errors
    ///
    /// Returns an error before [`freeze`](Self::freeze), if `y` is
    /// misshapen, or if `df/dp` cannot be evaluated.
    pub fn sensitivity(&self, y: &MultiVector) -> Result<DMatrix<f64>, Error> {
        let frozen = self.frozen.as_ref().ok_or(Error::NotReady)?;
        let ops = &frozen.operators;
        check_shape("y", ops.response_gradient.shape(), y.shape())?;

        let x = frozen.state.x.column(0).into_owned();
        let x_dot = frozen.state.x_dot.column(0).into_owned();
        let point = Point::new(frozen.state.time, &x, &x_dot, &frozen.params);

        let df_dp = self
            .model
            .parameter_jacobian(self.parameter_index, &point)
            .map_err(Error::model)?;
        check_shape("df/dp", (x.len(), ops.dg_dp.ncols()), df_dp.shape())?;

        Ok(&ops.dg_dp - y.adjoint() * df_dp)
    }

    /// Evaluates the adjoint of the iteration operator at the frozen point.
    fn adjoint_operator(
        &self,
        point: &Point<'_>,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Error> {
        match &self.adjoint_model {
            Some(adjoint) => adjoint
                .adjoint_jacobian(point, alpha, beta)
                .map_err(Error::adjoint_model),
            None => self
                .model
                .jacobian(point, alpha, beta)
                .map(|w| w.adjoint())
                .map_err(Error::model),
        }
    }
}

fn check_index(kind: IndexKind, index: usize, count: usize) -> Result<(), Error> {
    if index < count {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange { kind, index, count })
    }
}

fn check_shape(
    name: &'static str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            name,
            expected,
            actual,
        })
    }
}

impl<M: ResidualModel, A: AdjointModel> ImplicitOde for AdjointSensitivityModel<M, A> {
    type Error = Error;

    fn dim(&self) -> usize {
        self.model.state_dim()
    }

    fn directions(&self) -> usize {
        self.model.response_dim(self.response_index)
    }

    fn is_linear(&self) -> bool {
        true
    }

    fn mass_matrix_is_identity(&self) -> bool {
        self.mass_matrix_is_identity
    }

    fn residual(
        &self,
        _tau: f64,
        y: &MultiVector,
        y_dot: &MultiVector,
    ) -> Result<MultiVector, Self::Error> {
        self.evaluate_residual(y, y_dot)
    }

    fn jacobian(
        &self,
        _tau: f64,
        _y: &MultiVector,
        _y_dot: &MultiVector,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error> {
        self.evaluate_jacobian(alpha, beta)
    }
}
