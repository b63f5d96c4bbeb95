use nalgebra::DMatrix;

/// A dense block of column vectors, one column per direction.
///
/// A single-direction state is a one-column multivector.
pub type MultiVector = DMatrix<f64>;

/// Defines an implicit ODE `F(X_dot, X, t) = 0` to be integrated.
///
/// The state `X` is a [`MultiVector`] with [`dim`](Self::dim) rows and
/// [`directions`](Self::directions) columns. Every column is an independent
/// direction that shares one iteration matrix, so the Jacobian is a square
/// `dim x dim` operator applied column by column. Problems with more than one
/// direction must therefore be linear in `X`.
///
/// The mass matrix `dF/dX_dot` is assumed constant.
pub trait ImplicitOde {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the number of rows of the state.
    fn dim(&self) -> usize;

    /// Returns the number of columns of the state.
    fn directions(&self) -> usize {
        1
    }

    /// Returns `true` if the residual is affine in `X` and `X_dot` with
    /// coefficients that do not depend on `t`.
    ///
    /// Linear problems let implicit steppers accept a single Newton update
    /// and reuse one factorization of the iteration matrix for every step of
    /// the same size, at any time. Only the forcing term may vary with `t`.
    fn is_linear(&self) -> bool {
        false
    }

    /// Returns `true` if `dF/dX_dot` is the identity.
    fn mass_matrix_is_identity(&self) -> bool {
        false
    }

    /// Evaluates the residual `F(X_dot, X, t)`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the residual cannot be evaluated.
    fn residual(
        &self,
        t: f64,
        x: &MultiVector,
        x_dot: &MultiVector,
    ) -> Result<MultiVector, Self::Error>;

    /// Evaluates the iteration matrix `alpha * dF/dX_dot + beta * dF/dX`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the operator cannot be evaluated.
    fn jacobian(
        &self,
        t: f64,
        x: &MultiVector,
        x_dot: &MultiVector,
        alpha: f64,
        beta: f64,
    ) -> Result<DMatrix<f64>, Self::Error>;
}
