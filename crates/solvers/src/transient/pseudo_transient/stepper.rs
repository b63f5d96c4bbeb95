use std::fmt;

use nalgebra::{DMatrix, Dyn, LU};
use ptc_core::{ImplicitOde, MultiVector};

use super::{NewtonConfig, SolutionState, StepperKind};

/// Advances an [`ImplicitOde`] by a single time step.
///
/// For linear problems the backward Euler iteration matrix is factored once
/// and reused while the step size is unchanged. The cached factorization
/// belongs to one problem state; [`reset`](Self::reset) discards it.
#[derive(Debug, Clone)]
pub struct Stepper {
    kind: StepperKind,
    newton: NewtonConfig,
    cache: Option<Factorization>,
}

#[derive(Debug, Clone)]
struct Factorization {
    dt: f64,
    lu: LU<f64, Dyn, Dyn>,
}

/// A successful step.
#[derive(Debug, Clone)]
pub(crate) struct Step {
    pub(crate) x: MultiVector,
    pub(crate) x_dot: MultiVector,
    pub(crate) newton_iters: usize,
}

/// Why a step attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFailure {
    /// The iteration or mass matrix could not be factored.
    SingularMatrix,

    /// Newton's method did not converge within the iteration limit.
    NewtonDiverged,

    /// The step produced NaN or infinite values.
    NonFinite,

    /// An explicit step increased the rate of change under adaptive control.
    RateGrowth,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::SingularMatrix => "singular matrix",
            Self::NewtonDiverged => "newton iteration did not converge",
            Self::NonFinite => "non-finite state",
            Self::RateGrowth => "rate of change grew",
        };
        f.write_str(reason)
    }
}

pub(crate) enum StepError<E> {
    Problem(E),
    Failure(StepFailure),
}

impl<E> From<StepFailure> for StepError<E> {
    fn from(failure: StepFailure) -> Self {
        Self::Failure(failure)
    }
}

impl Stepper {
    /// Creates a stepper of the given kind.
    #[must_use]
    pub fn new(kind: StepperKind, newton: NewtonConfig) -> Self {
        Self {
            kind,
            newton,
            cache: None,
        }
    }

    /// Returns the stepping scheme.
    #[must_use]
    pub fn kind(&self) -> StepperKind {
        self.kind
    }

    /// Returns the Newton settings used by implicit schemes.
    #[must_use]
    pub fn newton(&self) -> &NewtonConfig {
        &self.newton
    }

    /// Discards any cached factorization.
    pub fn reset(&mut self) {
        self.cache = None;
    }

    pub(crate) fn take_step<P: ImplicitOde>(
        &mut self,
        problem: &P,
        current: &SolutionState,
        dt: f64,
    ) -> Result<Step, StepError<P::Error>> {
        let step = match self.kind {
            StepperKind::BackwardEuler if problem.is_linear() => {
                self.backward_euler_linear(problem, current, dt)?
            }
            StepperKind::BackwardEuler => self.backward_euler(problem, current, dt)?,
            StepperKind::ForwardEuler => forward_euler(problem, current, dt)?,
        };

        if step.x.iter().chain(step.x_dot.iter()).all(|v| v.is_finite()) {
            Ok(step)
        } else {
            Err(StepFailure::NonFinite.into())
        }
    }

    /// Solves `F((X - X_n) / dt, X, t + dt) = 0` with one exact Newton update.
    fn backward_euler_linear<P: ImplicitOde>(
        &mut self,
        problem: &P,
        current: &SolutionState,
        dt: f64,
    ) -> Result<Step, StepError<P::Error>> {
        let t = current.time + dt;
        let x_dot = MultiVector::zeros(current.x.nrows(), current.x.ncols());

        let lu = match self.cache.take() {
            Some(cached) if cached.dt == dt => cached.lu,
            _ => problem
                .jacobian(t, &current.x, &x_dot, 1.0 / dt, 1.0)
                .map_err(StepError::Problem)?
                .lu(),
        };

        let residual = problem
            .residual(t, &current.x, &x_dot)
            .map_err(StepError::Problem)?;
        let update = lu.solve(&(-residual));
        self.cache = Some(Factorization { dt, lu });
        let update = update.ok_or(StepFailure::SingularMatrix)?;

        Ok(Step {
            x_dot: &update / dt,
            x: &current.x + update,
            newton_iters: 1,
        })
    }

    /// Solves `F((X - X_n) / dt, X, t + dt) = 0` with Newton's method.
    fn backward_euler<P: ImplicitOde>(
        &mut self,
        problem: &P,
        current: &SolutionState,
        dt: f64,
    ) -> Result<Step, StepError<P::Error>> {
        self.cache = None;

        let t = current.time + dt;
        let alpha = 1.0 / dt;
        let mut x = current.x.clone();
        let mut x_dot = MultiVector::zeros(x.nrows(), x.ncols());

        for iter in 1..=self.newton.max_iters {
            let residual = problem.residual(t, &x, &x_dot).map_err(StepError::Problem)?;
            let update = problem
                .jacobian(t, &x, &x_dot, alpha, 1.0)
                .map_err(StepError::Problem)?
                .lu()
                .solve(&(-residual))
                .ok_or(StepFailure::SingularMatrix)?;

            x += &update;
            x_dot = (&x - &current.x) * alpha;

            if !update.iter().all(|v| v.is_finite()) {
                return Err(StepFailure::NonFinite.into());
            }
            if update.norm() <= self.newton.abs_tol + self.newton.rel_tol * x.norm() {
                return Ok(Step {
                    x,
                    x_dot,
                    newton_iters: iter,
                });
            }
        }

        Err(StepFailure::NewtonDiverged.into())
    }
}

/// Steps `X_{n+1} = X_n + dt * X_dot_n` with `X_dot = -M^{-1} F(0, X, t)`.
///
/// The returned `x_dot` is the rate at `X_{n+1}`. Accepted states carry the
/// rate at their own state, so only the initial state needs an extra
/// evaluation.
fn forward_euler<P: ImplicitOde>(
    problem: &P,
    current: &SolutionState,
    dt: f64,
) -> Result<Step, StepError<P::Error>> {
    let zero = MultiVector::zeros(current.x.nrows(), current.x.ncols());
    let mass = if problem.mass_matrix_is_identity() {
        None
    } else {
        let mass: DMatrix<f64> = problem
            .jacobian(current.time, &current.x, &zero, 1.0, 0.0)
            .map_err(StepError::Problem)?;
        Some(mass.lu())
    };

    let x_dot_n = if current.index > 0 {
        current.x_dot.clone()
    } else {
        explicit_rate(problem, mass.as_ref(), current.time, &current.x, &zero)?
    };

    let x = &current.x + &x_dot_n * dt;
    let x_dot = explicit_rate(problem, mass.as_ref(), current.time + dt, &x, &zero)?;

    Ok(Step {
        x,
        x_dot,
        newton_iters: 0,
    })
}

/// Evaluates `-M^{-1} F(0, X, t)`, with `mass = None` for an identity mass matrix.
fn explicit_rate<P: ImplicitOde>(
    problem: &P,
    mass: Option<&LU<f64, Dyn, Dyn>>,
    t: f64,
    x: &MultiVector,
    zero: &MultiVector,
) -> Result<MultiVector, StepError<P::Error>> {
    let residual = problem.residual(t, x, zero).map_err(StepError::Problem)?;
    match mass {
        None => Ok(-residual),
        Some(lu) => Ok(lu
            .solve(&(-residual))
            .ok_or(StepFailure::SingularMatrix)?),
    }
}
