//! Bounded nonlinear least squares.
//!
//! The model hands a residual function to a [`LeastSquaresSolver`]; which
//! algorithm minimizes the sum of squared residuals is an injected strategy.
//! [`LevenbergMarquardt`] is the default; [`NelderMead`] is a derivative-free
//! alternative built on `argmin`.

pub mod lm;
pub mod nelder_mead;

pub use lm::LevenbergMarquardt;
pub use nelder_mead::NelderMead;

use nalgebra::DVector;

use crate::error::SeirError;

/// A residual vector as a function of the parameters.
///
/// The solver treats the output as opaque: it only ever minimizes the sum
/// of squares of the entries.
pub trait ResidualFn {
    /// Number of parameters.
    fn nparams(&self) -> usize;

    /// Number of residual entries.
    fn nresiduals(&self) -> usize;

    /// Evaluate the residual at `params`.
    fn residuals(&self, params: &DVector<f64>) -> Result<DVector<f64>, SeirError>;
}

/// Closed box constraints, one interval per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl Bounds {
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Result<Self, SeirError> {
        if lower.len() != upper.len() {
            return Err(SeirError::Optimizer(format!(
                "bound dimension mismatch: {} vs {}",
                lower.len(),
                upper.len()
            )));
        }
        if lower.iter().zip(upper.iter()).any(|(l, u)| l > u) {
            return Err(SeirError::Optimizer("lower bound exceeds upper bound".into()));
        }
        Ok(Self { lower, upper })
    }

    /// The same `[lower, upper]` interval for every parameter.
    pub fn uniform(n: usize, lower: f64, upper: f64) -> Self {
        Self {
            lower: DVector::from_element(n, lower),
            upper: DVector::from_element(n, upper),
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    /// Project a point onto the box, coordinate by coordinate.
    pub fn project(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(x.len(), |i, _| x[i].clamp(self.lower[i], self.upper[i]))
    }

    /// Indices of coordinates sitting on either face of the box.
    pub fn active(&self, x: &DVector<f64>, tol: f64) -> Vec<usize> {
        (0..x.len())
            .filter(|&i| (x[i] - self.lower[i]).abs() <= tol || (self.upper[i] - x[i]).abs() <= tol)
            .collect()
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Parameter step fell below `xtol`.
    SmallStep,
    /// Relative cost reduction fell below `ftol`.
    SmallCostReduction,
    /// Gradient infinity norm fell below `gtol`.
    SmallGradient,
    /// Iteration cap hit before any convergence criterion.
    MaxIterationsReached,
}

impl TerminationReason {
    pub fn converged(self) -> bool {
        !matches!(self, TerminationReason::MaxIterationsReached)
    }
}

/// Outcome of a least-squares minimization.
#[derive(Debug, Clone)]
pub struct FitReport {
    /// Best parameters found, inside the bounds.
    pub params: DVector<f64>,
    /// Residual vector at `params`.
    pub residuals: DVector<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    /// Iterations actually performed.
    pub iterations: usize,
    pub termination: TerminationReason,
}

impl FitReport {
    pub fn converged(&self) -> bool {
        self.termination.converged()
    }
}

/// Strategy interface over bounded nonlinear least-squares backends.
pub trait LeastSquaresSolver {
    /// Minimize the sum of squared residuals of `problem` over the box
    /// `bounds`, starting from `start` (projected into the box first).
    fn minimize(
        &self,
        problem: &dyn ResidualFn,
        start: &DVector<f64>,
        bounds: &Bounds,
    ) -> Result<FitReport, SeirError>;
}

pub(crate) fn sum_of_squares(r: &DVector<f64>) -> f64 {
    r.iter().map(|v| v * v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_clamps_each_coordinate() {
        let bounds = Bounds::uniform(3, 0.0, 10.0);
        let x = DVector::from_vec(vec![-1.0, 5.0, 12.0]);
        let p = bounds.project(&x);
        assert_eq!(p.as_slice(), &[0.0, 5.0, 10.0]);
        assert_eq!(bounds.active(&p, 1e-12), vec![0, 2]);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = Bounds::new(
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![0.0]),
        );
        assert!(err.is_err());
    }
}
