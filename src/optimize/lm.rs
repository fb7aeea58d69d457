//! Damped least squares (Levenberg–Marquardt) with box constraints.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace};

use crate::error::SeirError;
use crate::optimize::{sum_of_squares, Bounds, FitReport, LeastSquaresSolver, ResidualFn, TerminationReason};

// Damping beyond this is numerically indistinguishable from a zero step.
const LAMBDA_MAX: f64 = 1e12;
const LAMBDA_MIN: f64 = 1e-12;

/// Levenberg–Marquardt over the damped normal equations
/// `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr`, with the Jacobian taken by forward
/// finite differences and every trial point projected onto the bounds.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    /// Outer iteration cap.
    pub max_iters: usize,
    /// Relative cost-reduction threshold.
    pub ftol: f64,
    /// Relative step-size threshold.
    pub xtol: f64,
    /// Gradient infinity-norm threshold.
    pub gtol: f64,
    /// Initial damping factor.
    pub lambda_init: f64,
    /// Multiplicative damping adjustment on rejection/acceptance.
    pub lambda_scale: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iters: 200,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            lambda_init: 1e-3,
            lambda_scale: 10.0,
        }
    }
}

impl LevenbergMarquardt {
    /// Forward-difference Jacobian of the residual at `x`, stepping away
    /// from the nearer bound face so trial points stay feasible.
    fn jacobian(
        &self,
        problem: &dyn ResidualFn,
        x: &DVector<f64>,
        r0: &DVector<f64>,
        bounds: &Bounds,
    ) -> Result<DMatrix<f64>, SeirError> {
        let n = x.len();
        let m = r0.len();
        let mut jac = DMatrix::zeros(m, n);
        let base = f64::EPSILON.sqrt();
        for j in 0..n {
            let mut h = base * x[j].abs().max(1.0);
            if x[j] + h > bounds.upper()[j] {
                h = -h;
            }
            let mut xj = x.clone();
            xj[j] += h;
            let rj = problem.residuals(&xj)?;
            for i in 0..m {
                jac[(i, j)] = (rj[i] - r0[i]) / h;
            }
        }
        Ok(jac)
    }
}

impl LeastSquaresSolver for LevenbergMarquardt {
    fn minimize(
        &self,
        problem: &dyn ResidualFn,
        start: &DVector<f64>,
        bounds: &Bounds,
    ) -> Result<FitReport, SeirError> {
        let mut x = bounds.project(start);
        let mut r = problem.residuals(&x)?;
        let mut cost = sum_of_squares(&r);
        let mut lambda = self.lambda_init;

        let mut iterations = 0;
        let mut termination = TerminationReason::MaxIterationsReached;

        'outer: for iter in 1..=self.max_iters {
            iterations = iter;
            let jac = self.jacobian(problem, &x, &r, bounds)?;
            let jtj = jac.transpose() * &jac;
            let grad = jac.transpose() * &r;

            if grad.amax() < self.gtol {
                termination = TerminationReason::SmallGradient;
                break;
            }

            loop {
                let mut damped = jtj.clone();
                for d in 0..damped.nrows() {
                    damped[(d, d)] += lambda * jtj[(d, d)].max(f64::EPSILON);
                }
                let delta = match damped.cholesky() {
                    Some(chol) => chol.solve(&(-&grad)),
                    None => {
                        lambda *= self.lambda_scale;
                        if lambda > LAMBDA_MAX {
                            termination = TerminationReason::SmallCostReduction;
                            break 'outer;
                        }
                        continue;
                    }
                };

                let x_new = bounds.project(&(&x + &delta));
                let r_new = problem.residuals(&x_new)?;
                let cost_new = sum_of_squares(&r_new);
                trace!(iter, lambda, cost_new, "trial step");

                if cost_new < cost {
                    let step = (&x_new - &x).norm();
                    let reduction = cost - cost_new;
                    x = x_new;
                    r = r_new;
                    cost = cost_new;
                    lambda = (lambda / self.lambda_scale).max(LAMBDA_MIN);
                    debug!(iter, cost, lambda, "accepted step");

                    if step < self.xtol * (x.norm() + self.xtol) {
                        termination = TerminationReason::SmallStep;
                        break 'outer;
                    }
                    if reduction <= self.ftol * cost.max(self.ftol) {
                        termination = TerminationReason::SmallCostReduction;
                        break 'outer;
                    }
                    break;
                }

                lambda *= self.lambda_scale;
                if lambda > LAMBDA_MAX {
                    termination = TerminationReason::SmallCostReduction;
                    break 'outer;
                }
            }
        }

        Ok(FitReport {
            params: x,
            residuals: r,
            cost,
            iterations,
            termination,
        })
    }
}
