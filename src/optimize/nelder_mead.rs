//! Derivative-free alternative solver built on `argmin`'s Nelder–Mead.

use argmin::{
    core::{CostFunction, Error, Executor},
    solver::neldermead::NelderMead as ArgminNelderMead,
};
use nalgebra::DVector;

use crate::error::SeirError;
use crate::optimize::{sum_of_squares, Bounds, FitReport, LeastSquaresSolver, ResidualFn, TerminationReason};

/// Nelder–Mead simplex search over the sum of squared residuals.
///
/// Bounds are enforced by clamping each trial vertex into the box before
/// the residual is evaluated.
#[derive(Debug, Clone)]
pub struct NelderMead {
    /// Iteration cap handed to the argmin executor.
    pub max_iters: u64,
    /// Standard-deviation tolerance on the simplex cost values.
    pub sd_tolerance: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iters: 500,
            sd_tolerance: 1e-12,
        }
    }
}

struct BoundedCost<'a> {
    problem: &'a dyn ResidualFn,
    bounds: &'a Bounds,
}

impl CostFunction for BoundedCost<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, point: &Self::Param) -> Result<Self::Output, Error> {
        let clamped = self.bounds.project(&DVector::from_vec(point.clone()));
        let r = self.problem.residuals(&clamped)?;
        Ok(sum_of_squares(&r))
    }
}

fn initial_simplex(start: &DVector<f64>, bounds: &Bounds) -> Vec<Vec<f64>> {
    let perturbation_percentage = 0.008;
    let mut vertices = Vec::with_capacity(start.len() + 1);
    vertices.push(start.iter().copied().collect::<Vec<f64>>());

    for i in 0..start.len() {
        let perturbation = if start[i] == 0.0 {
            0.00025
        } else {
            perturbation_percentage * start[i]
        };
        let mut vertex = vertices[0].clone();
        vertex[i] += perturbation;
        if vertex[i] > bounds.upper()[i] {
            vertex[i] = vertices[0][i] - perturbation;
        }
        vertices.push(vertex);
    }

    vertices
}

impl LeastSquaresSolver for NelderMead {
    fn minimize(
        &self,
        problem: &dyn ResidualFn,
        start: &DVector<f64>,
        bounds: &Bounds,
    ) -> Result<FitReport, SeirError> {
        let start = bounds.project(start);
        let cost = BoundedCost { problem, bounds };

        let solver: ArgminNelderMead<Vec<f64>, f64> =
            ArgminNelderMead::new(initial_simplex(&start, bounds))
                .with_sd_tolerance(self.sd_tolerance)
                .map_err(|e| SeirError::Optimizer(e.to_string()))?;

        let max_iters = self.max_iters;
        let res = Executor::new(cost, solver)
            .configure(|state| state.max_iters(max_iters))
            .run()
            .map_err(|e| SeirError::Optimizer(e.to_string()))?;

        let iterations = res.state.iter as usize;
        let best = res
            .state
            .best_param
            .ok_or_else(|| SeirError::Optimizer("no best parameter produced".into()))?;

        let params = bounds.project(&DVector::from_vec(best));
        let residuals = problem.residuals(&params)?;
        let cost = sum_of_squares(&residuals);
        let termination = if iterations >= max_iters as usize {
            TerminationReason::MaxIterationsReached
        } else {
            TerminationReason::SmallCostReduction
        };

        Ok(FitReport {
            params,
            residuals,
            cost,
            iterations,
            termination,
        })
    }
}
