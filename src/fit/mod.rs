//! The fit-and-predict surface: a SEIR model bound to an observed series.

use nalgebra::DVector;
use ndarray::Array2;
use tracing::{debug, warn};

use crate::data::ObservedSeries;
use crate::error::SeirError;
use crate::model::{SeirInit, SeirOde, SeirParams, INFECTED, RECOVERED};
use crate::optimize::{Bounds, FitReport, LeastSquaresSolver, LevenbergMarquardt, ResidualFn};
use crate::solver::{solve_grid, OdeOptions, Trajectory};

/// Lower and upper face of the parameter box, per the reference
/// parameterization.
pub const PARAM_LOWER: f64 = 0.0;
pub const PARAM_UPPER: f64 = 10.0;

/// A SEIR model bound to one observed epidemic, ready to be fitted.
///
/// Construction fixes the observed series and the initial compartment
/// sizes; `beta`, `sigma` and `gamma` start from caller-supplied guesses
/// and are searched over `[0, 10]` during fitting. Fitting never mutates
/// the receiver: [`CompartmentalModel::fit_predict`] returns the fitted
/// parameters together with a model snapshot carrying them.
#[derive(Debug, Clone)]
pub struct CompartmentalModel {
    observations: ObservedSeries,
    init: SeirInit,
    params: SeirParams,
    bounds: Bounds,
    ode_options: OdeOptions,
}

/// Builder with the reference defaults: E0=1000, I0=47, R0=0,
/// beta=1.08, sigma=0.2, gamma=0.2.
pub struct CompartmentalModelBuilder {
    infected: Vec<f64>,
    removed: Vec<f64>,
    population: f64,
    exposed: f64,
    init_infected: f64,
    recovered: f64,
    params: SeirParams,
    ode_options: OdeOptions,
}

impl CompartmentalModelBuilder {
    pub fn exposed(mut self, exposed: f64) -> Self {
        self.exposed = exposed;
        self
    }

    pub fn infected(mut self, infected: f64) -> Self {
        self.init_infected = infected;
        self
    }

    pub fn recovered(mut self, recovered: f64) -> Self {
        self.recovered = recovered;
        self
    }

    pub fn params(mut self, params: SeirParams) -> Self {
        self.params = params;
        self
    }

    pub fn ode_options(mut self, ode_options: OdeOptions) -> Self {
        self.ode_options = ode_options;
        self
    }

    pub fn build(self) -> Result<CompartmentalModel, SeirError> {
        let observations = ObservedSeries::new(self.infected, self.removed)?;
        let init = SeirInit::with_pools(
            self.population,
            self.exposed,
            self.init_infected,
            self.recovered,
        )?;
        Ok(CompartmentalModel {
            observations,
            init,
            params: self.params,
            bounds: Bounds::uniform(3, PARAM_LOWER, PARAM_UPPER),
            ode_options: self.ode_options,
        })
    }
}

/// Result of a fit: the recovered parameters, the reconstructed best-fit
/// observation matrix, the solver report and a model snapshot that carries
/// the fitted parameters.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub params: SeirParams,
    /// `(T, 2)` matrix aligned with the observation grid; column 0 is
    /// infected, column 1 is recovered-or-dead.
    pub prediction: Array2<f64>,
    pub report: FitReport,
    pub model: CompartmentalModel,
}

impl CompartmentalModel {
    /// Start building a model from the two observed series and the total
    /// population.
    pub fn builder(
        infected: Vec<f64>,
        removed: Vec<f64>,
        population: f64,
    ) -> CompartmentalModelBuilder {
        CompartmentalModelBuilder {
            infected,
            removed,
            population,
            exposed: 1000.0,
            init_infected: 47.0,
            recovered: 0.0,
            params: SeirParams::default(),
            ode_options: OdeOptions::default(),
        }
    }

    pub fn observations(&self) -> &ObservedSeries {
        &self.observations
    }

    pub fn init(&self) -> SeirInit {
        self.init
    }

    pub fn params(&self) -> SeirParams {
        self.params
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Integrate the SEIR system with `params` over the observation grid.
    /// Returns the `(T, 4)` compartment trajectory `[S, E, I, R]`.
    pub fn simulate(&self, params: SeirParams) -> Result<Trajectory, SeirError> {
        let sys = SeirOde::new(params);
        solve_grid(
            &sys,
            &self.init.state(),
            &self.observations.days(),
            &self.ode_options,
        )
    }

    /// Model-minus-observed residual, flattened time-major: for each day,
    /// the infected residual then the recovered-or-dead residual, `2T`
    /// entries in total. The same order is used when the prediction matrix
    /// is reconstructed.
    pub fn residuals(&self, params: SeirParams) -> Result<DVector<f64>, SeirError> {
        let trajectory = self.simulate(params)?;
        let states = trajectory.states();
        let t = self.observations.len();
        let mut r = DVector::zeros(2 * t);
        for day in 0..t {
            r[2 * day] = states[[day, INFECTED]] - self.observations.infected()[day];
            r[2 * day + 1] = states[[day, RECOVERED]] - self.observations.removed()[day];
        }
        Ok(r)
    }

    /// Fit with the default Levenberg–Marquardt solver.
    pub fn fit_predict(&self) -> Result<FitOutcome, SeirError> {
        self.fit_predict_with(&LevenbergMarquardt::default())
    }

    /// Fit `beta`, `sigma` and `gamma` to the observed series with the
    /// given solver, starting from the model's current parameter values.
    ///
    /// The returned prediction is the observed matrix plus the final
    /// residual, reshaped to `(T, 2)` — the model's reconstructed best-fit
    /// trajectory for the two observed channels.
    pub fn fit_predict_with(
        &self,
        solver: &dyn LeastSquaresSolver,
    ) -> Result<FitOutcome, SeirError> {
        let start = DVector::from_vec(self.params.to_vec());
        let report = solver.minimize(self, &start, &self.bounds)?;
        let params = SeirParams::from_slice(report.params.as_slice());
        debug!(
            beta = params.beta,
            sigma = params.sigma,
            gamma = params.gamma,
            cost = report.cost,
            iterations = report.iterations,
            "fit finished"
        );

        if !report.converged() {
            warn!(
                iterations = report.iterations,
                "fit stopped at the iteration cap without converging"
            );
        }
        let pinned = self.bounds.active(&report.params, 1e-9);
        if !pinned.is_empty() {
            let names: Vec<&str> = pinned.iter().map(|&i| SeirParams::names()[i]).collect();
            warn!(?names, "fitted parameters pinned at the bounds");
        }

        let t = self.observations.len();
        let mut prediction = self.observations.as_matrix();
        for day in 0..t {
            prediction[[day, 0]] += report.residuals[2 * day];
            prediction[[day, 1]] += report.residuals[2 * day + 1];
        }

        let mut model = self.clone();
        model.params = params;

        Ok(FitOutcome {
            params,
            prediction,
            report,
            model,
        })
    }
}

impl ResidualFn for CompartmentalModel {
    fn nparams(&self) -> usize {
        3
    }

    fn nresiduals(&self) -> usize {
        2 * self.observations.len()
    }

    fn residuals(&self, params: &DVector<f64>) -> Result<DVector<f64>, SeirError> {
        CompartmentalModel::residuals(self, SeirParams::from_slice(params.as_slice()))
    }
}
