//! SEIR compartmental dynamics.
//!
//! The state vector is `[S, E, I, R]`. Total population `N = S+E+I+R` is an
//! algebraic invariant of the equations (no birth or death terms), so the
//! four derivatives always sum to zero.

use serde::{Deserialize, Serialize};

use crate::error::SeirError;
use crate::solver::OdeSystem;

/// Index of each compartment in the state vector.
pub const SUSCEPTIBLE: usize = 0;
pub const EXPOSED: usize = 1;
pub const INFECTED: usize = 2;
pub const RECOVERED: usize = 3;

/// The three transmission-rate parameters of the SEIR model.
///
/// - `beta`: transmission rate (new exposures per contact)
/// - `sigma`: rate at which exposed individuals become infected
/// - `gamma`: rate at which infected individuals recover or die
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeirParams {
    pub beta: f64,
    pub sigma: f64,
    pub gamma: f64,
}

impl Default for SeirParams {
    fn default() -> Self {
        Self {
            beta: 1.08,
            sigma: 0.2,
            gamma: 0.2,
        }
    }
}

impl SeirParams {
    pub fn new(beta: f64, sigma: f64, gamma: f64) -> Self {
        Self { beta, sigma, gamma }
    }

    pub fn to_vec(self) -> Vec<f64> {
        vec![self.beta, self.sigma, self.gamma]
    }

    /// Parameter order is `[beta, sigma, gamma]`, matching [`Self::to_vec`].
    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            beta: values[0],
            sigma: values[1],
            gamma: values[2],
        }
    }

    pub fn names() -> &'static [&'static str] {
        &["beta", "sigma", "gamma"]
    }
}

/// Initial compartment sizes and the total population.
///
/// The initial susceptible pool is derived, `S0 = N - (E0 + I0 + R0)`,
/// and must be non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeirInit {
    pub exposed: f64,
    pub infected: f64,
    pub recovered: f64,
    pub population: f64,
}

impl SeirInit {
    /// Default initial pools from the reference parameterization:
    /// E0 = 1000, I0 = 47, R0 = 0.
    pub fn new(population: f64) -> Result<Self, SeirError> {
        Self::with_pools(population, 1000.0, 47.0, 0.0)
    }

    pub fn with_pools(
        population: f64,
        exposed: f64,
        infected: f64,
        recovered: f64,
    ) -> Result<Self, SeirError> {
        if !population.is_finite() || population <= 0.0 {
            return Err(SeirError::NonPositivePopulation { population });
        }
        let total = exposed + infected + recovered;
        if total > population {
            return Err(SeirError::InitialExceedsPopulation { total, population });
        }
        Ok(Self {
            exposed,
            infected,
            recovered,
            population,
        })
    }

    pub fn susceptible(&self) -> f64 {
        self.population - (self.exposed + self.infected + self.recovered)
    }

    /// Initial state vector `[S0, E0, I0, R0]`.
    pub fn state(&self) -> [f64; 4] {
        [
            self.susceptible(),
            self.exposed,
            self.infected,
            self.recovered,
        ]
    }
}

/// The SEIR right-hand side for a fixed parameter triple.
///
/// A pure function of `(t, state)`; the integrator may evaluate it at
/// arbitrary interior times and in any order.
#[derive(Debug, Clone, Copy)]
pub struct SeirOde {
    params: SeirParams,
}

impl SeirOde {
    pub fn new(params: SeirParams) -> Self {
        Self { params }
    }
}

impl OdeSystem for SeirOde {
    fn ndim(&self) -> usize {
        4
    }

    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        let SeirParams { beta, sigma, gamma } = self.params;
        let (s, e, i) = (y[SUSCEPTIBLE], y[EXPOSED], y[INFECTED]);
        // N is recomputed from the current state rather than stored, so the
        // derivative stays consistent even if the state drifts.
        let n = y.iter().sum::<f64>();
        let exposure = beta * s * i / n;
        dydt[SUSCEPTIBLE] = -exposure;
        dydt[EXPOSED] = exposure - sigma * e;
        dydt[INFECTED] = sigma * e - gamma * i;
        dydt[RECOVERED] = gamma * i;
    }
}
