//! Fit SEIR compartmental epidemic models to observed case data.
//!
//! The crate is a thin orchestration of two numerical pieces: an adaptive
//! ODE integrator ([`solver`]) and a bounded nonlinear least-squares
//! minimizer ([`optimize`]). A [`CompartmentalModel`] owns the observed
//! infected and recovered-or-dead series plus the initial compartment
//! sizes, and searches `beta`, `sigma` and `gamma` over `[0, 10]` so the
//! integrated trajectory matches the observations.
//!
//! ```no_run
//! use seirfit::prelude::*;
//!
//! let infected = vec![47.0, 58.0, 74.0, 98.0, 130.0];
//! let removed = vec![0.0, 2.0, 5.0, 9.0, 15.0];
//!
//! let model = CompartmentalModel::builder(infected, removed, 1_000_000.0)
//!     .exposed(500.0)
//!     .build()?;
//! let outcome = model.fit_predict()?;
//! println!("beta = {}", outcome.params.beta);
//! # Ok::<(), seirfit::SeirError>(())
//! ```

pub mod data;
pub mod error;
pub mod fit;
pub mod model;
pub mod optimize;
pub mod solver;

pub use data::ObservedSeries;
pub use error::SeirError;
pub use fit::{CompartmentalModel, CompartmentalModelBuilder, FitOutcome};
pub use model::{SeirInit, SeirOde, SeirParams};
pub use optimize::{
    Bounds, FitReport, LeastSquaresSolver, LevenbergMarquardt, NelderMead, ResidualFn,
    TerminationReason,
};
pub use solver::{solve_grid, OdeOptions, OdeSystem, Trajectory};

pub mod prelude {
    pub use crate::data::ObservedSeries;
    pub use crate::error::SeirError;
    pub use crate::fit::{CompartmentalModel, FitOutcome};
    pub use crate::model::{SeirInit, SeirParams};
    pub use crate::optimize::{LeastSquaresSolver, LevenbergMarquardt, NelderMead};
    pub use crate::solver::{OdeOptions, OdeSystem};
}
