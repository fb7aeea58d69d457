use thiserror::Error;

/// Errors raised by model construction, integration and fitting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeirError {
    /// The two observed series must be aligned day by day.
    #[error("observed series length mismatch: {infected} infected vs {removed} recovered-or-dead")]
    LengthMismatch { infected: usize, removed: usize },

    /// At least one observed day is required to build a residual.
    #[error("observed series are empty")]
    EmptyObservations,

    /// NaN or infinity in an observed series.
    #[error("non-finite observation at day {index}")]
    NonFiniteObservation { index: usize },

    /// The total population must be positive and finite.
    #[error("total population must be positive, got {population}")]
    NonPositivePopulation { population: f64 },

    /// E0 + I0 + R0 may not exceed N, otherwise S0 would be negative.
    #[error("initial E+I+R = {total} exceeds population {population}")]
    InitialExceedsPopulation { total: f64, population: f64 },

    /// The ODE integrator failed to reach the end of the requested grid.
    #[error("ODE integration failed: {0}")]
    Ode(String),

    /// The least-squares backend failed outright.
    #[error("optimizer failed: {0}")]
    Optimizer(String),
}
