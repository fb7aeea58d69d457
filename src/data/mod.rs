//! Observed epidemic time series.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::SeirError;

/// Paired daily observations: infected counts and cumulative
/// recovered-or-dead counts, aligned on an integer day grid `0..T-1`.
///
/// Both series must have the same, non-zero length and contain only
/// finite values. This is checked once, at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedSeries {
    infected: Vec<f64>,
    removed: Vec<f64>,
}

impl ObservedSeries {
    pub fn new(infected: Vec<f64>, removed: Vec<f64>) -> Result<Self, SeirError> {
        if infected.len() != removed.len() {
            return Err(SeirError::LengthMismatch {
                infected: infected.len(),
                removed: removed.len(),
            });
        }
        if infected.is_empty() {
            return Err(SeirError::EmptyObservations);
        }
        for (index, (i, r)) in infected.iter().zip(removed.iter()).enumerate() {
            if !i.is_finite() || !r.is_finite() {
                return Err(SeirError::NonFiniteObservation { index });
            }
        }
        Ok(Self { infected, removed })
    }

    /// Number of observed days, `T`.
    pub fn len(&self) -> usize {
        self.infected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infected.is_empty()
    }

    pub fn infected(&self) -> &[f64] {
        &self.infected
    }

    pub fn removed(&self) -> &[f64] {
        &self.removed
    }

    /// The observation grid `[0.0, 1.0, ..., T-1]`, unit day step.
    pub fn days(&self) -> Vec<f64> {
        (0..self.len()).map(|d| d as f64).collect()
    }

    /// The `(T, 2)` observation matrix; column 0 is infected,
    /// column 1 is recovered-or-dead.
    pub fn as_matrix(&self) -> Array2<f64> {
        let mut m = Array2::zeros((self.len(), 2));
        for (day, (i, r)) in self.infected.iter().zip(self.removed.iter()).enumerate() {
            m[[day, 0]] = *i;
            m[[day, 1]] = *r;
        }
        m
    }
}
