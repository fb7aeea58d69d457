//! Adaptive ODE integration.
//!
//! A Dormand–Prince 4(5) explicit pair with step-size control, suitable for
//! the non-stiff compartmental systems this crate fits. The integrator is
//! decoupled from the dynamics through the [`OdeSystem`] trait so a
//! different stepper can be substituted without touching the model.

use ndarray::Array2;

use crate::error::SeirError;

/// Right-hand side of an ODE system `dy/dt = f(t, y)`.
pub trait OdeSystem {
    /// Number of state variables.
    fn ndim(&self) -> usize;

    /// Evaluate `f(t, y)` and write the result into `dydt`.
    ///
    /// Both slices have length `ndim()`. Must be a pure function of
    /// `(t, y)`: the stepper evaluates it at interior trial points, out of
    /// order, and discards rejected evaluations.
    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]);
}

/// Configuration for the adaptive stepper.
#[derive(Debug, Clone)]
pub struct OdeOptions {
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Initial step size. `0.0` selects one automatically from the span.
    pub h0: f64,
    /// Minimum step size.
    pub h_min: f64,
    /// Maximum step size.
    pub h_max: f64,
    /// Maximum number of attempted steps per integration segment.
    pub max_steps: usize,
}

impl Default for OdeOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-8,
            h0: 0.0,
            h_min: 1e-14,
            h_max: f64::INFINITY,
            max_steps: 100_000,
        }
    }
}

impl OdeOptions {
    fn validate(&self) -> Result<(), SeirError> {
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(SeirError::Ode("rtol must be finite and > 0".into()));
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            return Err(SeirError::Ode("atol must be finite and > 0".into()));
        }
        if self.max_steps == 0 {
            return Err(SeirError::Ode("max_steps must be > 0".into()));
        }
        Ok(())
    }

    fn initial_step(&self, span: f64) -> f64 {
        if self.h0 > 0.0 {
            self.h0.min(span)
        } else {
            (span * 1e-3).max(self.h_min).min(self.h_max).min(span)
        }
    }
}

/// States evaluated on a caller-requested time grid.
#[derive(Debug, Clone)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Array2<f64>,
}

impl Trajectory {
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// `(T, ndim)` state matrix, one row per requested time point.
    pub fn states(&self) -> &Array2<f64> {
        &self.states
    }

    /// One state column across the whole grid.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.states.column(index).to_vec()
    }
}

// Dormand–Prince coefficients.
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights; the solution advances on these (local extrapolation).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Embedded 4th-order weights, for the error estimate.
const BE1: f64 = 5179.0 / 57600.0;
const BE3: f64 = 7571.0 / 16695.0;
const BE4: f64 = 393.0 / 640.0;
const BE5: f64 = -92097.0 / 339200.0;
const BE6: f64 = 187.0 / 2100.0;
const BE7: f64 = 1.0 / 40.0;

// Error = y5 - y4.
const E1: f64 = B1 - BE1;
const E3: f64 = B3 - BE3;
const E4: f64 = B4 - BE4;
const E5: f64 = B5 - BE5;
const E6: f64 = B6 - BE6;
const E7: f64 = -BE7;

struct Stepper<'a, S: OdeSystem> {
    sys: &'a S,
    opts: &'a OdeOptions,
    n: usize,
    k: [Vec<f64>; 7],
    y_tmp: Vec<f64>,
    y_new: Vec<f64>,
    fsal_valid: bool,
}

impl<'a, S: OdeSystem> Stepper<'a, S> {
    fn new(sys: &'a S, opts: &'a OdeOptions) -> Self {
        let n = sys.ndim();
        Self {
            sys,
            opts,
            n,
            k: std::array::from_fn(|_| vec![0.0; n]),
            y_tmp: vec![0.0; n],
            y_new: vec![0.0; n],
            fsal_valid: false,
        }
    }

    /// Advance `y` from `t` to exactly `t1`, mutating `y`, `t` and the
    /// proposed step `h` in place.
    fn advance(&mut self, t: &mut f64, y: &mut [f64], h: &mut f64, t1: f64) -> Result<(), SeirError> {
        let n = self.n;
        if !self.fsal_valid {
            let mut k1 = std::mem::take(&mut self.k[0]);
            self.sys.rhs(*t, y, &mut k1);
            self.k[0] = k1;
            self.fsal_valid = true;
        }

        for _ in 0..self.opts.max_steps {
            if *t >= t1 {
                return Ok(());
            }
            let step = h.min(t1 - *t).max(self.opts.h_min).min(self.opts.h_max);
            if !step.is_finite() || step <= 0.0 {
                return Err(SeirError::Ode(format!(
                    "step size underflow at t={t:.6e}"
                )));
            }

            self.stages(*t, y, step);

            let mut err_norm = 0.0;
            for i in 0..n {
                let ei = step
                    * (E1 * self.k[0][i]
                        + E3 * self.k[2][i]
                        + E4 * self.k[3][i]
                        + E5 * self.k[4][i]
                        + E6 * self.k[5][i]
                        + E7 * self.k[6][i]);
                let sc = self.opts.atol + self.opts.rtol * y[i].abs().max(self.y_new[i].abs());
                err_norm += (ei / sc) * (ei / sc);
            }
            err_norm = (err_norm / n as f64).sqrt();

            if err_norm <= 1.0 {
                *t += step;
                y.copy_from_slice(&self.y_new);
                self.k.swap(0, 6); // FSAL: last stage seeds the next step
            }

            let factor = if err_norm == 0.0 {
                5.0
            } else {
                (0.9 * err_norm.powf(-0.2)).clamp(0.2, 5.0)
            };
            *h = (step * factor).max(self.opts.h_min).min(self.opts.h_max);
        }

        if *t >= t1 - self.opts.h_min {
            Ok(())
        } else {
            Err(SeirError::Ode(format!(
                "exceeded max_steps={} at t={:.6e} before reaching {:.6e}",
                self.opts.max_steps, t, t1
            )))
        }
    }

    fn stages(&mut self, t: f64, y: &[f64], h: f64) {
        let n = self.n;
        for i in 0..n {
            self.y_tmp[i] = y[i] + h * A21 * self.k[0][i];
        }
        let mut k2 = std::mem::take(&mut self.k[1]);
        self.sys.rhs(t + h / 5.0, &self.y_tmp, &mut k2);
        self.k[1] = k2;

        for i in 0..n {
            self.y_tmp[i] = y[i] + h * (A31 * self.k[0][i] + A32 * self.k[1][i]);
        }
        let mut k3 = std::mem::take(&mut self.k[2]);
        self.sys.rhs(t + 3.0 * h / 10.0, &self.y_tmp, &mut k3);
        self.k[2] = k3;

        for i in 0..n {
            self.y_tmp[i] =
                y[i] + h * (A41 * self.k[0][i] + A42 * self.k[1][i] + A43 * self.k[2][i]);
        }
        let mut k4 = std::mem::take(&mut self.k[3]);
        self.sys.rhs(t + 4.0 * h / 5.0, &self.y_tmp, &mut k4);
        self.k[3] = k4;

        for i in 0..n {
            self.y_tmp[i] = y[i]
                + h * (A51 * self.k[0][i]
                    + A52 * self.k[1][i]
                    + A53 * self.k[2][i]
                    + A54 * self.k[3][i]);
        }
        let mut k5 = std::mem::take(&mut self.k[4]);
        self.sys.rhs(t + 8.0 * h / 9.0, &self.y_tmp, &mut k5);
        self.k[4] = k5;

        for i in 0..n {
            self.y_tmp[i] = y[i]
                + h * (A61 * self.k[0][i]
                    + A62 * self.k[1][i]
                    + A63 * self.k[2][i]
                    + A64 * self.k[3][i]
                    + A65 * self.k[4][i]);
        }
        let mut k6 = std::mem::take(&mut self.k[5]);
        self.sys.rhs(t + h, &self.y_tmp, &mut k6);
        self.k[5] = k6;

        for i in 0..n {
            self.y_new[i] = y[i]
                + h * (B1 * self.k[0][i]
                    + B3 * self.k[2][i]
                    + B4 * self.k[3][i]
                    + B5 * self.k[4][i]
                    + B6 * self.k[5][i]);
        }
        let mut k7 = std::mem::take(&mut self.k[6]);
        self.sys.rhs(t + h, &self.y_new, &mut k7);
        self.k[6] = k7;
    }
}

/// Solve the initial-value problem and report the state at every requested
/// time point.
///
/// `times` must be finite and non-decreasing, starting at the initial time.
/// Each grid point is an exact integration endpoint rather than an
/// interpolant, so the state reported at `times[0]` equals `y0` exactly.
pub fn solve_grid<S: OdeSystem>(
    sys: &S,
    y0: &[f64],
    times: &[f64],
    opts: &OdeOptions,
) -> Result<Trajectory, SeirError> {
    opts.validate()?;
    let n = sys.ndim();
    if y0.len() != n {
        return Err(SeirError::Ode(format!(
            "y0 has {} entries but the system has {} states",
            y0.len(),
            n
        )));
    }
    if times.is_empty() {
        return Err(SeirError::Ode("empty time grid".into()));
    }
    for w in times.windows(2) {
        if !w[0].is_finite() || !w[1].is_finite() || w[1] < w[0] {
            return Err(SeirError::Ode("time grid must be finite and non-decreasing".into()));
        }
    }

    let mut states = Array2::zeros((times.len(), n));
    let mut y = y0.to_vec();
    let mut t = times[0];
    let span = (times[times.len() - 1] - times[0]).max(1.0);
    let mut h = opts.initial_step(span);
    let mut stepper = Stepper::new(sys, opts);

    for (row, &tq) in times.iter().enumerate() {
        if tq > t {
            stepper.advance(&mut t, &mut y, &mut h, tq)?;
        }
        for (col, &v) in y.iter().enumerate() {
            states[[row, col]] = v;
        }
    }

    Ok(Trajectory {
        times: times.to_vec(),
        states,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// dy/dt = -k*y with the analytic solution y0 * exp(-k*t).
    struct ExpDecay {
        k: f64,
    }

    impl OdeSystem for ExpDecay {
        fn ndim(&self) -> usize {
            1
        }
        fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
            dydt[0] = -self.k * y[0];
        }
    }

    /// Harmonic oscillator, y'' = -y.
    struct Oscillator;

    impl OdeSystem for Oscillator {
        fn ndim(&self) -> usize {
            2
        }
        fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
            dydt[0] = y[1];
            dydt[1] = -y[0];
        }
    }

    #[test]
    fn exp_decay_matches_analytic_solution() {
        let sys = ExpDecay { k: 1.3 };
        let times = [0.0, 0.5, 1.0, 2.0, 5.0];
        let sol = solve_grid(&sys, &[2.0], &times, &OdeOptions::default()).unwrap();
        for (row, &t) in times.iter().enumerate() {
            let expected = 2.0 * (-1.3 * t).exp();
            assert_abs_diff_eq!(sol.states()[[row, 0]], expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn first_grid_point_is_exact() {
        let sys = ExpDecay { k: 0.7 };
        let sol = solve_grid(&sys, &[3.5], &[0.0, 1.0], &OdeOptions::default()).unwrap();
        assert_eq!(sol.states()[[0, 0]], 3.5);
    }

    #[test]
    fn oscillator_holds_energy_over_long_span() {
        let sys = Oscillator;
        let times: Vec<f64> = (0..=50).map(|d| d as f64).collect();
        let sol = solve_grid(&sys, &[1.0, 0.0], &times, &OdeOptions::default()).unwrap();
        for row in 0..times.len() {
            let energy = sol.states()[[row, 0]].powi(2) + sol.states()[[row, 1]].powi(2);
            assert_abs_diff_eq!(energy, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let sys = ExpDecay { k: 1.0 };
        let err = solve_grid(&sys, &[1.0, 2.0], &[0.0, 1.0], &OdeOptions::default());
        assert!(err.is_err());
    }

    #[test]
    fn rejects_decreasing_grid() {
        let sys = ExpDecay { k: 1.0 };
        let err = solve_grid(&sys, &[1.0], &[1.0, 0.0], &OdeOptions::default());
        assert!(err.is_err());
    }

    #[test]
    fn repeated_grid_times_reuse_the_state() {
        let sys = ExpDecay { k: 1.0 };
        let sol = solve_grid(&sys, &[1.0], &[0.0, 1.0, 1.0], &OdeOptions::default()).unwrap();
        assert_eq!(sol.states()[[1, 0]], sol.states()[[2, 0]]);
    }
}
