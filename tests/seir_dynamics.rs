use approx::assert_abs_diff_eq;
use seirfit::prelude::*;
use seirfit::model::{EXPOSED, INFECTED, RECOVERED, SUSCEPTIBLE};
use seirfit::solver::solve_grid;
use seirfit::SeirOde;

#[test]
fn derivatives_sum_to_zero_across_states_and_parameters() {
    let states = [
        [985.0, 10.0, 5.0, 0.0],
        [1.0, 0.0, 0.0, 0.0],
        [500.0, 300.0, 150.0, 50.0],
        [0.0, 0.0, 10.0, 990.0],
    ];
    let params = [
        SeirParams::new(1.08, 0.2, 0.2),
        SeirParams::new(0.0, 0.5, 0.1),
        SeirParams::new(10.0, 10.0, 10.0),
    ];
    for p in params {
        let sys = SeirOde::new(p);
        for y in states {
            let mut dydt = [0.0; 4];
            sys.rhs(0.0, &y, &mut dydt);
            assert_abs_diff_eq!(dydt.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
        }
    }
}

#[test]
fn exact_scenario_reports_the_initial_state_verbatim() {
    // N=1000, E0=10, I0=5, R0=0, beta=0, sigma=gamma=0.2, grid [0, 1].
    let init = SeirInit::with_pools(1000.0, 10.0, 5.0, 0.0).unwrap();
    let sys = SeirOde::new(SeirParams::new(0.0, 0.2, 0.2));
    let sol = solve_grid(&sys, &init.state(), &[0.0, 1.0], &OdeOptions::default()).unwrap();

    assert_eq!(sol.states()[[0, SUSCEPTIBLE]], 985.0);
    assert_eq!(sol.states()[[0, EXPOSED]], 10.0);
    assert_eq!(sol.states()[[0, INFECTED]], 5.0);
    assert_eq!(sol.states()[[0, RECOVERED]], 0.0);
}

#[test]
fn population_is_conserved_over_the_whole_grid() {
    let init = SeirInit::with_pools(100_000.0, 500.0, 100.0, 0.0).unwrap();
    let sys = SeirOde::new(SeirParams::new(1.2, 0.25, 0.12));
    let times: Vec<f64> = (0..120).map(|d| d as f64).collect();
    let sol = solve_grid(&sys, &init.state(), &times, &OdeOptions::default()).unwrap();

    for row in 0..times.len() {
        let total: f64 = (0..4).map(|c| sol.states()[[row, c]]).sum();
        assert_abs_diff_eq!(total, 100_000.0, epsilon = 1e-4);
    }
}

#[test]
fn zero_transmission_cannot_seed_new_infections() {
    let init = SeirInit::with_pools(10_000.0, 50.0, 20.0, 0.0).unwrap();
    let sys = SeirOde::new(SeirParams::new(0.0, 0.3, 0.2));
    let times: Vec<f64> = (0..200).map(|d| d as f64).collect();
    let sol = solve_grid(&sys, &init.state(), &times, &OdeOptions::default()).unwrap();

    // With beta = 0 the exposed pool only drains.
    for row in 1..times.len() {
        assert!(
            sol.states()[[row, EXPOSED]] <= sol.states()[[row - 1, EXPOSED]] + 1e-9,
            "exposed increased at day {row}"
        );
    }

    // Once the exposed pool is depleted, infected can only decline.
    let mut depleted = None;
    for row in 0..times.len() {
        if sol.states()[[row, EXPOSED]] < 1e-3 {
            depleted = Some(row);
            break;
        }
    }
    let depleted = depleted.expect("exposed pool never drained");
    for row in (depleted + 1)..times.len() {
        assert!(
            sol.states()[[row, INFECTED]] <= sol.states()[[row - 1, INFECTED]] + 1e-9,
            "infected increased at day {row} after the exposed pool drained"
        );
    }
}

#[test]
fn zero_exposed_pool_makes_infected_monotone_from_the_start() {
    let init = SeirInit::with_pools(10_000.0, 0.0, 100.0, 0.0).unwrap();
    let sys = SeirOde::new(SeirParams::new(0.0, 0.3, 0.2));
    let times: Vec<f64> = (0..50).map(|d| d as f64).collect();
    let sol = solve_grid(&sys, &init.state(), &times, &OdeOptions::default()).unwrap();

    for row in 1..times.len() {
        assert!(sol.states()[[row, INFECTED]] <= sol.states()[[row - 1, INFECTED]] + 1e-9);
    }
}
