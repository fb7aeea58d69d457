use approx::assert_abs_diff_eq;
use seirfit::model::{INFECTED, RECOVERED};
use seirfit::prelude::*;

const TRUE_PARAMS: SeirParams = SeirParams {
    beta: 0.9,
    sigma: 0.25,
    gamma: 0.15,
};

/// Build a model whose "observations" are a noiseless synthetic trajectory
/// generated from [`TRUE_PARAMS`]; the model itself starts from the
/// reference default guesses.
fn synthetic_model(days: usize) -> CompartmentalModel {
    let population = 100_000.0;
    let (exposed, infected, recovered) = (200.0, 50.0, 0.0);

    let generator = CompartmentalModel::builder(vec![0.0; days], vec![0.0; days], population)
        .exposed(exposed)
        .infected(infected)
        .recovered(recovered)
        .build()
        .unwrap();
    let trajectory = generator.simulate(TRUE_PARAMS).unwrap();

    CompartmentalModel::builder(
        trajectory.column(INFECTED),
        trajectory.column(RECOVERED),
        population,
    )
    .exposed(exposed)
    .infected(infected)
    .recovered(recovered)
    .build()
    .unwrap()
}

#[test]
fn residual_vector_has_exactly_two_entries_per_day() {
    let model = synthetic_model(30);
    let r = model.residuals(model.params()).unwrap();
    assert_eq!(r.len(), 60);
}

#[test]
fn fit_recovers_known_parameters_from_noiseless_data() {
    let model = synthetic_model(60);
    let outcome = model.fit_predict().unwrap();

    assert!(
        outcome.report.converged(),
        "termination: {:?}",
        outcome.report.termination
    );
    assert_abs_diff_eq!(outcome.params.beta, TRUE_PARAMS.beta, epsilon = 1e-3);
    assert_abs_diff_eq!(outcome.params.sigma, TRUE_PARAMS.sigma, epsilon = 1e-3);
    assert_abs_diff_eq!(outcome.params.gamma, TRUE_PARAMS.gamma, epsilon = 1e-3);
}

#[test]
fn prediction_matrix_matches_the_synthetic_observations() {
    let model = synthetic_model(60);
    let outcome = model.fit_predict().unwrap();
    let observed = model.observations().as_matrix();

    assert_eq!(outcome.prediction.shape(), &[60, 2]);
    for day in 0..60 {
        for channel in 0..2 {
            assert_abs_diff_eq!(
                outcome.prediction[[day, channel]],
                observed[[day, channel]],
                epsilon = 0.5
            );
        }
    }
}

#[test]
fn fit_does_not_mutate_the_receiver() {
    let model = synthetic_model(40);
    let before = model.params();
    let outcome = model.fit_predict().unwrap();

    assert_eq!(model.params(), before);
    assert_eq!(outcome.model.params(), outcome.params);
    assert_ne!(outcome.params, before);
}

#[test]
fn nelder_mead_solver_is_substitutable() {
    let model = synthetic_model(60);
    let start_cost: f64 = model
        .residuals(model.params())
        .unwrap()
        .iter()
        .map(|v| v * v)
        .sum();

    let solver = NelderMead::default();
    let outcome = model.fit_predict_with(&solver).unwrap();

    assert!(outcome.report.cost < start_cost * 1e-3);
    assert_abs_diff_eq!(outcome.params.beta, TRUE_PARAMS.beta, epsilon = 0.05);
    assert_abs_diff_eq!(outcome.params.sigma, TRUE_PARAMS.sigma, epsilon = 0.05);
    assert_abs_diff_eq!(outcome.params.gamma, TRUE_PARAMS.gamma, epsilon = 0.05);
}

#[test]
fn fitted_parameters_stay_inside_the_box() {
    let model = synthetic_model(60);
    let outcome = model.fit_predict().unwrap();
    for v in outcome.params.to_vec() {
        assert!((0.0..=10.0).contains(&v));
    }
}
