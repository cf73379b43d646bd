//! End-to-end divergence curves for the supported mechanisms, checked
//! against closed forms.

use pld_accounting::prelude::*;

fn config(interval: f64) -> PldConfig {
    PldConfig::default().with_discretization_interval(interval)
}

#[test]
fn laplace_delta_at_zero_is_the_total_variation_distance() {
    let pld =
        PrivacyLossDistribution::from_laplace_mechanism(1.0, 1.0, &config(1e-4)).unwrap();
    assert!((pld.total_mass() - 1.0).abs() < 1e-9);
    assert_eq!(pld.infinity_mass(), 0.0);

    // TV(Lap(0, 1), Lap(1, 1)) = 1 - exp(-1/2); the pessimistic estimate
    // sits just above it.
    let exact = 1.0 - (-0.5_f64).exp();
    let delta = pld.get_delta_for_epsilon(0.0);
    assert!(delta >= exact - 1e-9, "delta={delta}");
    assert!(delta <= exact + 2e-4, "delta={delta}");
}

#[test]
fn laplace_is_pure_dp_at_sensitivity_over_parameter() {
    let pld =
        PrivacyLossDistribution::from_laplace_mechanism(1.0, 1.0, &config(1e-4)).unwrap();
    // The privacy loss is bounded by sensitivity / parameter = 1, so the
    // mechanism is (1, 0)-DP and delta vanishes beyond that epsilon.
    let eps = pld.get_epsilon_for_delta(0.0);
    assert!((eps - 1.0).abs() < 1e-3, "eps={eps}");
    assert_eq!(pld.get_delta_for_epsilon(1.001), 0.0);
}

#[test]
fn laplace_delta_follows_the_closed_form_curve() {
    let pld =
        PrivacyLossDistribution::from_laplace_mechanism(1.0, 1.0, &config(1e-4)).unwrap();
    // delta(eps) = 1 - exp((eps - 1) / 2) for 0 <= eps <= 1.
    for &eps in &[0.0f64, 0.2, 0.5, 0.8] {
        let exact = 1.0 - ((eps - 1.0) / 2.0).exp();
        let delta = pld.get_delta_for_epsilon(eps);
        assert!(delta >= exact - 1e-9, "eps={eps}: {delta} vs {exact}");
        assert!(delta <= exact + 2e-4, "eps={eps}: {delta} vs {exact}");
    }
}

#[test]
fn gaussian_delta_at_zero_matches_total_variation() {
    let pld =
        PrivacyLossDistribution::from_gaussian_mechanism(1.0, 1.0, &config(1e-3)).unwrap();
    assert!((pld.total_mass() - 1.0).abs() < 1e-9);

    // TV(N(0, 1), N(1, 1)) = 2 Phi(1/2) - 1.
    let exact = 0.38292492254802624;
    let delta = pld.get_delta_for_epsilon(0.0);
    assert!(delta >= exact - 1e-9, "delta={delta}");
    assert!(delta <= exact + 2e-3, "delta={delta}");
}

#[test]
fn gaussian_never_reaches_zero_delta() {
    let pld =
        PrivacyLossDistribution::from_gaussian_mechanism(1.0, 1.0, &config(1e-3)).unwrap();
    // The pessimistic tail keeps strictly positive infinity mass, so no
    // finite epsilon achieves delta zero.
    assert!(pld.infinity_mass() > 0.0);
    assert_eq!(pld.get_epsilon_for_delta(0.0), f64::INFINITY);
    // Far out on the curve the divergence still decays below the tail cut.
    assert!(pld.get_delta_for_epsilon(20.0) < 1e-20);
}

#[test]
fn gaussian_noise_scale_orders_the_curves() {
    let narrow =
        PrivacyLossDistribution::from_gaussian_mechanism(0.8, 1.0, &config(1e-3)).unwrap();
    let wide =
        PrivacyLossDistribution::from_gaussian_mechanism(2.0, 1.0, &config(1e-3)).unwrap();
    for &eps in &[0.1, 0.5, 1.0] {
        assert!(wide.get_delta_for_epsilon(eps) <= narrow.get_delta_for_epsilon(eps));
    }
}

#[test]
fn discrete_laplace_delta_at_zero_is_tanh() {
    let parameter = 0.3;
    let pld =
        PrivacyLossDistribution::from_discrete_laplace_mechanism(parameter, 1, &config(1e-4))
            .unwrap();
    assert!((pld.total_mass() - 1.0).abs() < 1e-12);
    // For sensitivity 1 the TV distance is tanh(parameter / 2).
    let exact = (parameter / 2.0_f64).tanh();
    let delta = pld.get_delta_for_epsilon(0.0);
    assert!(delta >= exact - 1e-12, "delta={delta}");
    assert!(delta <= exact + 1e-3, "delta={delta}");
}

#[test]
fn discrete_laplace_is_pure_dp() {
    let pld =
        PrivacyLossDistribution::from_discrete_laplace_mechanism(0.3, 1, &config(1e-4)).unwrap();
    let eps = pld.get_epsilon_for_delta(0.0);
    assert!((eps - 0.3).abs() < 1e-3, "eps={eps}");
}

#[test]
fn discrete_gaussian_delta_at_zero_is_the_center_mass() {
    let pld =
        PrivacyLossDistribution::from_discrete_gaussian_mechanism(1.0, 1, Some(4), &config(1e-4))
            .unwrap();
    assert!((pld.total_mass() - 1.0).abs() < 1e-12);
    // Truncated support carries real infinity mass: the outcome -4 is
    // impossible under the shifted distribution.
    assert!(pld.infinity_mass() > 0.0);
    assert_eq!(pld.get_epsilon_for_delta(0.0), f64::INFINITY);

    // For sensitivity 1 the positive-loss outcomes telescope to p(0) plus
    // the infinity mass already counted in p(-4).
    let normalizer: f64 = (-4..=4).map(|k: i64| (-0.5 * (k * k) as f64).exp()).sum();
    let exact = 1.0 / normalizer;
    let delta = pld.get_delta_for_epsilon(0.0);
    assert!(delta >= exact - 1e-12, "delta={delta}");
    assert!(delta <= exact + 1e-3, "delta={delta}");
}

#[test]
fn mechanism_dispatch_matches_direct_factories() {
    let c = config(1e-3);
    let direct =
        PrivacyLossDistribution::from_gaussian_mechanism(1.5, 1.0, &c).unwrap();
    let dispatched = PrivacyLossDistribution::from_mechanism(
        &NoiseMechanism::Gaussian {
            standard_deviation: 1.5,
            sensitivity: 1.0,
        },
        &c,
    )
    .unwrap();
    for &eps in &[0.0, 0.5, 1.5] {
        let a = direct.get_delta_for_epsilon(eps);
        let b = dispatched.get_delta_for_epsilon(eps);
        assert!((a - b).abs() < 1e-15);
    }

    assert!(PrivacyLossDistribution::from_mechanism(
        &NoiseMechanism::RandomizedResponse {
            noise_parameter: 1.2,
            num_buckets: 4,
        },
        &c,
    )
    .is_err());
}

#[test]
fn optimistic_estimates_bound_from_below() {
    let pessimistic =
        PrivacyLossDistribution::from_laplace_mechanism(1.0, 1.0, &config(1e-3)).unwrap();
    let optimistic = PrivacyLossDistribution::from_laplace_mechanism(
        1.0,
        1.0,
        &config(1e-3).with_estimate_type(EstimateType::Optimistic),
    )
    .unwrap();
    let exact = 1.0 - (-0.5_f64).exp();
    let low = optimistic.get_delta_for_epsilon(0.0);
    let high = pessimistic.get_delta_for_epsilon(0.0);
    assert!(low <= exact + 1e-9, "low={low}");
    assert!(high >= exact - 1e-9, "high={high}");
    assert!(low <= high);
}
