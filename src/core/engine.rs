use rand::Rng;
use rand_distr::StandardNormal;

use super::aggregate::aggregate;
use super::types::{SimulationParameters, SimulationResult, Trajectory, YearPoint};

#[derive(Clone, Copy)]
struct MarketSample {
    portfolio_return: f64,
    inflation: f64,
}

#[derive(Debug, Clone, Copy)]
struct ProjectedStart {
    corpus: f64,
    monthly_expense: f64,
}

/// Simulates and summarises in one pass, drawing every sample from `rng`.
pub fn run_simulation<R: Rng + ?Sized>(
    params: &SimulationParameters,
    rng: &mut R,
) -> SimulationResult {
    let paths = simulate(params, rng);
    let years = params.year_offsets();
    let summary = aggregate(&paths, &years, params.num_simulations);

    tracing::debug!(
        horizon = years.len(),
        paths = paths.len(),
        years_to_project = params.years_to_project(),
        ruin_probability = summary.ruin_probability,
        "simulation finished"
    );

    SimulationResult {
        paths,
        years,
        percentiles: summary.percentiles,
        ruin_probability: summary.ruin_probability,
    }
}

/// Generates `num_simulations` independent yearly value trajectories.
///
/// Paths come back in generation order, so a seeded `rng` reproduces the
/// same output. An empty horizon yields empty trajectories and draws nothing.
///
/// Only points after year 0 are floored at zero. Year 0 is the projected
/// corpus as-is, so it goes negative if a projection year returns below -100%.
pub fn simulate<R: Rng + ?Sized>(params: &SimulationParameters, rng: &mut R) -> Vec<Trajectory> {
    let horizon = params.simulation_horizon();
    let years_to_project = params.years_to_project();

    (0..params.num_simulations)
        .map(|_| {
            if horizon == 0 {
                return Vec::new();
            }
            let start = project_to_start(params, years_to_project, rng);
            simulate_path(params, horizon, start, rng)
        })
        .collect()
}

fn project_to_start<R: Rng + ?Sized>(
    params: &SimulationParameters,
    years_to_project: u32,
    rng: &mut R,
) -> ProjectedStart {
    let mut start = ProjectedStart {
        corpus: params.initial_corpus,
        monthly_expense: params.current_monthly_expense,
    };

    for _ in 0..years_to_project {
        let sampled = sample_market(params, rng);
        start.corpus *= 1.0 + sampled.portfolio_return;
        start.monthly_expense *= 1.0 + sampled.inflation;
    }

    start
}

fn simulate_path<R: Rng + ?Sized>(
    params: &SimulationParameters,
    horizon: usize,
    start: ProjectedStart,
    rng: &mut R,
) -> Trajectory {
    let mut path = Vec::with_capacity(horizon);
    let mut current_value = start.corpus;
    let mut annual_expense = start.monthly_expense * 12.0;

    // year 0 is recorded unrounded
    path.push(YearPoint {
        year: 0,
        value: current_value,
    });

    for year in 1..horizon {
        let sampled = sample_market(params, rng);
        current_value *= 1.0 + sampled.portfolio_return;
        annual_expense *= 1.0 + sampled.inflation;
        current_value -= annual_expense;
        if current_value < 0.0 {
            current_value = 0.0;
        }
        path.push(YearPoint {
            year: year as u32,
            value: round_to_cents(current_value),
        });
    }

    path
}

fn sample_market<R: Rng + ?Sized>(params: &SimulationParameters, rng: &mut R) -> MarketSample {
    let z_return: f64 = rng.sample(StandardNormal);
    let z_inflation: f64 = rng.sample(StandardNormal);

    MarketSample {
        portfolio_return: params.expected_return + params.return_std_dev * z_return,
        inflation: params.inflation + params.inflation_std_dev * z_inflation,
    }
}

/// Rounds half away from zero at two decimals. Python's `round(x, 2)` rounds
/// the exact binary value half-to-even, so results can differ at ties and at
/// values within one ulp of a tie once scaled by 100.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PercentileLabel, ProjectionReference};
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_params() -> SimulationParameters {
        SimulationParameters {
            initial_corpus: 100_000.0,
            current_monthly_expense: 1_000.0,
            start_year: 2025,
            end_year: 2045,
            reference: ProjectionReference::CalendarYear(2025),
            expected_return: 0.08,
            return_std_dev: 0.12,
            inflation: 0.025,
            inflation_std_dev: 0.01,
            num_simulations: 50,
        }
    }

    fn deterministic_params() -> SimulationParameters {
        let mut params = sample_params();
        params.return_std_dev = 0.0;
        params.inflation_std_dev = 0.0;
        params
    }

    #[test]
    fn simulate_produces_one_full_length_path_per_simulation() {
        let params = sample_params();
        let mut rng = StdRng::seed_from_u64(42);
        let paths = simulate(&params, &mut rng);

        assert_eq!(paths.len(), 50);
        for path in &paths {
            assert_eq!(path.len(), 21);
            assert_eq!(
                path.iter().map(|p| p.year).collect::<Vec<_>>(),
                (0..21).collect::<Vec<u32>>()
            );
        }
    }

    #[test]
    fn first_point_is_initial_corpus_without_projection() {
        let params = sample_params();
        let mut rng = StdRng::seed_from_u64(7);
        for path in simulate(&params, &mut rng) {
            assert_eq!(path[0].value, 100_000.0);
        }
    }

    #[test]
    fn zero_volatility_path_matches_hand_calculation() {
        let mut params = deterministic_params();
        params.end_year = 2027;
        params.num_simulations = 1;
        let mut rng = StdRng::seed_from_u64(1);
        let path = &simulate(&params, &mut rng)[0];

        let expense_1 = 12_000.0 * 1.025;
        let value_1 = 100_000.0 * 1.08 - expense_1;
        let expense_2 = expense_1 * 1.025;
        let value_2 = value_1 * 1.08 - expense_2;

        assert_eq!(path.len(), 3);
        assert_approx(path[0].value, 100_000.0);
        assert_approx(path[1].value, round_to_cents(value_1));
        assert_approx(path[2].value, round_to_cents(value_2));
        assert_approx(path[1].value, 95_700.0);
    }

    #[test]
    fn pre_projection_compounds_corpus_and_expense_before_year_zero() {
        let mut params = deterministic_params();
        params.reference = ProjectionReference::CurrentAge(58);
        params.start_year = 60;
        params.end_year = 61;
        params.num_simulations = 2;
        let mut rng = StdRng::seed_from_u64(3);
        let paths = simulate(&params, &mut rng);

        let corpus = 100_000.0 * 1.08 * 1.08;
        let annual_expense = 1_000.0 * 1.025 * 1.025 * 12.0 * 1.025;
        for path in &paths {
            assert_approx(path[0].value, corpus);
            assert_approx(path[1].value, round_to_cents(corpus * 1.08 - annual_expense));
        }
    }

    #[test]
    fn reference_after_start_year_skips_projection() {
        let mut params = deterministic_params();
        params.reference = ProjectionReference::CalendarYear(2030);
        assert_eq!(params.years_to_project(), 0);
        let mut rng = StdRng::seed_from_u64(3);
        assert_approx(simulate(&params, &mut rng)[0][0].value, 100_000.0);
    }

    #[test]
    fn year_zero_keeps_a_negative_projected_corpus() {
        let mut params = deterministic_params();
        params.expected_return = -1.5;
        params.current_monthly_expense = 5_000.0;
        params.reference = ProjectionReference::CalendarYear(2024);
        params.end_year = 2026;
        params.num_simulations = 1;
        let mut rng = StdRng::seed_from_u64(5);
        let path = &simulate(&params, &mut rng)[0];

        assert_approx(path[0].value, -50_000.0);
        assert_eq!(path[1].value, 0.0);
    }

    #[test]
    fn depleted_paths_are_floored_at_zero() {
        let mut params = deterministic_params();
        params.initial_corpus = 10_000.0;
        params.current_monthly_expense = 5_000.0;
        params.num_simulations = 3;
        let mut rng = StdRng::seed_from_u64(9);
        let result = run_simulation(&params, &mut rng);

        for path in &result.paths {
            assert!(path[1..].iter().all(|p| p.value == 0.0));
        }
        assert_approx(result.ruin_probability, 100.0);
    }

    #[test]
    fn out_of_order_years_yield_empty_but_well_formed_result() {
        let mut params = sample_params();
        params.start_year = 2025;
        params.end_year = 2020;
        let mut rng = StdRng::seed_from_u64(5);
        let result = run_simulation(&params, &mut rng);

        assert_eq!(result.paths.len(), 50);
        assert!(result.paths.iter().all(|p| p.is_empty()));
        assert!(result.years.is_empty());
        for label in PercentileLabel::ALL {
            assert!(result.percentiles.band(label).is_empty());
        }
        assert_approx(result.ruin_probability, 0.0);
    }

    #[test]
    fn single_year_horizon_holds_only_the_start_point() {
        let mut params = sample_params();
        params.end_year = params.start_year;
        let mut rng = StdRng::seed_from_u64(5);
        let result = run_simulation(&params, &mut rng);

        assert_eq!(result.years, vec![0]);
        assert!(result.paths.iter().all(|p| p.len() == 1));
        assert_approx(result.percentiles.median[0].value, 100_000.0);
    }

    #[test]
    fn same_seed_reproduces_identical_results() {
        let params = sample_params();
        let a = run_simulation(&params, &mut StdRng::seed_from_u64(42));
        let b = run_simulation(&params, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);

        let c = run_simulation(&params, &mut StdRng::seed_from_u64(43));
        assert_ne!(a.paths, c.paths);
    }

    #[test]
    fn negative_std_dev_is_accepted() {
        let mut params = sample_params();
        params.return_std_dev = -0.12;
        params.inflation_std_dev = -0.01;
        let mut rng = StdRng::seed_from_u64(11);
        let result = run_simulation(&params, &mut rng);
        assert_eq!(result.paths.len(), 50);
        assert!((0.0..=100.0).contains(&result.ruin_probability));
    }

    #[test]
    fn round_to_cents_rounds_half_away_from_zero() {
        assert_approx(round_to_cents(1.005_000_1), 1.01);
        assert_approx(round_to_cents(2.344), 2.34);
        assert_approx(round_to_cents(-2.345_1), -2.35);
        // 12.5 is exact in binary, so this tie goes up where Python's goes to even.
        assert_eq!(round_to_cents(0.125), 0.13);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_result_shape_and_ordering_invariants(
            seed in any::<u64>(),
            start_year in 2000i32..2100,
            span in -5i32..30,
            reference_back in 0i32..5,
            simulations in 1u32..40,
            corpus in 0u32..2_000_000,
            monthly_expense in 0u32..20_000,
            return_bp in -500i32..1500,
            return_vol_bp in 0u32..3000,
            inflation_bp in 0u32..1000,
            inflation_vol_bp in 0u32..500
        ) {
            let params = SimulationParameters {
                initial_corpus: corpus as f64,
                current_monthly_expense: monthly_expense as f64,
                start_year,
                end_year: start_year + span,
                reference: ProjectionReference::CalendarYear(start_year - reference_back),
                expected_return: return_bp as f64 / 10_000.0,
                return_std_dev: return_vol_bp as f64 / 10_000.0,
                inflation: inflation_bp as f64 / 10_000.0,
                inflation_std_dev: inflation_vol_bp as f64 / 10_000.0,
                num_simulations: simulations,
            };
            let horizon = params.simulation_horizon();
            let mut rng = StdRng::seed_from_u64(seed);
            let result = run_simulation(&params, &mut rng);

            prop_assert_eq!(result.paths.len(), simulations as usize);
            prop_assert_eq!(result.years.len(), horizon);
            prop_assert!((0.0..=100.0).contains(&result.ruin_probability));

            for path in &result.paths {
                prop_assert_eq!(path.len(), horizon);
                for point in path {
                    prop_assert!(point.value.is_finite());
                }
                // the projected start point is not floored
                for point in path.iter().skip(1) {
                    prop_assert!(point.value >= 0.0);
                }
            }

            for label in PercentileLabel::ALL {
                prop_assert_eq!(result.percentiles.band(label).len(), horizon);
            }

            let bands = &result.percentiles;
            for y in 0..horizon {
                prop_assert_eq!(bands.median[y].year, y as u32);
                prop_assert!(bands.p95[y].value >= bands.p75[y].value);
                prop_assert!(bands.p75[y].value >= bands.median[y].value);
                prop_assert!(bands.median[y].value >= bands.p25[y].value);
                prop_assert!(bands.p25[y].value >= bands.p5[y].value);
            }
        }
    }
}
