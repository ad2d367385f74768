use super::engine::round_to_cents;
use super::types::{PercentileLabel, Percentiles, Trajectory, YearPoint};

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub percentiles: Percentiles,
    pub ruin_probability: f64,
}

/// Reduces simulated trajectories to per-year percentile bands and the share
/// of paths that end broke.
///
/// Every band gets one point per entry in `year_offsets`; the column for
/// offset `y` is the value at index `y` of every trajectory long enough to
/// have one.
pub fn aggregate(
    trajectories: &[Trajectory],
    year_offsets: &[u32],
    num_simulations: u32,
) -> Aggregate {
    let mut percentiles = Percentiles::default();
    for label in PercentileLabel::ALL {
        percentiles
            .band_mut(label)
            .reserve_exact(year_offsets.len());
    }

    let mut column = Vec::with_capacity(trajectories.len());
    for (idx, &year) in year_offsets.iter().enumerate() {
        column.clear();
        column.extend(
            trajectories
                .iter()
                .filter_map(|path| path.get(idx).map(|point| point.value)),
        );

        for label in PercentileLabel::ALL {
            let value = round_to_cents(percentile(&mut column, label.quantile()));
            percentiles
                .band_mut(label)
                .push(YearPoint { year, value });
        }
    }

    Aggregate {
        percentiles,
        ruin_probability: ruin_probability(trajectories, num_simulations),
    }
}

/// Percentage of trajectories whose final point is at or below zero.
pub fn ruin_probability(trajectories: &[Trajectory], num_simulations: u32) -> f64 {
    if num_simulations == 0 {
        return 0.0;
    }

    let ruined = trajectories
        .iter()
        .filter(|path| path.last().is_some_and(|point| point.value <= 0.0))
        .count();
    round_to_cents(ruined as f64 / num_simulations as f64 * 100.0)
}

/// Linear interpolation between closest ranks, matching NumPy's default.
///
/// Sorts `values` in place.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (n as f64 - 1.0) * p / 100.0;
    let lower = rank.floor();
    let upper = rank.ceil();

    if lower == upper {
        values[rank as usize]
    } else {
        values[lower as usize] * (upper - rank) + values[upper as usize] * (rank - lower)
    }
}
