mod aggregate;
mod engine;
mod types;

pub use aggregate::{Aggregate, aggregate, percentile, ruin_probability};
pub use engine::{round_to_cents, run_simulation, simulate};
pub use types::{
    PercentileLabel, Percentiles, ProjectionReference, SimulationParameters, SimulationResult,
    Trajectory, YearPoint,
};
