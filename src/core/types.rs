use serde::Serialize;

/// Anchor that pre-retirement projection counts from.
///
/// `start_year - value()` is the number of years the corpus and expense are
/// compounded before the first recorded point, so both calendar years and
/// ages work as long as `start_year` is expressed on the same scale.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProjectionReference {
    CalendarYear(i32),
    CurrentAge(i32),
}

impl ProjectionReference {
    pub fn value(self) -> i32 {
        match self {
            ProjectionReference::CalendarYear(year) => year,
            ProjectionReference::CurrentAge(age) => age,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationParameters {
    pub initial_corpus: f64,
    pub current_monthly_expense: f64,
    pub start_year: i32,
    pub end_year: i32,
    pub reference: ProjectionReference,
    pub expected_return: f64,
    pub return_std_dev: f64,
    pub inflation: f64,
    pub inflation_std_dev: f64,
    pub num_simulations: u32,
}

impl SimulationParameters {
    /// Inclusive year count; out-of-order years give 0.
    pub fn simulation_horizon(&self) -> usize {
        let span = i64::from(self.end_year) - i64::from(self.start_year) + 1;
        usize::try_from(span.max(0)).unwrap_or(0)
    }

    pub fn years_to_project(&self) -> u32 {
        let gap = i64::from(self.start_year) - i64::from(self.reference.value());
        u32::try_from(gap.max(0)).unwrap_or(u32::MAX)
    }

    pub fn year_offsets(&self) -> Vec<u32> {
        (0..self.simulation_horizon() as u32).collect()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct YearPoint {
    pub year: u32,
    pub value: f64,
}

pub type Trajectory = Vec<YearPoint>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PercentileLabel {
    Median,
    P25,
    P75,
    P5,
    P95,
}

impl PercentileLabel {
    pub const ALL: [PercentileLabel; 5] = [
        PercentileLabel::Median,
        PercentileLabel::P25,
        PercentileLabel::P75,
        PercentileLabel::P5,
        PercentileLabel::P95,
    ];

    pub fn quantile(self) -> f64 {
        match self {
            PercentileLabel::Median => 50.0,
            PercentileLabel::P25 => 25.0,
            PercentileLabel::P75 => 75.0,
            PercentileLabel::P5 => 5.0,
            PercentileLabel::P95 => 95.0,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            PercentileLabel::Median => "median",
            PercentileLabel::P25 => "p25",
            PercentileLabel::P75 => "p75",
            PercentileLabel::P5 => "p5",
            PercentileLabel::P95 => "p95",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Percentiles {
    pub median: Vec<YearPoint>,
    pub p25: Vec<YearPoint>,
    pub p75: Vec<YearPoint>,
    pub p5: Vec<YearPoint>,
    pub p95: Vec<YearPoint>,
}

impl Percentiles {
    pub fn band(&self, label: PercentileLabel) -> &[YearPoint] {
        match label {
            PercentileLabel::Median => &self.median,
            PercentileLabel::P25 => &self.p25,
            PercentileLabel::P75 => &self.p75,
            PercentileLabel::P5 => &self.p5,
            PercentileLabel::P95 => &self.p95,
        }
    }

    pub(crate) fn band_mut(&mut self, label: PercentileLabel) -> &mut Vec<YearPoint> {
        match label {
            PercentileLabel::Median => &mut self.median,
            PercentileLabel::P25 => &mut self.p25,
            PercentileLabel::P75 => &mut self.p75,
            PercentileLabel::P5 => &mut self.p5,
            PercentileLabel::P95 => &mut self.p95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub paths: Vec<Trajectory>,
    pub years: Vec<u32>,
    pub percentiles: Percentiles,
    pub ruin_probability: f64,
}
