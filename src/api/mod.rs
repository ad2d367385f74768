mod config;
mod error;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, Utc};
use clap::Args;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::core::{ProjectionReference, SimulationParameters, SimulationResult, run_simulation};

pub use config::{ConfigError, ServerConfig, SimulationLimits};
pub use error::{ApiError, ServerError};

const DEFAULT_NUM_SIMULATIONS: u32 = 100;

/// Body of `POST /api/simulate`. Rates are percentages.
///
/// `current_age` (start/end read as ages) and `reference_year` are mutually
/// exclusive; with neither, projection counts from the current calendar year.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulateRequest {
    pub initial_corpus: f64,
    pub start_year: i32,
    pub end_year: i32,
    pub expected_return_pct: f64,
    pub return_std_dev_pct: f64,
    pub inflation_pct: f64,
    pub inflation_std_dev_pct: f64,
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    #[serde(default)]
    pub current_monthly_expense: f64,
    #[serde(default)]
    pub current_age: Option<i32>,
    #[serde(default)]
    pub reference_year: Option<i32>,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_num_simulations() -> u32 {
    DEFAULT_NUM_SIMULATIONS
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long, help = "Portfolio value today")]
    pub initial_corpus: f64,
    #[arg(long, default_value_t = 0.0, help = "Monthly spending in today's money")]
    pub current_monthly_expense: f64,
    #[arg(long, help = "First year of the drawdown horizon")]
    pub start_year: i32,
    #[arg(long, help = "Last year of the drawdown horizon, inclusive")]
    pub end_year: i32,
    #[arg(long, help = "Expected annual return in percent, e.g. 8")]
    pub expected_return_pct: f64,
    #[arg(
        long,
        default_value_t = 12.0,
        help = "Annual return volatility in percent"
    )]
    pub return_std_dev_pct: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        help = "Expected annual inflation in percent"
    )]
    pub inflation_pct: f64,
    #[arg(long, default_value_t = 1.0, help = "Inflation volatility in percent")]
    pub inflation_std_dev_pct: f64,
    #[arg(long, default_value_t = DEFAULT_NUM_SIMULATIONS)]
    pub num_simulations: u32,
    #[arg(
        long,
        help = "Age today; start/end years are then read as ages"
    )]
    pub current_age: Option<i32>,
    #[arg(
        long,
        conflicts_with = "current_age",
        help = "Year to project from; defaults to the current calendar year"
    )]
    pub reference_year: Option<i32>,
    #[arg(long, help = "Seed for a reproducible run")]
    pub seed: Option<u64>,
    #[arg(long, help = "Pretty-print the JSON result")]
    pub pretty: bool,
}

impl From<&SimulateArgs> for SimulateRequest {
    fn from(args: &SimulateArgs) -> Self {
        SimulateRequest {
            initial_corpus: args.initial_corpus,
            start_year: args.start_year,
            end_year: args.end_year,
            expected_return_pct: args.expected_return_pct,
            return_std_dev_pct: args.return_std_dev_pct,
            inflation_pct: args.inflation_pct,
            inflation_std_dev_pct: args.inflation_std_dev_pct,
            num_simulations: args.num_simulations,
            current_monthly_expense: args.current_monthly_expense,
            current_age: args.current_age,
            reference_year: args.reference_year,
            seed: args.seed,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn build_parameters(
    request: &SimulateRequest,
    limits: SimulationLimits,
    current_year: i32,
) -> Result<SimulationParameters, ApiError> {
    for (field, amount) in [
        ("initial_corpus", request.initial_corpus),
        ("current_monthly_expense", request.current_monthly_expense),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ApiError::InvalidAmount { field });
        }
    }

    for (field, rate) in [
        ("expected_return_pct", request.expected_return_pct),
        ("return_std_dev_pct", request.return_std_dev_pct),
        ("inflation_pct", request.inflation_pct),
        ("inflation_std_dev_pct", request.inflation_std_dev_pct),
    ] {
        if !rate.is_finite() {
            return Err(ApiError::InvalidRate { field });
        }
    }

    if request.num_simulations > limits.max_simulations {
        return Err(ApiError::TooManySimulations {
            requested: request.num_simulations,
            max: limits.max_simulations,
        });
    }

    let reference = match (request.current_age, request.reference_year) {
        (Some(_), Some(_)) => return Err(ApiError::ConflictingReference),
        (Some(age), None) => ProjectionReference::CurrentAge(age),
        (None, Some(year)) => ProjectionReference::CalendarYear(year),
        (None, None) => ProjectionReference::CalendarYear(current_year),
    };

    let params = SimulationParameters {
        initial_corpus: request.initial_corpus,
        current_monthly_expense: request.current_monthly_expense,
        start_year: request.start_year,
        end_year: request.end_year,
        reference,
        expected_return: request.expected_return_pct / 100.0,
        return_std_dev: request.return_std_dev_pct / 100.0,
        inflation: request.inflation_pct / 100.0,
        inflation_std_dev: request.inflation_std_dev_pct / 100.0,
        num_simulations: request.num_simulations,
    };

    // out-of-order years pass through and simulate to an empty horizon
    let horizon = params.simulation_horizon();
    if horizon > limits.max_horizon_years as usize {
        return Err(ApiError::HorizonTooLong {
            requested: horizon,
            max: limits.max_horizon_years,
        });
    }

    let years_to_project = params.years_to_project();
    if years_to_project > limits.max_projection_years {
        return Err(ApiError::ProjectionTooLong {
            requested: years_to_project,
            max: limits.max_projection_years,
        });
    }

    Ok(params)
}

fn rng_for_request(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn simulate_request(
    request: &SimulateRequest,
    limits: SimulationLimits,
    current_year: i32,
) -> Result<SimulationResult, ApiError> {
    let params = build_parameters(request, limits, current_year)?;
    let mut rng = rng_for_request(request.seed);
    Ok(run_simulation(&params, &mut rng))
}

/// Runs one simulation for the command line, seeded from `--seed` when given.
pub fn run_cli_simulation(args: &SimulateArgs) -> Result<SimulationResult, ApiError> {
    let request = SimulateRequest::from(args);
    simulate_request(&request, SimulationLimits::default(), Utc::now().year())
}

pub fn build_router(config: &ServerConfig) -> Result<Router, ConfigError> {
    let cors = config.cors_layer()?;

    Ok(Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/simulate", post(simulate_handler))
        .fallback(not_found_handler)
        .with_state(config.limits())
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

pub async fn run_http_server(config: ServerConfig) -> Result<(), ServerError> {
    let addr = config.socket_addr();
    let app = build_router(&config)?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!(%addr, "drawdown HTTP API listening");
    tracing::info!(
        origins = ?config.allowed_origins,
        max_simulations = config.max_simulations,
        max_horizon_years = config.max_horizon_years,
        "request limits and CORS origins"
    );

    axum::serve(listener, app).await.map_err(ServerError::Serve)
}

async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello from the drawdown backend!",
    })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error::error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(
    State(limits): State<SimulationLimits>,
    payload: Result<Json<SimulateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };

    let current_year = Utc::now().year();
    let outcome = tokio::task::spawn_blocking(move || {
        simulate_request(&request, limits, current_year)
    })
    .await
    .map_err(ApiError::from)
    .and_then(|result| result);

    match outcome {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => err.into_response(),
    }
}
