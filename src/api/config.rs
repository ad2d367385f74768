use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::HeaderValue;
use clap::Args;
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://127.0.0.1:5173"];
pub const DEFAULT_MAX_SIMULATIONS: u32 = 10_000;
pub const DEFAULT_MAX_HORIZON_YEARS: u32 = 200;
pub const DEFAULT_MAX_PROJECTION_YEARS: u32 = 150;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid allowed origin {origin:?}: {source}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: axum::http::header::InvalidHeaderValue,
    },
}

/// Upper bounds on a single request's work.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SimulationLimits {
    pub max_simulations: u32,
    pub max_horizon_years: u32,
    pub max_projection_years: u32,
}

impl Default for SimulationLimits {
    fn default() -> Self {
        Self {
            max_simulations: DEFAULT_MAX_SIMULATIONS,
            max_horizon_years: DEFAULT_MAX_HORIZON_YEARS,
            max_projection_years: DEFAULT_MAX_PROJECTION_YEARS,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    #[arg(long, env = "DRAWDOWN_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,
    #[arg(long, env = "DRAWDOWN_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    #[arg(
        long = "allow-origin",
        env = "DRAWDOWN_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_values = DEFAULT_ALLOWED_ORIGINS,
        help = "Browser origin allowed to call the API; repeat or comma-separate"
    )]
    pub allowed_origins: Vec<String>,
    #[arg(
        long,
        env = "DRAWDOWN_MAX_SIMULATIONS",
        default_value_t = DEFAULT_MAX_SIMULATIONS,
        help = "Largest num_simulations a request may ask for"
    )]
    pub max_simulations: u32,
    #[arg(
        long,
        env = "DRAWDOWN_MAX_HORIZON_YEARS",
        default_value_t = DEFAULT_MAX_HORIZON_YEARS,
        help = "Longest start_year..=end_year span a request may ask for"
    )]
    pub max_horizon_years: u32,
    #[arg(
        long,
        env = "DRAWDOWN_MAX_PROJECTION_YEARS",
        default_value_t = DEFAULT_MAX_PROJECTION_YEARS,
        help = "Most years a request may pre-project before start_year"
    )]
    pub max_projection_years: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
            max_simulations: DEFAULT_MAX_SIMULATIONS,
            max_horizon_years: DEFAULT_MAX_HORIZON_YEARS,
            max_projection_years: DEFAULT_MAX_PROJECTION_YEARS,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn limits(&self) -> SimulationLimits {
        SimulationLimits {
            max_simulations: self.max_simulations,
            max_horizon_years: self.max_horizon_years,
            max_projection_years: self.max_projection_years,
        }
    }

    /// Credentialed CORS: explicit origins, methods and headers mirrored from
    /// the preflight since wildcards are not allowed alongside credentials.
    pub fn cors_layer(&self) -> Result<CorsLayer, ConfigError> {
        let origins = self
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim()).map_err(|source| ConfigError::InvalidOrigin {
                    origin: origin.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true))
    }
}
