use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use drawdown::api::{ServerConfig, SimulateArgs, run_cli_simulation, run_http_server};

#[derive(Parser, Debug)]
#[command(
    name = "drawdown",
    about = "Monte Carlo retirement drawdown projector (stochastic returns + inflation)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the simulation HTTP API.
    Serve(ServerConfig),
    /// Run one simulation and print the result as JSON.
    Simulate(SimulateArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve(config) => {
            if let Err(e) = run_http_server(config).await {
                tracing::error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        Command::Simulate(args) => {
            let result = match run_cli_simulation(&args) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(2);
                }
            };
            let rendered = if args.pretty {
                serde_json::to_string_pretty(&result)
            } else {
                serde_json::to_string(&result)
            };
            match rendered {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("failed to render result: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
