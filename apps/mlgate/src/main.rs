//! # mlgate - ML Model Governance
//!
//! The main binary for mlgate.
//!
//! ## Usage
//!
//! ```bash
//! # Create a context and record a test suite
//! mlgate -s fs://./gov -c vision/inspector/v1 init
//! mlgate -s fs://./gov -c vision/inspector/v1 write -t test_suite -f suite.json
//!
//! # Record evidence, then validate it
//! mlgate -s fs://./gov -c vision/inspector/v1 write -t evidence -f accuracy.json
//! mlgate -s fs://./gov -c vision/inspector/v1 validate --save
//! ```

use clap::Parser;
use mlgate::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // MLGATE_LOG_FORMAT=json enables machine-parseable logs; stdout stays for results.
    let log_format = std::env::var("MLGATE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mlgate=info,mlgate_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
