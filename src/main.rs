//! meshcfg - Istio and Gateway-API configuration aggregation and validation
//!
//! Lists mesh configuration per namespace with cross-reference validation,
//! shows single objects with their references and reports per-kind
//! permissions, all as JSON.

use clap::Parser;
use meshcfg::cli::{self, Args};
use meshcfg::error::EngineError;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match cli::init_logging(args.debug) {
        Ok(Some(log_path)) => {
            eprintln!("Debug logging enabled. Logs written to: {}", log_path.display());
        }
        Ok(None) => {}
        Err(e) => eprintln!("Logging disabled: {:#}", e),
    }

    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<EngineError>() {
                Some(engine) => eprintln!("Error ({}): {:#}", engine.status_code(), e),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}
