//! usvc
//!
//! Serves an HTTP router and the gRPC health service on one listener (or two, with
//! `--rpc-addr`), until SIGINT or SIGTERM. A second signal forces exit.
//!
//! ```text
//!                 ┌──────────────────────────────────────────┐
//!   connection ──▶│ cors → access_log → dispatcher           │
//!                 │                       ├─ HTTP/2 + grpc ──▶ RPC engine
//!                 │                       └─ otherwise ──────▶ app router
//!                 │                                            (/, /health, /metrics)
//!                 └──────────────────────────────────────────┘
//! ```

use std::process::ExitCode;

use axum::{routing::get, Router};
use clap::Parser;

use usvc::config::cli::CliArgs;
use usvc::config::ServeConfig;
use usvc::observability::{logging::init_logging, Metrics};
use usvc::{Coordinator, RpcEngine, SignalContext};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("usvc: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.log) {
        eprintln!("usvc: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "usvc starting");

    match serve(config).await {
        Ok(()) => {
            tracing::info!("Stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Exiting with error");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: ServeConfig) -> usvc::Result<()> {
    tracing::info!(
        http_addr = %config.listener.http_addr,
        rpc_addr = config.listener.rpc_addr.as_deref().unwrap_or("shared"),
        tls = config.tls.is_some(),
        shutdown_secs = config.timeouts.shutdown_secs,
        "Configuration loaded"
    );

    let app = Router::new().route("/", get(|| async { "Hello from usvc\n" }));
    let (_health_reporter, health) = tonic_health::server::health_reporter();
    let engine = RpcEngine::from_routes(tonic::service::Routes::new(health));

    let coordinator = Coordinator::builder(config, app)
        .rpc(engine)
        .metrics(Metrics::new()?)
        .build()
        .await?;

    let ctx = SignalContext::new()?;
    coordinator.run(ctx).await
}
