//! Payment gateway HTTP entrypoint.
//!
//! This binary launches an Axum-based HTTP server that sells access to its
//! resources for cross-chain payments, verified and consumed on the receiver
//! chain.
//!
//! Endpoints:
//! - `GET /resource` – `402 Payment Required` with a fresh payment identifier
//! - `GET /verify/{paymentId}` – Whether a relayed receipt can be redeemed
//! - `POST /consume/{paymentId}` – Redeem a receipt for the resource
//! - `GET /api/data` – Paid per request through the `X-Payment-Id` header
//! - `GET /api/public`, `GET /pricing`, `GET /contract-status`, `GET /health`
//!
//! This server includes:
//! - OpenTelemetry tracing via `TraceLayer`
//! - CORS support for browser clients, including the `X-Payment-Id` header
//! - Graceful shutdown on SIGTERM and SIGINT
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` (or `--config`) selects the JSON configuration file
//! - `HOST`, `PORT` control binding address
//! - `RUST_LOG` sets the log filter
//! - `OTEL_*` variables enable trace and metric export

use axum::Router;
use axum::http::{HeaderName, Method, header};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors;

use relaypay::config::Config;
use relaypay::gateway::{self, GatewayState, PAYMENT_ID_HEADER, Pricing};
use relaypay::orchestrator::PaymentOrchestrator;
use relaypay::util::{SigDown, Telemetry};

/// Initializes the payment gateway.
///
/// - Loads `.env` variables.
/// - Initializes tracing, with OpenTelemetry export when configured.
/// - Validates the client configuration and connects to both chains.
/// - Starts an Axum HTTP server with the gateway handlers.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = Config::load()?;

    let orchestrator = PaymentOrchestrator::connect(config.client())?;
    let pricing = Pricing::from(config.pricing());
    let axum_state = Arc::new(GatewayState::new(orchestrator, pricing));

    let http_endpoints = Router::new()
        .merge(gateway::routes().with_state(axum_state))
        .layer(telemetry.http_tracing())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    HeaderName::from_static(PAYMENT_ID_HEADER),
                ]),
        );

    let addr = SocketAddr::new(config.host(), config.port());
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        });

    let sig_down = SigDown::try_new()?;
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(async move { sig_down.recv().await })
        .await?;

    Ok(())
}
