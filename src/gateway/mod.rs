//! HTTP 402 gateway: resources priced in cross-chain payments.
//!
//! A client asks for a resource, receives `402 Payment Required` with a fresh
//! payment identifier and the chain coordinates, pays on the sender chain with
//! that identifier, and once the receipt has been relayed redeems it here. Each
//! receipt unlocks exactly one response: redemption consumes it on the receiver
//! chain.
//!
//! Endpoints:
//! - `GET /` – Gateway description
//! - `GET /health` – Liveness and network coordinates
//! - `GET /pricing` – Price list of the paid routes
//! - `GET /contract-status` – On-chain configuration of both contracts
//! - `GET /resource` – `402` with payment instructions
//! - `GET /verify/{paymentId}` – Receipt lookup with validity verdict
//! - `POST /consume/{paymentId}` – Redeem a receipt for the protected resource
//! - `GET /api/public` – Free content
//! - `GET /api/data` – Paid content, redeemed through the `X-Payment-Id` header

mod handlers;

pub use handlers::routes;

use alloy_primitives::U256;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::config::PricingConfig;
use crate::encoding::{EncodingError, PaymentId};
use crate::orchestrator::{OrchestratorError, PaymentOrchestrator};
use crate::receiver::ConsumeError;

/// Header carrying the payment identifier on header-gated routes.
pub const PAYMENT_ID_HEADER: &str = "x-payment-id";

/// Prices of the paid routes, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub resource: U256,
    pub data: U256,
}

impl From<&PricingConfig> for Pricing {
    fn from(config: &PricingConfig) -> Self {
        Self {
            resource: config.resource.inner().0,
            data: config.data.inner().0,
        }
    }
}

/// Shared state of every gateway handler.
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: PaymentOrchestrator,
    pub pricing: Pricing,
}

impl GatewayState {
    pub fn new(orchestrator: PaymentOrchestrator, pricing: Pricing) -> Self {
        Self {
            orchestrator,
            pricing,
        }
    }
}

/// Why a gateway request was refused.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid payment identifier: {0}")]
    InvalidPaymentId(#[from] EncodingError),
    #[error("No payment found with identifier {0}")]
    NotFound(PaymentId),
    #[error("Payment {0} has expired and cannot be consumed")]
    Expired(PaymentId),
    #[error("Payment {0} has already been used")]
    AlreadyConsumed(PaymentId),
    #[error("Payment amount {provided} is less than required {required}")]
    InsufficientAmount { required: String, provided: String },
    #[error(transparent)]
    Orchestrator(OrchestratorError),
}

impl From<OrchestratorError> for GatewayError {
    fn from(error: OrchestratorError) -> Self {
        match error {
            OrchestratorError::Consume(ConsumeError::AlreadyConsumed(id)) => {
                GatewayError::AlreadyConsumed(id)
            }
            OrchestratorError::Consume(ConsumeError::Expired(id)) => GatewayError::Expired(id),
            OrchestratorError::Consume(ConsumeError::NotFound(id)) => GatewayError::NotFound(id),
            other => GatewayError::Orchestrator(other),
        }
    }
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidPaymentId(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_)
            | GatewayError::Expired(_)
            | GatewayError::AlreadyConsumed(_)
            | GatewayError::InsufficientAmount { .. } => StatusCode::FORBIDDEN,
            GatewayError::Orchestrator(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            GatewayError::InvalidPaymentId(_) => "Invalid payment identifier",
            GatewayError::NotFound(_) => "Payment not found",
            GatewayError::Expired(_) => "Payment expired",
            GatewayError::AlreadyConsumed(_) => "Payment already consumed",
            GatewayError::InsufficientAmount { .. } => "Insufficient payment amount",
            GatewayError::Orchestrator(_) => "Internal error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Gateway request failed");
        } else {
            tracing::warn!(error = %self, "Gateway request refused");
        }
        let body = Json(json!({
            "error": self.title(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
