//! HTTP endpoints of the payment gateway.
//!
//! Handlers only translate between HTTP and [`PaymentOrchestrator`] calls; every
//! on-chain decision (existence, expiry, single use) is the receiver contract's.
//!
//! [`PaymentOrchestrator`]: crate::orchestrator::PaymentOrchestrator

use alloy_primitives::U256;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::instrument;

use crate::encoding::{PaymentId, format_amount};
use crate::gateway::{GatewayError, GatewayState, PAYMENT_ID_HEADER};
use crate::types::{PaymentReceipt, PaymentStatus, PaymentVerification, TransactionResult};

/// Routes of the gateway, to be completed with a [`GatewayState`].
pub fn routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/pricing", get(get_pricing))
        .route("/contract-status", get(get_contract_status))
        .route("/resource", get(get_resource))
        .route("/verify/{payment_id}", get(get_verify))
        .route("/consume/{payment_id}", post(post_consume))
        .route("/api/public", get(get_public))
        .route("/api/data", get(get_data))
}

/// `GET /`: machine-readable description of the gateway.
#[instrument(skip_all)]
pub async fn get_root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "HTTP 402 Payment Required gateway backed by cross-chain payment receipts",
        "endpoints": {
            "GET /resource": "Request a protected resource (returns 402 with payment details)",
            "GET /verify/{paymentId}": "Verify a payment receipt",
            "POST /consume/{paymentId}": "Consume a payment and access the resource",
            "GET /api/data": "Protected data, pay and send the identifier in X-Payment-Id",
            "GET /api/public": "Public data, no payment required",
            "GET /pricing": "Prices of the paid routes",
            "GET /contract-status": "On-chain configuration of both contracts",
            "GET /health": "Health check",
        }
    }))
}

/// `GET /health`: liveness plus the chains this gateway is bound to.
#[instrument(skip_all)]
pub async fn get_health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": unix_now(),
        "version": env!("CARGO_PKG_VERSION"),
        "network": state.orchestrator.network(),
    }))
}

/// `GET /pricing`: price list of the paid routes.
#[instrument(skip_all)]
pub async fn get_pricing(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let pricing = &state.pricing;
    Json(json!({
        "endpoints": [
            {
                "path": "/api/public",
                "price": "0",
                "description": "Public endpoint, no payment required",
            },
            {
                "path": "/resource",
                "price": format_amount(pricing.resource),
                "priceBaseUnits": pricing.resource.to_string(),
                "description": "Premium resource, redeemed with POST /consume/{paymentId}",
            },
            {
                "path": "/api/data",
                "price": format_amount(pricing.data),
                "priceBaseUnits": pricing.data.to_string(),
                "description": "Data access, redeemed with the X-Payment-Id header",
            },
        ],
        "instructions": "Pay on the sender chain, wait for the relay, then present the payment identifier",
    }))
}

/// `GET /contract-status`: on-chain configuration of the sender and receiver contracts.
#[instrument(skip_all)]
pub async fn get_contract_status(
    State(state): State<Arc<GatewayState>>,
) -> Result<Response, GatewayError> {
    let orchestrator = &state.orchestrator;
    let network = orchestrator.network();
    let (sender, contract_balance, receiver) = tokio::try_join!(
        orchestrator.sender_configuration(),
        orchestrator.sender_contract_balance(),
        orchestrator.receiver_configuration(),
    )?;
    let expiry_secs = u64::try_from(receiver.payment_expiry_time).unwrap_or(u64::MAX);
    let body = json!({
        "timestamp": unix_now(),
        "sender": {
            "address": network.sender.contract,
            "chainId": network.sender.chain_id,
            "balance": {
                "baseUnits": contract_balance.to_string(),
                "formatted": format_amount(contract_balance),
            },
            "configuration": sender,
        },
        "receiver": {
            "address": network.receiver.contract,
            "chainId": network.receiver.chain_id,
            "requiredPaymentAmount": format_amount(receiver.required_payment_amount),
            "paymentExpiry": format_expiry(expiry_secs),
            "configuration": receiver,
        },
    });
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// `GET /resource`: always `402`, with a fresh payment identifier to pay under.
#[instrument(skip_all)]
pub async fn get_resource(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let payment_id = PaymentId::generate();
    let price = state.pricing.resource;
    let network = state.orchestrator.network();
    tracing::info!(%payment_id, price = %format_amount(price), "Issued payment request");
    let body = json!({
        "error": "Payment Required",
        "message": "This resource requires payment to access",
        "payment": {
            "paymentId": payment_id,
            "amount": price.to_string(),
            "amountFormatted": format_amount(price),
            "senderChainId": network.sender.chain_id,
            "receiverChainId": network.receiver.chain_id,
            "senderBlockchainId": network.sender.blockchain_id,
            "receiverBlockchainId": network.receiver.blockchain_id,
            "senderContract": network.sender.contract,
            "receiverContract": network.receiver.contract,
        },
        "instructions": [
            "1. Send the payment on the sender chain using the payment ID above",
            "2. Wait for the cross-chain relay",
            "3. Verify the payment with GET /verify/{paymentId}",
            "4. Consume the payment with POST /consume/{paymentId}",
        ],
    });
    (StatusCode::PAYMENT_REQUIRED, Json(body))
}

/// `GET /verify/{paymentId}`: whether a receipt exists and can still be redeemed.
///
/// A payment that was never relayed is not an error: it answers `200` with
/// `verified: false`, since the relay may simply not have happened yet. Any
/// relayed receipt that cannot be redeemed is refused with `403` and a reason.
#[instrument(skip_all)]
pub async fn get_verify(
    State(state): State<Arc<GatewayState>>,
    Path(payment_id): Path<String>,
) -> Result<Response, GatewayError> {
    let payment_id: PaymentId = payment_id.parse()?;
    let orchestrator = &state.orchestrator;
    let verification = orchestrator.get_verification(&payment_id).await?;

    if let PaymentVerification {
        is_valid: true,
        receipt: Some(receipt),
    } = verification
    {
        let amount_formatted = format_amount(receipt.amount);
        let body = json!({
            "verified": true,
            "message": "Payment verified successfully",
            "receipt": receipt,
            "amountFormatted": amount_formatted,
        });
        return Ok((StatusCode::OK, Json(body)).into_response());
    }

    let refused = |reason: &str, message: &str| {
        let body = json!({
            "verified": false,
            "paymentId": payment_id,
            "reason": reason,
            "message": message,
        });
        (StatusCode::FORBIDDEN, Json(body)).into_response()
    };
    let response = match orchestrator.status(&payment_id).await? {
        PaymentStatus::Expired => refused("expired", "Payment has expired"),
        PaymentStatus::Consumed => refused("consumed", "Payment already consumed"),
        // Relayed, unused and unexpired, yet the contract refuses it (paused).
        PaymentStatus::Valid => refused(
            "invalid",
            "Payment was relayed but the receiver contract does not accept it",
        ),
        PaymentStatus::NotFound => {
            let body = json!({
                "verified": false,
                "paymentId": payment_id,
                "message": "Payment not found or not yet relayed",
                "suggestion": "Wait a few more seconds for the cross-chain relay",
            });
            (StatusCode::OK, Json(body)).into_response()
        }
    };
    Ok(response)
}

/// `POST /consume/{paymentId}`: redeems a receipt for the priced resource.
#[instrument(skip_all)]
pub async fn post_consume(
    State(state): State<Arc<GatewayState>>,
    Path(payment_id): Path<String>,
) -> Result<Response, GatewayError> {
    let payment_id: PaymentId = payment_id.parse()?;
    let (transaction, receipt) = redeem(&state, &payment_id, state.pricing.resource).await?;
    let body = json!({
        "success": true,
        "message": "Payment consumed successfully",
        "paymentId": payment_id,
        "transaction": transaction,
        "resource": {
            "message": "Access granted",
            "data": {
                "content": "Premium content unlocked by a cross-chain payment",
                "timestamp": unix_now(),
                "paymentAmount": format_amount(receipt.amount),
            },
        },
    });
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// `GET /api/public`: free content.
#[instrument(skip_all)]
pub async fn get_public() -> impl IntoResponse {
    Json(json!({
        "message": "This is a public endpoint",
        "timestamp": unix_now(),
        "paid": false,
    }))
}

/// `GET /api/data`: content paid per request through the `X-Payment-Id` header.
#[instrument(skip_all)]
pub async fn get_data(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let price = state.pricing.data;
    let Some(header) = headers.get(PAYMENT_ID_HEADER) else {
        let body = json!({
            "error": "Payment Required",
            "message": "Please include the X-Payment-Id header",
            "price": price.to_string(),
            "priceFormatted": format_amount(price),
            "network": state.orchestrator.network(),
        });
        return Ok((StatusCode::PAYMENT_REQUIRED, Json(body)).into_response());
    };
    let Some(payment_id) = header
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse::<PaymentId>().ok())
    else {
        let body = json!({
            "error": "Invalid payment identifier",
            "message": "X-Payment-Id must be a 32-byte hex identifier",
        });
        return Ok((StatusCode::FORBIDDEN, Json(body)).into_response());
    };

    let (_, receipt) = redeem(&state, &payment_id, price).await?;
    let body = json!({
        "message": "Protected data endpoint",
        "data": {
            "paymentId": payment_id,
            "payer": receipt.payer,
            "timestamp": unix_now(),
            "source": "cross-chain-verified",
        },
        "paid": true,
    });
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// Checks that the receipt is redeemable and worth at least `price`, then
/// consumes it.
///
/// The pre-checks only produce friendlier refusals. Single use is enforced by
/// the consumption itself, so two racing requests still redeem at most once.
async fn redeem(
    state: &GatewayState,
    payment_id: &PaymentId,
    price: U256,
) -> Result<(TransactionResult, PaymentReceipt), GatewayError> {
    let orchestrator = &state.orchestrator;
    match orchestrator.status(payment_id).await? {
        PaymentStatus::NotFound => return Err(GatewayError::NotFound(*payment_id)),
        PaymentStatus::Expired => return Err(GatewayError::Expired(*payment_id)),
        PaymentStatus::Consumed => return Err(GatewayError::AlreadyConsumed(*payment_id)),
        PaymentStatus::Valid => {}
    }
    let receipt = orchestrator
        .get_receipt(payment_id)
        .await?
        .ok_or(GatewayError::NotFound(*payment_id))?;
    if receipt.amount < price {
        return Err(GatewayError::InsufficientAmount {
            required: format_amount(price),
            provided: format_amount(receipt.amount),
        });
    }
    let transaction = orchestrator.consume(payment_id).await?;
    tracing::info!(%payment_id, tx_hash = %transaction.hash, "Payment redeemed");
    Ok((transaction, receipt))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// `3600` → `"1h"`, `90061` → `"1d 1h 1m"`, `0` → `"never expires"`.
fn format_expiry(secs: u64) -> String {
    if secs == 0 {
        return "never expires".to_string();
    }
    let units = [
        (secs / 86_400, "d"),
        (secs % 86_400 / 3_600, "h"),
        (secs % 3_600 / 60, "m"),
    ];
    let parts: Vec<String> = units
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();
    if parts.is_empty() {
        format!("{secs}s")
    } else {
        parts.join(" ")
    }
}
