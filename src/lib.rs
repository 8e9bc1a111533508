//! Cross-chain payment receipts for EVM chains joined by a message relay.
//!
//! A payer sends value on a *sender chain*, tagged with a 32-byte payment
//! identifier. The sender contract forwards a receipt through the relay to a
//! *receiver chain*, where a service can check that the payment exists, is
//! unexpired and unconsumed, and then consume it exactly once.
//!
//! # Overview
//!
//! ```text
//! pay ──► Sent ──(relay)──► Valid ──consume──► Consumed
//!                             └──(expiry window)──► Expired
//! ```
//!
//! The relay delay is not under the client's control: [`orchestrator`] bridges
//! it with bounded polling of the receiver chain.
//!
//! # Modules
//!
//! - [`config`] - Client and gateway configuration, `$VAR` references, network presets.
//! - [`validator`] - Checks a [`config::ClientConfig`] and resolves it into typed values.
//! - [`encoding`] - Payment identifiers, amount and chain-id conversions.
//! - [`types`] - Receipts, verification results and lifecycle states.
//! - [`chain`] - Contract boundary traits and their alloy-backed implementations.
//! - [`sender`] - Sends payments on the sender chain.
//! - [`receiver`] - Reads and consumes receipts on the receiver chain.
//! - [`orchestrator`] - [`orchestrator::PaymentOrchestrator`], the integrator-facing API.
//! - [`gateway`] - HTTP 402 gateway routes over the orchestrator.
//! - [`util`] - Telemetry and signal handling for the gateway binary.
//!
//! # Example
//!
//! ```no_run
//! use relaypay::config::{ClientConfig, Preset, SigningKey};
//! use relaypay::encoding::parse_amount;
//! use relaypay::orchestrator::PaymentOrchestrator;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let key = SigningKey::new(std::env::var("PRIVATE_KEY")?);
//! let config = ClientConfig::from_preset(Preset::Local, key);
//! let payments = PaymentOrchestrator::connect(&config)?;
//!
//! let payment_id = payments.pay_and_wait(parse_amount("0.01")?).await?;
//! payments.consume(&payment_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod encoding;
pub mod gateway;
pub mod orchestrator;
pub mod receiver;
pub mod sender;
pub mod types;
pub mod util;
pub mod validator;
