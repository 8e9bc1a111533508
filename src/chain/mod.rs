//! The boundary between the payment clients and the two contracts.
//!
//! [`SenderContract`] and [`ReceiverContract`] describe the fixed method set
//! each contract exposes. The alloy-backed implementations live in [`evm`];
//! tests swap in an in-memory ledger.

pub mod contracts;
pub mod evm;
pub mod pending_nonce_manager;
pub mod provider;

#[cfg(test)]
pub mod memory;
#[cfg(test)]
pub mod rpc_mock;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::types::{ReceiverConfiguration, SenderConfiguration, TransactionResult};

pub use pending_nonce_manager::PendingNonceManager;
pub use provider::{EvmChainProvider, SignerNonces};

/// Gas limit for `sendPayment`; the call pays for the outbound relay message.
pub const SEND_PAYMENT_GAS_LIMIT: u64 = 500_000;
/// Gas limit for `consumePayment`.
pub const CONSUME_PAYMENT_GAS_LIMIT: u64 = 200_000;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// RPC unreachable, malformed response, receipt wait timed out.
    #[error("Contract call failed: {0}")]
    Transport(String),
    /// Rejected by the contract before inclusion, with the decoded reason if any.
    #[error("Contract call reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Reverted { reason: Option<String> },
    /// Included in a block with a failed status.
    #[error("Transaction {hash} failed on-chain")]
    Failed { hash: B256 },
}

/// Raw `getReceipt` response. A zero `payer` means no record exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawReceipt {
    pub payment_id: B256,
    pub amount: U256,
    pub payer: Address,
    pub timestamp: U256,
    pub consumed: bool,
}

/// Sender-chain payment contract.
#[async_trait]
pub trait SenderContract: Send + Sync {
    /// Address whose funds pay for `send_payment`.
    fn signer_address(&self) -> Address;

    /// Calls `sendPayment(paymentId)` with `amount` attached and waits for confirmation.
    async fn send_payment(
        &self,
        payment_id: B256,
        amount: U256,
    ) -> Result<TransactionResult, ContractError>;

    /// Spendable native balance of [`Self::signer_address`].
    async fn signer_balance(&self) -> Result<U256, ContractError>;

    /// Funds held by the contract itself.
    async fn contract_balance(&self) -> Result<U256, ContractError>;

    async fn configuration(&self) -> Result<SenderConfiguration, ContractError>;
}

/// Receiver-chain receipt contract.
#[async_trait]
pub trait ReceiverContract: Send + Sync {
    async fn has_paid(&self, payment_id: B256) -> Result<bool, ContractError>;

    async fn receipt(&self, payment_id: B256) -> Result<RawReceipt, ContractError>;

    async fn is_consumed(&self, payment_id: B256) -> Result<bool, ContractError>;

    async fn is_expired(&self, payment_id: B256) -> Result<bool, ContractError>;

    /// Exists, unconsumed and unexpired, evaluated with chain time.
    async fn is_valid_payment(&self, payment_id: B256) -> Result<bool, ContractError>;

    /// Calls `consumePayment(paymentId)` and waits for confirmation.
    async fn consume_payment(&self, payment_id: B256) -> Result<TransactionResult, ContractError>;

    async fn configuration(&self) -> Result<ReceiverConfiguration, ContractError>;
}
