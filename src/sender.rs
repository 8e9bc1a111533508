//! Sender-side operations: bind a payment identifier to a value transfer.

use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::instrument;

use crate::chain::evm::EvmSenderContract;
use crate::chain::{ContractError, EvmChainProvider, SenderContract};
use crate::encoding::{PaymentId, format_amount};
use crate::types::{SenderConfiguration, TransactionResult};
use crate::validator::ResolvedConfig;

#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    /// Submission or confirmation failed. Never retried: resubmitting the same
    /// identifier could be taken for a duplicate of an already relayed payment.
    #[error("Payment failed: {0}")]
    PaymentFailed(#[source] ContractError),
    #[error("Failed to read sender chain state: {0}")]
    Read(#[source] ContractError),
}

/// Client of the sender contract on the sender chain.
#[derive(Clone)]
pub struct SenderClient {
    contract: Arc<dyn SenderContract>,
}

impl SenderClient {
    pub fn new(contract: Arc<dyn SenderContract>) -> Self {
        Self { contract }
    }

    /// Binds to the sender contract of `config` through `provider`.
    ///
    /// `provider` must be connected to the sender chain, see
    /// [`EvmChainProvider::connect_pair`].
    pub fn connect(config: &ResolvedConfig, provider: Arc<EvmChainProvider>) -> Self {
        let chain = &config.sender_chain;
        let contract = EvmSenderContract::new(provider, chain.contract, chain.gas_limit);
        tracing::info!(chain_id = chain.chain_id, contract = %chain.contract, "Sender client initialized");
        Self::new(Arc::new(contract))
    }

    /// Address paying for [`SenderClient::send_payment`].
    pub fn address(&self) -> Address {
        self.contract.signer_address()
    }

    /// Sends `amount` base units tagged with `payment_id` and waits for confirmation.
    #[instrument(skip_all, err, fields(payment_id = %payment_id, amount = %amount))]
    pub async fn send_payment(
        &self,
        payment_id: &PaymentId,
        amount: U256,
    ) -> Result<TransactionResult, SenderError> {
        tracing::info!(amount = %format_amount(amount), "Sending payment");
        let result = self
            .contract
            .send_payment(payment_id.as_b256(), amount)
            .await
            .map_err(SenderError::PaymentFailed)?;
        tracing::info!(tx_hash = %result.hash, block = result.block_number, "Payment sent");
        Ok(result)
    }

    /// Spendable balance of the signer, in base units.
    pub async fn balance(&self) -> Result<U256, SenderError> {
        let balance = self
            .contract
            .signer_balance()
            .await
            .map_err(SenderError::Read)?;
        tracing::debug!(balance = %format_amount(balance), "Wallet balance");
        Ok(balance)
    }

    /// Funds held by the sender contract.
    pub async fn contract_balance(&self) -> Result<U256, SenderError> {
        self.contract
            .contract_balance()
            .await
            .map_err(SenderError::Read)
    }

    pub async fn configuration(&self) -> Result<SenderConfiguration, SenderError> {
        self.contract.configuration().await.map_err(SenderError::Read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::{MemoryLedger, PAYER};

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(1_000_000_000_000_000_000u128)
    }

    #[tokio::test]
    async fn test_send_payment_debits_balance() {
        let ledger = Arc::new(MemoryLedger::with_balance(ether(5)));
        let client = SenderClient::new(ledger.clone());
        let result = client
            .send_payment(&PaymentId::generate(), ether(2))
            .await
            .unwrap();
        assert!(result.status);
        assert_eq!(client.balance().await.unwrap(), ether(3));
        assert_eq!(client.contract_balance().await.unwrap(), ether(2));
        assert_eq!(client.address(), PAYER);
    }

    #[tokio::test]
    async fn test_submission_failure_is_payment_failed() {
        let ledger = Arc::new(MemoryLedger::with_balance(ether(5)));
        ledger.set_sends_failing(true);
        let client = SenderClient::new(ledger.clone());
        let err = client
            .send_payment(&PaymentId::generate(), ether(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SenderError::PaymentFailed(_)));
        assert_eq!(ledger.sent(), 0);
    }

    #[tokio::test]
    async fn test_configuration_is_read() {
        let client = SenderClient::new(Arc::new(MemoryLedger::default()));
        let config = client.configuration().await.unwrap();
        assert!(!config.paused);
        assert_eq!(config.default_gas_limit, U256::from(500_000u64));
    }
}
