//! Alloy-backed implementations of the contract boundary.
//!
//! Reads go through `eth_call` on the generated `#[sol(rpc)]` instances.
//! `consumePayment` is simulated before it is sent, so a revert is reported
//! with its reason instead of as an anonymous failed transaction.

use alloy_contract::Error as AlloyContractError;
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Instrument, instrument};

use crate::chain::contracts::{IPaymentReceiver, IPaymentSender};
use crate::chain::provider::{
    ContractTransaction, EvmChainProvider, InnerProvider, contract_error_from_transport,
};
use crate::chain::{
    CONSUME_PAYMENT_GAS_LIMIT, ContractError, RawReceipt, ReceiverContract, SEND_PAYMENT_GAS_LIMIT,
    SenderContract,
};
use crate::types::{ReceiverConfiguration, SenderConfiguration, TransactionResult};

fn contract_error(error: AlloyContractError) -> ContractError {
    match error {
        AlloyContractError::TransportError(e) => contract_error_from_transport(e),
        other => ContractError::Transport(other.to_string()),
    }
}

/// The sender contract reached through an [`EvmChainProvider`].
#[derive(Debug, Clone)]
pub struct EvmSenderContract {
    provider: Arc<EvmChainProvider>,
    address: Address,
    gas_limit: u64,
}

impl EvmSenderContract {
    pub fn new(provider: Arc<EvmChainProvider>, address: Address, gas_limit: Option<u64>) -> Self {
        Self {
            provider,
            address,
            gas_limit: gas_limit.unwrap_or(SEND_PAYMENT_GAS_LIMIT),
        }
    }

    fn instance(&self) -> IPaymentSender::IPaymentSenderInstance<&InnerProvider> {
        IPaymentSender::new(self.address, self.provider.inner())
    }
}

#[async_trait]
impl SenderContract for EvmSenderContract {
    fn signer_address(&self) -> Address {
        self.provider.signer_address()
    }

    #[instrument(skip_all, err, fields(payment_id = %payment_id, amount = %amount, contract = %self.address))]
    async fn send_payment(
        &self,
        payment_id: B256,
        amount: U256,
    ) -> Result<TransactionResult, ContractError> {
        let calldata = IPaymentSender::sendPaymentCall {
            paymentId: payment_id,
        }
        .abi_encode();
        let receipt = self
            .provider
            .send_transaction(ContractTransaction {
                to: self.address,
                calldata: calldata.into(),
                value: amount,
                gas_limit: self.gas_limit,
            })
            .await?;
        Ok(TransactionResult::from(&receipt))
    }

    async fn signer_balance(&self) -> Result<U256, ContractError> {
        self.provider
            .balance_of(self.provider.signer_address())
            .await
    }

    async fn contract_balance(&self) -> Result<U256, ContractError> {
        self.instance()
            .getBalance()
            .call()
            .into_future()
            .instrument(tracing::info_span!("call_getBalance", contract = %self.address, otel.kind = "client"))
            .await
            .map_err(contract_error)
    }

    #[instrument(skip_all, err, fields(contract = %self.address))]
    async fn configuration(&self) -> Result<SenderConfiguration, ContractError> {
        let contract = self.instance();
        let remote_blockchain_id = contract.remoteBlockchainId();
        let remote_receiver = contract.remoteReceiver();
        let messenger = contract.MESSENGER();
        let owner = contract.owner();
        let paused = contract.paused();
        let default_gas_limit = contract.defaultGasLimit();
        let message_gas_limit = contract.messageGasLimit();
        let (
            remote_blockchain_id,
            remote_receiver,
            messenger,
            owner,
            paused,
            default_gas_limit,
            message_gas_limit,
        ) = tokio::try_join!(
            remote_blockchain_id.call().into_future(),
            remote_receiver.call().into_future(),
            messenger.call().into_future(),
            owner.call().into_future(),
            paused.call().into_future(),
            default_gas_limit.call().into_future(),
            message_gas_limit.call().into_future(),
        )
        .map_err(contract_error)?;
        Ok(SenderConfiguration {
            remote_blockchain_id,
            remote_receiver,
            messenger,
            owner,
            paused,
            default_gas_limit,
            message_gas_limit,
        })
    }
}

/// The receiver contract reached through an [`EvmChainProvider`].
#[derive(Debug, Clone)]
pub struct EvmReceiverContract {
    provider: Arc<EvmChainProvider>,
    address: Address,
    gas_limit: u64,
}

impl EvmReceiverContract {
    pub fn new(provider: Arc<EvmChainProvider>, address: Address, gas_limit: Option<u64>) -> Self {
        Self {
            provider,
            address,
            gas_limit: gas_limit.unwrap_or(CONSUME_PAYMENT_GAS_LIMIT),
        }
    }

    fn instance(&self) -> IPaymentReceiver::IPaymentReceiverInstance<&InnerProvider> {
        IPaymentReceiver::new(self.address, self.provider.inner())
    }
}

#[async_trait]
impl ReceiverContract for EvmReceiverContract {
    async fn has_paid(&self, payment_id: B256) -> Result<bool, ContractError> {
        self.instance()
            .hasPaid(payment_id)
            .call()
            .into_future()
            .instrument(tracing::info_span!("call_hasPaid", %payment_id, contract = %self.address, otel.kind = "client"))
            .await
            .map_err(contract_error)
    }

    async fn receipt(&self, payment_id: B256) -> Result<RawReceipt, ContractError> {
        let receipt = self
            .instance()
            .getReceipt(payment_id)
            .call()
            .into_future()
            .instrument(tracing::info_span!("call_getReceipt", %payment_id, contract = %self.address, otel.kind = "client"))
            .await
            .map_err(contract_error)?;
        Ok(RawReceipt {
            payment_id: receipt.paymentId,
            amount: receipt.amount,
            payer: receipt.payer,
            timestamp: receipt.timestamp,
            consumed: receipt.consumed,
        })
    }

    async fn is_consumed(&self, payment_id: B256) -> Result<bool, ContractError> {
        self.instance()
            .isConsumed(payment_id)
            .call()
            .into_future()
            .instrument(tracing::info_span!("call_isConsumed", %payment_id, contract = %self.address, otel.kind = "client"))
            .await
            .map_err(contract_error)
    }

    async fn is_expired(&self, payment_id: B256) -> Result<bool, ContractError> {
        self.instance()
            .isExpired(payment_id)
            .call()
            .into_future()
            .instrument(tracing::info_span!("call_isExpired", %payment_id, contract = %self.address, otel.kind = "client"))
            .await
            .map_err(contract_error)
    }

    async fn is_valid_payment(&self, payment_id: B256) -> Result<bool, ContractError> {
        self.instance()
            .isValidPayment(payment_id)
            .call()
            .into_future()
            .instrument(tracing::info_span!("call_isValidPayment", %payment_id, contract = %self.address, otel.kind = "client"))
            .await
            .map_err(contract_error)
    }

    #[instrument(skip_all, err, fields(payment_id = %payment_id, contract = %self.address))]
    async fn consume_payment(&self, payment_id: B256) -> Result<TransactionResult, ContractError> {
        // Simulate first so a revert comes back with its reason.
        self.instance()
            .consumePayment(payment_id)
            .from(self.provider.signer_address())
            .call()
            .into_future()
            .instrument(tracing::info_span!("simulate_consumePayment", %payment_id, otel.kind = "client"))
            .await
            .map_err(contract_error)?;

        let calldata = IPaymentReceiver::consumePaymentCall {
            paymentId: payment_id,
        }
        .abi_encode();
        let receipt = self
            .provider
            .send_transaction(ContractTransaction {
                to: self.address,
                calldata: calldata.into(),
                value: U256::ZERO,
                gas_limit: self.gas_limit,
            })
            .await?;
        Ok(TransactionResult::from(&receipt))
    }

    #[instrument(skip_all, err, fields(contract = %self.address))]
    async fn configuration(&self) -> Result<ReceiverConfiguration, ContractError> {
        let contract = self.instance();
        let approved_sender = contract.approvedSender();
        let approved_source_blockchain_id = contract.approvedSourceBlockchainId();
        let messenger = contract.MESSENGER();
        let owner = contract.owner();
        let paused = contract.paused();
        let required_payment_amount = contract.requiredPaymentAmount();
        let payment_expiry_time = contract.paymentExpiryTime();
        let (
            approved_sender,
            approved_source_blockchain_id,
            messenger,
            owner,
            paused,
            required_payment_amount,
            payment_expiry_time,
        ) = tokio::try_join!(
            approved_sender.call().into_future(),
            approved_source_blockchain_id.call().into_future(),
            messenger.call().into_future(),
            owner.call().into_future(),
            paused.call().into_future(),
            required_payment_amount.call().into_future(),
            payment_expiry_time.call().into_future(),
        )
        .map_err(contract_error)?;
        Ok(ReceiverConfiguration {
            approved_sender,
            approved_source_blockchain_id,
            messenger,
            owner,
            paused,
            required_payment_amount,
            payment_expiry_time,
        })
    }
}
