//! Receiver-side operations: observe and consume relayed payment receipts.

use alloy_primitives::Address;
use std::sync::Arc;
use tracing::instrument;

use crate::chain::evm::EvmReceiverContract;
use crate::chain::{ContractError, EvmChainProvider, RawReceipt, ReceiverContract};
use crate::encoding::{PaymentId, format_amount};
use crate::types::{
    PaidProbe, PaymentReceipt, PaymentStatus, PaymentVerification, ReceiverConfiguration,
    TransactionResult,
};
use crate::validator::ResolvedConfig;

#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    #[error("Failed to read receiver chain state: {0}")]
    Read(#[from] ContractError),
}

/// Why a consumption did not happen.
///
/// `AlreadyConsumed` and `Expired` are final for the identifier; retrying
/// cannot succeed.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConsumeError {
    #[error("Payment {0} already consumed")]
    AlreadyConsumed(PaymentId),
    #[error("Payment {0} expired")]
    Expired(PaymentId),
    #[error("Payment {0} not found")]
    NotFound(PaymentId),
    #[error("Consumption of payment {payment_id} reverted: {reason}")]
    Reverted { payment_id: PaymentId, reason: String },
    #[error("Consumption of payment {payment_id} failed: {source}")]
    Failed {
        payment_id: PaymentId,
        #[source]
        source: ContractError,
    },
}

impl ConsumeError {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsumeError::AlreadyConsumed(_) | ConsumeError::Expired(_)
        )
    }
}

/// Client of the receiver contract on the receiver chain.
#[derive(Clone)]
pub struct ReceiverClient {
    contract: Arc<dyn ReceiverContract>,
}

impl ReceiverClient {
    pub fn new(contract: Arc<dyn ReceiverContract>) -> Self {
        Self { contract }
    }

    /// Binds to the receiver contract of `config` through `provider`.
    ///
    /// `provider` must be connected to the receiver chain, see
    /// [`EvmChainProvider::connect_pair`].
    pub fn connect(config: &ResolvedConfig, provider: Arc<EvmChainProvider>) -> Self {
        let chain = &config.receiver_chain;
        let contract = EvmReceiverContract::new(provider, chain.contract, chain.gas_limit);
        tracing::info!(chain_id = chain.chain_id, contract = %chain.contract, "Receiver client initialized");
        Self::new(Arc::new(contract))
    }

    /// Whether a receipt exists, regardless of consumed or expired status.
    ///
    /// A failed read counts as "not paid". Use [`ReceiverClient::probe_paid`] to
    /// tell the two apart.
    pub async fn has_paid(&self, payment_id: &PaymentId) -> bool {
        self.probe_paid(payment_id).await.is_paid()
    }

    pub async fn probe_paid(&self, payment_id: &PaymentId) -> PaidProbe {
        match self.contract.has_paid(payment_id.as_b256()).await {
            Ok(true) => {
                tracing::info!(%payment_id, "Payment found");
                PaidProbe::Paid
            }
            Ok(false) => {
                tracing::debug!(%payment_id, "Payment not found");
                PaidProbe::NotPaid
            }
            Err(e) => {
                tracing::warn!(%payment_id, error = %e, "Failed to check payment status");
                PaidProbe::Unknown(e.to_string())
            }
        }
    }

    /// Full receipt, or `None` while the payment has not been relayed.
    #[instrument(skip_all, err, fields(payment_id = %payment_id))]
    pub async fn receipt(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<PaymentReceipt>, ReceiverError> {
        let raw = self.contract.receipt(payment_id.as_b256()).await?;
        let receipt = to_receipt(*payment_id, raw);
        match &receipt {
            Some(r) => tracing::info!(
                amount = %format_amount(r.amount),
                payer = %r.payer,
                consumed = r.consumed,
                "Receipt found"
            ),
            None => tracing::debug!("Receipt not found"),
        }
        Ok(receipt)
    }

    pub async fn is_consumed(&self, payment_id: &PaymentId) -> Result<bool, ReceiverError> {
        Ok(self.contract.is_consumed(payment_id.as_b256()).await?)
    }

    pub async fn is_expired(&self, payment_id: &PaymentId) -> Result<bool, ReceiverError> {
        Ok(self.contract.is_expired(payment_id.as_b256()).await?)
    }

    /// Existence and validity as judged by the contract, using chain time.
    pub async fn is_valid_payment(&self, payment_id: &PaymentId) -> Result<bool, ReceiverError> {
        Ok(self.contract.is_valid_payment(payment_id.as_b256()).await?)
    }

    /// Receipt together with the contract's validity verdict.
    #[instrument(skip_all, err, fields(payment_id = %payment_id))]
    pub async fn verify(
        &self,
        payment_id: &PaymentId,
    ) -> Result<PaymentVerification, ReceiverError> {
        let id = payment_id.as_b256();
        let (raw, valid) = tokio::try_join!(
            self.contract.receipt(id),
            self.contract.is_valid_payment(id)
        )?;
        let receipt = to_receipt(*payment_id, raw);
        Ok(PaymentVerification {
            is_valid: valid && receipt.is_some(),
            receipt,
        })
    }

    /// Lifecycle state derived from the receipt and the expiry check.
    pub async fn status(&self, payment_id: &PaymentId) -> Result<PaymentStatus, ReceiverError> {
        let Some(receipt) = self.receipt(payment_id).await? else {
            return Ok(PaymentStatus::NotFound);
        };
        if receipt.consumed {
            return Ok(PaymentStatus::Consumed);
        }
        if self.is_expired(payment_id).await? {
            return Ok(PaymentStatus::Expired);
        }
        Ok(PaymentStatus::Valid)
    }

    /// Marks the payment used. At most one call per identifier ever succeeds.
    #[instrument(skip_all, err, fields(payment_id = %payment_id))]
    pub async fn consume(&self, payment_id: &PaymentId) -> Result<TransactionResult, ConsumeError> {
        tracing::info!("Consuming payment");
        match self.contract.consume_payment(payment_id.as_b256()).await {
            Ok(result) => {
                tracing::info!(tx_hash = %result.hash, block = result.block_number, "Payment consumed");
                Ok(result)
            }
            Err(ContractError::Reverted {
                reason: Some(reason),
            }) => match classify_reason(*payment_id, &reason) {
                Some(classified) => Err(classified),
                None => Err(self.diagnose(payment_id, Some(reason), None).await),
            },
            Err(ContractError::Reverted { reason: None }) => {
                Err(self.diagnose(payment_id, None, None).await)
            }
            Err(e @ ContractError::Failed { .. }) => {
                Err(self.diagnose(payment_id, None, Some(e)).await)
            }
            Err(e @ ContractError::Transport(_)) => Err(ConsumeError::Failed {
                payment_id: *payment_id,
                source: e,
            }),
        }
    }

    /// Works out why a consumption was rejected when the revert did not say.
    async fn diagnose(
        &self,
        payment_id: &PaymentId,
        reason: Option<String>,
        failure: Option<ContractError>,
    ) -> ConsumeError {
        let id = payment_id.as_b256();
        let payment_id = *payment_id;
        if let Ok(true) = self.contract.is_consumed(id).await {
            return ConsumeError::AlreadyConsumed(payment_id);
        }
        if let Ok(true) = self.contract.is_expired(id).await {
            return ConsumeError::Expired(payment_id);
        }
        if let Ok(false) = self.contract.has_paid(id).await {
            return ConsumeError::NotFound(payment_id);
        }
        match failure {
            Some(source) => ConsumeError::Failed { payment_id, source },
            None => ConsumeError::Reverted {
                payment_id,
                reason: reason.unwrap_or_else(|| "no reason given".to_string()),
            },
        }
    }

    pub async fn configuration(&self) -> Result<ReceiverConfiguration, ReceiverError> {
        Ok(self.contract.configuration().await?)
    }
}

/// A zero payer is the contract's way of saying "no record".
fn to_receipt(payment_id: PaymentId, raw: RawReceipt) -> Option<PaymentReceipt> {
    if raw.payer == Address::ZERO {
        return None;
    }
    Some(PaymentReceipt {
        payment_id,
        amount: raw.amount,
        payer: raw.payer,
        timestamp: u64::try_from(raw.timestamp).unwrap_or(u64::MAX),
        consumed: raw.consumed,
    })
}

fn classify_reason(payment_id: PaymentId, reason: &str) -> Option<ConsumeError> {
    let reason = reason.to_ascii_lowercase();
    if reason.contains("already consumed") {
        Some(ConsumeError::AlreadyConsumed(payment_id))
    } else if reason.contains("expired") {
        Some(ConsumeError::Expired(payment_id))
    } else if reason.contains("not found") || reason.contains("does not exist") {
        Some(ConsumeError::NotFound(payment_id))
    } else {
        None
    }
}
