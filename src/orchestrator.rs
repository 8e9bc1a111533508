//! Payment lifecycle facade: pay on the sender chain, observe and consume on
//! the receiver chain, and bridge the relay delay with bounded polling.
//!
//! ```text
//! pay ──► Sent ──(relay, observed by polling)──► Valid ──consume──► Consumed
//!                                                  └──(expiry window)──► Expired
//! ```

use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

use crate::chain::EvmChainProvider;
use crate::config::ClientConfig;
use crate::encoding::{PaymentId, format_amount};
use crate::receiver::{ConsumeError, ReceiverClient, ReceiverError};
use crate::sender::{SenderClient, SenderError};
use crate::types::{
    PaidProbe, PaymentReceipt, PaymentStatus, PaymentVerification, ReceiverConfiguration,
    SenderConfiguration, TransactionResult,
};
use crate::validator::{ConfigError, ResolvedChain, ResolvedConfig, validate};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);
/// Floor for the poll interval, so a zero interval still yields between probes.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long and how often to poll the receiver chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn from_millis(timeout_ms: u64, interval_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            interval: Duration::from_millis(interval_ms),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Insufficient balance: payment needs {required} but signer holds {available}")]
    InsufficientBalance { required: String, available: String },
    #[error(transparent)]
    Sender(#[from] SenderError),
    #[error(transparent)]
    Receiver(#[from] ReceiverError),
    #[error(transparent)]
    Consume(#[from] ConsumeError),
    /// The receiver chain answered, but the payment did not show up in time.
    #[error("Payment {payment_id} not verified within {timeout:?}")]
    Timeout {
        payment_id: PaymentId,
        timeout: Duration,
    },
    /// No probe could determine the payment state before the deadline.
    #[error("Payment {payment_id} could not be verified within {timeout:?}, receiver chain unreachable: {last_error}")]
    Unreachable {
        payment_id: PaymentId,
        timeout: Duration,
        last_error: String,
    },
}

/// Public coordinates of one side of the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub chain_id: u64,
    pub blockchain_id: B256,
    pub contract: Address,
}

impl From<&ResolvedChain> for ChainInfo {
    fn from(chain: &ResolvedChain) -> Self {
        Self {
            chain_id: chain.chain_id,
            blockchain_id: chain.blockchain_id,
            contract: chain.contract,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub sender: ChainInfo,
    pub receiver: ChainInfo,
    pub same_chain_mode: bool,
}

impl From<&ResolvedConfig> for NetworkInfo {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            sender: ChainInfo::from(&config.sender_chain),
            receiver: ChainInfo::from(&config.receiver_chain),
            same_chain_mode: config.same_chain_mode,
        }
    }
}

/// Integrator-facing payment API.
///
/// Operations run one at a time per call site; nothing is fanned out
/// internally. The signing key is held by the clients for the lifetime of the
/// orchestrator.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    sender: SenderClient,
    receiver: ReceiverClient,
    network: NetworkInfo,
}

impl PaymentOrchestrator {
    pub fn new(sender: SenderClient, receiver: ReceiverClient, network: NetworkInfo) -> Self {
        Self {
            sender,
            receiver,
            network,
        }
    }

    /// Validates `config` and connects to both chains.
    pub fn connect(config: &ClientConfig) -> Result<Self, OrchestratorError> {
        let resolved = validate(config)?;
        let (sender_provider, receiver_provider) = EvmChainProvider::connect_pair(&resolved);
        let sender = SenderClient::connect(&resolved, sender_provider);
        let receiver = ReceiverClient::connect(&resolved, receiver_provider);
        tracing::info!(
            sender_chain = resolved.sender_chain.chain_id,
            receiver_chain = resolved.receiver_chain.chain_id,
            same_chain_mode = resolved.same_chain_mode,
            "Payment orchestrator initialized"
        );
        Ok(Self::new(sender, receiver, NetworkInfo::from(&resolved)))
    }

    pub fn network(&self) -> &NetworkInfo {
        &self.network
    }

    /// Sends `amount` base units and returns the identifier once the sender
    /// chain confirmed it. Does not wait for the relay.
    ///
    /// Generates a random identifier when `payment_id` is `None`. The balance is
    /// checked before anything is submitted.
    #[instrument(skip_all, err, fields(amount = %amount))]
    pub async fn pay(
        &self,
        amount: U256,
        payment_id: Option<PaymentId>,
    ) -> Result<PaymentId, OrchestratorError> {
        let payment_id = payment_id.unwrap_or_else(PaymentId::generate);
        tracing::info!(%payment_id, "Initiating payment");
        let available = self.sender.balance().await?;
        if available < amount {
            return Err(OrchestratorError::InsufficientBalance {
                required: format_amount(amount),
                available: format_amount(available),
            });
        }
        self.sender.send_payment(&payment_id, amount).await?;
        Ok(payment_id)
    }

    /// Whether the payment has been relayed at all. Not a validity check.
    pub async fn verify(&self, payment_id: &PaymentId) -> bool {
        tracing::info!(%payment_id, "Verifying payment");
        self.receiver.has_paid(payment_id).await
    }

    /// Validity-aware check: relayed, unconsumed and unexpired.
    pub async fn get_verification(
        &self,
        payment_id: &PaymentId,
    ) -> Result<PaymentVerification, OrchestratorError> {
        Ok(self.receiver.verify(payment_id).await?)
    }

    pub async fn get_receipt(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<PaymentReceipt>, OrchestratorError> {
        Ok(self.receiver.receipt(payment_id).await?)
    }

    pub async fn consume(
        &self,
        payment_id: &PaymentId,
    ) -> Result<TransactionResult, OrchestratorError> {
        Ok(self.receiver.consume(payment_id).await?)
    }

    pub async fn status(&self, payment_id: &PaymentId) -> Result<PaymentStatus, OrchestratorError> {
        Ok(self.receiver.status(payment_id).await?)
    }

    /// [`PaymentOrchestrator::pay_and_wait_with`] with a 60 s timeout and 2 s interval.
    pub async fn pay_and_wait(&self, amount: U256) -> Result<PaymentId, OrchestratorError> {
        self.pay_and_wait_with(amount, PollPolicy::default()).await
    }

    /// Pays, then polls until the payment is relayed or `policy.timeout` has
    /// passed since this call started.
    #[instrument(skip_all, err, fields(amount = %amount, timeout = ?policy.timeout, interval = ?policy.interval))]
    pub async fn pay_and_wait_with(
        &self,
        amount: U256,
        policy: PollPolicy,
    ) -> Result<PaymentId, OrchestratorError> {
        let started = Instant::now();
        let payment_id = self.pay(amount, None).await?;
        self.poll_until_paid(&payment_id, started, policy).await?;
        Ok(payment_id)
    }

    /// Polls for an already-sent payment, with the deadline measured from now.
    pub async fn wait_for(
        &self,
        payment_id: &PaymentId,
        policy: PollPolicy,
    ) -> Result<(), OrchestratorError> {
        self.poll_until_paid(payment_id, Instant::now(), policy).await
    }

    async fn poll_until_paid(
        &self,
        payment_id: &PaymentId,
        started: Instant,
        policy: PollPolicy,
    ) -> Result<(), OrchestratorError> {
        let deadline = started + policy.timeout;
        let interval = policy.interval.max(MIN_POLL_INTERVAL);
        let mut answered = false;
        let mut last_error = None;
        tracing::info!(%payment_id, timeout = ?policy.timeout, "Waiting for cross-chain verification");

        loop {
            match self.receiver.probe_paid(payment_id).await {
                PaidProbe::Paid => {
                    tracing::info!(%payment_id, elapsed = ?started.elapsed(), "Payment verified");
                    return Ok(());
                }
                PaidProbe::NotPaid => answered = true,
                PaidProbe::Unknown(error) => last_error = Some(error),
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }

        if answered {
            Err(OrchestratorError::Timeout {
                payment_id: *payment_id,
                timeout: policy.timeout,
            })
        } else {
            Err(OrchestratorError::Unreachable {
                payment_id: *payment_id,
                timeout: policy.timeout,
                last_error: last_error.unwrap_or_default(),
            })
        }
    }

    pub async fn sender_balance(&self) -> Result<U256, OrchestratorError> {
        Ok(self.sender.balance().await?)
    }

    /// Funds held by the sender contract.
    pub async fn sender_contract_balance(&self) -> Result<U256, OrchestratorError> {
        Ok(self.sender.contract_balance().await?)
    }

    pub fn sender_address(&self) -> Address {
        self.sender.address()
    }

    pub async fn sender_configuration(&self) -> Result<SenderConfiguration, OrchestratorError> {
        Ok(self.sender.configuration().await?)
    }

    pub async fn receiver_configuration(
        &self,
    ) -> Result<ReceiverConfiguration, OrchestratorError> {
        Ok(self.receiver.configuration().await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chain::memory::{EXPIRY_WINDOW_SECS, MemoryLedger};
    use std::sync::Arc;

    pub fn one_ether() -> U256 {
        U256::from(1_000_000_000_000_000_000u128)
    }

    pub fn orchestrator(ledger: &Arc<MemoryLedger>) -> PaymentOrchestrator {
        let network = NetworkInfo {
            sender: ChainInfo {
                chain_id: 1001,
                blockchain_id: B256::repeat_byte(0x11),
                contract: Address::repeat_byte(0x44),
            },
            receiver: ChainInfo {
                chain_id: 1002,
                blockchain_id: B256::repeat_byte(0x22),
                contract: Address::repeat_byte(0x55),
            },
            same_chain_mode: false,
        };
        PaymentOrchestrator::new(
            SenderClient::new(ledger.clone()),
            ReceiverClient::new(ledger.clone()),
            network,
        )
    }

    fn setup() -> (Arc<MemoryLedger>, PaymentOrchestrator) {
        let ledger = Arc::new(MemoryLedger::with_balance(one_ether() * U256::from(10)));
        let orchestrator = orchestrator(&ledger);
        (ledger, orchestrator)
    }

    #[tokio::test]
    async fn test_happy_path() {
        let (ledger, orchestrator) = setup();
        let id = orchestrator.pay(one_ether(), None).await.unwrap();
        assert!(!orchestrator.verify(&id).await);

        ledger.relay_all();
        assert!(orchestrator.verify(&id).await);
        let receipt = orchestrator.get_receipt(&id).await.unwrap().unwrap();
        assert_eq!(receipt.amount, one_ether());
        assert!(!receipt.consumed);
        assert!(orchestrator.get_verification(&id).await.unwrap().is_valid);

        let tx = orchestrator.consume(&id).await.unwrap();
        assert!(tx.status);
        assert!(!orchestrator.get_verification(&id).await.unwrap().is_valid);
        assert!(orchestrator.get_receipt(&id).await.unwrap().unwrap().consumed);
        assert_eq!(
            orchestrator.status(&id).await.unwrap(),
            PaymentStatus::Consumed
        );
    }

    #[tokio::test]
    async fn test_replay_is_rejected() {
        let (ledger, orchestrator) = setup();
        let id = orchestrator.pay(one_ether(), None).await.unwrap();
        ledger.relay_all();
        orchestrator.consume(&id).await.unwrap();

        let err = orchestrator.consume(&id).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Consume(ConsumeError::AlreadyConsumed(p)) if p == id
        ));
        assert!(orchestrator.get_receipt(&id).await.unwrap().unwrap().consumed);
    }

    #[tokio::test]
    async fn test_validity_never_returns_after_expiry() {
        let (ledger, orchestrator) = setup();
        let id = orchestrator.pay(one_ether(), None).await.unwrap();
        ledger.relay_all();
        ledger.advance_time(EXPIRY_WINDOW_SECS + 1);

        assert!(orchestrator.verify(&id).await);
        assert!(!orchestrator.get_verification(&id).await.unwrap().is_valid);
        assert!(matches!(
            orchestrator.consume(&id).await.unwrap_err(),
            OrchestratorError::Consume(ConsumeError::Expired(_))
        ));
        ledger.advance_time(1);
        assert!(!orchestrator.get_verification(&id).await.unwrap().is_valid);
    }

    #[tokio::test]
    async fn test_custom_identifier_is_kept() {
        let (_, orchestrator) = setup();
        let custom = PaymentId::from(B256::repeat_byte(0xab));
        let id = orchestrator.pay(one_ether(), Some(custom)).await.unwrap();
        assert_eq!(id, custom);
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_detected_before_submission() {
        let (ledger, orchestrator) = setup();
        let err = orchestrator
            .pay(one_ether() * U256::from(11), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InsufficientBalance { .. }));
        assert_eq!(ledger.sent(), 0);
        assert_eq!(ledger.balance(), one_ether() * U256::from(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pay_and_wait_returns_once_relayed() {
        let (ledger, orchestrator) = setup();
        ledger.relay_after_probes(3);
        let started = Instant::now();
        let id = orchestrator
            .pay_and_wait_with(one_ether(), PollPolicy::from_millis(60_000, 2_000))
            .await
            .unwrap();
        assert!(orchestrator.verify(&id).await);
        assert_eq!(started.elapsed(), Duration::from_millis(4_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pay_and_wait_times_out_within_bound() {
        let (_, orchestrator) = setup();
        let policy = PollPolicy::from_millis(5_000, 2_000);
        let started = Instant::now();
        let err = orchestrator
            .pay_and_wait_with(one_ether(), policy)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();
        assert!(matches!(err, OrchestratorError::Timeout { .. }));
        assert!(elapsed >= policy.timeout);
        assert!(elapsed <= policy.timeout + policy.interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_receiver_is_distinguished_from_timeout() {
        let (ledger, orchestrator) = setup();
        ledger.set_reads_failing(true);
        let err = orchestrator
            .pay_and_wait_with(one_ether(), PollPolicy::from_millis(3_000, 1_000))
            .await
            .unwrap_err();
        match err {
            OrchestratorError::Unreachable { last_error, .. } => {
                assert!(last_error.contains("connection refused"))
            }
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_sleeps_between_probes() {
        let (ledger, orchestrator) = setup();
        let id = orchestrator.pay(one_ether(), None).await.unwrap();
        let _ = orchestrator
            .wait_for(&id, PollPolicy::from_millis(10_000, 2_000))
            .await;
        // Probes at 0, 2, 4, 6, 8 and 10 seconds.
        assert_eq!(ledger.probes(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_does_not_spin() {
        let (ledger, orchestrator) = setup();
        let id = orchestrator.pay(one_ether(), None).await.unwrap();
        let _ = orchestrator
            .wait_for(&id, PollPolicy::from_millis(100, 0))
            .await;
        assert!(ledger.probes() <= 11);
    }

    #[tokio::test]
    async fn test_diagnostics_pass_through() {
        let (_, orchestrator) = setup();
        assert_eq!(
            orchestrator.sender_balance().await.unwrap(),
            one_ether() * U256::from(10)
        );
        assert!(!orchestrator.sender_configuration().await.unwrap().paused);
        assert_eq!(
            orchestrator
                .receiver_configuration()
                .await
                .unwrap()
                .payment_expiry_time,
            U256::from(EXPIRY_WINDOW_SECS)
        );
        assert_eq!(
            orchestrator.sender_address(),
            crate::chain::memory::PAYER
        );
    }
}
