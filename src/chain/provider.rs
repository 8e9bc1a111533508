use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy_provider::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{TransactionReceipt, TransactionRequest};
use alloy_signer::Signer;
use alloy_sol_types::{Revert, SolError};
use alloy_transport::TransportError;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tracing::Instrument;

use crate::chain::{ContractError, PendingNonceManager};
use crate::validator::{ResolvedChain, ResolvedConfig, SecretKey};

/// Combined filler type for gas, blob gas, nonce, and chain ID.
pub type InnerFiller = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<PendingNonceManager>, ChainIdFiller>>,
>;

/// Provider with gas, nonce, chain id and wallet fillers over a throttled HTTP transport.
pub type InnerProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

/// A state-changing call to one of the payment contracts.
#[derive(Debug, Clone)]
pub struct ContractTransaction {
    pub to: Address,
    pub calldata: Bytes,
    /// Native value attached to the call.
    pub value: U256,
    pub gas_limit: u64,
}

/// Nonce cache and submission lock of one signer on one chain.
///
/// Every provider that signs with the same key on the same chain must hold a
/// clone of the same `SignerNonces`, or one provider's cache misses the nonces
/// the other one used. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct SignerNonces {
    nonce_manager: PendingNonceManager,
    submissions: Arc<Mutex<()>>,
}

impl SignerNonces {
    pub fn nonce_manager(&self) -> &PendingNonceManager {
        &self.nonce_manager
    }
}

/// One connection to one chain, signing with the client's key.
///
/// Submissions sharing a [`SignerNonces`] are serialized: a transaction is sent
/// and confirmed before the next one allocates a nonce.
#[derive(Debug)]
pub struct EvmChainProvider {
    chain_id: u64,
    signer_address: Address,
    receipt_timeout: Duration,
    confirmations: u64,
    inner: InnerProvider,
    nonces: SignerNonces,
}

impl EvmChainProvider {
    pub fn new(chain: &ResolvedChain, signing_key: &SecretKey) -> Self {
        Self::with_nonces(chain, signing_key, SignerNonces::default())
    }

    /// Providers for the sender and the receiver chain of `config`.
    ///
    /// When both sides are the same chain (same-chain development mode) the two
    /// providers share their [`SignerNonces`], so a consumption and the next
    /// payment never allocate the same nonce.
    pub fn connect_pair(config: &ResolvedConfig) -> (Arc<Self>, Arc<Self>) {
        let key = &config.signing_key;
        let sender = Self::new(&config.sender_chain, key);
        let receiver_nonces = if config.sender_chain.chain_id == config.receiver_chain.chain_id {
            tracing::info!(
                chain_id = config.sender_chain.chain_id,
                "Sender and receiver share a chain, sharing the signer nonce cache"
            );
            sender.nonces.clone()
        } else {
            SignerNonces::default()
        };
        let receiver = Self::with_nonces(&config.receiver_chain, key, receiver_nonces);
        (Arc::new(sender), Arc::new(receiver))
    }

    pub fn with_nonces(chain: &ResolvedChain, signing_key: &SecretKey, nonces: SignerNonces) -> Self {
        let signer = signing_key.signer().with_chain_id(Some(chain.chain_id));
        let signer_address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let rate_limit = chain.rate_limit.unwrap_or(u32::MAX);
        tracing::info!(role = %chain.role, chain_id = chain.chain_id, rpc_url = %chain.rpc, rate_limit = ?chain.rate_limit, "Using HTTP transport");
        let transport = ServiceBuilder::new()
            .layer(ThrottleLayer::new(rate_limit))
            .service(Http::new(chain.rpc.clone()));
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(NonZeroUsize::MIN))
            .service(vec![transport]);
        let client = RpcClient::new(fallback, false);

        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(nonces.nonce_manager.clone()),
                    ChainIdFiller::default(),
                ),
            ),
        );
        let inner: InnerProvider = ProviderBuilder::default()
            .filler(filler)
            .wallet(wallet)
            .connect_client(client);

        tracing::info!(role = %chain.role, chain_id = chain.chain_id, signer = %signer_address, "Initialized EVM provider");

        Self {
            chain_id: chain.chain_id,
            signer_address,
            receipt_timeout: chain.receipt_timeout,
            confirmations: chain.confirmations,
            inner,
            nonces,
        }
    }

    pub fn inner(&self) -> &InnerProvider {
        &self.inner
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn signer_address(&self) -> Address {
        self.signer_address
    }

    pub fn nonces(&self) -> &SignerNonces {
        &self.nonces
    }

    pub async fn balance_of(&self, address: Address) -> Result<U256, ContractError> {
        self.inner
            .get_balance(address)
            .into_future()
            .instrument(tracing::info_span!("get_balance", %address, otel.kind = "client"))
            .await
            .map_err(contract_error_from_transport)
    }

    /// Sends `tx` from the signer and waits for the configured confirmations.
    ///
    /// Any failure before a receipt is obtained resets the signer's cached nonce.
    /// A receipt with failed status is [`ContractError::Failed`]. Nothing is retried.
    pub async fn send_transaction(
        &self,
        tx: ContractTransaction,
    ) -> Result<TransactionReceipt, ContractError> {
        let _submission = self.nonces.submissions.lock().await;
        let from = self.signer_address;
        let txr = TransactionRequest::default()
            .with_to(tx.to)
            .with_from(from)
            .with_input(tx.calldata)
            .with_value(tx.value)
            .with_gas_limit(tx.gas_limit);

        let pending_tx = match self
            .inner
            .send_transaction(txr)
            .instrument(tracing::info_span!("send_transaction",
                chain_id = self.chain_id,
                %from,
                to = %tx.to,
                value = %tx.value,
                otel.kind = "client",
            ))
            .await
        {
            Ok(pending) => pending,
            Err(e) => {
                self.nonces.nonce_manager.reset_nonce(from).await;
                return Err(contract_error_from_transport(e));
            }
        };
        let tx_hash = *pending_tx.tx_hash();
        tracing::debug!(%tx_hash, "Transaction submitted");

        let watcher = pending_tx
            .with_required_confirmations(self.confirmations)
            .with_timeout(Some(self.receipt_timeout));
        let receipt = match watcher.get_receipt().await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.nonces.nonce_manager.reset_nonce(from).await;
                return Err(ContractError::Transport(format!(
                    "Transaction {tx_hash} not confirmed: {e}"
                )));
            }
        };

        if receipt.status() {
            Ok(receipt)
        } else {
            Err(ContractError::Failed { hash: tx_hash })
        }
    }
}

/// Classifies a JSON-RPC failure, pulling out a revert reason when the node sent one.
pub fn contract_error_from_transport(error: TransportError) -> ContractError {
    if let Some(payload) = error.as_error_resp() {
        if let Some(data) = payload.as_revert_data() {
            return ContractError::Reverted {
                reason: revert_reason(&data),
            };
        }
        let message: &str = &payload.message;
        if message.contains("revert") {
            let reason = message
                .split_once("reverted: ")
                .map(|(_, reason)| reason.to_string());
            return ContractError::Reverted { reason };
        }
    }
    ContractError::Transport(error.to_string())
}

/// Reason carried by revert data: the bare string of an `Error(string)`, or
/// alloy's rendering of anything else (panics, custom errors).
fn revert_reason(data: &[u8]) -> Option<String> {
    match Revert::abi_decode(data) {
        Ok(revert) => Some(revert.reason),
        Err(_) => alloy_sol_types::decode_revert_reason(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::rpc_mock::{mount_rpc_error, mount_rpc_result};
    use crate::config::{ChainConfig, ChainRole, ClientConfig, SigningKey};
    use crate::validator::validate;
    use alloy_provider::fillers::NonceManager;
    use serde_json::json;
    use wiremock::MockServer;

    const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn resolved_for(rpc: &str, receiver_chain_id: i64) -> ResolvedConfig {
        let messenger = format!("0x{}", "3".repeat(40));
        let sender = ChainConfig::new(rpc, 1001, format!("0x{}", "1".repeat(64)), &messenger)
            .with_sender_contract(format!("0x{}", "4".repeat(40)));
        let receiver = ChainConfig::new(
            rpc,
            receiver_chain_id,
            format!("0x{}", "2".repeat(64)),
            &messenger,
        )
        .with_receiver_contract(format!("0x{}", "5".repeat(40)));
        validate(&ClientConfig::new(SigningKey::new(KEY), sender, receiver)).unwrap()
    }

    fn provider_for(rpc: &str) -> EvmChainProvider {
        let resolved = resolved_for(rpc, 1002);
        assert_eq!(resolved.sender_chain.role, ChainRole::Sender);
        EvmChainProvider::new(&resolved.sender_chain, &resolved.signing_key)
    }

    #[tokio::test]
    async fn test_balance_of_reads_native_balance() {
        let server = MockServer::start().await;
        mount_rpc_result(&server, "eth_getBalance", json!("0xde0b6b3a7640000")).await;
        let provider = provider_for(&server.uri());
        let balance = provider.balance_of(provider.signer_address()).await.unwrap();
        assert_eq!(balance, U256::from(1_000_000_000_000_000_000u128));
    }

    #[tokio::test]
    async fn test_rpc_error_is_transport_error() {
        let server = MockServer::start().await;
        mount_rpc_error(
            &server,
            "eth_getBalance",
            json!({ "code": -32000, "message": "header not found" }),
        )
        .await;
        let provider = provider_for(&server.uri());
        let err = provider.balance_of(Address::ZERO).await.unwrap_err();
        assert!(matches!(err, ContractError::Transport(_)));
    }

    #[tokio::test]
    async fn test_signer_address_matches_key() {
        let provider = provider_for("http://127.0.0.1:1");
        assert_eq!(
            provider.signer_address(),
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(provider.chain_id(), 1001);
    }

    async fn next_nonce(provider: &EvmChainProvider) -> u64 {
        provider
            .nonces()
            .nonce_manager()
            .get_next_nonce(provider.inner(), provider.signer_address())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_same_chain_pair_shares_nonces() {
        let server = MockServer::start().await;
        mount_rpc_result(&server, "eth_getTransactionCount", json!("0x5")).await;
        let (sender, receiver) = EvmChainProvider::connect_pair(&resolved_for(&server.uri(), 1001));

        // pay, consume, pay
        assert_eq!(next_nonce(&sender).await, 5);
        assert_eq!(next_nonce(&receiver).await, 6);
        assert_eq!(next_nonce(&sender).await, 7);
        assert!(Arc::ptr_eq(
            &sender.nonces().submissions,
            &receiver.nonces().submissions
        ));
    }

    #[tokio::test]
    async fn test_distinct_chain_pair_keeps_separate_nonces() {
        let server = MockServer::start().await;
        mount_rpc_result(&server, "eth_getTransactionCount", json!("0x5")).await;
        let (sender, receiver) = EvmChainProvider::connect_pair(&resolved_for(&server.uri(), 1002));

        assert_eq!(next_nonce(&sender).await, 5);
        assert_eq!(next_nonce(&sender).await, 6);
        assert_eq!(next_nonce(&receiver).await, 5);
        assert_eq!(receiver.chain_id(), 1002);
        assert!(!Arc::ptr_eq(
            &sender.nonces().submissions,
            &receiver.nonces().submissions
        ));
    }

    #[test]
    fn test_revert_reason_is_bare_error_string() {
        let data = Revert {
            reason: "Payment already consumed".to_string(),
        }
        .abi_encode();
        assert_eq!(
            revert_reason(&data).as_deref(),
            Some("Payment already consumed")
        );
    }

    #[test]
    fn test_revert_reason_falls_back_for_panics() {
        let data = alloy_sol_types::Panic {
            code: U256::from(0x11),
        }
        .abi_encode();
        let reason = revert_reason(&data).unwrap();
        assert!(reason.contains("overflow"), "{reason}");
    }
}
