use alloy_network::Network;
use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_provider::fillers::NonceManager;
use alloy_transport::TransportResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Marks an address whose nonce must be fetched from the node.
const UNKNOWN: u64 = u64::MAX;

/// Nonce cache seeded from the node's pending transaction count.
///
/// The first nonce for an address comes from `eth_getTransactionCount(addr, "pending")`,
/// so a restart while payments are still in the mempool does not reuse a nonce.
/// Later nonces are incremented locally. After a failed submission the owner calls
/// [`PendingNonceManager::reset_nonce`] and the next allocation asks the node again.
///
/// Clones share one cache. Providers that sign with the same key on the same
/// chain must allocate from one shared manager, see
/// [`crate::chain::SignerNonces`].
#[derive(Clone, Debug, Default)]
pub struct PendingNonceManager {
    nonces: Arc<DashMap<Address, Arc<Mutex<u64>>>>,
}

impl PendingNonceManager {
    fn slot(&self, address: Address) -> Arc<Mutex<u64>> {
        // Clone the Arc out so the map shard is not locked across an await.
        let entry = self
            .nonces
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(UNKNOWN)));
        Arc::clone(entry.value())
    }

    /// Forgets the cached nonce of `address`.
    ///
    /// A failed send leaves the on-chain nonce unknown: the transaction may or
    /// may not have reached the mempool.
    pub async fn reset_nonce(&self, address: Address) {
        if let Some(slot) = self.nonces.get(&address).map(|s| Arc::clone(s.value())) {
            *slot.lock().await = UNKNOWN;
            tracing::debug!(%address, "Nonce cache reset");
        }
    }
}

#[async_trait]
impl NonceManager for PendingNonceManager {
    async fn get_next_nonce<P, N>(&self, provider: &P, address: Address) -> TransportResult<u64>
    where
        P: Provider<N>,
        N: Network,
    {
        let slot = self.slot(address);
        let mut nonce = slot.lock().await;
        let next = if *nonce == UNKNOWN {
            tracing::trace!(%address, "Fetching pending nonce");
            provider.get_transaction_count(address).pending().await?
        } else {
            *nonce + 1
        };
        *nonce = next;
        Ok(next)
    }
}
