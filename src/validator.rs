//! Configuration validation.
//!
//! [`validate`] checks a [`ClientConfig`] before any network call is made and
//! stops at the first violated rule. The order is part of the contract:
//!
//! 1. signing key present, then 32 bytes of hex
//! 2. sender chain well-formed
//! 3. sender chain has a sender contract address
//! 4. receiver chain well-formed
//! 5. receiver chain has a receiver contract address
//! 6. (warning only) sender and receiver blockchain identifiers differ
//!
//! A chain is well-formed when its RPC endpoint is present with an http(s)
//! scheme, its chain id is positive, its blockchain identifier is present and
//! 32 bytes, and its messenger address is present and 20 bytes.

use alloy_primitives::{Address, B256};
use alloy_signer_local::PrivateKeySigner;
use regex::Regex;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use crate::config::{ChainConfig, ChainRole, ClientConfig};

static SIGNING_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0x)?[0-9a-fA-F]{64}$").expect("valid regex"));
static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex"));
static BYTES32_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0x)?[0-9a-fA-F]{64}$").expect("valid regex"));

/// Classified configuration errors. Always fatal, never retried.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Signing key is required")]
    MissingSigningKey,
    #[error("Invalid signing key format: expected 32 bytes of hex")]
    InvalidSigningKey,
    #[error("{0} chain RPC is required")]
    MissingRpc(ChainRole),
    #[error("{0} chain RPC must be a valid HTTP(S) URL, got {1:?}")]
    InvalidRpc(ChainRole, String),
    #[error("{0} chain ID must be a positive number")]
    InvalidChainId(ChainRole),
    #[error("{0} chain blockchain ID is required")]
    MissingBlockchainId(ChainRole),
    #[error("{0} chain blockchain ID must be 32 bytes of hex, got {1:?}")]
    InvalidBlockchainId(ChainRole, String),
    #[error("{0} chain messenger address is required")]
    MissingMessenger(ChainRole),
    #[error("{0} chain messenger address is invalid: {1:?}")]
    InvalidMessenger(ChainRole, String),
    #[error("{0} chain must have a {0} contract address")]
    MissingContract(ChainRole),
    #[error("{0} contract address is invalid: {1:?}")]
    InvalidContract(ChainRole, String),
}

/// Signing key that passed validation. Redacted in `Debug`.
#[derive(Clone)]
pub struct SecretKey(PrivateKeySigner);

impl SecretKey {
    pub fn signer(&self) -> PrivateKeySigner {
        self.0.clone()
    }

    pub fn address(&self) -> Address {
        self.0.address()
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// A chain configuration with every field parsed into its typed form.
#[derive(Debug, Clone)]
pub struct ResolvedChain {
    pub role: ChainRole,
    pub rpc: Url,
    pub chain_id: u64,
    pub blockchain_id: B256,
    pub messenger: Address,
    /// Sender contract on the sender chain, receiver contract on the receiver chain.
    pub contract: Address,
    pub receipt_timeout: Duration,
    pub confirmations: u64,
    pub gas_limit: Option<u64>,
    pub rate_limit: Option<u32>,
}

/// Output of a successful [`validate`].
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub signing_key: SecretKey,
    pub sender_chain: ResolvedChain,
    pub receiver_chain: ResolvedChain,
    /// Both sides share one blockchain identifier. Relayed delivery cannot
    /// happen in this mode; it exists for local development.
    pub same_chain_mode: bool,
}

/// Validates `config` without touching the network.
///
/// Returns the first violation in the documented order.
pub fn validate(config: &ClientConfig) -> Result<ResolvedConfig, ConfigError> {
    let signing_key = validate_signing_key(config)?;

    let sender_chain = validate_chain(&config.sender_chain, ChainRole::Sender)?;
    let sender_chain = sender_chain.with_contract(config.sender_chain.sender_contract())?;

    let receiver_chain = validate_chain(&config.receiver_chain, ChainRole::Receiver)?;
    let receiver_chain = receiver_chain.with_contract(config.receiver_chain.receiver_contract())?;

    let same_chain_mode = sender_chain.blockchain_id == receiver_chain.blockchain_id;
    if same_chain_mode {
        tracing::warn!(
            blockchain_id = %sender_chain.blockchain_id,
            "Sender and receiver chains have the same blockchain ID. Cross-chain messaging may not work."
        );
    }
    tracing::info!("Configuration validated successfully");

    Ok(ResolvedConfig {
        signing_key,
        sender_chain: sender_chain.finish(),
        receiver_chain: receiver_chain.finish(),
        same_chain_mode,
    })
}

fn validate_signing_key(config: &ClientConfig) -> Result<SecretKey, ConfigError> {
    let key = config
        .signing_key()
        .map(|k| k.expose_secret())
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingSigningKey)?;
    if !SIGNING_KEY_RE.is_match(key) {
        return Err(ConfigError::InvalidSigningKey);
    }
    let bytes = parse_b256(key).ok_or(ConfigError::InvalidSigningKey)?;
    // Zero and out-of-range scalars are hex-valid but unusable.
    let signer = PrivateKeySigner::from_bytes(&bytes).map_err(|_| ConfigError::InvalidSigningKey)?;
    Ok(SecretKey(signer))
}

/// A well-formed chain still waiting for its role-specific contract address.
struct PartialChain {
    role: ChainRole,
    rpc: Url,
    chain_id: u64,
    blockchain_id: B256,
    messenger: Address,
    contract: Option<Address>,
    receipt_timeout: Duration,
    confirmations: u64,
    gas_limit: Option<u64>,
    rate_limit: Option<u32>,
}

impl PartialChain {
    fn with_contract(mut self, contract: Option<&str>) -> Result<Self, ConfigError> {
        let contract = contract
            .filter(|c| !c.is_empty())
            .ok_or(ConfigError::MissingContract(self.role))?;
        let address = parse_address(contract)
            .ok_or_else(|| ConfigError::InvalidContract(self.role, contract.to_string()))?;
        self.contract = Some(address);
        Ok(self)
    }

    fn finish(self) -> ResolvedChain {
        ResolvedChain {
            role: self.role,
            rpc: self.rpc,
            chain_id: self.chain_id,
            blockchain_id: self.blockchain_id,
            messenger: self.messenger,
            contract: self.contract.unwrap_or_default(),
            receipt_timeout: self.receipt_timeout,
            confirmations: self.confirmations,
            gas_limit: self.gas_limit,
            rate_limit: self.rate_limit,
        }
    }
}

fn validate_chain(chain: &ChainConfig, role: ChainRole) -> Result<PartialChain, ConfigError> {
    let rpc = chain
        .rpc()
        .filter(|r| !r.is_empty())
        .ok_or(ConfigError::MissingRpc(role))?;
    let rpc_url = Url::parse(rpc)
        .ok()
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .ok_or_else(|| ConfigError::InvalidRpc(role, rpc.to_string()))?;

    let chain_id = chain
        .chain_id
        .filter(|id| *id > 0)
        .and_then(|id| u64::try_from(id).ok())
        .ok_or(ConfigError::InvalidChainId(role))?;

    let blockchain_id = chain
        .blockchain_id()
        .filter(|b| !b.is_empty())
        .ok_or(ConfigError::MissingBlockchainId(role))?;
    let blockchain_id = BYTES32_RE
        .is_match(blockchain_id)
        .then(|| parse_b256(blockchain_id))
        .flatten()
        .ok_or_else(|| ConfigError::InvalidBlockchainId(role, blockchain_id.to_string()))?;

    let messenger = chain
        .messenger()
        .filter(|m| !m.is_empty())
        .ok_or(ConfigError::MissingMessenger(role))?;
    let messenger = parse_address(messenger)
        .ok_or_else(|| ConfigError::InvalidMessenger(role, messenger.to_string()))?;

    Ok(PartialChain {
        role,
        rpc: rpc_url,
        chain_id,
        blockchain_id,
        messenger,
        contract: None,
        receipt_timeout: Duration::from_secs(chain.receipt_timeout_secs),
        confirmations: chain.confirmations,
        gas_limit: chain.gas_limit,
        rate_limit: chain.rate_limit,
    })
}

/// `0x` followed by exactly 40 hex characters. Checksums are not enforced.
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

fn parse_address(address: &str) -> Option<Address> {
    if !is_valid_address(address) {
        return None;
    }
    let bytes = hex::decode(&address[2..]).ok()?;
    Some(Address::from_slice(&bytes))
}

fn parse_b256(value: &str) -> Option<B256> {
    let body = value.strip_prefix("0x").unwrap_or(value);
    B256::from_str(body).ok()
}
