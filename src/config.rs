//! Configuration for the payment client and the HTTP gateway.
//!
//! Client configuration is deliberately loose on the wire: every field is an
//! optional string (or number) so that a malformed or missing value reaches
//! [`crate::validator::validate`] and is reported with a classified error,
//! instead of failing somewhere inside the JSON deserializer.
//!
//! # Environment Variable Resolution
//!
//! String fields accept `$VAR` or `${VAR}` references, resolved at load time:
//!
//! ```json
//! {
//!   "signing_key": "$PRIVATE_KEY",
//!   "sender_chain": { "rpc": "${SENDER_RPC}", "chain_id": 1001, ... }
//! }
//! ```

use alloy_primitives::U256;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::fs;
use std::net::IpAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::encoding::{AmountError, format_amount, parse_amount};

/// CLI arguments for the gateway server.
#[derive(Parser, Debug)]
#[command(name = "relaypay-gateway")]
#[command(about = "HTTP 402 gateway backed by cross-chain payment receipts")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

// ============================================================================
// Environment Variable Resolution
// ============================================================================

/// A transparent wrapper that resolves environment variables during deserialization.
///
/// Supports both literal values and environment variable references:
/// - Literal: `"http://127.0.0.1:9650/ext/bc/C/rpc"`
/// - Simple env var: `"$SENDER_RPC"`
/// - Braced env var: `"${SENDER_RPC}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name if the string matches `$VAR` or `${VAR}` syntax.
    fn parse_env_var_syntax(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            Some(braced)
        } else if let Some(var_name) = s.strip_prefix('$') {
            let is_name =
                !var_name.is_empty() && var_name.chars().all(|c| c.is_alphanumeric() || c == '_');
            is_name.then_some(var_name)
        } else {
            None
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = if let Some(var_name) = Self::parse_env_var_syntax(&s) {
            std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{}' not found (referenced as '{}')",
                    var_name, s
                ))
            })?
        } else {
            s
        };
        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {}", e)))?;
        Ok(LiteralOrEnv(parsed))
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

// ============================================================================
// Signing Key
// ============================================================================

/// The 32-byte secret used to sign sender-chain payments and receiver-chain
/// consumptions. Its format is checked by the validator, not on construction.
///
/// Never printed: `Debug` and `Serialize` both emit `<redacted>`.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key text as configured, with or without `0x`.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl FromStr for SigningKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

impl Serialize for SigningKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("<redacted>")
    }
}

// ============================================================================
// Chain Configuration
// ============================================================================

/// Which side of the cross-chain flow a chain configuration describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainRole {
    Sender,
    Receiver,
}

impl Display for ChainRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainRole::Sender => f.write_str("sender"),
            ChainRole::Receiver => f.write_str("receiver"),
        }
    }
}

/// One chain the client talks to.
///
/// `sender` is the payment contract on a sender chain, `receiver` the receipt
/// contract on a receiver chain; each is only required for its role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc: Option<LiteralOrEnv<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<i64>,
    /// 32-byte relay routing identifier of this chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_id: Option<LiteralOrEnv<String>>,
    /// Relay messenger entry point on this chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messenger: Option<LiteralOrEnv<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<LiteralOrEnv<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<LiteralOrEnv<String>>,
    /// How long to wait for a transaction receipt.
    #[serde(default = "chain_config_defaults::default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    /// Block confirmations required before a transaction counts as confirmed.
    #[serde(default = "chain_config_defaults::default_confirmations")]
    pub confirmations: u64,
    /// Overrides the per-operation gas limit of state-changing calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Requests per second sent to `rpc`. Unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

pub mod chain_config_defaults {
    pub fn default_receipt_timeout_secs() -> u64 {
        30
    }
    pub fn default_confirmations() -> u64 {
        1
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc: None,
            chain_id: None,
            blockchain_id: None,
            messenger: None,
            sender: None,
            receiver: None,
            receipt_timeout_secs: chain_config_defaults::default_receipt_timeout_secs(),
            confirmations: chain_config_defaults::default_confirmations(),
            gas_limit: None,
            rate_limit: None,
        }
    }
}

impl ChainConfig {
    pub fn new(
        rpc: impl Into<String>,
        chain_id: i64,
        blockchain_id: impl Into<String>,
        messenger: impl Into<String>,
    ) -> Self {
        Self {
            rpc: Some(LiteralOrEnv::from_literal(rpc.into())),
            chain_id: Some(chain_id),
            blockchain_id: Some(LiteralOrEnv::from_literal(blockchain_id.into())),
            messenger: Some(LiteralOrEnv::from_literal(messenger.into())),
            ..Self::default()
        }
    }

    pub fn with_sender_contract(mut self, address: impl Into<String>) -> Self {
        self.sender = Some(LiteralOrEnv::from_literal(address.into()));
        self
    }

    pub fn with_receiver_contract(mut self, address: impl Into<String>) -> Self {
        self.receiver = Some(LiteralOrEnv::from_literal(address.into()));
        self
    }

    pub fn rpc(&self) -> Option<&str> {
        self.rpc.as_deref().map(String::as_str)
    }
    pub fn blockchain_id(&self) -> Option<&str> {
        self.blockchain_id.as_deref().map(String::as_str)
    }
    pub fn messenger(&self) -> Option<&str> {
        self.messenger.as_deref().map(String::as_str)
    }
    pub fn sender_contract(&self) -> Option<&str> {
        self.sender.as_deref().map(String::as_str)
    }
    pub fn receiver_contract(&self) -> Option<&str> {
        self.receiver.as_deref().map(String::as_str)
    }
}

/// Complete client configuration: one signing key, one chain per role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<LiteralOrEnv<SigningKey>>,
    #[serde(default)]
    pub sender_chain: ChainConfig,
    #[serde(default)]
    pub receiver_chain: ChainConfig,
}

impl ClientConfig {
    pub fn new(
        signing_key: SigningKey,
        sender_chain: ChainConfig,
        receiver_chain: ChainConfig,
    ) -> Self {
        Self {
            signing_key: Some(LiteralOrEnv::from_literal(signing_key)),
            sender_chain,
            receiver_chain,
        }
    }

    /// Builds a configuration from a built-in network preset.
    pub fn from_preset(preset: Preset, signing_key: SigningKey) -> Self {
        let (sender_chain, receiver_chain) = preset.chains();
        Self::new(signing_key, sender_chain, receiver_chain)
    }

    pub fn signing_key(&self) -> Option<&SigningKey> {
        self.signing_key.as_deref()
    }
}

// ============================================================================
// Presets
// ============================================================================

/// Relay messenger address shared by the preset networks.
const PRESET_MESSENGER: &str = "0x253b2784c75e510dD0fF1da844684a1aC0aa5fcf";

/// Built-in network presets; each lacks only the signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Two local subnets with distinct blockchain identifiers.
    Local,
    /// Fuji C-Chain on both sides: same-chain development mode.
    Fuji,
}

impl Preset {
    fn chains(&self) -> (ChainConfig, ChainConfig) {
        match self {
            Preset::Local => (
                ChainConfig::new(
                    "http://127.0.0.1:9650/ext/bc/subnetA/rpc",
                    1001,
                    format!("0x{}", "1".repeat(64)),
                    PRESET_MESSENGER,
                )
                .with_sender_contract("0x52C84043CD9c865236f11d9Fc9F56aa003c1f922"),
                ChainConfig::new(
                    "http://127.0.0.1:9650/ext/bc/subnetB/rpc",
                    1002,
                    format!("0x{}", "2".repeat(64)),
                    PRESET_MESSENGER,
                )
                .with_receiver_contract("0x52C84043CD9c865236f11d9Fc9F56aa003c1f922"),
            ),
            Preset::Fuji => {
                let rpc = "https://api.avax-test.network/ext/bc/C/rpc";
                let blockchain_id =
                    "0x7fc93d85c6d62c5b2ac0b519c87010ea5294012d1e407030d6acd0021cac10d5";
                (
                    ChainConfig::new(rpc, 43113, blockchain_id, PRESET_MESSENGER)
                        .with_sender_contract("0x52C84043CD9c865236f11d9Fc9F56aa003c1f922"),
                    ChainConfig::new(rpc, 43113, blockchain_id, PRESET_MESSENGER)
                        .with_receiver_contract("0x52C84043CD9c865236f11d9Fc9F56aa003c1f922"),
                )
            }
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Preset::Local),
            "fuji" => Ok(Preset::Fuji),
            other => Err(format!("Unknown preset {other}")),
        }
    }
}

// ============================================================================
// Gateway Configuration
// ============================================================================

/// A price written as a human-readable amount (`"0.01"`) and held in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanAmount(pub U256);

impl FromStr for HumanAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_amount(s).map(HumanAmount)
    }
}

impl Serialize for HumanAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format_amount(self.0))
    }
}

/// Prices of the gateway's paid routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Price of `/resource` (verify-then-consume flow).
    #[serde(default = "config_defaults::default_resource_price")]
    pub resource: LiteralOrEnv<HumanAmount>,
    /// Price of `/api/data` (header-gated flow).
    #[serde(default = "config_defaults::default_data_price")]
    pub data: LiteralOrEnv<HumanAmount>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            resource: config_defaults::default_resource_price(),
            data: config_defaults::default_data_price(),
        }
    }
}

/// Gateway server configuration.
///
/// Fields use serde defaults that fall back to environment variables,
/// then to hardcoded defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
    client: ClientConfig,
    #[serde(default)]
    pricing: PricingConfig,
}

pub mod config_defaults {
    use std::env;
    use std::net::{IpAddr, Ipv4Addr};

    use super::{HumanAmount, LiteralOrEnv};
    use alloy_primitives::U256;

    pub const DEFAULT_PORT: u16 = 3402;

    /// Returns the default port value with fallback: $PORT env var -> 3402
    pub fn default_port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Returns the default host value with fallback: $HOST env var -> "0.0.0.0"
    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    /// 1.0 in 18-decimal base units.
    pub fn default_resource_price() -> LiteralOrEnv<HumanAmount> {
        LiteralOrEnv::from_literal(HumanAmount(U256::from(1_000_000_000_000_000_000u128)))
    }

    /// 0.01 in 18-decimal base units.
    pub fn default_data_price() -> LiteralOrEnv<HumanAmount> {
        LiteralOrEnv::from_literal(HumanAmount(U256::from(10_000_000_000_000_000u128)))
    }
}

/// Configuration file error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn client(&self) -> &ClientConfig {
        &self.client
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Load configuration from CLI arguments and JSON file.
    ///
    /// The config file path is determined by:
    /// 1. `--config <path>` CLI argument
    /// 2. `$CONFIG`
    /// 3. `./config.json`
    pub fn load() -> Result<Self, ConfigLoadError> {
        let cli_args = CliArgs::parse();
        let config_path = Path::new(&cli_args.config)
            .canonicalize()
            .map_err(|e| ConfigLoadError::FileRead(cli_args.config, e))?;
        Self::load_from_path(config_path)
    }

    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(&path).map_err(|e| ConfigLoadError::FileRead(path, e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigLoadError> {
        let config: Config = serde_json::from_str(content)?;
        Ok(config)
    }
}
