//! Payment identifiers, amounts and chain id encodings.
//!
//! Everything in this module is pure: no I/O, no clock. Identifiers travel on
//! the wire as `0x`-prefixed, 64-character lowercase hex and are accepted with
//! or without the prefix on input.

use alloy_primitives::utils::{ParseUnits, format_units, parse_units};
use alloy_primitives::{B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Decimal places of the native currency on every supported chain.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Width of a canonical payment identifier body, in hex characters.
const PAYMENT_ID_HEX_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid payment identifier {0:?}: expected 32 bytes of hex")]
    InvalidPaymentId(String),
    #[error("Blockchain identifier {0} does not fit into a 64-bit chain id")]
    ChainIdOverflow(B256),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount {0:?}: {1}")]
    InvalidFormat(String, String),
    #[error("Negative amount {0:?} is not allowed")]
    Negative(String),
}

/// Canonicalizes a payment identifier: strips an optional `0x`, left-pads with
/// zeros to 64 characters and re-adds the prefix.
///
/// Neither hex-ness nor length is checked here: input longer than 64 digits is
/// returned lowercased and prefixed but not truncated, so the result is longer
/// than 66 characters. See [`is_valid_payment_identifier`].
pub fn to_payment_identifier(input: &str) -> String {
    let body = strip_hex_prefix(input).to_ascii_lowercase();
    format!("0x{:0>width$}", body, width = PAYMENT_ID_HEX_LEN)
}

/// True iff `input` is exactly 64 hex characters, with or without `0x`.
pub fn is_valid_payment_identifier(input: &str) -> bool {
    let body = strip_hex_prefix(input);
    body.len() == PAYMENT_ID_HEX_LEN && body.bytes().all(|b| b.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

/// Formats a base-unit amount as a decimal string with 18 decimals.
pub fn format_amount(amount: U256) -> String {
    format_amount_with_decimals(amount, DEFAULT_DECIMALS)
}

pub fn format_amount_with_decimals(amount: U256, decimals: u8) -> String {
    // Only fails for decimals > 77, which cannot represent any U256 scale.
    format_units(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

/// Parses a human-readable decimal amount into base units (18 decimals).
pub fn parse_amount(amount: &str) -> Result<U256, AmountError> {
    parse_amount_with_decimals(amount, DEFAULT_DECIMALS)
}

pub fn parse_amount_with_decimals(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = amount.trim();
    match parse_units(trimmed, decimals) {
        Ok(ParseUnits::U256(value)) => Ok(value),
        Ok(ParseUnits::I256(_)) => Err(AmountError::Negative(amount.to_string())),
        Err(e) => Err(AmountError::InvalidFormat(amount.to_string(), e.to_string())),
    }
}

/// Encodes a numeric chain id as a 32-byte big-endian, zero-padded value.
pub fn encode_chain_id(chain_id: u64) -> B256 {
    B256::left_padding_from(&chain_id.to_be_bytes())
}

/// Inverse of [`encode_chain_id`].
pub fn decode_chain_id(blockchain_id: B256) -> Result<u64, EncodingError> {
    let value = U256::from_be_bytes(blockchain_id.0);
    u64::try_from(value).map_err(|_| EncodingError::ChainIdOverflow(blockchain_id))
}

/// A 32-byte payment identifier binding a sender-chain payment to its
/// receiver-chain receipt.
///
/// Two identifiers are equal iff their 32-byte forms are equal, regardless of
/// how they were written on input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PaymentId(B256);

impl PaymentId {
    /// Generates a fresh identifier from 32 random bytes. No network access.
    pub fn generate() -> Self {
        Self(B256::from(rand::random::<[u8; 32]>()))
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }
}

impl From<B256> for PaymentId {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<PaymentId> for B256 {
    fn from(value: PaymentId) -> Self {
        value.0
    }
}

impl FromStr for PaymentId {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_valid_payment_identifier(s) {
            return Err(EncodingError::InvalidPaymentId(s.to_string()));
        }
        let bytes = hex::decode(strip_hex_prefix(s))
            .map_err(|_| EncodingError::InvalidPaymentId(s.to_string()))?;
        Ok(Self(B256::from_slice(&bytes)))
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for PaymentId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PaymentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_payment_identifier_pads_and_prefixes() {
        let id = to_payment_identifier("abc");
        assert_eq!(id.len(), 66);
        assert!(id.starts_with("0x"));
        assert!(id.ends_with("0abc"));
    }

    #[test]
    fn test_to_payment_identifier_is_idempotent() {
        let long = "a".repeat(64);
        for input in ["1", "0xFF", long.as_str(), "0xdeadbeef"] {
            let once = to_payment_identifier(input);
            assert_eq!(to_payment_identifier(&once), once);
        }
    }

    #[test]
    fn test_to_payment_identifier_does_not_validate() {
        assert_eq!(to_payment_identifier("zz").len(), 66);
        assert!(!is_valid_payment_identifier("zz"));
    }

    #[test]
    fn test_to_payment_identifier_keeps_overlong_input() {
        let input = format!("0x{}", "AB".repeat(35));
        let canonical = to_payment_identifier(&input);
        assert_eq!(canonical.len(), 72);
        assert_eq!(canonical, format!("0x{}", "ab".repeat(35)));
        assert!(!is_valid_payment_identifier(&canonical));
    }

    #[test]
    fn test_is_valid_payment_identifier() {
        let body = "ab".repeat(32);
        assert!(is_valid_payment_identifier(&body));
        assert!(is_valid_payment_identifier(&format!("0x{body}")));
        assert!(!is_valid_payment_identifier(&body[..62]));
        assert!(!is_valid_payment_identifier(&format!("{body}00")));
        assert!(!is_valid_payment_identifier(&"g".repeat(64)));
    }

    #[test]
    fn test_payment_id_equality_ignores_prefix_and_case() {
        let lower: PaymentId = "ab".repeat(32).parse().unwrap();
        let upper: PaymentId = format!("0x{}", "AB".repeat(32)).parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.to_string(), format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn test_payment_id_serde_uses_prefixed_hex() {
        let id: PaymentId = "01".repeat(32).parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "01".repeat(32)));
        let back: PaymentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_payment_id_rejects_short_input() {
        let err = "0x1234".parse::<PaymentId>().unwrap_err();
        assert_eq!(err, EncodingError::InvalidPaymentId("0x1234".to_string()));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(PaymentId::generate(), PaymentId::generate());
    }

    #[test]
    fn test_amount_roundtrip() {
        let one_ether = U256::from(1_000_000_000_000_000_000u128);
        for amount in [U256::ZERO, U256::from(1u8), one_ether, U256::MAX] {
            assert_eq!(parse_amount(&format_amount(amount)).unwrap(), amount);
        }
    }

    #[test]
    fn test_parse_amount_human_values() {
        assert_eq!(
            parse_amount("0.01").unwrap(),
            U256::from(10_000_000_000_000_000u128)
        );
        assert_eq!(
            parse_amount_with_decimals("1.5", 6).unwrap(),
            U256::from(1_500_000u64)
        );
    }

    #[test]
    fn test_parse_amount_rejects_garbage_and_negatives() {
        assert!(matches!(
            parse_amount("ten"),
            Err(AmountError::InvalidFormat(_, _))
        ));
        assert!(matches!(parse_amount("-1"), Err(AmountError::Negative(_))));
    }

    #[test]
    fn test_chain_id_roundtrip() {
        for chain_id in [1u64, 43113, 1002, u64::MAX] {
            assert_eq!(decode_chain_id(encode_chain_id(chain_id)).unwrap(), chain_id);
        }
    }

    #[test]
    fn test_encode_chain_id_is_big_endian_padded() {
        let encoded = encode_chain_id(0x0102);
        assert_eq!(encoded[30], 0x01);
        assert_eq!(encoded[31], 0x02);
        assert!(encoded[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_decode_chain_id_overflow() {
        let wide = B256::repeat_byte(0x11);
        assert_eq!(
            decode_chain_id(wide),
            Err(EncodingError::ChainIdOverflow(wide))
        );
    }
}
