//! Values exchanged between the clients, the orchestrator and the gateway.
//!
//! Field names follow camelCase on the wire, as the gateway emits them in
//! its JSON bodies.

use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types_eth::TransactionReceipt;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::encoding::PaymentId;

/// Receiver-chain record proving a payment was relayed.
///
/// Only ever constructed for an existing record: a raw contract response with
/// a zero payer is "absent" and never becomes a `PaymentReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment_id: PaymentId,
    /// Base units, serialized as a decimal string.
    #[serde(with = "u256_decimal")]
    pub amount: U256,
    pub payer: Address,
    /// Unix seconds at which the receiver chain recorded the payment.
    pub timestamp: u64,
    pub consumed: bool,
}

/// Validity-aware view of a payment.
///
/// `is_valid` holds iff a receipt exists and the receiver contract reports it
/// unconsumed and unexpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerification {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<PaymentReceipt>,
}

impl PaymentVerification {
    pub fn absent() -> Self {
        Self {
            is_valid: false,
            receipt: None,
        }
    }
}

/// Confirmed outcome of a state-changing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    /// `true` for success, `false` for a mined but reverted transaction.
    pub status: bool,
}

impl From<&TransactionReceipt> for TransactionResult {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used,
            status: receipt.status(),
        }
    }
}

/// Lifecycle state of a payment as seen from the receiver chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Not relayed yet, or never sent.
    NotFound,
    Valid,
    Consumed,
    Expired,
}

impl PaymentStatus {
    /// `Consumed` and `Expired` admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Consumed | PaymentStatus::Expired)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::NotFound => "not_found",
            PaymentStatus::Valid => "valid",
            PaymentStatus::Consumed => "consumed",
            PaymentStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Result of asking the receiver chain whether a payment exists, keeping
/// "could not determine" apart from "confirmed not paid".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaidProbe {
    Paid,
    NotPaid,
    /// The read failed; carries the rendered error.
    Unknown(String),
}

impl PaidProbe {
    pub fn is_paid(&self) -> bool {
        matches!(self, PaidProbe::Paid)
    }
}

/// Operational parameters of the sender contract. Diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderConfiguration {
    pub remote_blockchain_id: B256,
    pub remote_receiver: Address,
    pub messenger: Address,
    pub owner: Address,
    pub paused: bool,
    #[serde(with = "u256_decimal")]
    pub default_gas_limit: U256,
    #[serde(with = "u256_decimal")]
    pub message_gas_limit: U256,
}

/// Operational parameters of the receiver contract. Diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverConfiguration {
    pub approved_sender: Address,
    pub approved_source_blockchain_id: B256,
    pub messenger: Address,
    pub owner: Address,
    pub paused: bool,
    #[serde(with = "u256_decimal")]
    pub required_payment_amount: U256,
    /// Seconds after the receipt timestamp at which a payment expires.
    #[serde(with = "u256_decimal")]
    pub payment_expiry_time: U256,
}

/// Serializes a `U256` as a base-10 string so JavaScript clients keep precision.
pub mod u256_decimal {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_serializes_camel_case_with_decimal_amount() {
        let receipt = PaymentReceipt {
            payment_id: PaymentId::from(B256::repeat_byte(0xab)),
            amount: U256::from(1_000_000_000_000_000_000u128),
            payer: Address::repeat_byte(0x11),
            timestamp: 1_700_000_000,
            consumed: false,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["amount"], "1000000000000000000");
        assert_eq!(json["paymentId"], format!("0x{}", "ab".repeat(32)));
        assert_eq!(json["consumed"], false);
        let back: PaymentReceipt = serde_json::from_value(json).unwrap();
        assert_eq!(back, receipt);
    }

    #[test]
    fn test_absent_verification_omits_receipt() {
        let json = serde_json::to_value(PaymentVerification::absent()).unwrap();
        assert_eq!(json, serde_json::json!({ "isValid": false }));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(PaymentStatus::Consumed.is_terminal());
        assert!(PaymentStatus::Expired.is_terminal());
        assert!(!PaymentStatus::Valid.is_terminal());
        assert!(!PaymentStatus::NotFound.is_terminal());
        assert_eq!(PaymentStatus::NotFound.to_string(), "not_found");
    }
}
