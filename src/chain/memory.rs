//! In-memory stand-in for both contracts and the relay between them.
//!
//! Payments sent through [`SenderContract::send_payment`] sit in flight until
//! the test relays them, either explicitly or after a number of `hasPaid`
//! probes. Chain time is a counter the test advances.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::chain::{ContractError, RawReceipt, ReceiverContract, SenderContract};
use crate::types::{ReceiverConfiguration, SenderConfiguration, TransactionResult};

pub const PAYER: Address = Address::new([0x70; 20]);
pub const EXPIRY_WINDOW_SECS: u64 = 3600;

#[derive(Debug, Default)]
struct LedgerState {
    now: u64,
    block: u64,
    balance: U256,
    contract_balance: U256,
    in_flight: Vec<(B256, U256)>,
    receipts: HashMap<B256, RawReceipt>,
    relay_after_probes: Option<usize>,
    probes: usize,
    reads_failing: bool,
    sends_failing: bool,
    bare_reverts: bool,
    receiver_paused: bool,
    sent: usize,
}

impl LedgerState {
    fn relay(&mut self) {
        for (payment_id, amount) in std::mem::take(&mut self.in_flight) {
            // A duplicate delivery never overwrites an existing receipt.
            self.receipts.entry(payment_id).or_insert(RawReceipt {
                payment_id,
                amount,
                payer: PAYER,
                timestamp: U256::from(self.now),
                consumed: false,
            });
        }
    }

    fn is_expired(&self, receipt: &RawReceipt) -> bool {
        U256::from(self.now) > receipt.timestamp + U256::from(EXPIRY_WINDOW_SECS)
    }

    fn next_tx(&mut self) -> TransactionResult {
        self.block += 1;
        TransactionResult {
            hash: B256::from(U256::from(self.block)),
            block_number: self.block,
            gas_used: 21_000,
            status: true,
        }
    }

    fn revert(&self, reason: &str) -> ContractError {
        ContractError::Reverted {
            reason: (!self.bare_reverts).then(|| reason.to_string()),
        }
    }

    fn read_guard(&self) -> Result<(), ContractError> {
        if self.reads_failing {
            Err(ContractError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn with_balance(balance: U256) -> Self {
        let ledger = Self::default();
        ledger.with_state(|s| {
            s.balance = balance;
            s.now = 1_700_000_000;
        });
        ledger
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut LedgerState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Delivers every in-flight payment to the receiver side.
    pub fn relay_all(&self) {
        self.with_state(|s| s.relay());
    }

    /// Delivers in-flight payments once `hasPaid` has been probed `probes` times.
    pub fn relay_after_probes(&self, probes: usize) {
        self.with_state(|s| {
            s.probes = 0;
            s.relay_after_probes = Some(probes);
        });
    }

    pub fn advance_time(&self, secs: u64) {
        self.with_state(|s| s.now += secs);
    }

    pub fn set_reads_failing(&self, failing: bool) {
        self.with_state(|s| s.reads_failing = failing);
    }

    pub fn set_sends_failing(&self, failing: bool) {
        self.with_state(|s| s.sends_failing = failing);
    }

    /// Reverts come back without a reason string.
    pub fn set_bare_reverts(&self, bare: bool) {
        self.with_state(|s| s.bare_reverts = bare);
    }

    /// Pauses the receiver contract: receipts stay readable but none is valid.
    pub fn set_receiver_paused(&self, paused: bool) {
        self.with_state(|s| s.receiver_paused = paused);
    }

    pub fn probes(&self) -> usize {
        self.with_state(|s| s.probes)
    }

    pub fn sent(&self) -> usize {
        self.with_state(|s| s.sent)
    }

    pub fn balance(&self) -> U256 {
        self.with_state(|s| s.balance)
    }
}

#[async_trait]
impl SenderContract for MemoryLedger {
    fn signer_address(&self) -> Address {
        PAYER
    }

    async fn send_payment(
        &self,
        payment_id: B256,
        amount: U256,
    ) -> Result<TransactionResult, ContractError> {
        self.with_state(|s| {
            if s.sends_failing {
                return Err(ContractError::Transport("nonce too low".to_string()));
            }
            if amount > s.balance {
                return Err(ContractError::Transport("insufficient funds".to_string()));
            }
            s.balance -= amount;
            s.contract_balance += amount;
            s.in_flight.push((payment_id, amount));
            s.sent += 1;
            Ok(s.next_tx())
        })
    }

    async fn signer_balance(&self) -> Result<U256, ContractError> {
        self.with_state(|s| Ok(s.balance))
    }

    async fn contract_balance(&self) -> Result<U256, ContractError> {
        self.with_state(|s| Ok(s.contract_balance))
    }

    async fn configuration(&self) -> Result<SenderConfiguration, ContractError> {
        Ok(SenderConfiguration {
            remote_blockchain_id: B256::repeat_byte(0x22),
            remote_receiver: Address::repeat_byte(0x55),
            messenger: Address::repeat_byte(0x33),
            owner: PAYER,
            paused: false,
            default_gas_limit: U256::from(500_000u64),
            message_gas_limit: U256::from(300_000u64),
        })
    }
}

#[async_trait]
impl ReceiverContract for MemoryLedger {
    async fn has_paid(&self, payment_id: B256) -> Result<bool, ContractError> {
        self.with_state(|s| {
            s.probes += 1;
            if s.relay_after_probes.is_some_and(|n| s.probes >= n) {
                s.relay();
            }
            s.read_guard()?;
            Ok(s.receipts.contains_key(&payment_id))
        })
    }

    async fn receipt(&self, payment_id: B256) -> Result<RawReceipt, ContractError> {
        self.with_state(|s| {
            s.read_guard()?;
            Ok(s.receipts.get(&payment_id).copied().unwrap_or_default())
        })
    }

    async fn is_consumed(&self, payment_id: B256) -> Result<bool, ContractError> {
        self.with_state(|s| {
            s.read_guard()?;
            Ok(s.receipts.get(&payment_id).is_some_and(|r| r.consumed))
        })
    }

    async fn is_expired(&self, payment_id: B256) -> Result<bool, ContractError> {
        self.with_state(|s| {
            s.read_guard()?;
            Ok(s.receipts.get(&payment_id).is_some_and(|r| s.is_expired(r)))
        })
    }

    async fn is_valid_payment(&self, payment_id: B256) -> Result<bool, ContractError> {
        self.with_state(|s| {
            s.read_guard()?;
            Ok(s
                .receipts
                .get(&payment_id)
                .is_some_and(|r| !s.receiver_paused && !r.consumed && !s.is_expired(r)))
        })
    }

    async fn consume_payment(&self, payment_id: B256) -> Result<TransactionResult, ContractError> {
        self.with_state(|s| {
            if s.sends_failing {
                return Err(ContractError::Transport("connection reset".to_string()));
            }
            if s.receiver_paused {
                return Err(s.revert("Pausable: paused"));
            }
            let Some(receipt) = s.receipts.get(&payment_id).copied() else {
                return Err(s.revert("Payment not found"));
            };
            if receipt.consumed {
                return Err(s.revert("Payment already consumed"));
            }
            if s.is_expired(&receipt) {
                return Err(s.revert("Payment expired"));
            }
            if let Some(r) = s.receipts.get_mut(&payment_id) {
                r.consumed = true;
            }
            Ok(s.next_tx())
        })
    }

    async fn configuration(&self) -> Result<ReceiverConfiguration, ContractError> {
        Ok(ReceiverConfiguration {
            approved_sender: Address::repeat_byte(0x44),
            approved_source_blockchain_id: B256::repeat_byte(0x11),
            messenger: Address::repeat_byte(0x33),
            owner: PAYER,
            paused: self.with_state(|s| s.receiver_paused),
            required_payment_amount: U256::from(10_000_000_000_000_000u128),
            payment_expiry_time: U256::from(EXPIRY_WINDOW_SECS),
        })
    }
}
