//! UTXO transfer extraction.
//!
//! Converts a Bitcoin transaction into normalized [`Transfer`] records.
//! Coinbase outputs become `mining` transfers from the `"coinbase"`
//! sentinel; regular spends resolve their sender from prevout data, with an
//! unknown-sender fallback when no input can be resolved.

use rust_decimal::Decimal;

use chainscan_core::{Transfer, TransferType};

use crate::address::extract_addresses;
use crate::types::Transaction;

/// Sender recorded for mined coins.
pub const COINBASE_SENDER: &str = "coinbase";

impl Transaction {
    /// Extract normalized transfers from this transaction.
    ///
    /// `fee` is the pre-computed transaction fee ([`Transaction::fee`]).
    /// Output grouping follows first-appearance order over `vout`; the first
    /// emitted non-change transfer carries the fee, every other record
    /// carries zero. When the sender cannot be resolved the fee rides on the
    /// first emission.
    pub fn extract_transfers(
        &self,
        network_id: &str,
        block_number: u64,
        timestamp: u64,
        fee: Decimal,
    ) -> Vec<Transfer> {
        let mut transfers = Vec::new();

        // Coinbase: one mining transfer per extracted address, no fee.
        if self.is_coinbase() {
            for vout in &self.vout {
                if vout.value <= Decimal::ZERO {
                    continue;
                }
                for addr in extract_addresses(&vout.script_pub_key) {
                    transfers.push(Transfer {
                        tx_hash: self.txid.clone(),
                        network_id: network_id.to_string(),
                        block_number,
                        from_address: COINBASE_SENDER.to_string(),
                        to_address: addr,
                        asset_address: String::new(),
                        amount: vout.value.to_string(),
                        transfer_type: TransferType::Mining,
                        tx_fee: Decimal::ZERO,
                        timestamp,
                    });
                }
            }
            return transfers;
        }

        let input_addresses = self.input_addresses();
        let outputs = self.outputs_by_address();

        // Single sender as-is, multiple senders as a composite indicator,
        // unknown sender (no prevout data) as the empty string.
        let from_address = match input_addresses.len() {
            0 => String::new(),
            1 => input_addresses[0].clone(),
            n => format!("{}+{}_more", input_addresses[0], n - 1),
        };

        let mut fee_assigned = false;
        for (addr, value) in outputs {
            // An output going back to a spending address is likely change.
            // The heuristic only steers fee attribution.
            let is_change = input_addresses.iter().any(|input| *input == addr);

            let mut transfer = Transfer {
                tx_hash: self.txid.clone(),
                network_id: network_id.to_string(),
                block_number,
                from_address: from_address.clone(),
                to_address: addr,
                asset_address: String::new(),
                amount: value.to_string(),
                transfer_type: TransferType::Transfer,
                tx_fee: Decimal::ZERO,
                timestamp,
            };

            if !fee_assigned && !is_change && !fee.is_zero() {
                transfer.tx_fee = fee;
                fee_assigned = true;
            }

            transfers.push(transfer);
        }

        transfers
    }
}
