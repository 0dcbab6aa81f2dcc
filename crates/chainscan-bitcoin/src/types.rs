//! Bitcoin Core RPC shapes.
//!
//! Types align with `getblock` (verbosity ≥ 2) and `getrawtransaction`
//! responses. BTC amounts deserialize straight into [`Decimal`]; nothing
//! downstream touches binary floats.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::address::extract_addresses;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub hash: String,
    #[serde(default)]
    pub confirmations: i64,
    pub height: u64,
    #[serde(default)]
    pub version: i64,
    #[serde(default, rename = "versionHex")]
    pub version_hex: String,
    #[serde(default, rename = "merkleroot")]
    pub merkle_root: String,
    pub time: u64,
    #[serde(default, rename = "mediantime")]
    pub median_time: u64,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub bits: String,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default, rename = "chainwork")]
    pub chain_work: String,
    #[serde(default, rename = "nTx")]
    pub n_tx: u32,
    #[serde(default, rename = "previousblockhash")]
    pub previous_block_hash: String,
    #[serde(default, rename = "nextblockhash")]
    pub next_block_hash: String,
    #[serde(default, rename = "strippedsize")]
    pub stripped_size: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub tx: Vec<Transaction>,
}

impl Block {
    /// Returns `true` if any transaction already carries prevout data.
    pub fn has_prev_out_data(&self) -> bool {
        self.tx.iter().any(Transaction::has_prev_out_data)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub vsize: u64,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub locktime: u64,
    #[serde(default)]
    pub vin: Vec<Vin>,
    #[serde(default)]
    pub vout: Vec<Vout>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hex: String,
    // Block context, present only when the tx was fetched inside a block.
    #[serde(default, rename = "blockhash", skip_serializing_if = "String::is_empty")]
    pub block_hash: String,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(default)]
    pub time: u64,
    #[serde(default, rename = "blocktime")]
    pub block_time: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vin {
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub vout: u32,
    #[serde(default, rename = "scriptSig", skip_serializing_if = "Option::is_none")]
    pub script_sig: Option<ScriptSig>,
    #[serde(default)]
    pub sequence: u64,
    #[serde(default, rename = "txinwitness")]
    pub tx_in_witness: Vec<String>,
    #[serde(default)]
    pub coinbase: String,
    /// Present with `getblock` verbosity=3, or after prevout enrichment.
    #[serde(default, rename = "prevout", skip_serializing_if = "Option::is_none")]
    pub prev_out: Option<PrevOut>,
}

impl Vin {
    pub fn is_coinbase(&self) -> bool {
        !self.coinbase.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptSig {
    #[serde(default)]
    pub asm: String,
    #[serde(default)]
    pub hex: String,
}

/// The output being spent by an input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrevOut {
    pub value: Decimal,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vout {
    pub value: Decimal,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub asm: String,
    #[serde(default)]
    pub hex: String,
    #[serde(default, rename = "reqSigs")]
    pub req_sigs: u32,
    #[serde(default, rename = "type")]
    pub script_type: String,
    /// Single address (modern format).
    #[serde(default)]
    pub address: String,
    /// Multiple addresses (deprecated, still emitted for multisig).
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// `gettxout` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxOut {
    #[serde(default, rename = "bestblock")]
    pub best_block: String,
    #[serde(default)]
    pub confirmations: i64,
    pub value: Decimal,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
    #[serde(default)]
    pub coinbase: bool,
}

/// `decoderawtransaction` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodedRawTransaction {
    pub txid: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub vsize: u64,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub locktime: u64,
    #[serde(default)]
    pub vin: Vec<Vin>,
    #[serde(default)]
    pub vout: Vec<Vout>,
}

impl Transaction {
    /// A coinbase transaction mints new coins and has no real inputs.
    pub fn is_coinbase(&self) -> bool {
        self.vin.first().is_some_and(Vin::is_coinbase)
    }

    /// Returns `true` if every input carries prevout data.
    ///
    /// Fee math is strict: a single missing prevout invalidates the input
    /// total, so a partially enriched transaction reports no data and its
    /// fee stays zero.
    pub fn has_prev_out_data(&self) -> bool {
        if self.is_coinbase() {
            return false;
        }
        self.vin.iter().all(|vin| vin.prev_out.is_some())
    }

    /// Unique spending addresses in first-seen order.
    pub fn input_addresses(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut addresses = Vec::new();
        for vin in &self.vin {
            if vin.is_coinbase() {
                continue;
            }
            if let Some(prev_out) = &vin.prev_out {
                for addr in extract_addresses(&prev_out.script_pub_key) {
                    if seen.insert(addr.clone()) {
                        addresses.push(addr);
                    }
                }
            }
        }
        addresses
    }

    /// Positive-value outputs grouped by recipient address, values summed.
    ///
    /// Ordering is first appearance while walking `vout` — fee attribution
    /// and tests depend on it being deterministic.
    pub fn outputs_by_address(&self) -> Vec<(String, Decimal)> {
        let mut outputs: Vec<(String, Decimal)> = Vec::new();
        for vout in &self.vout {
            if vout.value <= Decimal::ZERO {
                continue;
            }
            // Non-standard and OP_RETURN outputs carry no address
            for addr in extract_addresses(&vout.script_pub_key) {
                match outputs.iter_mut().find(|(a, _)| *a == addr) {
                    Some((_, total)) => *total += vout.value,
                    None => outputs.push((addr, vout.value)),
                }
            }
        }
        outputs
    }

    /// Sum of all input values (requires prevout data).
    pub fn total_input(&self) -> Decimal {
        self.vin
            .iter()
            .filter_map(|vin| vin.prev_out.as_ref())
            .filter(|p| p.value > Decimal::ZERO)
            .map(|p| p.value)
            .sum()
    }

    /// Sum of all positive output values.
    pub fn total_output(&self) -> Decimal {
        self.vout
            .iter()
            .filter(|v| v.value > Decimal::ZERO)
            .map(|v| v.value)
            .sum()
    }
}
