//! Bitcoin address validation and classification.
//!
//! Pure functions, no I/O. Bech32 decoding accepts both the Bech32 and
//! Bech32m checksums so segwit v0 and v1+ addresses go through one decoder;
//! Base58Check is verified against the double-SHA256 checksum.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::ScriptPubKey;

/// Standard Bitcoin output/address classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    WitnessUnknown,
    NullData,
    Multisig,
    Pubkey,
    NonStandard,
    Unknown,
}

impl std::fmt::Display for AddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::P2pkh => "p2pkh",
            Self::P2sh => "p2sh",
            Self::P2wpkh => "p2wpkh",
            Self::P2wsh => "p2wsh",
            Self::P2tr => "p2tr",
            Self::WitnessUnknown => "witness_unknown",
            Self::NullData => "nulldata",
            Self::Multisig => "multisig",
            Self::Pubkey => "pubkey",
            Self::NonStandard => "nonstandard",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

// Mainnet prefixes
pub const MAINNET_P2PKH_PREFIX: u8 = 0x00;
pub const MAINNET_P2SH_PREFIX: u8 = 0x05;
pub const MAINNET_BECH32_HRP: &str = "bc";

// Testnet prefixes
pub const TESTNET_P2PKH_PREFIX: u8 = 0x6f;
pub const TESTNET_P2SH_PREFIX: u8 = 0xc4;
pub const TESTNET_BECH32_HRP: &str = "tb";

/// Returns `true` if `addr` is a valid Bitcoin address on the given network.
pub fn is_valid_address(addr: &str, is_testnet: bool) -> bool {
    if addr.is_empty() {
        return false;
    }
    if addr.starts_with("bc1") || addr.starts_with("tb1") {
        return is_valid_bech32_address(addr, is_testnet);
    }
    is_valid_base58_address(addr, is_testnet)
}

/// Validate a Bech32/Bech32m-encoded segwit address.
pub fn is_valid_bech32_address(addr: &str, is_testnet: bool) -> bool {
    match decode_segwit(addr, is_testnet) {
        Some((version, program)) => witness_program_valid(version, program.len()),
        None => false,
    }
}

/// Validate a Base58Check-encoded legacy/P2SH address.
pub fn is_valid_base58_address(addr: &str, is_testnet: bool) -> bool {
    let Ok(decoded) = bs58::decode(addr).into_vec() else {
        return false;
    };
    if decoded.len() != 25 {
        return false;
    }

    let version = decoded[0];
    let payload = &decoded[..21];
    let checksum = &decoded[21..];

    let valid_version = if is_testnet {
        version == TESTNET_P2PKH_PREFIX || version == TESTNET_P2SH_PREFIX
    } else {
        version == MAINNET_P2PKH_PREFIX || version == MAINNET_P2SH_PREFIX
    };
    if !valid_version {
        return false;
    }

    let hash = Sha256::digest(Sha256::digest(payload));
    checksum == &hash[..4]
}

/// Classify an address string.
pub fn detect_address_type(addr: &str, is_testnet: bool) -> AddressType {
    if addr.is_empty() {
        return AddressType::Unknown;
    }

    if addr.starts_with("bc1") || addr.starts_with("tb1") {
        let Some((version, program)) = decode_segwit(addr, is_testnet) else {
            return AddressType::Unknown;
        };
        return match (version, program.len()) {
            (0, 20) => AddressType::P2wpkh,
            (0, 32) => AddressType::P2wsh,
            (1, 32) => AddressType::P2tr,
            (0 | 1, _) => AddressType::Unknown,
            _ => AddressType::WitnessUnknown,
        };
    }

    if let Ok(decoded) = bs58::decode(addr).into_vec() {
        if decoded.len() == 25 {
            let version = decoded[0];
            if is_testnet {
                if version == TESTNET_P2PKH_PREFIX {
                    return AddressType::P2pkh;
                } else if version == TESTNET_P2SH_PREFIX {
                    return AddressType::P2sh;
                }
            } else if version == MAINNET_P2PKH_PREFIX {
                return AddressType::P2pkh;
            } else if version == MAINNET_P2SH_PREFIX {
                return AddressType::P2sh;
            }
        }
    }

    AddressType::Unknown
}

/// Map Bitcoin Core's `scriptPubKey.type` strings to [`AddressType`].
pub fn script_type_to_address_type(script_type: &str) -> AddressType {
    match script_type.to_ascii_lowercase().as_str() {
        "pubkeyhash" => AddressType::P2pkh,
        "scripthash" => AddressType::P2sh,
        "witness_v0_keyhash" => AddressType::P2wpkh,
        "witness_v0_scripthash" => AddressType::P2wsh,
        "witness_v1_taproot" => AddressType::P2tr,
        "nulldata" | "null_data" => AddressType::NullData,
        "multisig" => AddressType::Multisig,
        "pubkey" => AddressType::Pubkey,
        "nonstandard" => AddressType::NonStandard,
        "witness_unknown" => AddressType::WitnessUnknown,
        _ => AddressType::Unknown,
    }
}

/// All addresses carried by a scriptPubKey, in wire order.
///
/// The modern form has a single `address`; legacy multisig still uses
/// `addresses`. Duplicates are preserved — callers dedupe per purpose.
pub fn extract_addresses(spk: &ScriptPubKey) -> Vec<String> {
    let mut addresses = Vec::new();
    if !spk.address.is_empty() {
        addresses.push(spk.address.clone());
    }
    addresses.extend(spk.addresses.iter().filter(|a| !a.is_empty()).cloned());
    addresses
}

/// Trim and validate an address against either network.
pub fn normalize_address(addr: &str) -> Option<String> {
    let cleaned = addr.trim();
    if cleaned.is_empty() {
        return None;
    }
    if is_valid_address(cleaned, false) || is_valid_address(cleaned, true) {
        Some(cleaned.to_string())
    } else {
        None
    }
}

/// Decode a segwit address into (witness version, program bytes).
///
/// Accepts both Bech32 and Bech32m checksums; the payload past the version
/// quintet is regrouped 5→8 bits with no padding.
fn decode_segwit(addr: &str, is_testnet: bool) -> Option<(u8, Vec<u8>)> {
    let expected_hrp = if is_testnet {
        TESTNET_BECH32_HRP
    } else {
        MAINNET_BECH32_HRP
    };

    let (hrp, data, _variant) = bech32::decode(addr).ok()?;
    if hrp != expected_hrp || data.is_empty() {
        return None;
    }

    let program = bech32::convert_bits(&data[1..], 5, 8, false).ok()?;
    Some((data[0].to_u8(), program))
}

fn witness_program_valid(version: u8, program_len: usize) -> bool {
    match version {
        // v0: 20 bytes for P2WPKH, 32 for P2WSH
        0 => program_len == 20 || program_len == 32,
        // v1 (taproot): 32 bytes
        1 => program_len == 32,
        // Future versions are accepted syntactically
        _ => true,
    }
}
