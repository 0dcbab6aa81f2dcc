//! Transaction fee math.

use rust_decimal::Decimal;

use crate::types::Transaction;

/// Satoshis per BTC.
pub const BTC_TO_SATOSHI: i64 = 100_000_000;

/// Fee urgency bucket derived from the fee rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePriority {
    High,
    Medium,
    Low,
    VeryLow,
}

impl std::fmt::Display for FeePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::VeryLow => write!(f, "very_low"),
        }
    }
}

impl Transaction {
    /// Fee = total input − total output, clamped to zero.
    ///
    /// Coinbase transactions mint coins and pay no fee. Without prevout
    /// data the fee is zero rather than a partial guess.
    pub fn fee(&self) -> Decimal {
        if self.is_coinbase() || !self.has_prev_out_data() {
            return Decimal::ZERO;
        }

        let fee = self.total_input() - self.total_output();
        if fee.is_sign_negative() {
            return Decimal::ZERO;
        }
        fee
    }

    /// Fee rate in satoshis per virtual byte.
    pub fn fee_rate(&self) -> Decimal {
        let fee = self.fee();
        if fee.is_zero() || self.vsize == 0 {
            return Decimal::ZERO;
        }
        btc_to_satoshi(fee) / Decimal::from(self.vsize)
    }
}

pub fn btc_to_satoshi(btc: Decimal) -> Decimal {
    btc * Decimal::from(BTC_TO_SATOSHI)
}

pub fn satoshi_to_btc(satoshi: Decimal) -> Decimal {
    satoshi / Decimal::from(BTC_TO_SATOSHI)
}

/// Bucket a fee rate (sat/vB). Thresholds are approximate and drift with
/// network conditions.
pub fn fee_priority(sat_per_vbyte: Decimal) -> FeePriority {
    if sat_per_vbyte >= Decimal::from(100) {
        FeePriority::High
    } else if sat_per_vbyte >= Decimal::from(50) {
        FeePriority::Medium
    } else if sat_per_vbyte >= Decimal::from(10) {
        FeePriority::Low
    } else {
        FeePriority::VeryLow
    }
}
