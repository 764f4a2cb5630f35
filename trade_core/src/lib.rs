//! Trade classification for native-coin/token swaps.
//!
//! A transaction counts as a trade when, from the signer's perspective, the
//! native coin moved one way and some token balance moved the other. The
//! classifier is a pure function over the parsed transaction JSON: same
//! input, same output, no I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod classifier;

pub use classifier::classify_transaction;

/// Base units of the native coin per whole coin.
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Buy,
    Sell,
}

/// One reconstructed native-coin/token trade.
///
/// Derived from a single transaction, never mutated afterwards, and only
/// lives for the duration of one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTrade {
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    /// Whole-coin amount the signer paid (buy) or received (sell), net of
    /// the transaction fee.
    pub sol_amount: f64,
    /// Mint address of the traded token.
    pub token: String,
    pub token_amount: f64,
    /// Block time of the transaction.
    pub timestamp: i64,
    /// Primary transaction signature.
    pub signature: String,
    pub signer: String,
}

/// Signed per-mint change in the signer's holdings across a transaction.
///
/// Keyed by mint in a `BTreeMap` so iteration order, and therefore the
/// classifier's tie-break between mints, is deterministic.
pub type BalanceDeltas = BTreeMap<String, f64>;

/// Convert a raw base-unit amount string by its reported decimals.
pub fn ui_amount(amount: &str, decimals: u32) -> f64 {
    amount.parse::<f64>().unwrap_or(0.0) / 10f64.powi(decimals as i32)
}

/// Lamport delta to whole coins, with the fee added back so the trade's
/// economic effect is isolated from the unavoidable fee cost.
pub fn adjusted_sol_change(pre_lamports: u64, post_lamports: u64, fee_lamports: u64) -> f64 {
    let sol_change = (post_lamports as f64 - pre_lamports as f64) / LAMPORTS_PER_SOL;
    sol_change + fee_lamports as f64 / LAMPORTS_PER_SOL
}

/// Token balance entries owned by `owner`, as mint -> ui amount.
pub(crate) fn owner_balances_by_mint(balances: Option<&Value>, owner: &str) -> BalanceDeltas {
    let mut by_mint = BalanceDeltas::new();

    let entries = match balances.and_then(Value::as_array) {
        Some(entries) => entries,
        None => return by_mint,
    };

    for entry in entries {
        if entry.get("owner").and_then(Value::as_str) != Some(owner) {
            continue;
        }
        let mint = match entry.get("mint").and_then(Value::as_str) {
            Some(mint) => mint,
            None => continue,
        };
        let amount = entry
            .pointer("/uiTokenAmount/amount")
            .and_then(Value::as_str)
            .unwrap_or("0");
        let decimals = entry
            .pointer("/uiTokenAmount/decimals")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;

        by_mint.insert(mint.to_string(), ui_amount(amount, decimals));
    }

    by_mint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_adjustment_is_exact() {
        // -1.5 SOL gross plus a 5000-lamport fee refund nets -1.499995.
        let adjusted = adjusted_sol_change(2_000_000_000, 500_000_000, 5_000);
        assert!((adjusted - (-1.499995)).abs() < 1e-12);
    }

    #[test]
    fn test_ui_amount_conversion() {
        assert!((ui_amount("2500000", 6) - 2.5).abs() < 1e-12);
        assert_eq!(ui_amount("not-a-number", 6), 0.0);
    }
}
