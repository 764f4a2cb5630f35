//! The buy/sell detection heuristic.

use crate::{
    adjusted_sol_change, owner_balances_by_mint, BalanceDeltas, TokenTrade, TradeType,
};
use serde_json::Value;
use tracing::trace;

/// Decide whether one parsed transaction is a native-coin/token trade from
/// the signer's perspective.
///
/// Returns `None` for anything that is not classifiable: missing `meta` or
/// message, no account flagged as signer, no block time or signature, or
/// balance movements that do not pair a coin change with an opposite token
/// change (token-to-token swaps, pure transfers). Malformed data never
/// raises.
///
/// When several mints moved in the qualifying direction the one with the
/// largest absolute change is reported; exact ties fall to the
/// lexicographically smaller mint, so the choice is deterministic.
pub fn classify_transaction(transaction: &Value) -> Option<TokenTrade> {
    let meta = transaction.get("meta")?;
    let message = transaction.pointer("/transaction/message")?;

    let account_keys = message.get("accountKeys")?.as_array()?;
    let signer_index = account_keys
        .iter()
        .position(|account| account.get("signer").and_then(Value::as_bool) == Some(true))?;
    let signer = account_keys[signer_index]
        .get("pubkey")
        .and_then(Value::as_str)?;

    let pre_lamports = lamports_at(meta.get("preBalances"), signer_index);
    let post_lamports = lamports_at(meta.get("postBalances"), signer_index);
    let fee_lamports = meta.get("fee").and_then(Value::as_u64).unwrap_or(0);
    let adjusted = adjusted_sol_change(pre_lamports, post_lamports, fee_lamports);

    let token_changes = signer_token_changes(meta, signer);

    let timestamp = transaction.get("blockTime").and_then(Value::as_i64)?;
    let signature = transaction
        .pointer("/transaction/signatures/0")
        .and_then(Value::as_str)?;

    trace!(
        "signer={} adjusted_sol_change={} token_changes={:?}",
        signer,
        adjusted,
        token_changes
    );

    if adjusted < 0.0 {
        // Coin decreased, some token increased: a buy.
        let (mint, change) = dominant_change(&token_changes, |change| change > 0.0)?;
        Some(TokenTrade {
            trade_type: TradeType::Buy,
            sol_amount: adjusted.abs(),
            token: mint.to_string(),
            token_amount: change,
            timestamp,
            signature: signature.to_string(),
            signer: signer.to_string(),
        })
    } else if adjusted > 0.0 {
        // Coin increased, some token decreased: a sell.
        let (mint, change) = dominant_change(&token_changes, |change| change < 0.0)?;
        Some(TokenTrade {
            trade_type: TradeType::Sell,
            sol_amount: adjusted,
            token: mint.to_string(),
            token_amount: change.abs(),
            timestamp,
            signature: signature.to_string(),
            signer: signer.to_string(),
        })
    } else {
        None
    }
}

fn lamports_at(balances: Option<&Value>, index: usize) -> u64 {
    balances
        .and_then(Value::as_array)
        .and_then(|balances| balances.get(index))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Per-mint post-minus-pre deltas in the signer's token holdings, with
/// unchanged mints omitted.
fn signer_token_changes(meta: &Value, signer: &str) -> BalanceDeltas {
    let pre = owner_balances_by_mint(meta.get("preTokenBalances"), signer);
    let post = owner_balances_by_mint(meta.get("postTokenBalances"), signer);

    let mut changes = BalanceDeltas::new();
    for mint in pre.keys().chain(post.keys()) {
        if changes.contains_key(mint) {
            continue;
        }
        let change = post.get(mint).copied().unwrap_or(0.0) - pre.get(mint).copied().unwrap_or(0.0);
        if change != 0.0 {
            changes.insert(mint.clone(), change);
        }
    }

    changes
}

/// The qualifying mint with the largest absolute change.
fn dominant_change(
    changes: &BalanceDeltas,
    qualifies: impl Fn(f64) -> bool,
) -> Option<(&str, f64)> {
    let mut dominant: Option<(&str, f64)> = None;
    for (mint, &change) in changes {
        if !qualifies(change) {
            continue;
        }
        match dominant {
            Some((_, best)) if change.abs() <= best.abs() => {}
            _ => dominant = Some((mint, change)),
        }
    }
    dominant
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct TxFixture {
        pre_lamports: u64,
        post_lamports: u64,
        fee: u64,
        pre_tokens: Vec<Value>,
        post_tokens: Vec<Value>,
    }

    const SIGNER: &str = "SignerPubkey1111111111111111111111111111111";

    fn token_balance(owner: &str, mint: &str, amount: &str, decimals: u32) -> Value {
        json!({
            "owner": owner,
            "mint": mint,
            "uiTokenAmount": {"amount": amount, "decimals": decimals},
        })
    }

    fn transaction(fixture: TxFixture) -> Value {
        json!({
            "blockTime": 1_700_000_123,
            "meta": {
                "fee": fixture.fee,
                "preBalances": [fixture.pre_lamports, 10],
                "postBalances": [fixture.post_lamports, 10],
                "preTokenBalances": fixture.pre_tokens,
                "postTokenBalances": fixture.post_tokens,
            },
            "transaction": {
                "message": {
                    "accountKeys": [
                        {"pubkey": SIGNER, "signer": true},
                        {"pubkey": "OtherAccount", "signer": false},
                    ],
                },
                "signatures": ["PrimarySig"],
            },
        })
    }

    #[test]
    fn test_buy_two_sol_for_fifty_tokens() {
        // Signer's coin balance drops by 2.0 net of fee, mint M rises by 50.
        let tx = transaction(TxFixture {
            pre_lamports: 5_000_000_000,
            post_lamports: 2_999_995_000,
            fee: 5_000,
            pre_tokens: vec![token_balance(SIGNER, "M", "0", 6)],
            post_tokens: vec![token_balance(SIGNER, "M", "50000000", 6)],
        });

        let trade = classify_transaction(&tx).expect("buy expected");
        assert_eq!(trade.trade_type, TradeType::Buy);
        assert!((trade.sol_amount - 2.0).abs() < 1e-9);
        assert_eq!(trade.token, "M");
        assert!((trade.token_amount - 50.0).abs() < 1e-9);
        assert_eq!(trade.timestamp, 1_700_000_123);
        assert_eq!(trade.signature, "PrimarySig");
        assert_eq!(trade.signer, SIGNER);
    }

    #[test]
    fn test_sell_reports_positive_amounts() {
        let tx = transaction(TxFixture {
            pre_lamports: 1_000_000_000,
            post_lamports: 2_499_995_000,
            fee: 5_000,
            pre_tokens: vec![token_balance(SIGNER, "M", "80000000", 6)],
            post_tokens: vec![token_balance(SIGNER, "M", "30000000", 6)],
        });

        let trade = classify_transaction(&tx).expect("sell expected");
        assert_eq!(trade.trade_type, TradeType::Sell);
        assert!((trade.sol_amount - 1.5).abs() < 1e-9);
        assert_eq!(trade.token, "M");
        assert!((trade.token_amount - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_signer_flag_means_no_trade() {
        let mut tx = transaction(TxFixture {
            pre_lamports: 5_000_000_000,
            post_lamports: 3_000_000_000,
            fee: 5_000,
            pre_tokens: vec![],
            post_tokens: vec![token_balance(SIGNER, "M", "50", 0)],
        });
        tx["transaction"]["message"]["accountKeys"] =
            json!([{"pubkey": SIGNER, "signer": false}]);

        assert!(classify_transaction(&tx).is_none());
    }

    #[test]
    fn test_missing_meta_means_no_trade() {
        let mut tx = transaction(TxFixture {
            pre_lamports: 1,
            post_lamports: 1,
            fee: 0,
            pre_tokens: vec![],
            post_tokens: vec![],
        });
        tx.as_object_mut().unwrap().remove("meta");

        assert!(classify_transaction(&tx).is_none());
    }

    #[test]
    fn test_zero_deltas_mean_no_trade() {
        // Coin net of fee is zero and no token balances changed.
        let tx = transaction(TxFixture {
            pre_lamports: 1_000_005_000,
            post_lamports: 1_000_000_000,
            fee: 5_000,
            pre_tokens: vec![token_balance(SIGNER, "M", "100", 0)],
            post_tokens: vec![token_balance(SIGNER, "M", "100", 0)],
        });

        assert!(classify_transaction(&tx).is_none());
    }

    #[test]
    fn test_token_to_token_swap_is_not_a_trade() {
        // Only the fee moved on the coin side; two mints swapped.
        let tx = transaction(TxFixture {
            pre_lamports: 1_000_005_000,
            post_lamports: 1_000_000_000,
            fee: 5_000,
            pre_tokens: vec![
                token_balance(SIGNER, "A", "100", 0),
                token_balance(SIGNER, "B", "0", 0),
            ],
            post_tokens: vec![
                token_balance(SIGNER, "A", "0", 0),
                token_balance(SIGNER, "B", "250", 0),
            ],
        });

        assert!(classify_transaction(&tx).is_none());
    }

    #[test]
    fn test_multi_mint_buy_picks_largest_change() {
        let tx = transaction(TxFixture {
            pre_lamports: 5_000_000_000,
            post_lamports: 2_999_995_000,
            fee: 5_000,
            pre_tokens: vec![],
            post_tokens: vec![
                token_balance(SIGNER, "Small", "10", 0),
                token_balance(SIGNER, "Large", "900", 0),
            ],
        });

        let trade = classify_transaction(&tx).expect("buy expected");
        assert_eq!(trade.token, "Large");
        assert!((trade.token_amount - 900.0).abs() < 1e-9);
    }

    #[test]
    fn test_other_owners_token_movements_ignored() {
        // The counterparty's token balance change must not classify the
        // signer's pure transfer as a trade.
        let tx = transaction(TxFixture {
            pre_lamports: 5_000_005_000,
            post_lamports: 3_000_000_000,
            fee: 5_000,
            pre_tokens: vec![token_balance("Counterparty", "M", "0", 0)],
            post_tokens: vec![token_balance("Counterparty", "M", "50", 0)],
        });

        assert!(classify_transaction(&tx).is_none());
    }

    #[test]
    fn test_missing_block_time_means_no_trade() {
        let mut tx = transaction(TxFixture {
            pre_lamports: 5_000_000_000,
            post_lamports: 2_999_995_000,
            fee: 5_000,
            pre_tokens: vec![],
            post_tokens: vec![token_balance(SIGNER, "M", "50", 0)],
        });
        tx.as_object_mut().unwrap().remove("blockTime");

        assert!(classify_transaction(&tx).is_none());
    }

    #[test]
    fn test_classifier_is_deterministic() {
        let tx = transaction(TxFixture {
            pre_lamports: 5_000_000_000,
            post_lamports: 2_999_995_000,
            fee: 5_000,
            pre_tokens: vec![],
            post_tokens: vec![
                token_balance(SIGNER, "A", "7", 0),
                token_balance(SIGNER, "B", "7", 0),
            ],
        });

        let first = classify_transaction(&tx);
        for _ in 0..10 {
            assert_eq!(classify_transaction(&tx), first);
        }
        // Exact tie falls to the lexicographically smaller mint.
        assert_eq!(first.unwrap().token, "A");
    }
}
