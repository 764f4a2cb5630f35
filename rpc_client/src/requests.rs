//! JSON-RPC 2.0 request bodies for the chain endpoints this service consumes.
//!
//! Builders are pure so the wire shape can be asserted in tests without a
//! server. Batched calls correlate responses to requests through the `id`
//! field, which is why signature and address lookups carry their subject as
//! the id instead of a counter.

use serde_json::{json, Value};

/// Token program that owns standard fungible token accounts.
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

pub fn signatures_for_address_request(
    pubkey: &str,
    before: Option<&str>,
    until: Option<&str>,
) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": pubkey,
        "method": "getSignaturesForAddress",
        "params": [
            pubkey,
            {
                "before": before,
                "until": until,
            },
        ],
    })
}

pub fn transaction_request(signature: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": signature,
        "method": "getTransaction",
        "params": [
            signature,
            {"encoding": "jsonParsed", "maxSupportedTransactionVersion": 0},
        ],
    })
}

/// `getTokenAccountsByOwner`, scoped to one mint when `token_address` is
/// given and to the whole token program otherwise.
pub fn token_accounts_by_owner_request(pubkey: &str, token_address: Option<&str>) -> Value {
    let filter = match token_address {
        Some(mint) => json!({"mint": mint}),
        None => json!({"programId": TOKEN_PROGRAM_ID}),
    };

    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getTokenAccountsByOwner",
        "params": [pubkey, filter, {"encoding": "jsonParsed"}],
    })
}

pub fn multiple_accounts_request(pubkeys: &[String]) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getMultipleAccounts",
        "params": [pubkeys, {"encoding": "jsonParsed"}],
    })
}

pub fn balance_request(pubkey: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getBalance",
        "params": [pubkey],
    })
}

pub fn token_largest_accounts_request(token_address: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getTokenLargestAccounts",
        "params": [token_address],
    })
}

pub fn program_accounts_request(pubkey: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getProgramAccounts",
        "params": [pubkey, {"encoding": "base64"}],
    })
}

pub fn latest_blockhash_request() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getLatestBlockhash",
        "params": [],
    })
}

pub fn minimum_balance_for_rent_exemption_request(data_len: usize) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getMinimumBalanceForRentExemption",
        "params": [data_len],
    })
}

pub fn send_transaction_request(base64_transaction: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "sendTransaction",
        "params": [base64_transaction, {"encoding": "base64"}],
    })
}

pub fn signature_statuses_request(signatures: &[String]) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getSignatureStatuses",
        "params": [signatures],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_request_carries_address_as_id() {
        let request = signatures_for_address_request("addr1", Some("sigN"), None);
        assert_eq!(request["id"], "addr1");
        assert_eq!(request["method"], "getSignaturesForAddress");
        assert_eq!(request["params"][0], "addr1");
        assert_eq!(request["params"][1]["before"], "sigN");
        assert!(request["params"][1]["until"].is_null());
    }

    #[test]
    fn test_transaction_request_shape() {
        let request = transaction_request("sig1");
        assert_eq!(request["id"], "sig1");
        assert_eq!(request["params"][0], "sig1");
        assert_eq!(request["params"][1]["encoding"], "jsonParsed");
        assert_eq!(request["params"][1]["maxSupportedTransactionVersion"], 0);
    }

    #[test]
    fn test_token_accounts_filter_switches_on_mint() {
        let by_program = token_accounts_by_owner_request("owner", None);
        assert_eq!(by_program["params"][1]["programId"], TOKEN_PROGRAM_ID);

        let by_mint = token_accounts_by_owner_request("owner", Some("mint1"));
        assert_eq!(by_mint["params"][1]["mint"], "mint1");
        assert!(by_mint["params"][1].get("programId").is_none());
    }

    #[test]
    fn test_send_transaction_uses_base64_encoding() {
        let request = send_transaction_request("AQID");
        assert_eq!(request["method"], "sendTransaction");
        assert_eq!(request["params"][1]["encoding"], "base64");
    }
}
