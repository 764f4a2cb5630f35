//! Mint creation and initial-supply provisioning.
//!
//! One signed transaction creates the mint account, initializes it, creates
//! the authority's associated token account, and mints the initial supply
//! into it. Submission goes through the same JSON-RPC client the rest of
//! the service uses; the signing key is injected configuration, never a
//! process-wide singleton.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use rpc_client::RpcClient;
use serde_json::Value;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction,
    transaction::Transaction,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};
use spl_token::state::Mint;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum MinterError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
    #[error("RPC error: {0}")]
    Rpc(#[from] rpc_client::RpcClientError),
    #[error("Instruction build error: {0}")]
    Instruction(String),
    #[error("Transaction serialization error: {0}")]
    Serialization(String),
    #[error("Invalid blockhash: {0}")]
    InvalidBlockhash(String),
    #[error("Transaction {signature} failed on chain: {error}")]
    TransactionFailed { signature: String, error: String },
    #[error("Transaction {0} not confirmed before the poll budget ran out")]
    Unconfirmed(String),
}

pub type Result<T> = std::result::Result<T, MinterError>;

#[derive(Debug, Clone)]
pub struct MinterConfig {
    /// Base58-encoded 64-byte keypair of the mint authority / fee payer
    pub private_key: String,
    /// Decimals of newly created mints
    pub token_decimals: u8,
    /// Supply minted to the authority's associated token account, base units
    pub initial_supply: u64,
}

pub struct TokenMinter {
    rpc: Arc<RpcClient>,
    payer: Keypair,
    config: MinterConfig,
}

impl TokenMinter {
    pub fn new(rpc: Arc<RpcClient>, config: MinterConfig) -> Result<Self> {
        let payer = parse_keypair(&config.private_key)?;
        Ok(Self { rpc, payer, config })
    }

    /// Create a new mint and provision its initial supply.
    ///
    /// Returns the mint address once the transaction is confirmed.
    pub async fn create_and_mint_token(&self) -> Result<String> {
        let mint = Keypair::new();
        let authority = self.payer.pubkey();

        let rent_lamports = self
            .rpc
            .get_minimum_balance_for_rent_exemption(Mint::LEN)
            .await?;
        let recent_blockhash: Hash = self
            .rpc
            .get_latest_blockhash()
            .await?
            .parse()
            .map_err(|e| MinterError::InvalidBlockhash(format!("{:?}", e)))?;

        let instructions = mint_creation_instructions(
            &authority,
            &mint.pubkey(),
            rent_lamports,
            self.config.token_decimals,
            self.config.initial_supply,
        )?;

        let transaction = Transaction::new_signed_with_payer(
            &instructions,
            Some(&authority),
            &[&self.payer, &mint],
            recent_blockhash,
        );

        let serialized = bincode::serialize(&transaction)
            .map_err(|e| MinterError::Serialization(e.to_string()))?;
        let signature = self
            .rpc
            .send_transaction(&BASE64_STANDARD.encode(serialized))
            .await?;

        info!(
            "Created mint {} (tx {}), awaiting confirmation",
            mint.pubkey(),
            signature
        );

        self.await_confirmation(&signature).await?;

        info!("Minted initial supply of {} to the authority's associated token account",
            self.config.initial_supply);

        Ok(mint.pubkey().to_string())
    }

    /// Poll `getSignatureStatuses` until the transaction confirms.
    async fn await_confirmation(&self, signature: &str) -> Result<()> {
        const MAX_POLLS: u32 = 20;
        const POLL_INTERVAL: Duration = Duration::from_millis(500);

        for attempt in 1..=MAX_POLLS {
            let response = self
                .rpc
                .get_signature_statuses(&[signature.to_string()])
                .await?;

            let status = response.pointer("/result/value/0");
            if let Some(status) = status.filter(|status| !status.is_null()) {
                if let Some(err) = status.get("err").filter(|err| !err.is_null()) {
                    return Err(MinterError::TransactionFailed {
                        signature: signature.to_string(),
                        error: err.to_string(),
                    });
                }

                let confirmation = status
                    .get("confirmationStatus")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if confirmation == "confirmed" || confirmation == "finalized" {
                    debug!("Transaction {} {} after {} poll(s)", signature, confirmation, attempt);
                    return Ok(());
                }
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }

        warn!(
            "Transaction {} still unconfirmed after {} polls",
            signature, MAX_POLLS
        );
        Err(MinterError::Unconfirmed(signature.to_string()))
    }
}

/// Decode a base58 keypair string into a signing key.
fn parse_keypair(private_key: &str) -> Result<Keypair> {
    let bytes = bs58::decode(private_key)
        .into_vec()
        .map_err(|e| MinterError::InvalidKey(e.to_string()))?;

    Keypair::try_from(&bytes[..]).map_err(|e| MinterError::InvalidKey(e.to_string()))
}

/// The four instructions of a mint bootstrap, in execution order:
/// fund the mint account, initialize the mint, create the authority's
/// associated token account, mint the initial supply into it.
fn mint_creation_instructions(
    authority: &Pubkey,
    mint_pubkey: &Pubkey,
    rent_lamports: u64,
    decimals: u8,
    initial_supply: u64,
) -> Result<Vec<Instruction>> {
    let associated_account = get_associated_token_address(authority, mint_pubkey);

    Ok(vec![
        system_instruction::create_account(
            authority,
            mint_pubkey,
            rent_lamports,
            Mint::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_mint(
            &spl_token::id(),
            mint_pubkey,
            authority,
            None,
            decimals,
        )
        .map_err(|e| MinterError::Instruction(e.to_string()))?,
        create_associated_token_account(authority, authority, mint_pubkey, &spl_token::id()),
        spl_token::instruction::mint_to(
            &spl_token::id(),
            mint_pubkey,
            &associated_account,
            authority,
            &[],
            initial_supply,
        )
        .map_err(|e| MinterError::Instruction(e.to_string()))?,
    ])
}
