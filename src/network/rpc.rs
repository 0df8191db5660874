// src/network/rpc.rs
use crate::network::ledger::{Ledger, TxStatus};
use crate::network::program::{
    MINER_ACCOUNT_DISCRIMINATOR, MINER_ACCOUNT_LEN, MinerRecord, ProgramAccounts,
    ProgramErrorCode, decode_miner, decode_round,
};
use crate::types::MinerAccountState;
use crate::utils::error::MinerError;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_client::RpcClient;
use solana_client::rpc_request::RpcError;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::InstructionError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, TransactionError};
use std::time::Duration;
use url::Url;

/// HTTP status used by providers to throttle clients
const TOO_MANY_REQUESTS: u16 = 429;

/// Ledger client over a Solana JSON-RPC endpoint
///
/// Every call is blocking and bounded by the client timeout. Never call it
/// from inside an async runtime.
pub struct RpcLedger {
    /// Underlying RPC client
    client: RpcClient,
    /// Mining program whose accounts are read
    program_id: Pubkey,
    /// Endpoint, for log messages
    url: Url,
}

impl RpcLedger {
    /// Creates a client for `rpc_url`
    ///
    /// # Arguments
    /// * `rpc_url` - HTTP(S) endpoint of the cluster
    /// * `program_id` - Mining program address
    /// * `timeout` - Per-request network timeout
    ///
    /// # Errors
    /// `UrlError` or `ConfigError` if the URL is not a valid HTTP(S) URL
    pub fn new(rpc_url: &str, program_id: Pubkey, timeout: Duration) -> Result<Self, MinerError> {
        let url = Url::parse(rpc_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MinerError::ConfigError(format!(
                "RPC URL must be http(s), got {}",
                url.scheme()
            )));
        }

        log::debug!("Connecting to {} (timeout {:?})", url, timeout);
        Ok(RpcLedger {
            client: RpcClient::new_with_timeout_and_commitment(
                url.as_str(),
                timeout,
                CommitmentConfig::confirmed(),
            ),
            program_id,
            url,
        })
    }

    /// Endpoint this client talks to
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Ledger for RpcLedger {
    fn account_state(&self, accounts: &ProgramAccounts) -> Result<MinerAccountState, MinerError> {
        let fetched = self
            .client
            .get_multiple_accounts(&[accounts.miner, accounts.global_round])
            .map_err(classify)?;

        let mut fetched = fetched.into_iter();
        let miner = fetched.next().flatten().ok_or_else(|| {
            MinerError::AccountNotInitialized(accounts.authority.to_string())
        })?;
        let round = fetched.next().flatten().ok_or_else(|| {
            MinerError::ConfigError(format!(
                "global round account {} not found; is the program id {} right?",
                accounts.global_round, accounts.program_id
            ))
        })?;

        if miner.owner != self.program_id || round.owner != self.program_id {
            return Err(MinerError::ProtocolError(format!(
                "mining accounts are not owned by program {}",
                self.program_id
            )));
        }

        Ok(MinerAccountState::from_records(
            &decode_miner(&miner.data)?,
            &decode_round(&round.data)?,
        ))
    }

    fn latest_blockhash(&self) -> Result<Hash, MinerError> {
        self.client.get_latest_blockhash().map_err(classify)
    }

    fn submit_transaction(&self, tx: &Transaction) -> Result<TxStatus, MinerError> {
        match self.client.send_and_confirm_transaction(tx) {
            Ok(signature) => Ok(TxStatus::Accepted(signature)),
            Err(e) => match e.get_transaction_error() {
                Some(TransactionError::AlreadyProcessed) => {
                    // An earlier send of this exact transaction landed
                    Ok(TxStatus::Accepted(tx.signatures.first().copied().unwrap_or_default()))
                }
                Some(tx_err) => classify_transaction_error(tx_err),
                None => Err(classify(e)),
            },
        }
    }

    fn balance(&self, pubkey: &Pubkey) -> Result<u64, MinerError> {
        self.client.get_balance(pubkey).map_err(classify)
    }

    fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> Result<Signature, MinerError> {
        let signature = self
            .client
            .request_airdrop(pubkey, lamports)
            .map_err(classify)?;
        self.client.poll_for_signature(&signature).map_err(classify)?;
        Ok(signature)
    }

    fn miner_accounts(&self) -> Result<Vec<MinerRecord>, MinerError> {
        let accounts = self
            .client
            .get_program_accounts(&self.program_id)
            .map_err(classify)?;

        Ok(accounts
            .iter()
            .filter(|(_, account)| {
                account.data.len() >= MINER_ACCOUNT_LEN
                    && account.data[..8] == MINER_ACCOUNT_DISCRIMINATOR
            })
            .filter_map(|(address, account)| match decode_miner(&account.data) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::debug!("Skipping account {}: {}", address, e);
                    None
                }
            })
            .collect())
    }
}

/// Maps a transport or RPC failure onto the crate error taxonomy
pub fn classify(err: ClientError) -> MinerError {
    if let Some(tx_err) = err.get_transaction_error() {
        return match classify_transaction_error(tx_err) {
            Ok(TxStatus::Rejected(reason)) => MinerError::Rejected(reason),
            Ok(TxStatus::Accepted(_)) => MinerError::Rejected("already processed".to_string()),
            Err(e) => e,
        };
    }

    match err.kind() {
        ClientErrorKind::Reqwest(e) => {
            if e.status().map(|s| s.as_u16()) == Some(TOO_MANY_REQUESTS) {
                MinerError::RateLimited(e.to_string())
            } else {
                MinerError::ConnectionError(e.to_string())
            }
        }
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
            if *code == i64::from(TOO_MANY_REQUESTS) || is_throttle_message(message) {
                MinerError::RateLimited(format!("{} ({})", message, code))
            } else {
                MinerError::ConnectionError(format!("RPC error {}: {}", code, message))
            }
        }
        ClientErrorKind::RpcError(RpcError::RpcRequestError(msg)) if is_throttle_message(msg) => {
            MinerError::RateLimited(msg.clone())
        }
        ClientErrorKind::SigningError(e) => MinerError::CryptoError(e.to_string()),
        ClientErrorKind::TransactionError(e) => MinerError::Rejected(e.to_string()),
        ClientErrorKind::Io(_)
        | ClientErrorKind::RpcError(_)
        | ClientErrorKind::SerdeJson(_)
        | ClientErrorKind::Custom(_) => MinerError::ConnectionError(err.to_string()),
    }
}

/// Maps an executed-and-failed transaction
///
/// Program rejections become `Ok(Rejected)`. Failures that say something
/// about the client or the cluster rather than the proof stay errors.
pub fn classify_transaction_error(err: TransactionError) -> Result<TxStatus, MinerError> {
    match err {
        TransactionError::BlockhashNotFound => Err(MinerError::BlockhashExpired(
            "blockhash not found; re-signing".to_string(),
        )),
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
            match ProgramErrorCode::from_code(code) {
                Some(ProgramErrorCode::TooManySubmissions) => Err(MinerError::RateLimited(
                    format!("program rate limit (error {})", code),
                )),
                Some(ProgramErrorCode::AccountNotInitialized) => Err(
                    MinerError::AccountNotInitialized("miner account missing on chain".to_string()),
                ),
                Some(known) => Ok(TxStatus::Rejected(format!("{:?} (error {})", known, code))),
                None => Ok(TxStatus::Rejected(format!("program error {}", code))),
            }
        }
        TransactionError::AccountNotFound
        | TransactionError::InsufficientFundsForFee
        | TransactionError::InsufficientFundsForRent { .. } => Err(MinerError::ConfigError(
            format!("fee payer cannot pay ({}); fund the wallet first", err),
        )),
        other => Ok(TxStatus::Rejected(other.to_string())),
    }
}

fn is_throttle_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("too many requests") || lower.contains("rate limit") || lower.contains("429")
}
