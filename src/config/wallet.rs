// src/config/wallet.rs
//! Wallet keypair loading

use crate::utils::error::MinerError;
use solana_sdk::signature::{Keypair, read_keypair_file};
use std::path::{Path, PathBuf};

/// Expands a leading `~/` to `$HOME`
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

/// Reads a keypair in the `solana-keygen` JSON format
///
/// # Errors
/// `ConfigError` when the file is missing or malformed; a miner without
/// its key cannot do anything useful, so this is never retried.
pub fn load_keypair(path: &Path) -> Result<Keypair, MinerError> {
    if !path.exists() {
        return Err(MinerError::ConfigError(format!(
            "keypair file {} not found (create one with `solana-keygen new`)",
            path.display()
        )));
    }
    read_keypair_file(path).map_err(|e| {
        MinerError::ConfigError(format!("invalid keypair file {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::{Signer, write_keypair_file};

    #[test]
    fn expands_home_prefix_only() {
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(
                expand_home("~/.config/solana/id.json"),
                PathBuf::from(home).join(".config/solana/id.json")
            );
        }
        assert_eq!(expand_home("/etc/id.json"), PathBuf::from("/etc/id.json"));
        assert_eq!(expand_home("a/~/b"), PathBuf::from("a/~/b"));
    }

    #[test]
    fn loads_written_keypair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.json");
        let keypair = Keypair::new();
        write_keypair_file(&keypair, &path).unwrap();

        assert_eq!(load_keypair(&path).unwrap().pubkey(), keypair.pubkey());
    }

    #[test]
    fn missing_or_garbage_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.json");
        assert!(load_keypair(&missing).unwrap_err().is_fatal());

        let garbage = dir.path().join("bad.json");
        std::fs::write(&garbage, "not a keypair").unwrap();
        assert!(load_keypair(&garbage).unwrap_err().is_fatal());
    }
}
