// src/config/config.rs
use crate::config::wallet::expand_home;
use crate::supervisor::SupervisorConfig;
use crate::utils::backoff::BackoffPolicy;
use crate::utils::error::MinerError;
use serde::{Deserialize, Deserializer, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "testore.toml";

/// Main configuration structure for the mining application
///
/// Every field has a default, so an empty file (or no file at all) is a
/// valid configuration apart from `program_id`, which ledger commands
/// require.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON-RPC endpoint of the cluster
    pub rpc_url: String,

    /// Path of the wallet keypair file (`~/` is expanded)
    pub keypair: String,

    /// Address of the mining program
    pub program_id: Option<String>,

    /// Number of worker threads to use for mining
    /// (0 = number of CPU cores)
    pub threads: usize,

    /// Requested difficulty in leading zero bits
    pub difficulty: u32,

    /// Offsets scanned per search (0 = 2^(difficulty + 6))
    pub nonce_space: u64,

    /// Wall-clock budget per search (0 = derived from measured hash rate)
    pub search_timeout_secs: u64,

    /// Timeout of each RPC request
    pub rpc_timeout_secs: u64,

    /// Interval between progress lines
    pub report_interval_secs: u64,

    /// Pause after a recoverable cycle failure
    pub cooldown_ms: u64,

    /// Minimum spacing between two proof submissions
    pub min_submit_interval_ms: u64,

    /// Where `mine` writes its final run statistics
    pub stats_file: String,

    /// Retry schedule of proof submission
    #[serde(deserialize_with = "submit_policy")]
    pub submit: BackoffPolicy,

    /// Retry schedule of the account refresh in forever mode
    #[serde(deserialize_with = "refresh_policy")]
    pub refresh: BackoffPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rpc_url: "https://api.testnet.solana.com".into(),
            keypair: "~/.config/solana/id.json".into(),
            program_id: None,
            threads: 0,
            difficulty: 8,
            nonce_space: 0,
            search_timeout_secs: 0,
            rpc_timeout_secs: 30,
            report_interval_secs: 30,
            cooldown_ms: 2_000,
            min_submit_interval_ms: 1_000,
            stats_file: "testore-stats.json".into(),
            submit: BackoffPolicy::submission(),
            refresh: BackoffPolicy::refresh(),
        }
    }
}

/// Partial backoff table; absent keys keep the base policy's values
#[derive(Debug, Default, Deserialize)]
struct PolicyOverrides {
    max_attempts: Option<u32>,
    initial_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    multiplier: Option<f64>,
    jitter: Option<f64>,
}

impl PolicyOverrides {
    fn apply(self, base: BackoffPolicy) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            initial_delay_ms: self.initial_delay_ms.unwrap_or(base.initial_delay_ms),
            max_delay_ms: self.max_delay_ms.unwrap_or(base.max_delay_ms),
            multiplier: self.multiplier.unwrap_or(base.multiplier),
            jitter: self.jitter.unwrap_or(base.jitter),
        }
    }
}

fn submit_policy<'de, D: Deserializer<'de>>(d: D) -> Result<BackoffPolicy, D::Error> {
    Ok(PolicyOverrides::deserialize(d)?.apply(BackoffPolicy::submission()))
}

fn refresh_policy<'de, D: Deserializer<'de>>(d: D) -> Result<BackoffPolicy, D::Error> {
    Ok(PolicyOverrides::deserialize(d)?.apply(BackoffPolicy::refresh()))
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded and validated configuration
    /// * `Err(MinerError)` - If file couldn't be read, parsed or validated
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or [`DEFAULT_CONFIG_FILE`] when it exists, or defaults
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, MinerError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE),
            None => {
                log::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Ok(Config::default())
            }
        }
    }

    /// Checks values that would otherwise fail late
    pub fn validate(&self) -> Result<(), MinerError> {
        let url = Url::parse(&self.rpc_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MinerError::ConfigError(format!(
                "rpc_url must be http(s): {}",
                self.rpc_url
            )));
        }
        if self.difficulty > 256 {
            return Err(MinerError::ConfigError(format!(
                "difficulty {} exceeds 256 bits",
                self.difficulty
            )));
        }
        for (name, policy) in [("submit", &self.submit), ("refresh", &self.refresh)] {
            if !(0.0..=1.0).contains(&policy.jitter) || policy.multiplier < 1.0 {
                return Err(MinerError::ConfigError(format!(
                    "[{}] needs 0 <= jitter <= 1 and multiplier >= 1",
                    name
                )));
            }
        }
        if self.program_id.is_some() {
            self.program_id()?;
        }
        Ok(())
    }

    /// Parsed mining program address
    ///
    /// # Errors
    /// `ConfigError` when unset or not a base58 address
    pub fn program_id(&self) -> Result<Pubkey, MinerError> {
        let raw = self.program_id.as_deref().ok_or_else(|| {
            MinerError::ConfigError(
                "program_id is not set; add it to the config file".to_string(),
            )
        })?;
        Pubkey::from_str(raw)
            .map_err(|e| MinerError::ConfigError(format!("invalid program_id {}: {}", raw, e)))
    }

    /// Keypair path with `~/` expanded
    pub fn keypair_path(&self) -> PathBuf {
        expand_home(&self.keypair)
    }

    /// Worker threads to launch
    ///
    /// `0` means every available core. Requests above the core count are
    /// clamped with a warning.
    pub fn worker_threads(&self) -> usize {
        let available = num_cpus::get().max(1);
        match self.threads {
            0 => available,
            n if n > available => {
                log::warn!(
                    "{}",
                    MinerError::ResourceError(format!(
                        "{} threads requested but only {} cores available; using {}",
                        n, available, available
                    ))
                );
                available
            }
            n => n,
        }
    }

    /// Per-request RPC timeout, at least one second
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs.max(1))
    }

    /// Progress line interval, at least one second
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }

    /// Minimum spacing between two proof submissions
    pub fn min_submit_interval(&self) -> Duration {
        Duration::from_millis(self.min_submit_interval_ms)
    }

    /// Supervisor parameters derived from this configuration
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            difficulty: self.difficulty,
            nonce_space: self.nonce_space,
            search_timeout: Duration::from_secs(self.search_timeout_secs),
            cooldown: Duration::from_millis(self.cooldown_ms),
            refresh: self.refresh.clone(),
        }
    }

    /// Generates a configuration template string
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template() -> String {
        let d = Config::default();
        let mut template = String::new();
        template.push_str("# TestORE Miner Configuration\n\n");
        template.push_str("# Cluster JSON-RPC endpoint\n");
        template.push_str(&format!("rpc_url = \"{}\"\n", d.rpc_url));
        template.push_str("# Wallet keypair (solana-keygen format)\n");
        template.push_str(&format!("keypair = \"{}\"\n", d.keypair));
        template.push_str("# Address of the TestORE program (required)\n");
        template.push_str("program_id = \"<PROGRAM ID>\"\n\n");

        template.push_str("# Number of worker threads (0 = all cores)\n");
        template.push_str(&format!("threads = {}\n", d.threads));
        template.push_str("# Leading zero bits per proof; raised to the round minimum\n");
        template.push_str(&format!("difficulty = {}\n", d.difficulty));
        template.push_str("# Offsets per search (0 = 2^(difficulty + 6))\n");
        template.push_str(&format!("nonce_space = {}\n", d.nonce_space));
        template.push_str("# Seconds per search (0 = derive from hash rate)\n");
        template.push_str(&format!("search_timeout_secs = {}\n", d.search_timeout_secs));
        template.push_str(&format!("rpc_timeout_secs = {}\n", d.rpc_timeout_secs));
        template.push_str(&format!("report_interval_secs = {}\n", d.report_interval_secs));
        template.push_str("# Pause after a failed cycle\n");
        template.push_str(&format!("cooldown_ms = {}\n", d.cooldown_ms));
        template.push_str("# The program accepts one proof per second per miner\n");
        template.push_str(&format!("min_submit_interval_ms = {}\n", d.min_submit_interval_ms));
        template.push_str(&format!("stats_file = \"{}\"\n\n", d.stats_file));

        for (name, policy, note) in [
            ("submit", &d.submit, "Proof submission retries"),
            ("refresh", &d.refresh, "Account refresh retries (max_attempts 0 = forever)"),
        ] {
            template.push_str(&format!("# {}\n[{}]\n", note, name));
            template.push_str(&format!("max_attempts = {}\n", policy.max_attempts));
            template.push_str(&format!("initial_delay_ms = {}\n", policy.initial_delay_ms));
            template.push_str(&format!("max_delay_ms = {}\n", policy.max_delay_ms));
            template.push_str(&format!("multiplier = {:.1}\n", policy.multiplier));
            template.push_str(&format!("jitter = {:.1}\n\n", policy.jitter));
        }

        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_gives_defaults() {
        let file = write("");
        assert_eq!(Config::load(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn partial_tables_keep_their_own_defaults() {
        let file = write(
            r#"
            difficulty = 12
            [submit]
            max_attempts = 3
            [refresh]
            initial_delay_ms = 50
            "#,
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.difficulty, 12);
        assert_eq!(config.submit.max_attempts, 3);
        assert_eq!(config.submit.max_delay_ms, 8_000);
        assert_eq!(config.refresh.initial_delay_ms, 50);
        assert_eq!(config.refresh.max_attempts, 0);
    }

    #[test]
    fn template_round_trips() {
        let template = Config::generate_template()
            .replace("<PROGRAM ID>", &Pubkey::new_unique().to_string());
        let file = write(&template);
        let config = Config::load(file.path()).unwrap();

        assert!(config.program_id().is_ok());
        assert_eq!(config.submit, BackoffPolicy::submission());
        assert_eq!(config.refresh, BackoffPolicy::refresh());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.toml");
        let err = Config::load_or_default(Some(absent.as_path())).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn invalid_values_are_fatal() {
        for bad in [
            "rpc_url = \"ftp://example.com\"",
            "difficulty = 300",
            "program_id = \"not-a-key\"",
            "[submit]\njitter = 2.0",
            "threads = \"many\"",
        ] {
            let file = write(bad);
            let err = Config::load(file.path()).unwrap_err();
            assert!(err.is_fatal(), "{} should be fatal", bad);
        }
    }

    #[test]
    fn missing_program_id() {
        assert!(Config::default().program_id().unwrap_err().is_fatal());
    }

    #[test]
    fn thread_clamp() {
        let cores = num_cpus::get().max(1);
        let auto = Config::default();
        assert_eq!(auto.worker_threads(), cores);

        let greedy = Config {
            threads: cores + 64,
            ..Config::default()
        };
        assert_eq!(greedy.worker_threads(), cores);

        let one = Config {
            threads: 1,
            ..Config::default()
        };
        assert_eq!(one.worker_threads(), 1);
    }
}
