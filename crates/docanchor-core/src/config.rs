//! Engine configuration.
//!
//! One typed struct, built once at startup and passed by reference to
//! every component. Loaded from YAML, with `DOCANCHOR_*` environment
//! variables taking precedence over file values.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for anchoring, job retries and distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many times a dropped or timed-out transaction is resubmitted.
    pub task_retries: u32,
    /// Upper bound for waiting on a job completion signal, in seconds.
    pub default_task_timeout_secs: u64,
    /// Upper bound for one receipt wait, in seconds.
    pub ledger_wait_timeout_secs: u64,
    /// Base delay for exponential backoff between resubmissions, in ms.
    pub retry_base_delay_ms: u64,
    /// Issue a pre-commit before collecting signatures.
    pub precommit_enabled: bool,
    /// Blocks after the current height at which a pre-commit expires.
    pub precommit_expiration_blocks: u64,
    /// Timeout for one peer delivery, in seconds.
    pub p2p_connection_timeout_secs: u64,
    /// Mint NFTs with 128-bit token ids.
    pub low_entropy_nft_token_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            task_retries: 3,
            default_task_timeout_secs: 60,
            ledger_wait_timeout_secs: 30,
            retry_base_delay_ms: 500,
            precommit_enabled: false,
            precommit_expiration_blocks: 15,
            p2p_connection_timeout_secs: 10,
            low_entropy_nft_token_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Parse from a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Read and parse a YAML file, then apply environment overrides.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        let mut cfg = Self::from_yaml_str(&raw)?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Defaults overridden by environment variables.
    ///
    /// Variables:
    /// - `DOCANCHOR_TASK_RETRIES`
    /// - `DOCANCHOR_DEFAULT_TASK_TIMEOUT_SECS`
    /// - `DOCANCHOR_LEDGER_WAIT_TIMEOUT_SECS`
    /// - `DOCANCHOR_RETRY_BASE_DELAY_MS`
    /// - `DOCANCHOR_PRECOMMIT_ENABLED`
    /// - `DOCANCHOR_PRECOMMIT_EXPIRATION_BLOCKS`
    /// - `DOCANCHOR_P2P_CONNECTION_TIMEOUT_SECS`
    /// - `DOCANCHOR_LOW_ENTROPY_NFT_TOKEN_ENABLED`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Override fields from any `DOCANCHOR_*` variables that are set.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        env_override("DOCANCHOR_TASK_RETRIES", &mut self.task_retries)?;
        env_override(
            "DOCANCHOR_DEFAULT_TASK_TIMEOUT_SECS",
            &mut self.default_task_timeout_secs,
        )?;
        env_override(
            "DOCANCHOR_LEDGER_WAIT_TIMEOUT_SECS",
            &mut self.ledger_wait_timeout_secs,
        )?;
        env_override("DOCANCHOR_RETRY_BASE_DELAY_MS", &mut self.retry_base_delay_ms)?;
        env_override("DOCANCHOR_PRECOMMIT_ENABLED", &mut self.precommit_enabled)?;
        env_override(
            "DOCANCHOR_PRECOMMIT_EXPIRATION_BLOCKS",
            &mut self.precommit_expiration_blocks,
        )?;
        env_override(
            "DOCANCHOR_P2P_CONNECTION_TIMEOUT_SECS",
            &mut self.p2p_connection_timeout_secs,
        )?;
        env_override(
            "DOCANCHOR_LOW_ENTROPY_NFT_TOKEN_ENABLED",
            &mut self.low_entropy_nft_token_enabled,
        )?;
        self.check()
    }

    /// Fast timings for tests and local mock ledgers.
    pub fn local_mock() -> Self {
        Self {
            task_retries: 2,
            default_task_timeout_secs: 5,
            ledger_wait_timeout_secs: 1,
            retry_base_delay_ms: 5,
            precommit_enabled: false,
            precommit_expiration_blocks: 15,
            p2p_connection_timeout_secs: 1,
            low_entropy_nft_token_enabled: false,
        }
    }

    pub fn with_precommit(mut self, enabled: bool) -> Self {
        self.precommit_enabled = enabled;
        self
    }

    pub fn with_task_retries(mut self, retries: u32) -> Self {
        self.task_retries = retries;
        self
    }

    pub fn default_task_timeout(&self) -> Duration {
        Duration::from_secs(self.default_task_timeout_secs)
    }

    pub fn ledger_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_wait_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn p2p_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.p2p_connection_timeout_secs)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.default_task_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "default_task_timeout_secs".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if self.ledger_wait_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "ledger_wait_timeout_secs".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if self.precommit_enabled && self.precommit_expiration_blocks == 0 {
            return Err(ConfigError::Invalid(
                "precommit_expiration_blocks".to_string(),
                "must be greater than zero when pre-commit is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_override<T: std::str::FromStr>(var: &str, slot: &mut T) -> Result<(), ConfigError> {
    if let Ok(raw) = std::env::var(var) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(var.to_string(), raw.clone()))?;
    }
    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(String, String),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.task_retries, 3);
        assert!(!cfg.precommit_enabled);
        assert_eq!(cfg.default_task_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn yaml_partial_uses_defaults() {
        let cfg = EngineConfig::from_yaml_str("task_retries: 7\nprecommit_enabled: true\n").unwrap();
        assert_eq!(cfg.task_retries, 7);
        assert!(cfg.precommit_enabled);
        assert_eq!(cfg.ledger_wait_timeout_secs, 30);
    }

    #[test]
    fn yaml_rejects_zero_timeout() {
        let err = EngineConfig::from_yaml_str("default_task_timeout_secs: 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(field, _) if field == "default_task_timeout_secs"));
    }

    #[test]
    fn yaml_rejects_garbage() {
        assert!(matches!(
            EngineConfig::from_yaml_str("task_retries: [1, 2]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_override_parses_value() {
        std::env::set_var("TEST_DOCANCHOR_RETRIES_CFG", "9");
        let mut retries = 3u32;
        env_override("TEST_DOCANCHOR_RETRIES_CFG", &mut retries).unwrap();
        std::env::remove_var("TEST_DOCANCHOR_RETRIES_CFG");
        assert_eq!(retries, 9);
    }

    #[test]
    fn env_override_rejects_bad_value() {
        std::env::set_var("TEST_DOCANCHOR_BAD_BOOL_CFG", "maybe");
        let mut flag = false;
        let result = env_override("TEST_DOCANCHOR_BAD_BOOL_CFG", &mut flag);
        std::env::remove_var("TEST_DOCANCHOR_BAD_BOOL_CFG");
        assert!(result.is_err());
    }

    #[test]
    fn from_yaml_file_reads_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "p2p_connection_timeout_secs: 4").unwrap();
        let cfg = EngineConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(cfg.p2p_connection_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::from_yaml_file(Path::new("/nonexistent/docanchor.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }
}
