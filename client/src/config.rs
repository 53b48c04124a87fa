//! YAML configuration for tools built on the client.

use crate::{
    client::{Client, RetryPolicy},
    events::ConfirmationPolicy,
    protocol::RevealDelays,
    tx::{Deployment, RANDOM_OBJECT},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr, time::Duration};
use suu_types::{
    constants::{BATTLE_REVEAL_DELAY_BASE_MS, CAPTURE_REVEAL_DELAY_BASE_MS},
    Address,
};
use thiserror::Error;
use tracing::{debug, Level};
use url::Url;

const MAINNET_PACKAGE: &str = "0x8ba4d7710351b6ef3044515d206625dc26116712eac155003e9813350fd46421";
const MAINNET_GAME_OBJECT: &str =
    "0x56a57376fb68d041723b1119f5b9d7f6a1863c0331d0f215506f6e78ba5e4e14";
const TESTNET_PACKAGE: &str = "0x7ceff956432740658ada869243d30cf30bbc76bfba703669ee264a047cd930ab";
const TESTNET_GAME_OBJECT: &str =
    "0xf43fd10d5892124eb8eb5b8e61fda0d2c8c7a524d594d00a7585088da1a4063e";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
    Localnet,
}

impl Network {
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://fullnode.mainnet.sui.io:443",
            Network::Testnet => "https://fullnode.testnet.sui.io:443",
            Network::Devnet => "https://fullnode.devnet.sui.io:443",
            Network::Localnet => "http://127.0.0.1:9000",
        }
    }

    /// Package and game object of the known deployment, if any.
    fn deployment(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Network::Mainnet => Some((MAINNET_PACKAGE, MAINNET_GAME_OBJECT)),
            Network::Testnet => Some((TESTNET_PACKAGE, TESTNET_GAME_OBJECT)),
            Network::Devnet | Network::Localnet => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Localnet => "localnet",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_confirmation_attempts")]
    pub attempts: u32,
    #[serde(default = "default_confirmation_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_confirmation_delay_step_ms")]
    pub delay_step_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            attempts: default_confirmation_attempts(),
            initial_delay_ms: default_confirmation_initial_delay_ms(),
            delay_step_ms: default_confirmation_delay_step_ms(),
        }
    }
}

/// Configuration as read from YAML. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub rpc_url: Option<String>,

    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub game_object: Option<String>,
    #[serde(default)]
    pub game_object_initial_version: Option<u64>,
    #[serde(default)]
    pub random_initial_version: Option<u64>,

    #[serde(default)]
    pub inspect_sender: Option<String>,
    #[serde(default)]
    pub secret_store: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    #[serde(default = "default_battle_delay_base_ms")]
    pub battle_delay_base_ms: u64,
    #[serde(default = "default_capture_delay_base_ms")]
    pub capture_delay_base_ms: u64,
    #[serde(default = "default_event_page_limit")]
    pub event_page_limit: usize,
    #[serde(default = "default_max_event_pages")]
    pub max_event_pages: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> usize {
    RetryPolicy::default().max_attempts
}

fn default_initial_backoff_ms() -> u64 {
    RetryPolicy::default().initial_backoff.as_millis() as u64
}

fn default_max_backoff_ms() -> u64 {
    RetryPolicy::default().max_backoff.as_millis() as u64
}

fn default_confirmation_attempts() -> u32 {
    ConfirmationPolicy::default().attempts
}

fn default_confirmation_initial_delay_ms() -> u64 {
    ConfirmationPolicy::default().initial_delay.as_millis() as u64
}

fn default_confirmation_delay_step_ms() -> u64 {
    ConfirmationPolicy::default().delay_step.as_millis() as u64
}

fn default_battle_delay_base_ms() -> u64 {
    BATTLE_REVEAL_DELAY_BASE_MS
}

fn default_capture_delay_base_ms() -> u64 {
    CAPTURE_REVEAL_DELAY_BASE_MS
}

fn default_event_page_limit() -> usize {
    100
}

fn default_max_event_pages() -> usize {
    5
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{field} must be an address: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{field} is required on {network}")]
    MissingField {
        field: &'static str,
        network: Network,
    },
    #[error("log_level is invalid: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("{field} must be a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("{field} URL scheme must be http or https: {value}")]
    InvalidUrlScheme { field: &'static str, value: String },
}

/// Configuration with defaults resolved and every value checked.
#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    pub network: Network,
    pub rpc_url: String,
    pub package: Address,
    pub game_object: Address,
    /// `None` until resolved from the ledger with [ValidatedConfig::deployment].
    pub game_object_initial_version: Option<u64>,
    pub random_initial_version: Option<u64>,
    pub inspect_sender: Address,
    pub secret_store: Option<PathBuf>,
    pub log_level: Level,
    pub retry: RetryPolicy,
    pub confirmation: ConfirmationPolicy,
    pub delays: RevealDelays,
    pub event_page_limit: usize,
    pub max_event_pages: usize,
}

fn ensure_nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

fn validate_http_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        _ => {
            return Err(ConfigError::InvalidUrlScheme {
                field,
                value: value.to_string(),
            })
        }
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let rpc_url = self
            .rpc_url
            .clone()
            .unwrap_or_else(|| self.network.default_rpc_url().to_string());
        validate_http_url("rpc_url", &rpc_url)?;

        let known = self.network.deployment();
        let package = match (&self.package_id, known) {
            (Some(value), _) => parse_address("package_id", value)?,
            (None, Some((package, _))) => parse_address("package_id", package)?,
            (None, None) => {
                return Err(ConfigError::MissingField {
                    field: "package_id",
                    network: self.network,
                })
            }
        };
        let game_object = match (&self.game_object, known) {
            (Some(value), _) => parse_address("game_object", value)?,
            (None, Some((_, game_object))) => parse_address("game_object", game_object)?,
            (None, None) => {
                return Err(ConfigError::MissingField {
                    field: "game_object",
                    network: self.network,
                })
            }
        };
        let inspect_sender = match &self.inspect_sender {
            Some(value) => parse_address("inspect_sender", value)?,
            None => Address::ZERO,
        };

        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        ensure_nonzero("retry.max_attempts", self.retry.max_attempts as u64)?;
        ensure_nonzero("confirmation.attempts", u64::from(self.confirmation.attempts))?;
        ensure_nonzero("battle_delay_base_ms", self.battle_delay_base_ms)?;
        ensure_nonzero("capture_delay_base_ms", self.capture_delay_base_ms)?;
        ensure_nonzero("event_page_limit", self.event_page_limit as u64)?;
        ensure_nonzero("max_event_pages", self.max_event_pages as u64)?;

        Ok(ValidatedConfig {
            network: self.network,
            rpc_url,
            package,
            game_object,
            game_object_initial_version: self.game_object_initial_version,
            random_initial_version: self.random_initial_version,
            inspect_sender,
            secret_store: self.secret_store,
            log_level,
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
                ..RetryPolicy::default()
            },
            confirmation: ConfirmationPolicy {
                attempts: self.confirmation.attempts,
                initial_delay: Duration::from_millis(self.confirmation.initial_delay_ms),
                delay_step: Duration::from_millis(self.confirmation.delay_step_ms),
            },
            delays: RevealDelays {
                battle_base_ms: self.battle_delay_base_ms,
                capture_base_ms: self.capture_delay_base_ms,
            },
            event_page_limit: self.event_page_limit,
            max_event_pages: self.max_event_pages,
        })
    }
}

impl ValidatedConfig {
    pub fn client(&self) -> crate::Result<Client> {
        Ok(Client::new(&self.rpc_url)?
            .with_retry_policy(self.retry.clone())
            .with_inspect_sender(self.inspect_sender))
    }

    /// Builds the [Deployment], asking the ledger for shared object versions not configured.
    pub async fn deployment(&self, client: &Client) -> crate::Result<Deployment> {
        let game_object_initial_version = match self.game_object_initial_version {
            Some(version) => version,
            None => client.initial_shared_version(&self.game_object).await?,
        };
        let random_initial_version = match self.random_initial_version {
            Some(version) => version,
            None => client.initial_shared_version(&RANDOM_OBJECT).await?,
        };
        debug!(
            game_object_initial_version,
            random_initial_version, "resolved shared object versions"
        );
        Ok(Deployment {
            package: self.package,
            game_object: self.game_object,
            game_object_initial_version,
            random_initial_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_mainnet_defaults() {
        let config = Config::from_yaml("{}").unwrap().validate().unwrap();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.rpc_url, "https://fullnode.mainnet.sui.io:443");
        assert_eq!(config.package, MAINNET_PACKAGE.parse().unwrap());
        assert_eq!(config.game_object, MAINNET_GAME_OBJECT.parse().unwrap());
        assert_eq!(config.inspect_sender, Address::ZERO);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.confirmation, ConfirmationPolicy::default());
        assert_eq!(config.delays, RevealDelays::default());
        assert_eq!(config.event_page_limit, 100);
        assert_eq!(config.max_event_pages, 5);
        assert!(config.secret_store.is_none());
    }

    #[test]
    fn test_overrides() {
        let yaml = r#"
network: testnet
rpc_url: http://localhost:9000
inspect_sender: "0x1234"
game_object_initial_version: 17
secret_store: /tmp/suu.db
log_level: debug
confirmation:
  attempts: 8
battle_delay_base_ms: 1000
"#;
        let config = Config::from_yaml(yaml).unwrap().validate().unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.rpc_url, "http://localhost:9000");
        assert_eq!(config.package, TESTNET_PACKAGE.parse().unwrap());
        assert_eq!(config.inspect_sender, Address::from_low_u64(0x1234));
        assert_eq!(config.game_object_initial_version, Some(17));
        assert_eq!(config.random_initial_version, None);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.confirmation.attempts, 8);
        assert_eq!(config.confirmation.initial_delay, Duration::from_millis(1_000));
        assert_eq!(config.delays.battle_base_ms, 1_000);
        assert_eq!(config.delays.capture_base_ms, CAPTURE_REVEAL_DELAY_BASE_MS);
    }

    #[test]
    fn test_devnet_requires_deployment() {
        let err = Config::from_yaml("network: devnet")
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                field: "package_id",
                ..
            }
        ));

        let yaml = "network: localnet\npackage_id: \"0xaa\"\ngame_object: \"0xbb\"";
        let config = Config::from_yaml(yaml).unwrap().validate().unwrap();
        assert_eq!(config.rpc_url, "http://127.0.0.1:9000");
        assert_eq!(config.package, Address::from_low_u64(0xaa));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            ("rpc_url: ws://example.com", "rpc_url"),
            ("package_id: nothex", "package_id"),
            ("log_level: loud", "log_level"),
            ("battle_delay_base_ms: 0", "battle_delay_base_ms"),
            ("event_page_limit: 0", "event_page_limit"),
        ];
        for (yaml, field) in cases {
            let err = Config::from_yaml(yaml).unwrap().validate().unwrap_err();
            assert!(err.to_string().contains(field), "{yaml}: {err}");
        }
        assert!(Config::from_yaml("network: moon").is_err());
    }
}
