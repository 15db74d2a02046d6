// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use ::config::{Config as ConfigFile, Environment, File};

/// Base URL of the connect server when none is configured
pub const DEFAULT_SERVER_BASE_URL: &str = "http://localhost:1323";
/// Storage key for the connect key pair
pub const DEFAULT_KEY_PAIR_KEY: &str = "connect_key_pair";
/// Storage key for the stored session information
pub const DEFAULT_SESSION_KEY: &str = "connect_session";
/// Name of the directory created under the platform data directory
pub const DATA_DIR_NAME: &str = "dapp-connect";
/// Prefix of the credential names in the platform keyring
pub const DEFAULT_KEYRING_PREFIX: &str = "dapp-connect/";

/// Configuration for a dApp Connect client
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Base URL of the connect server
    pub server_url: String,
    /// Timeout for a single request to the connect server
    pub request_timeout_secs: u64,
    pub storage: StorageConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for persisted client state. Uses the platform data directory
    /// when not set.
    pub data_dir: Option<PathBuf>,
    /// Where the connect key pair is kept. The session always goes to `data_dir`.
    pub key_pair_backend: KeyPairBackend,
    pub keyring_prefix: String,
    pub key_pair_key: String,
    pub session_key: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPairBackend {
    /// Platform credential store
    #[default]
    Keyring,
    /// JSON file in the data directory
    File,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_BASE_URL.to_string(),
            request_timeout_secs: 30,
            storage: StorageConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            key_pair_backend: KeyPairBackend::default(),
            keyring_prefix: DEFAULT_KEYRING_PREFIX.to_string(),
            key_pair_key: DEFAULT_KEY_PAIR_KEY.to_string(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
        }
    }
}

impl StorageConfig {
    /// Directory the client state is stored in
    pub fn resolve_data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DATA_DIR_NAME),
        }
    }
}

impl ConnectConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ::config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Environment variables with prefix "DAPP_CONNECT", e.g. DAPP_CONNECT__SERVER_URL
            .add_source(Environment::with_prefix("DAPP_CONNECT").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration, falling back to the defaults when it can't be read
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration: {}", e);
                tracing::info!("Falling back to default configuration");
                Self::default()
            }
        }
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.storage.data_dir = Some(data_dir.into());
        self
    }

    pub fn with_key_pair_backend(mut self, backend: KeyPairBackend) -> Self {
        self.storage.key_pair_backend = backend;
        self
    }
}
