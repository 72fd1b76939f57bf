use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use swiftslice_core::{Result, SliceError, StoreBuilder, UploadConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub local: Option<LocalStoreConfig>,
    pub swift: Option<SwiftStoreConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Local,
    Swift,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Local => "local",
            StoreBackend::Swift => "swift",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStoreConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwiftStoreConfig {
    /// Authenticated storage URL, e.g. `https://swift.example.com/v1/AUTH_account`.
    pub storage_url: String,
    pub token: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("SWIFTSLICE").separator("__"))
            .build()
            .map_err(|e| SliceError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| SliceError::Config(e.to_string()))?;

        config.upload.validate()?;
        Ok(config)
    }

    pub fn store_builder(&self) -> Result<StoreBuilder> {
        let builder = StoreBuilder::new().backend(self.store.backend.as_str());

        match self.store.backend {
            StoreBackend::Local => {
                let local = self.store.local.as_ref().ok_or_else(|| {
                    SliceError::Config(
                        "local configuration is required for local backend".to_string(),
                    )
                })?;
                Ok(builder.local_root(local.root.clone()))
            }
            StoreBackend::Swift => {
                let swift = self.store.swift.as_ref().ok_or_else(|| {
                    SliceError::Config(
                        "swift configuration is required for swift backend".to_string(),
                    )
                })?;
                Ok(builder
                    .swift_storage_url(swift.storage_url.clone())
                    .swift_token(swift.token.clone())
                    .request_timeout(Duration::from_secs(swift.request_timeout_secs)))
            }
        }
    }
}
