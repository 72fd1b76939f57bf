use super::{LocalObjectStore, ObjectStore, SwiftObjectStore};
use crate::{Result, SliceError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct StoreBuilder {
    backend: Option<String>,
    local_root: Option<PathBuf>,
    swift_storage_url: Option<String>,
    swift_token: Option<String>,
    request_timeout: Option<Duration>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    pub fn swift_storage_url(mut self, url: impl Into<String>) -> Self {
        self.swift_storage_url = Some(url.into());
        self
    }

    pub fn swift_token(mut self, token: impl Into<String>) -> Self {
        self.swift_token = Some(token.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn resolve_backend(&self) -> Result<String> {
        let backend = self
            .backend
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if backend.is_empty() {
            return Err(SliceError::Config(
                "store backend cannot be empty".to_string(),
            ));
        }

        Ok(backend)
    }

    pub fn build(&self) -> Result<Arc<dyn ObjectStore>> {
        let backend = self.resolve_backend()?;

        match backend.as_str() {
            "local" => {
                let root = self.local_root.clone().ok_or_else(|| {
                    SliceError::Config("local root is required for local backend".to_string())
                })?;

                Ok(Arc::new(LocalObjectStore::new(root)?))
            }
            "swift" => {
                let url = self.swift_storage_url.as_deref().unwrap_or_default().trim();
                if url.is_empty() {
                    return Err(SliceError::Config(
                        "storage url is required for swift backend".to_string(),
                    ));
                }

                let token = self.swift_token.as_deref().unwrap_or_default().trim();
                if token.is_empty() {
                    return Err(SliceError::Config(
                        "auth token is required for swift backend".to_string(),
                    ));
                }

                let store = SwiftObjectStore::new(url, token, self.request_timeout)?;
                Ok(Arc::new(store))
            }
            other => Err(SliceError::Config(format!(
                "unsupported store backend: {}",
                other
            ))),
        }
    }
}
