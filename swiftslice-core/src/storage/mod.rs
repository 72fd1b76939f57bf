//! Object store backends for Swiftslice
//!
//! Provides the store capability used by uploads, a filesystem-backed store and
//! a Swift HTTP store.

pub mod factory;
pub mod local_store;
pub mod swift_store;

pub use factory::StoreBuilder;
pub use local_store::{LocalObjectStore, ObjectRecord, compute_etag};
pub use swift_store::{SwiftObjectStore, manifest_header_value};

use crate::{Payload, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options forwarded unchanged to every object written for one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOptions {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub user_metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct StoreObject {
    pub name: String,
    pub payload: Payload,
    pub options: PutOptions,
}

/// Write side of an object store that supports manifest objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes one object and returns its ETag.
    async fn put_object(&self, container: &str, object: StoreObject) -> Result<String>;

    /// Makes `object_key` a manifest over every object whose name starts with
    /// `object_key` followed by the segment separator. Returns the ETag of the
    /// logical object.
    async fn put_object_manifest(&self, container: &str, object_key: &str) -> Result<String>;
}
