use super::{ObjectStore, StoreObject};
use crate::error::{Result, SliceError};
use crate::plan::segment_prefix;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use ulid::Ulid;

/// Stored alongside every object as `<stem>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub name: String,
    pub etag: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    #[serde(default)]
    pub user_metadata: BTreeMap<String, String>,
    /// Set on manifest objects: the name prefix of their segments.
    pub manifest_prefix: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ObjectRecord {
    pub fn is_manifest(&self) -> bool {
        self.manifest_prefix.is_some()
    }
}

/// Filesystem object store laid out as
/// `{base}/containers/{container}/{md5(name)}.{data,json}`.
///
/// Manifest objects follow the Swift dynamic large object convention: the
/// manifest holds no data and its ETag is the MD5 of the concatenated segment
/// ETags.
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Reads an object. Manifest objects resolve to their segments'
    /// concatenated contents.
    pub async fn get_object(&self, container: &str, name: &str) -> Result<Bytes> {
        let record = self
            .head_object(container, name)
            .await?
            .ok_or_else(|| SliceError::ObjectNotFound(format!("{}/{}", container, name)))?;

        let Some(prefix) = record.manifest_prefix else {
            return self.read_data(container, name).await;
        };

        let mut body = Vec::with_capacity(record.size as usize);
        for segment in self.list_segments(container, &prefix).await? {
            let bytes = self.read_data(container, &segment.name).await?;
            body.extend_from_slice(&bytes);
        }
        Ok(Bytes::from(body))
    }

    pub async fn head_object(&self, container: &str, name: &str) -> Result<Option<ObjectRecord>> {
        let record_path = self.record_path(container, name)?;
        if !fs::try_exists(&record_path).await? {
            return Ok(None);
        }

        let raw = fs::read(&record_path).await?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    /// Lists object records whose names start with `prefix`, sorted by name.
    pub async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<ObjectRecord>> {
        let container_dir = self.container_dir(container)?;
        if !fs::try_exists(&container_dir).await? {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&container_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let raw = fs::read(&path).await?;
            let record: ObjectRecord = serde_json::from_slice(&raw)?;
            if record.name.starts_with(prefix) {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Segment records under `prefix` in part order. Numbered segments sort
    /// numerically so `key/10` follows `key/9`.
    async fn list_segments(&self, container: &str, prefix: &str) -> Result<Vec<ObjectRecord>> {
        let mut segments: Vec<ObjectRecord> = self
            .list_objects(container, prefix)
            .await?
            .into_iter()
            .filter(|record| !record.is_manifest())
            .collect();

        segments.sort_by_key(|record| {
            let number = record.name[prefix.len()..].parse::<u64>().ok();
            (number.is_none(), number, record.name.clone())
        });
        Ok(segments)
    }

    async fn read_data(&self, container: &str, name: &str) -> Result<Bytes> {
        let data_path = self.data_path(container, name)?;
        if !fs::try_exists(&data_path).await? {
            return Err(SliceError::ObjectNotFound(format!("{}/{}", container, name)));
        }
        Ok(Bytes::from(fs::read(&data_path).await?))
    }

    async fn write_object(&self, container: &str, record: &ObjectRecord, data: &[u8]) -> Result<()> {
        let container_dir = self.container_dir(container)?;
        fs::create_dir_all(&container_dir).await?;

        write_atomic(&self.data_path(container, &record.name)?, data).await?;
        write_atomic(
            &self.record_path(container, &record.name)?,
            &serde_json::to_vec_pretty(record)?,
        )
        .await?;
        Ok(())
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf> {
        let container = container.trim();
        if container.is_empty() || container == "." || container == ".." || container.contains('/') {
            return Err(SliceError::InvalidArgument(format!(
                "invalid container name: {:?}",
                container
            )));
        }
        Ok(self.base_path.join("containers").join(container))
    }

    fn data_path(&self, container: &str, name: &str) -> Result<PathBuf> {
        Ok(self
            .container_dir(container)?
            .join(format!("{}.data", compute_etag(name.as_bytes()))))
    }

    fn record_path(&self, container: &str, name: &str) -> Result<PathBuf> {
        Ok(self
            .container_dir(container)?
            .join(format!("{}.json", compute_etag(name.as_bytes()))))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_object(&self, container: &str, object: StoreObject) -> Result<String> {
        let StoreObject {
            name,
            payload,
            options,
        } = object;

        if name.is_empty() {
            return Err(SliceError::InvalidArgument(
                "object name cannot be empty".to_string(),
            ));
        }

        let data = payload.read_all().await?;
        let etag = compute_etag(&data);
        let metadata = payload.metadata();

        let record = ObjectRecord {
            name,
            etag: etag.clone(),
            size: data.len() as u64,
            content_type: options
                .content_type
                .or_else(|| metadata.content_type.clone()),
            content_disposition: metadata.content_disposition.clone(),
            user_metadata: options.user_metadata,
            manifest_prefix: None,
            updated_at: Utc::now(),
        };

        self.write_object(container, &record, &data).await?;

        tracing::debug!(
            "Stored object {}/{} ({} bytes, etag {})",
            container,
            record.name,
            record.size,
            etag
        );
        Ok(etag)
    }

    async fn put_object_manifest(&self, container: &str, object_key: &str) -> Result<String> {
        let prefix = segment_prefix(object_key);
        let segments = self.list_segments(container, &prefix).await?;

        let concatenated: String = segments.iter().map(|segment| segment.etag.as_str()).collect();
        let etag = compute_etag(concatenated.as_bytes());
        let size = segments.iter().map(|segment| segment.size).sum();

        let record = ObjectRecord {
            name: object_key.to_string(),
            etag: etag.clone(),
            size,
            content_type: None,
            content_disposition: None,
            user_metadata: BTreeMap::new(),
            manifest_prefix: Some(prefix),
            updated_at: Utc::now(),
        };

        self.write_object(container, &record, &[]).await?;

        tracing::debug!(
            "Stored manifest {}/{} over {} segments ({} bytes)",
            container,
            object_key,
            segments.len(),
            size
        );
        Ok(etag)
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension(format!("{}.tmp", Ulid::new()));
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Hex MD5 digest, the ETag format Swift uses.
pub fn compute_etag(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
