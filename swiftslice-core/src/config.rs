use crate::plan::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_PART_COUNT};
use crate::{Result, SliceError};
use serde::{Deserialize, Serialize};

/// Tuning for segmented uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Preferred segment size in bytes. Payloads up to this size are stored as
    /// a single object.
    #[serde(default = "default_chunk_size")]
    pub default_chunk_size: u64,
    /// Most segments one object may be split into.
    #[serde(default = "default_max_part_count")]
    pub max_part_count: u64,
    /// Segments uploaded at once. 1 uploads strictly in part order.
    #[serde(default = "default_part_concurrency")]
    pub part_concurrency: usize,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_part_count() -> u64 {
    DEFAULT_MAX_PART_COUNT
}

fn default_part_concurrency() -> usize {
    1
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            default_chunk_size: default_chunk_size(),
            max_part_count: default_max_part_count(),
            part_concurrency: default_part_concurrency(),
        }
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_chunk_size == 0 {
            return Err(SliceError::Config(
                "default_chunk_size must be positive".to_string(),
            ));
        }
        if self.max_part_count == 0 {
            return Err(SliceError::Config(
                "max_part_count must be positive".to_string(),
            ));
        }
        if self.part_concurrency == 0 {
            return Err(SliceError::Config(
                "part_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
