//! Swiftslice Core - segmented large object uploads for Swift object storage
//!
//! Objects larger than a configured chunk size are cut into numbered segments
//! (`<key>/1`, `<key>/2`, ...), uploaded one after another and tied together by
//! a manifest object stored under the original key:
//! - slicing plans bounded by a maximum segment count
//! - sequential or bounded-concurrency segment uploads
//! - filesystem and Swift HTTP object stores

pub mod config;
pub mod error;
pub mod operations;
pub mod payload;
pub mod plan;
pub mod storage;

pub use config::UploadConfig;
pub use error::{ErrorKind, Result, SliceError};
pub use operations::{
    UploadObjectOperation, UploadObjectOperationOutcome, UploadObjectOperationRequest,
    UploadObjectOperationResult,
};
pub use payload::{BasicPayloadSlicer, Payload, PayloadBody, PayloadMetadata, PayloadSlicer};
pub use plan::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_PART_COUNT, SEGMENT_SEPARATOR, Segment, SlicingPlan,
    segment_name, segment_prefix,
};
pub use storage::{
    LocalObjectStore, ObjectRecord, ObjectStore, PutOptions, StoreBuilder, StoreObject,
    SwiftObjectStore, compute_etag, manifest_header_value,
};
