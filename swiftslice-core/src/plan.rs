//! Slicing plans for segmented uploads.
//!
//! A plan decides whether a payload is stored as one object or as numbered
//! segments `<key>/1`, `<key>/2`, ... that a manifest later ties together.

use crate::error::{Result, SliceError};
use serde::Serialize;

/// Preferred segment size (32 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 32 * 1024 * 1024;

/// Upper bound on the number of segments of one object.
pub const DEFAULT_MAX_PART_COUNT: u64 = 10_000;

/// Delimiter between an object key and a segment number.
pub const SEGMENT_SEPARATOR: char = '/';

/// Name of segment `part_number` of `object_key`.
pub fn segment_name(object_key: &str, part_number: u64) -> String {
    format!("{}{}{}", object_key, SEGMENT_SEPARATOR, part_number)
}

/// Prefix shared by every segment of `object_key`.
pub fn segment_prefix(object_key: &str) -> String {
    format!("{}{}", object_key, SEGMENT_SEPARATOR)
}

/// How a payload of `content_length` bytes is cut into segments.
///
/// `chunk_size * part_count + remainder == content_length` always holds.
/// An unsplit plan has `part_count == 0` and carries the whole payload in
/// `remainder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlicingPlan {
    pub content_length: u64,
    pub chunk_size: u64,
    pub part_count: u64,
    pub remainder: u64,
}

/// One contiguous range of the payload, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub number: u64,
    pub offset: u64,
    pub length: u64,
}

impl SlicingPlan {
    pub fn compute(content_length: u64, default_chunk_size: u64, max_part_count: u64) -> Result<Self> {
        if default_chunk_size == 0 {
            return Err(SliceError::InvalidArgument(
                "default chunk size must be positive".to_string(),
            ));
        }
        if max_part_count == 0 {
            return Err(SliceError::InvalidArgument(
                "max part count must be positive".to_string(),
            ));
        }

        if content_length <= default_chunk_size {
            return Ok(Self {
                content_length,
                chunk_size: content_length,
                part_count: 0,
                remainder: content_length,
            });
        }

        // The bound counts the remainder segment too. With
        // chunk_size = ceil(len / max), ceil(len / chunk_size) <= max.
        let mut chunk_size = default_chunk_size;
        if content_length.div_ceil(chunk_size) > max_part_count {
            chunk_size = content_length.div_ceil(max_part_count);
        }

        Ok(Self {
            content_length,
            chunk_size,
            part_count: content_length / chunk_size,
            remainder: content_length % chunk_size,
        })
    }

    pub fn is_split(&self) -> bool {
        self.part_count > 0
    }

    /// Number of uploads a split plan performs before the manifest.
    pub fn segment_count(&self) -> u64 {
        if !self.is_split() {
            return 0;
        }
        self.part_count + u64::from(self.remainder > 0)
    }

    /// Full-size segments in part order, then the remainder segment if any.
    /// Empty for an unsplit plan.
    pub fn segments(self) -> impl Iterator<Item = Segment> {
        let full = (1..=self.part_count).map(move |number| Segment {
            number,
            offset: (number - 1) * self.chunk_size,
            length: self.chunk_size,
        });

        let tail = (self.is_split() && self.remainder > 0).then(|| Segment {
            number: self.part_count + 1,
            offset: self.part_count * self.chunk_size,
            length: self.remainder,
        });

        full.chain(tail)
    }
}
