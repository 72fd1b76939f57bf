//! Upload payloads and the slicing capability used to cut them into segments.

use crate::error::{Result, SliceError};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Read size used when streaming file-backed payloads.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Where the bytes of a payload live.
#[derive(Debug, Clone)]
pub enum PayloadBody {
    Bytes(Bytes),
    /// A range of a local file starting at `offset`. The range length is the
    /// payload's content length.
    File { path: PathBuf, offset: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadMetadata {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Payload {
    body: PayloadBody,
    metadata: PayloadMetadata,
}

impl Payload {
    /// In-memory payload. The content length is taken from the buffer.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let metadata = PayloadMetadata {
            content_length: Some(data.len() as u64),
            ..Default::default()
        };
        Self {
            body: PayloadBody::Bytes(data),
            metadata,
        }
    }

    /// Payload backed by a whole local file. Nothing is read until the
    /// payload (or a slice of it) is consumed.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_meta = tokio::fs::metadata(&path).await?;
        if !file_meta.is_file() {
            return Err(SliceError::InvalidArgument(format!(
                "payload path is not a regular file: {}",
                path.display()
            )));
        }

        Ok(Self {
            body: PayloadBody::File { path, offset: 0 },
            metadata: PayloadMetadata {
                content_length: Some(file_meta.len()),
                ..Default::default()
            },
        })
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content_type = Some(content_type.into());
        self
    }

    pub fn with_content_disposition(mut self, content_disposition: impl Into<String>) -> Self {
        self.metadata.content_disposition = Some(content_disposition.into());
        self
    }

    /// Overrides the declared content length. `None` marks the length as
    /// unknown, which uploads reject.
    pub fn with_content_length(mut self, content_length: Option<u64>) -> Self {
        self.metadata.content_length = content_length;
        self
    }

    pub fn body(&self) -> &PayloadBody {
        &self.body
    }

    pub fn metadata(&self) -> &PayloadMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut PayloadMetadata {
        &mut self.metadata
    }

    pub fn content_length(&self) -> Option<u64> {
        self.metadata.content_length
    }

    /// Reads the whole payload into memory.
    pub async fn read_all(&self) -> Result<Bytes> {
        match &self.body {
            PayloadBody::Bytes(data) => match self.metadata.content_length {
                Some(length) if length != data.len() as u64 => {
                    Err(SliceError::InvalidArgument(format!(
                        "declared content length {} does not match buffer length {}",
                        length,
                        data.len()
                    )))
                }
                _ => Ok(data.clone()),
            },
            PayloadBody::File { path, offset } => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(*offset)).await?;

                let mut buf = Vec::new();
                match self.metadata.content_length {
                    Some(length) => {
                        buf.resize(length as usize, 0);
                        file.read_exact(&mut buf).await?;
                    }
                    None => {
                        file.read_to_end(&mut buf).await?;
                    }
                }
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Streams the payload. File ranges are read lazily in bounded chunks
    /// and a file shorter than the declared length ends the stream with
    /// `UnexpectedEof`.
    pub async fn stream(&self) -> Result<BoxStream<'static, std::io::Result<Bytes>>> {
        let length = self.metadata.content_length.ok_or_else(|| {
            SliceError::InvalidArgument("cannot stream a payload of unknown length".to_string())
        })?;

        match &self.body {
            PayloadBody::Bytes(_) => {
                let data = self.read_all().await?;
                Ok(stream::once(async move { Ok(data) }).boxed())
            }
            PayloadBody::File { path, offset } => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(*offset)).await?;

                let chunks = stream::try_unfold(
                    (file.take(length), length),
                    |(mut reader, remaining)| async move {
                        if remaining == 0 {
                            return Ok(None);
                        }
                        let mut buf = BytesMut::with_capacity(STREAM_CHUNK_SIZE);
                        let read = reader.read_buf(&mut buf).await?;
                        if read == 0 {
                            return Err(std::io::Error::new(
                                std::io::ErrorKind::UnexpectedEof,
                                format!("payload ended {} bytes early", remaining),
                            ));
                        }
                        Ok(Some((buf.freeze(), (reader, remaining - read as u64))))
                    },
                );
                Ok(chunks.boxed())
            }
        }
    }
}

/// Produces bounded read-only views of a payload.
pub trait PayloadSlicer: Send + Sync {
    /// Returns a payload covering exactly `length` bytes starting at `offset`.
    fn slice(&self, payload: &Payload, offset: u64, length: u64) -> Result<Payload>;
}

/// Slicer for in-memory and file-backed payloads. Slicing never copies or
/// reads data; bytes are shared and file ranges are offset arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicPayloadSlicer;

impl PayloadSlicer for BasicPayloadSlicer {
    fn slice(&self, payload: &Payload, offset: u64, length: u64) -> Result<Payload> {
        let total = payload.content_length().ok_or_else(|| {
            SliceError::InvalidArgument("cannot slice a payload of unknown length".to_string())
        })?;

        let end = offset.checked_add(length).filter(|end| *end <= total).ok_or_else(|| {
            SliceError::InvalidArgument(format!(
                "slice out of range: offset={} length={} payload_length={}",
                offset, length, total
            ))
        })?;

        let body = match payload.body() {
            PayloadBody::Bytes(data) => {
                if end as usize > data.len() {
                    return Err(SliceError::InvalidArgument(format!(
                        "slice out of range: offset={} length={} buffer_length={}",
                        offset,
                        length,
                        data.len()
                    )));
                }
                PayloadBody::Bytes(data.slice(offset as usize..end as usize))
            }
            PayloadBody::File {
                path,
                offset: base,
            } => PayloadBody::File {
                path: path.clone(),
                offset: base + offset,
            },
        };

        Ok(Payload {
            body,
            metadata: PayloadMetadata {
                content_length: Some(length),
                content_type: payload.metadata().content_type.clone(),
                content_disposition: None,
            },
        })
    }
}
