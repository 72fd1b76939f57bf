use super::{ObjectStore, StoreObject};
use crate::error::{Result, SliceError};
use crate::plan::segment_prefix;
use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap};
use reqwest::{Body, Client, Response, Url};
use std::time::Duration;

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const OBJECT_MANIFEST_HEADER: &str = "X-Object-Manifest";
const OBJECT_META_PREFIX: &str = "X-Object-Meta-";

/// Unreserved characters stay as they are; `/` separates container and
/// prefix in a manifest value.
const MANIFEST_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// `X-Object-Manifest` value for the segments of `object_key`:
/// `<container>/<object_key>/`, URL-encoded.
pub fn manifest_header_value(container: &str, object_key: &str) -> String {
    format!(
        "{}/{}",
        utf8_percent_encode(container, MANIFEST_ENCODE_SET),
        utf8_percent_encode(&segment_prefix(object_key), MANIFEST_ENCODE_SET)
    )
}

/// Swift object store reached through an authenticated storage URL
/// (`https://host/v1/AUTH_account`) and token.
#[derive(Clone)]
pub struct SwiftObjectStore {
    client: Client,
    storage_url: Url,
    token: String,
}

impl std::fmt::Debug for SwiftObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwiftObjectStore")
            .field("storage_url", &self.storage_url.as_str())
            .finish_non_exhaustive()
    }
}

impl SwiftObjectStore {
    pub fn new(storage_url: &str, token: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let storage_url = Url::parse(storage_url.trim()).map_err(|error| {
            SliceError::Config(format!("invalid swift storage url {}: {}", storage_url, error))
        })?;
        if storage_url.cannot_be_a_base() {
            return Err(SliceError::Config(format!(
                "swift storage url cannot be a base: {}",
                storage_url
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|error| SliceError::Config(format!("failed to build http client: {}", error)))?;

        Ok(Self {
            client,
            storage_url,
            token: token.into(),
        })
    }

    /// `{storage_url}/{container}/{name}` with every path segment encoded.
    /// Slashes inside `name` stay path separators, as Swift expects.
    pub fn object_url(&self, container: &str, name: &str) -> Result<Url> {
        let mut url = self.storage_url.clone();
        url.path_segments_mut()
            .map_err(|_| SliceError::Config("swift storage url cannot be a base".to_string()))?
            .pop_if_empty()
            .push(container)
            .extend(name.split('/'));
        Ok(url)
    }

    async fn send_put(&self, request: reqwest::RequestBuilder, what: &str) -> Result<String> {
        let response = request
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|error| SliceError::Transport(format!("{}: {}", what, error)))?;

        let response = check_status(response, what).await?;
        parse_etag(response.headers(), what)
    }
}

#[async_trait]
impl ObjectStore for SwiftObjectStore {
    async fn put_object(&self, container: &str, object: StoreObject) -> Result<String> {
        let StoreObject {
            name,
            payload,
            options,
        } = object;

        let url = self.object_url(container, &name)?;
        let metadata = payload.metadata();
        let content_length = metadata.content_length.ok_or_else(|| {
            SliceError::InvalidArgument(format!("content length of {} is unknown", name))
        })?;
        let body = Body::wrap_stream(payload.stream().await?);

        let mut request = self
            .client
            .put(url)
            .header(CONTENT_LENGTH, content_length);

        if let Some(content_type) = options
            .content_type
            .as_deref()
            .or(metadata.content_type.as_deref())
        {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if let Some(content_disposition) = metadata.content_disposition.as_deref() {
            request = request.header(CONTENT_DISPOSITION, content_disposition);
        }
        for (key, value) in &options.user_metadata {
            request = request.header(format!("{}{}", OBJECT_META_PREFIX, key), value);
        }

        let what = format!("put object {}/{}", container, name);
        let etag = self.send_put(request.body(body), &what).await?;

        tracing::debug!("Uploaded {}/{} (etag {})", container, name, etag);
        Ok(etag)
    }

    async fn put_object_manifest(&self, container: &str, object_key: &str) -> Result<String> {
        let url = self.object_url(container, object_key)?;
        let manifest = manifest_header_value(container, object_key);

        let request = self
            .client
            .put(url)
            .header(CONTENT_LENGTH, 0)
            .header(OBJECT_MANIFEST_HEADER, manifest.as_str());

        let what = format!("put manifest {}/{}", container, object_key);
        let etag = self.send_put(request, &what).await?;

        tracing::debug!("Wrote manifest {}/{} -> {} (etag {})", container, object_key, manifest, etag);
        Ok(etag)
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SliceError::Provider {
        status: status.as_u16(),
        message: format!("{} failed: {}", what, body.trim()),
    })
}

fn parse_etag(headers: &HeaderMap, what: &str) -> Result<String> {
    let etag = headers
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty());

    etag.ok_or_else(|| SliceError::Internal(format!("{}: ETag missing from response", what)))
}
