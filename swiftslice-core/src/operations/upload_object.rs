use crate::{
    Payload, PayloadSlicer, PutOptions, Result, Segment, SliceError, SlicingPlan, StoreObject,
    UploadConfig, segment_name,
};
use crate::storage::ObjectStore;
use futures_util::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;

/// Uploads one object, splitting it into numbered segments finalized by a
/// manifest when it is larger than the configured chunk size.
///
/// A failed segment aborts the upload. Segments already written stay in the
/// store and no manifest is created; callers that need all-or-nothing
/// semantics must delete `<key>/*` themselves.
#[derive(Clone)]
pub struct UploadObjectOperation {
    store: Arc<dyn ObjectStore>,
    slicer: Arc<dyn PayloadSlicer>,
    config: UploadConfig,
}

#[derive(Debug, Clone)]
pub struct UploadObjectOperationRequest {
    pub container: String,
    pub object_key: String,
    pub payload: Payload,
    pub options: PutOptions,
}

#[derive(Debug, Clone)]
pub struct UploadObjectOperationResult {
    pub etag: String,
    pub plan: SlicingPlan,
    pub outcome: UploadObjectOperationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadObjectOperationOutcome {
    /// Stored whole under the object key.
    SingleObject,
    /// Stored as segments, listed in part order, behind a manifest.
    Manifest { segments: Vec<String> },
}

impl UploadObjectOperation {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        slicer: Arc<dyn PayloadSlicer>,
        config: UploadConfig,
    ) -> Self {
        Self {
            store,
            slicer,
            config,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub async fn run(
        &self,
        request: UploadObjectOperationRequest,
    ) -> Result<UploadObjectOperationResult> {
        let UploadObjectOperationRequest {
            container,
            object_key,
            payload,
            options,
        } = request;

        ensure_not_blank("container name", &container)?;
        ensure_not_blank("object key", &object_key)?;

        let content_length = payload.content_length().ok_or_else(|| {
            SliceError::InvalidArgument(format!(
                "content length must be set on the payload for {}/{}",
                container, object_key
            ))
        })?;

        let plan = SlicingPlan::compute(
            content_length,
            self.config.default_chunk_size,
            self.config.max_part_count,
        )?;

        if !plan.is_split() {
            tracing::debug!(
                "Uploading {}/{} as a single object ({} bytes)",
                container,
                object_key,
                content_length
            );

            let etag = self
                .store
                .put_object(
                    &container,
                    StoreObject {
                        name: object_key,
                        payload,
                        options,
                    },
                )
                .await?;

            return Ok(UploadObjectOperationResult {
                etag,
                plan,
                outcome: UploadObjectOperationOutcome::SingleObject,
            });
        }

        tracing::info!(
            "Uploading {}/{} in {} segments (chunk_size={} parts={} remainder={} concurrency={})",
            container,
            object_key,
            plan.segment_count(),
            plan.chunk_size,
            plan.part_count,
            plan.remainder,
            self.config.part_concurrency
        );

        let segments = if self.config.part_concurrency > 1 {
            self.upload_segments_concurrently(&container, &object_key, &payload, &options, plan)
                .await?
        } else {
            self.upload_segments_in_order(&container, &object_key, &payload, &options, plan)
                .await?
        };

        let etag = self
            .store
            .put_object_manifest(&container, &object_key)
            .await?;

        tracing::info!(
            "Finalized {}/{} over {} segments (etag {})",
            container,
            object_key,
            segments.len(),
            etag
        );

        Ok(UploadObjectOperationResult {
            etag,
            plan,
            outcome: UploadObjectOperationOutcome::Manifest { segments },
        })
    }

    async fn upload_segments_in_order(
        &self,
        container: &str,
        object_key: &str,
        payload: &Payload,
        options: &PutOptions,
        plan: SlicingPlan,
    ) -> Result<Vec<String>> {
        let mut uploaded = Vec::with_capacity(plan.segment_count() as usize);
        for segment in plan.segments() {
            let name = self
                .upload_segment(container, object_key, payload, options, segment)
                .await
                .inspect_err(|error| {
                    tracing::warn!(
                        "Segment {} of {}/{} failed, leaving {} uploaded segments in place: {}",
                        segment.number,
                        container,
                        object_key,
                        uploaded.len(),
                        error
                    );
                })?;
            uploaded.push(name);
        }
        Ok(uploaded)
    }

    /// Fans segments out over at most `part_concurrency` in-flight uploads.
    /// The first failure drops every pending upload.
    async fn upload_segments_concurrently(
        &self,
        container: &str,
        object_key: &str,
        payload: &Payload,
        options: &PutOptions,
        plan: SlicingPlan,
    ) -> Result<Vec<String>> {
        let mut uploaded: Vec<(u64, String)> = stream::iter(plan.segments())
            .map(|segment| async move {
                let name = self
                    .upload_segment(container, object_key, payload, options, segment)
                    .await
                    .inspect_err(|error| {
                        tracing::warn!(
                            "Segment {} of {}/{} failed, cancelling pending segments: {}",
                            segment.number,
                            container,
                            object_key,
                            error
                        );
                    })?;
                Ok::<_, SliceError>((segment.number, name))
            })
            .buffer_unordered(self.config.part_concurrency)
            .try_collect()
            .await?;

        uploaded.sort_by_key(|(number, _)| *number);
        Ok(uploaded.into_iter().map(|(_, name)| name).collect())
    }

    async fn upload_segment(
        &self,
        container: &str,
        object_key: &str,
        payload: &Payload,
        options: &PutOptions,
        segment: Segment,
    ) -> Result<String> {
        let name = segment_name(object_key, segment.number);
        let mut part = self.slicer.slice(payload, segment.offset, segment.length)?;
        part.metadata_mut().content_disposition = Some(name.clone());

        tracing::debug!(
            "Uploading segment {} ({} bytes at offset {})",
            name,
            segment.length,
            segment.offset
        );

        self.store
            .put_object(
                container,
                StoreObject {
                    name: name.clone(),
                    payload: part,
                    options: options.clone(),
                },
            )
            .await?;

        Ok(name)
    }
}

fn ensure_not_blank(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SliceError::InvalidArgument(format!("{} cannot be empty", what)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BasicPayloadSlicer, ErrorKind};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct RecordedPut {
        container: String,
        name: String,
        content_disposition: Option<String>,
        body: Bytes,
    }

    /// Records every call. Fails the `fail_on_put`-th put attempt (1-based).
    #[derive(Default)]
    struct RecordingStore {
        puts: Mutex<Vec<RecordedPut>>,
        manifests: Mutex<Vec<(String, String)>>,
        fail_on_put: Option<usize>,
        put_delay: Option<Duration>,
    }

    impl RecordingStore {
        fn failing_on(attempt: usize) -> Self {
            Self {
                fail_on_put: Some(attempt),
                ..Default::default()
            }
        }

        fn puts(&self) -> Vec<RecordedPut> {
            self.puts.lock().unwrap().clone()
        }

        fn put_names(&self) -> Vec<String> {
            self.puts().into_iter().map(|put| put.name).collect()
        }

        fn manifests(&self) -> Vec<(String, String)> {
            self.manifests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put_object(&self, container: &str, object: StoreObject) -> Result<String> {
            let body = object.payload.read_all().await?;
            let attempt = {
                let mut puts = self.puts.lock().unwrap();
                puts.push(RecordedPut {
                    container: container.to_string(),
                    name: object.name.clone(),
                    content_disposition: object.payload.metadata().content_disposition.clone(),
                    body,
                });
                puts.len()
            };

            if let Some(delay) = self.put_delay {
                tokio::time::sleep(delay).await;
            }

            if self.fail_on_put == Some(attempt) {
                return Err(SliceError::Provider {
                    status: 503,
                    message: format!("rejected {}", object.name),
                });
            }
            Ok(format!("etag-{}", object.name))
        }

        async fn put_object_manifest(&self, container: &str, object_key: &str) -> Result<String> {
            self.manifests
                .lock()
                .unwrap()
                .push((container.to_string(), object_key.to_string()));
            Ok(format!("manifest-{}", object_key))
        }
    }

    fn config(default_chunk_size: u64, max_part_count: u64, part_concurrency: usize) -> UploadConfig {
        UploadConfig {
            default_chunk_size,
            max_part_count,
            part_concurrency,
        }
    }

    fn operation(store: &Arc<RecordingStore>, config: UploadConfig) -> UploadObjectOperation {
        UploadObjectOperation::new(store.clone(), Arc::new(BasicPayloadSlicer), config)
    }

    fn request(object_key: &str, payload: Payload) -> UploadObjectOperationRequest {
        UploadObjectOperationRequest {
            container: "container".to_string(),
            object_key: object_key.to_string(),
            payload,
            options: PutOptions::default(),
        }
    }

    fn patterned(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
    }

    #[tokio::test]
    async fn test_small_payload_uploads_single_object() {
        let store = Arc::new(RecordingStore::default());
        let op = operation(&store, config(1_000, 10, 1));

        let result = op
            .run(request("small", Payload::from_bytes(patterned(1_000))))
            .await
            .unwrap();

        assert_eq!(result.outcome, UploadObjectOperationOutcome::SingleObject);
        assert_eq!(result.etag, "etag-small");
        assert_eq!(result.plan.part_count, 0);

        let puts = store.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].name, "small");
        assert_eq!(puts[0].container, "container");
        assert_eq!(puts[0].content_disposition, None);
        assert!(store.manifests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_payload_uploads_single_object() {
        let store = Arc::new(RecordingStore::default());
        let op = operation(&store, config(1_000, 10, 1));

        let result = op
            .run(request("empty", Payload::from_bytes(Bytes::new())))
            .await
            .unwrap();

        assert_eq!(result.outcome, UploadObjectOperationOutcome::SingleObject);
        assert_eq!(store.put_names(), vec!["empty"]);
        assert!(store.manifests().is_empty());
    }

    #[tokio::test]
    async fn test_split_upload_with_remainder() {
        let store = Arc::new(RecordingStore::default());
        let op = operation(&store, config(1_000_000, 10, 1));
        let data = patterned(2_500_000);

        let result = op
            .run(request("key", Payload::from_bytes(data.clone())))
            .await
            .unwrap();

        assert_eq!(result.plan.chunk_size, 1_000_000);
        assert_eq!(result.plan.part_count, 2);
        assert_eq!(result.plan.remainder, 500_000);
        assert_eq!(result.etag, "manifest-key");

        let puts = store.puts();
        let sizes: Vec<usize> = puts.iter().map(|put| put.body.len()).collect();
        assert_eq!(store.put_names(), vec!["key/1", "key/2", "key/3"]);
        assert_eq!(sizes, vec![1_000_000, 1_000_000, 500_000]);

        let reassembled: Vec<u8> = puts.iter().flat_map(|put| put.body.to_vec()).collect();
        assert_eq!(Bytes::from(reassembled), data);

        assert_eq!(
            store.manifests(),
            vec![("container".to_string(), "key".to_string())]
        );
        assert_eq!(
            result.outcome,
            UploadObjectOperationOutcome::Manifest {
                segments: vec!["key/1".into(), "key/2".into(), "key/3".into()]
            }
        );
    }

    #[tokio::test]
    async fn test_segments_named_in_order_with_own_disposition() {
        let store = Arc::new(RecordingStore::default());
        let op = operation(&store, config(100, 10, 1));

        op.run(request("foo", Payload::from_bytes(patterned(301))))
            .await
            .unwrap();

        let puts = store.puts();
        assert_eq!(store.put_names(), vec!["foo/1", "foo/2", "foo/3", "foo/4"]);
        for put in &puts {
            assert_eq!(put.content_disposition.as_deref(), Some(put.name.as_str()));
        }
        assert_eq!(puts[3].body.len(), 1);
    }

    #[tokio::test]
    async fn test_part_count_bound_raises_chunk_size() {
        let store = Arc::new(RecordingStore::default());
        let op = operation(&store, config(10, 4, 1));

        let result = op
            .run(request("big", Payload::from_bytes(patterned(100))))
            .await
            .unwrap();

        assert_eq!(result.plan.chunk_size, 25);
        assert_eq!(result.plan.part_count, 4);
        assert_eq!(store.puts().len(), 4);
        assert_eq!(store.manifests().len(), 1);
    }

    #[tokio::test]
    async fn test_remainder_does_not_exceed_part_limit() {
        let store = Arc::new(RecordingStore::default());
        let op = operation(&store, config(100, 10, 1));
        let data = patterned(1_001);

        let result = op
            .run(request("edge", Payload::from_bytes(data.clone())))
            .await
            .unwrap();

        assert_eq!(result.plan.chunk_size, 101);
        assert_eq!(result.plan.part_count, 9);
        assert_eq!(result.plan.remainder, 92);

        let puts = store.puts();
        assert_eq!(puts.len(), 10);
        assert_eq!(puts.last().map(|put| put.name.as_str()), Some("edge/10"));
        assert_eq!(puts.last().map(|put| put.body.len()), Some(92));
        assert_eq!(store.manifests().len(), 1);

        let reassembled: Vec<u8> = puts.iter().flat_map(|put| put.body.to_vec()).collect();
        assert_eq!(Bytes::from(reassembled), data);
    }

    #[tokio::test]
    async fn test_overstated_length_fails_single_upload() {
        let store = Arc::new(RecordingStore::default());
        let op = operation(&store, config(100, 10, 1));

        let payload = Payload::from_bytes(patterned(10)).with_content_length(Some(50));
        let error = op.run(request("short", payload)).await.unwrap_err();

        assert!(error.is_precondition());
        assert!(store.puts().is_empty());
        assert!(store.manifests().is_empty());
    }

    #[tokio::test]
    async fn test_failed_segment_aborts_without_manifest() {
        let store = Arc::new(RecordingStore::failing_on(2));
        let op = operation(&store, config(100, 10, 1));

        let error = op
            .run(request("foo", Payload::from_bytes(patterned(350))))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Provider);
        assert!(error.to_string().contains("foo/2"));
        // foo/1 stays behind: failed uploads are not cleaned up
        assert_eq!(store.put_names(), vec!["foo/1", "foo/2"]);
        assert!(store.manifests().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_content_length_fails_before_upload() {
        let store = Arc::new(RecordingStore::default());
        let op = operation(&store, config(100, 10, 1));

        let payload = Payload::from_bytes(patterned(10)).with_content_length(None);
        let error = op.run(request("foo", payload)).await.unwrap_err();

        assert!(matches!(error, SliceError::InvalidArgument(_)));
        assert!(store.puts().is_empty());
        assert!(store.manifests().is_empty());
    }

    #[tokio::test]
    async fn test_blank_names_fail_before_upload() {
        let store = Arc::new(RecordingStore::default());
        let op = operation(&store, config(100, 10, 1));

        let error = op
            .run(request(" ", Payload::from_bytes(patterned(10))))
            .await
            .unwrap_err();
        assert!(error.is_precondition());

        let mut blank_container = request("foo", Payload::from_bytes(patterned(10)));
        blank_container.container = String::new();
        let error = op.run(blank_container).await.unwrap_err();
        assert!(error.is_precondition());

        assert!(store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_options_are_forwarded_to_every_segment() {
        #[derive(Default)]
        struct OptionsStore {
            seen: Mutex<Vec<PutOptions>>,
        }

        #[async_trait]
        impl ObjectStore for OptionsStore {
            async fn put_object(&self, _container: &str, object: StoreObject) -> Result<String> {
                self.seen.lock().unwrap().push(object.options);
                Ok("etag".to_string())
            }

            async fn put_object_manifest(&self, _container: &str, _key: &str) -> Result<String> {
                Ok("manifest".to_string())
            }
        }

        let store = Arc::new(OptionsStore::default());
        let op = UploadObjectOperation::new(store.clone(), Arc::new(BasicPayloadSlicer), config(4, 10, 1));

        let mut upload = request("doc", Payload::from_bytes(patterned(10)));
        upload.options.content_type = Some("application/pdf".to_string());
        op.run(upload).await.unwrap();

        let seen = store.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen
            .iter()
            .all(|options| options.content_type.as_deref() == Some("application/pdf")));
    }

    #[tokio::test]
    async fn test_concurrent_upload_finalizes_after_all_segments() {
        let store = Arc::new(RecordingStore {
            put_delay: Some(Duration::from_millis(5)),
            ..Default::default()
        });
        let op = operation(&store, config(100, 100, 4));
        let data = patterned(1_050);

        let result = op
            .run(request("par", Payload::from_bytes(data.clone())))
            .await
            .unwrap();

        let expected: Vec<String> = (1..=11).map(|n| format!("par/{}", n)).collect();
        assert_eq!(
            result.outcome,
            UploadObjectOperationOutcome::Manifest {
                segments: expected.clone()
            }
        );

        let mut names = store.put_names();
        names.sort();
        let mut sorted_expected = expected;
        sorted_expected.sort();
        assert_eq!(names, sorted_expected);

        let mut puts = store.puts();
        puts.sort_by_key(|put| {
            put.name["par/".len()..].parse::<u64>().unwrap()
        });
        let reassembled: Vec<u8> = puts.iter().flat_map(|put| put.body.to_vec()).collect();
        assert_eq!(Bytes::from(reassembled), data);
        assert_eq!(store.manifests().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_upload_failure_skips_manifest() {
        let store = Arc::new(RecordingStore {
            fail_on_put: Some(3),
            put_delay: Some(Duration::from_millis(5)),
            ..Default::default()
        });
        let op = operation(&store, config(100, 100, 3));

        let error = op
            .run(request("par", Payload::from_bytes(patterned(2_000))))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Provider);
        assert!(store.puts().len() < 20);
        assert!(store.manifests().is_empty());
    }
}
