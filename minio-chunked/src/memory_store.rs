use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use parking_lot::RwLock;
use thiserror::Error;

use crate::{
    BlobError, BlobResult, BlobStore, BucketInfo, ByteRange, ByteStream, ComposeSource,
    DeleteFailure, DeleteStream, EntryStream, ManagedBlobStore, ObjectEntry, ObjectPut, ObjectStat,
    WriteResponse,
};

/// Failures raised by [`MemoryBlobStore`], shaped after S3 error codes
#[derive(Error, Debug)]
pub enum MemoryStoreError {
    #[error("NoSuchBucket: {bucket}")]
    NoSuchBucket { bucket: String },

    #[error("BucketAlreadyOwnedByYou: {bucket}")]
    BucketAlreadyExists { bucket: String },

    #[error("NoSuchKey: {bucket}/{object}")]
    NoSuchKey { bucket: String, object: String },

    #[error("EntityTooSmall: source {index} is {size} bytes, minimum is {min}")]
    EntityTooSmall { index: usize, size: u64, min: u64 },
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    etag: String,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(data: Bytes, content_type: Option<String>) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        data.hash(&mut hasher);
        Self {
            etag: format!("{:016x}", hasher.finish()),
            data,
            content_type,
            last_modified: Utc::now(),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    created: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
}

impl Bucket {
    fn new() -> Self {
        Self {
            created: Utc::now(),
            objects: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, Bucket>,
    /// (bucket, object) pairs that batch deletes report as failed
    delete_failures: HashSet<(String, String)>,
}

impl State {
    fn bucket(&self, bucket: &str) -> BlobResult<&Bucket> {
        self.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))
    }

    fn bucket_mut(&mut self, bucket: &str) -> BlobResult<&mut Bucket> {
        self.buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))
    }

    fn object(&self, bucket: &str, object: &str) -> BlobResult<&StoredObject> {
        self.bucket(bucket)?
            .objects
            .get(object)
            .ok_or_else(|| BlobError::not_found(format!("{}/{}", bucket, object)))
    }

    fn list(&self, bucket: &str, prefix: &str, recursive: bool) -> BlobResult<Vec<ObjectEntry>> {
        let mut entries = Vec::new();
        let mut dirs = BTreeSet::new();
        for name in self.bucket(bucket)?.objects.keys() {
            let Some(rest) = name.strip_prefix(prefix) else {
                continue;
            };
            match rest.find('/') {
                Some(pos) if !recursive => {
                    dirs.insert(format!("{}{}", prefix, &rest[..=pos]));
                }
                _ => entries.push(ObjectEntry::object(name.clone())),
            }
        }
        entries.extend(dirs.into_iter().map(ObjectEntry::dir));
        Ok(entries)
    }

    fn remove_all(&mut self, bucket: &str, objects: &[String]) -> BlobResult<Vec<DeleteFailure>> {
        let failing: Vec<String> = objects
            .iter()
            .filter(|o| self.delete_failures.contains(&(bucket.to_string(), (*o).clone())))
            .cloned()
            .collect();
        let stored = &mut self.bucket_mut(bucket)?.objects;
        let mut failures = Vec::new();
        for object in objects {
            if failing.contains(object) {
                failures.push(DeleteFailure {
                    object_name: object.clone(),
                    message: "InternalError: injected delete failure".to_string(),
                });
            } else {
                stored.remove(object);
            }
        }
        Ok(failures)
    }
}

fn no_such_bucket(bucket: &str) -> BlobError {
    BlobError::backend(MemoryStoreError::NoSuchBucket {
        bucket: bucket.to_string(),
    })
}

/// In-process store with S3-like semantics, for tests and local development.
///
/// Clones share the same buckets.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    state: Arc<RwLock<State>>,
    min_part_size: Option<u64>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject composes whose non-final sources are smaller than `bytes`,
    /// the way S3 rejects undersized multipart parts
    pub fn with_min_part_size(mut self, bytes: u64) -> Self {
        self.min_part_size = Some(bytes);
        self
    }

    /// Make batch deletes report `object` as failed and keep it
    pub fn fail_delete(&self, bucket: &str, object: &str) {
        self.state
            .write()
            .delete_failures
            .insert((bucket.to_string(), object.to_string()));
    }

    /// Store an object directly, creating the bucket if needed
    pub fn insert(&self, bucket: &str, object: &str, data: Vec<u8>) {
        let mut state = self.state.write();
        state
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(Bucket::new)
            .objects
            .insert(object.to_string(), StoredObject::new(Bytes::from(data), None));
    }

    /// Contents of an object, if present
    pub fn object(&self, bucket: &str, object: &str) -> Option<Vec<u8>> {
        let state = self.state.read();
        state
            .buckets
            .get(bucket)?
            .objects
            .get(object)
            .map(|o| o.data.to_vec())
    }

    /// All object names in a bucket, sorted; empty if the bucket is missing
    pub fn object_names(&self, bucket: &str) -> Vec<String> {
        let state = self.state.read();
        state
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn collect(mut body: ByteStream) -> BlobResult<Bytes> {
        let mut data = BytesMut::new();
        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data.freeze())
    }

    fn write_object(
        &self,
        bucket: &str,
        object: &str,
        stored: StoredObject,
    ) -> BlobResult<WriteResponse> {
        let mut state = self.state.write();
        let etag = stored.etag.clone();
        state
            .bucket_mut(bucket)?
            .objects
            .insert(object.to_string(), stored);
        Ok(WriteResponse::new(bucket, object).with_etag(etag))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn bucket_exists(&self, bucket: &str) -> BlobResult<bool> {
        Ok(self.state.read().buckets.contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> BlobResult<()> {
        let mut state = self.state.write();
        if state.buckets.contains_key(bucket) {
            return Err(BlobError::backend(MemoryStoreError::BucketAlreadyExists {
                bucket: bucket.to_string(),
            }));
        }
        state.buckets.insert(bucket.to_string(), Bucket::new());
        Ok(())
    }

    fn list_objects(&self, bucket: &str, prefix: &str, recursive: bool) -> EntryStream {
        let state = self.state.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        Box::pin(async_stream::stream! {
            let listed = state.read().list(&bucket, &prefix, recursive);
            match listed {
                Ok(entries) => {
                    for entry in entries {
                        yield Ok(entry);
                    }
                }
                Err(err) => yield Err(err),
            }
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        body: ByteStream,
        options: ObjectPut,
    ) -> BlobResult<WriteResponse> {
        if !self.bucket_exists(bucket).await? {
            return Err(no_such_bucket(bucket));
        }
        let data = Self::collect(body).await?;
        self.write_object(bucket, object, StoredObject::new(data, options.content_type))
    }

    async fn compose_object(
        &self,
        bucket: &str,
        object: &str,
        sources: Vec<ComposeSource>,
    ) -> BlobResult<WriteResponse> {
        let data = {
            let state = self.state.read();
            state.bucket(bucket)?;
            let mut data = BytesMut::new();
            let last = sources.len().saturating_sub(1);
            for (index, source) in sources.iter().enumerate() {
                let stored = state.object(&source.bucket, &source.object)?;
                let size = stored.data.len() as u64;
                if let Some(min) = self.min_part_size {
                    if index < last && size < min {
                        return Err(BlobError::backend(MemoryStoreError::EntityTooSmall {
                            index,
                            size,
                            min,
                        }));
                    }
                }
                data.extend_from_slice(&stored.data);
            }
            data.freeze()
        };
        self.write_object(bucket, object, StoredObject::new(data, None))
    }

    fn remove_objects(&self, bucket: &str, objects: Vec<String>) -> DeleteStream {
        let state = self.state.clone();
        let bucket = bucket.to_string();
        Box::pin(async_stream::stream! {
            let removed = state.write().remove_all(&bucket, &objects);
            match removed {
                Ok(failures) => {
                    for failure in failures {
                        yield Ok(failure);
                    }
                }
                Err(err) => yield Err(err),
            }
        })
    }
}

#[async_trait]
impl ManagedBlobStore for MemoryBlobStore {
    async fn list_buckets(&self) -> BlobResult<Vec<BucketInfo>> {
        Ok(self
            .state
            .read()
            .buckets
            .iter()
            .map(|(name, bucket)| BucketInfo {
                name: name.clone(),
                creation_date: Some(bucket.created),
            })
            .collect())
    }

    async fn stat_object(&self, bucket: &str, object: &str) -> BlobResult<ObjectStat> {
        let state = self.state.read();
        let stored = state.object(bucket, object)?;
        Ok(ObjectStat {
            bucket: bucket.to_string(),
            object: object.to_string(),
            size_bytes: stored.data.len() as u64,
            etag: Some(stored.etag.clone()),
            content_type: stored.content_type.clone(),
            last_modified: Some(stored.last_modified),
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        object: &str,
        range: Option<ByteRange>,
    ) -> BlobResult<ByteStream> {
        let data = self.state.read().object(bucket, object)?.data.clone();
        let data = match range {
            Some(range) => {
                let (start, end) = range.slice_bounds(data.len() as u64);
                data.slice(start..end)
            }
            None => data,
        };
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_object: &str,
        bucket: &str,
        object: &str,
    ) -> BlobResult<WriteResponse> {
        let stored = self.state.read().object(src_bucket, src_object)?.clone();
        self.write_object(bucket, object, StoredObject::new(stored.data, stored.content_type))
    }

    async fn remove_object(&self, bucket: &str, object: &str) -> BlobResult<()> {
        self.state.write().bucket_mut(bucket)?.objects.remove(object);
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        object: &str,
        expires_in: Duration,
    ) -> BlobResult<String> {
        self.state.read().object(bucket, object)?;
        Ok(format!(
            "memory://{}/{}?expires={}",
            bucket,
            object,
            expires_in.as_secs()
        ))
    }
}
