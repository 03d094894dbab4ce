use std::time::Duration;

use async_trait::async_trait;

use crate::{
    BlobResult, BucketInfo, ByteRange, ByteStream, ComposeSource, DeleteStream, EntryStream,
    ObjectPut, ObjectStat, WriteResponse,
};

/// Storage primitives the chunked uploader depends on.
///
/// Kept deliberately narrow; anything the uploader does not call lives on
/// [`ManagedBlobStore`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Check whether a bucket exists
    async fn bucket_exists(&self, bucket: &str) -> BlobResult<bool>;

    /// Create a bucket. Stores may fail if it already exists.
    async fn make_bucket(&self, bucket: &str) -> BlobResult<()>;

    /// List objects under `prefix`.
    ///
    /// A non-recursive listing reports deeper keys as directory entries, the way
    /// S3 reports common prefixes for the `/` delimiter. Order is unspecified.
    fn list_objects(&self, bucket: &str, prefix: &str, recursive: bool) -> EntryStream;

    /// Store an object from a stream, overwriting any existing object
    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        body: ByteStream,
        options: ObjectPut,
    ) -> BlobResult<WriteResponse>;

    /// Write the concatenation of `sources`, in the order given, to the destination
    async fn compose_object(
        &self,
        bucket: &str,
        object: &str,
        sources: Vec<ComposeSource>,
    ) -> BlobResult<WriteResponse>;

    /// Remove many objects; the stream yields only the ones that failed
    fn remove_objects(&self, bucket: &str, objects: Vec<String>) -> DeleteStream;
}

/// Convenience operations used by the facade
#[async_trait]
pub trait ManagedBlobStore: BlobStore {
    /// List all buckets
    async fn list_buckets(&self) -> BlobResult<Vec<BucketInfo>>;

    /// Get object metadata without content
    async fn stat_object(&self, bucket: &str, object: &str) -> BlobResult<ObjectStat>;

    /// Read an object, optionally a byte window of it
    async fn get_object(
        &self,
        bucket: &str,
        object: &str,
        range: Option<ByteRange>,
    ) -> BlobResult<ByteStream>;

    /// Server-side copy
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_object: &str,
        bucket: &str,
        object: &str,
    ) -> BlobResult<WriteResponse>;

    /// Remove a single object
    async fn remove_object(&self, bucket: &str, object: &str) -> BlobResult<()>;

    /// Generate a presigned GET URL
    async fn presign_get(&self, bucket: &str, object: &str, expires_in: Duration)
        -> BlobResult<String>;
}
