use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::content_type::content_type_for;
use crate::path::{add_tail, trim_head};
use crate::{
    BlobError, BlobResult, BlobStore, BucketInfo, ByteRange, ByteStream, ChunkedUploader,
    DeleteStream, EntryStream, FragResult, ManagedBlobStore, ObjectEntry, ObjectPut, ObjectStat,
    S3CompatibleStore, UploadConfig, WriteResponse,
};

/// Longest lifetime S3 accepts for a presigned URL
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The main entry point: convenience operations over a store plus the
/// chunked uploader, sharing one store.
#[derive(Clone)]
pub struct MinioAdapter {
    store: Arc<dyn ManagedBlobStore>,
    uploader: ChunkedUploader,
}

impl MinioAdapter {
    /// Create a new adapter
    pub fn new<S: ManagedBlobStore + 'static>(store: S, config: UploadConfig) -> Self {
        let store = Arc::new(store);
        let port: Arc<dyn BlobStore> = store.clone();
        Self {
            store,
            uploader: ChunkedUploader::from_arc(port, config),
        }
    }

    /// Adapter over the S3-compatible endpoint named by the `MINIO_UTIL_*` variables
    pub async fn from_env() -> BlobResult<Self> {
        let store = S3CompatibleStore::from_env().await?;
        Ok(Self::new(store, UploadConfig::from_env()))
    }

    pub fn uploader(&self) -> &ChunkedUploader {
        &self.uploader
    }

    /// Upload one chunk of a resumable upload, see [`ChunkedUploader::upload_chunk`]
    pub async fn upload_chunk(
        &self,
        body: ByteStream,
        curr_index: u32,
        total_pieces: u32,
        digest: &str,
    ) -> BlobResult<FragResult> {
        self.uploader
            .upload_chunk(body, curr_index, total_pieces, digest)
            .await
    }

    /// Compose a finished upload, see [`ChunkedUploader::compose`]
    pub async fn compose(
        &self,
        bucket: &str,
        object: &str,
        total_pieces: u32,
        digest: &str,
    ) -> BlobResult<bool> {
        self.uploader.compose(bucket, object, total_pieces, digest).await
    }

    /// Create a bucket if it does not exist yet
    pub async fn create_bucket(&self, bucket: &str) -> BlobResult<()> {
        if !self.store.bucket_exists(bucket).await? {
            self.store.make_bucket(bucket).await?;
            info!(bucket, "bucket created");
        }
        Ok(())
    }

    /// Look up a bucket by name
    pub async fn bucket_info(&self, bucket: &str) -> BlobResult<Option<BucketInfo>> {
        let buckets = self.store.list_buckets().await?;
        Ok(buckets.into_iter().find(|b| b.name == bucket))
    }

    /// Upload with a Content-Type derived from the object name's suffix
    pub async fn upload_file(
        &self,
        bucket: &str,
        object: &str,
        body: ByteStream,
    ) -> BlobResult<WriteResponse> {
        let options = ObjectPut::new().with_content_type(content_type_for(object));
        self.store.put_object(bucket, object, body, options).await
    }

    /// Upload a file from the local filesystem
    pub async fn upload_local_file(
        &self,
        bucket: &str,
        object: &str,
        path: impl AsRef<Path>,
    ) -> BlobResult<WriteResponse> {
        let path = path.as_ref();
        let data = Bytes::from(tokio::fs::read(path).await?);
        let content_type = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(content_type_for(object), content_type_for);
        let options = ObjectPut::new()
            .with_size_hint(data.len() as u64)
            .with_content_type(content_type);
        let body: ByteStream = Box::pin(futures::stream::once(async move { Ok(data) }));
        self.store.put_object(bucket, object, body, options).await
    }

    /// Upload a raw stream without a Content-Type
    pub async fn upload_stream(
        &self,
        bucket: &str,
        object: &str,
        body: ByteStream,
    ) -> BlobResult<WriteResponse> {
        self.store.put_object(bucket, object, body, ObjectPut::new()).await
    }

    /// True if the object can be stat'ed. Any store error counts as absent.
    pub async fn file_exists(&self, bucket: &str, object: &str) -> bool {
        self.store.stat_object(bucket, object).await.is_ok()
    }

    /// True if `folder` (written as `/a/b`) exists as a directory.
    /// Any store error counts as absent.
    pub async fn folder_exists(&self, bucket: &str, folder: &str) -> bool {
        let folder = trim_head(folder);
        if folder.is_empty() {
            return false;
        }
        let wanted = add_tail(folder);
        let mut listing = self.store.list_objects(bucket, folder, false);
        while let Some(entry) = listing.next().await {
            match entry {
                Ok(entry) if entry.is_dir && entry.name == wanted => return true,
                Ok(_) => {}
                Err(err) => {
                    debug!(error = %err, bucket, folder, "folder lookup failed");
                    return false;
                }
            }
        }
        false
    }

    /// Create an empty folder marker object for `folder` (written as `/a/b`)
    pub async fn create_folder(&self, bucket: &str, folder: &str) -> BlobResult<WriteResponse> {
        let folder = add_tail(trim_head(folder));
        if folder.is_empty() || folder == "/" {
            return Err(BlobError::invalid("Empty string: folder"));
        }
        let body: ByteStream = Box::pin(futures::stream::empty());
        self.store
            .put_object(bucket, &folder, body, ObjectPut::new().with_size_hint(0))
            .await
    }

    /// Object metadata; fails if the object does not exist
    pub async fn file_status(&self, bucket: &str, object: &str) -> BlobResult<ObjectStat> {
        self.store.stat_object(bucket, object).await
    }

    /// Collect every entry under `prefix`
    pub async fn list_all_by_prefix(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> BlobResult<Vec<ObjectEntry>> {
        let mut listing = self.store.list_objects(bucket, prefix, recursive);
        let mut entries = Vec::new();
        while let Some(entry) = listing.next().await {
            entries.push(entry?);
        }
        Ok(entries)
    }

    /// Lazily list entries under `prefix`
    pub fn files_by_prefix(&self, bucket: &str, prefix: &str, recursive: bool) -> EntryStream {
        self.store.list_objects(bucket, prefix, recursive)
    }

    /// Read an object, or a byte window of it for resumed downloads
    pub async fn get_file_stream(
        &self,
        bucket: &str,
        object: &str,
        range: Option<ByteRange>,
    ) -> BlobResult<ByteStream> {
        self.store.get_object(bucket, object, range).await
    }

    /// Server-side copy of `src_bucket/src_object` to `bucket/object`
    pub async fn copy_file(
        &self,
        src_bucket: &str,
        src_object: &str,
        bucket: &str,
        object: &str,
    ) -> BlobResult<WriteResponse> {
        self.store
            .copy_object(src_bucket, src_object, bucket, object)
            .await
    }

    /// Remove one object; a leading `/` on the name is ignored
    pub async fn remove_file(&self, bucket: &str, object: &str) -> BlobResult<()> {
        let object = trim_head(object);
        if object.is_empty() {
            return Err(BlobError::invalid("Empty string: object"));
        }
        self.store.remove_object(bucket, object).await
    }

    /// Remove many objects; the stream yields the ones that could not be removed
    pub fn remove_files(&self, bucket: &str, objects: Vec<String>) -> DeleteStream {
        self.store.remove_objects(bucket, objects)
    }

    /// Presigned GET URL, valid for `expires` (default and maximum: 7 days)
    pub async fn presigned_url(
        &self,
        bucket: &str,
        object: &str,
        expires: Option<Duration>,
    ) -> BlobResult<String> {
        let expires = expires.unwrap_or(MAX_PRESIGN_EXPIRY);
        if expires.is_zero() || expires > MAX_PRESIGN_EXPIRY {
            return Err(BlobError::invalid(format!(
                "Presigned URL expiry must be between 1 second and {} seconds",
                MAX_PRESIGN_EXPIRY.as_secs()
            )));
        }
        self.store.presign_get(bucket, object, expires).await
    }

    /// Percent-decode a URL component as UTF-8.
    ///
    /// A `%` not followed by two hex digits is kept literally and `+` decodes
    /// to a space.
    pub fn utf8_by_url_decode(input: &str) -> BlobResult<String> {
        let bytes = input.as_bytes();
        let mut escaped = String::with_capacity(input.len());
        for (i, c) in input.char_indices() {
            match c {
                '%' => {
                    let valid = bytes.len() > i + 2
                        && bytes[i + 1].is_ascii_hexdigit()
                        && bytes[i + 2].is_ascii_hexdigit();
                    escaped.push_str(if valid { "%" } else { "%25" });
                }
                '+' => escaped.push(' '),
                _ => escaped.push(c),
            }
        }
        urlencoding::decode(&escaped)
            .map(|decoded| decoded.into_owned())
            .map_err(|err| BlobError::invalid(format!("Invalid UTF-8 after decoding: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBlobStore;

    #[test]
    fn url_decode_keeps_stray_percent() {
        assert_eq!(
            MinioAdapter::utf8_by_url_decode("%E4%BD%A0%E5%A5%BD.png").unwrap(),
            "你好.png"
        );
        assert_eq!(MinioAdapter::utf8_by_url_decode("100%").unwrap(), "100%");
        assert_eq!(MinioAdapter::utf8_by_url_decode("a%zzb").unwrap(), "a%zzb");
        assert_eq!(MinioAdapter::utf8_by_url_decode("a+b%2Bc").unwrap(), "a b+c");
        assert!(MinioAdapter::utf8_by_url_decode("%FF").is_err());
    }

    #[tokio::test]
    async fn presigned_url_rejects_out_of_range_expiry() {
        let store = MemoryBlobStore::new();
        store.insert("b", "o", vec![1]);
        let adapter = MinioAdapter::new(store, UploadConfig::default());

        let too_long = adapter
            .presigned_url("b", "o", Some(MAX_PRESIGN_EXPIRY + Duration::from_secs(1)))
            .await;
        assert!(matches!(too_long, Err(BlobError::Invalid { .. })));

        let url = adapter.presigned_url("b", "o", None).await.unwrap();
        assert!(url.ends_with("expires=604800"));
    }
}
