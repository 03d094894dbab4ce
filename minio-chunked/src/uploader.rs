use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::path::{chunk_index, chunk_path, staging_prefix};
use crate::{
    BlobError, BlobResult, BlobStore, ByteStream, ComposeSource, FragResult, ObjectPut,
    UploadConfig,
};

/// Resumable chunked uploads staged in a reserved bucket and stitched together
/// with a store-side compose.
///
/// The uploader keeps no state of its own: a session is nothing more than the
/// chunks listed under `"{digest}/"` in the staging bucket. Callers must keep
/// `total_pieces` stable for a digest, and two different files reported under
/// the same digest share (and corrupt) one staging directory.
#[derive(Clone)]
pub struct ChunkedUploader {
    store: Arc<dyn BlobStore>,
    config: UploadConfig,
}

impl ChunkedUploader {
    pub fn new<S: BlobStore + 'static>(store: S, config: UploadConfig) -> Self {
        Self::from_arc(Arc::new(store), config)
    }

    /// Share a store that is already behind an `Arc`
    pub fn from_arc(store: Arc<dyn BlobStore>, config: UploadConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn staging_bucket(&self) -> &str {
        &self.config.staging_bucket
    }

    /// Upload chunk `curr_index` of a `total_pieces`-chunk file keyed by `digest`.
    ///
    /// A chunk that is already staged is not uploaded again. `all_completed` is
    /// true only for the call that wrote the last missing chunk, judged from the
    /// listing taken before the write.
    #[instrument(skip(self, body), fields(staging = %self.config.staging_bucket))]
    pub async fn upload_chunk(
        &self,
        body: ByteStream,
        curr_index: u32,
        total_pieces: u32,
        digest: &str,
    ) -> BlobResult<FragResult> {
        check_digest(digest)?;
        check_total(total_pieces)?;
        if curr_index >= total_pieces {
            return Err(BlobError::invalid(format!(
                "Index {} out of range (must be 0-{})",
                curr_index,
                total_pieces - 1
            )));
        }

        self.ensure_staging_bucket().await?;

        let saved_index = self.staged_chunks(digest).await?;
        let remain_index: BTreeSet<u32> =
            (0..total_pieces).filter(|i| !saved_index.contains_key(i)).collect();

        if saved_index.contains_key(&curr_index) {
            debug!(curr_index, "chunk already staged, skipping upload");
            return Ok(FragResult::exists(curr_index, remain_index));
        }

        let key = chunk_path(digest, curr_index, total_pieces);
        self.store
            .put_object(&self.config.staging_bucket, &key, body, ObjectPut::new())
            .await?;
        debug!(key = %key, remaining = remain_index.len(), "chunk staged");

        if remain_index.len() == 1 && remain_index.contains(&curr_index) {
            info!("all chunks staged");
            return Ok(FragResult::completed());
        }
        Ok(FragResult::uploaded(curr_index, remain_index))
    }

    /// Compose every staged chunk of `digest` into `dest_bucket/dest_object`
    /// and remove the chunks.
    ///
    /// Only names that decode to an index below `total_pieces` count as chunks.
    /// Fails with [`BlobError::IncompleteUpload`] without touching the
    /// destination unless exactly `total_pieces` chunks are staged. Store limits
    /// on source part sizes (S3 requires 5 MiB for every part but the last)
    /// surface as [`BlobError::Backend`] and leave the chunks in place. Failed
    /// chunk deletions after a successful compose are logged, never returned.
    #[instrument(skip(self), fields(staging = %self.config.staging_bucket))]
    pub async fn compose(
        &self,
        dest_bucket: &str,
        dest_object: &str,
        total_pieces: u32,
        digest: &str,
    ) -> BlobResult<bool> {
        check_not_blank(dest_bucket, "bucket")?;
        check_not_blank(dest_object, "object")?;
        check_total(total_pieces)?;
        check_digest(digest)?;

        let staging = &self.config.staging_bucket;
        let mut saved = self.staged_chunks(digest).await?;
        let stray = saved.split_off(&total_pieces);
        for name in stray.values() {
            warn!(object = %name, total_pieces, "ignoring staged chunk beyond total pieces");
        }

        if saved.len() != total_pieces as usize {
            return Err(BlobError::incomplete(digest, total_pieces, saved.len()));
        }

        let chunk_names: Vec<String> = saved.into_values().collect();
        let sources = chunk_names
            .iter()
            .map(|name| ComposeSource::new(staging.as_str(), name.as_str()))
            .collect();
        self.store.compose_object(dest_bucket, dest_object, sources).await?;
        info!("chunks composed");

        let mut failures = self.store.remove_objects(staging, chunk_names);
        while let Some(result) = failures.next().await {
            match result {
                Ok(failure) => {
                    let err = BlobError::cleanup(failure.object_name, failure.message);
                    warn!(error = %err, "staged chunk left behind");
                }
                Err(err) => warn!(error = %err, "staged chunk cleanup failed"),
            }
        }

        Ok(true)
    }

    /// Create the staging bucket if absent. Losing a creation race is fine.
    async fn ensure_staging_bucket(&self) -> BlobResult<()> {
        let staging = &self.config.staging_bucket;
        if self.store.bucket_exists(staging).await? {
            return Ok(());
        }
        match self.store.make_bucket(staging).await {
            Ok(()) => {
                info!(bucket = %staging, "created staging bucket");
                Ok(())
            }
            Err(err) => {
                if self.store.bucket_exists(staging).await? {
                    debug!(bucket = %staging, "staging bucket created concurrently");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Staged chunks of `digest` by index. Objects whose name does not decode
    /// to an index are skipped.
    async fn staged_chunks(&self, digest: &str) -> BlobResult<BTreeMap<u32, String>> {
        let mut listing =
            self.store
                .list_objects(&self.config.staging_bucket, &staging_prefix(digest), false);
        let mut saved = BTreeMap::new();
        while let Some(entry) = listing.next().await {
            let entry = entry?;
            if entry.is_dir {
                continue;
            }
            match chunk_index(digest, &entry.name) {
                Some(index) => {
                    saved.insert(index, entry.name);
                }
                None => warn!(object = %entry.name, "ignoring staged object without a chunk index"),
            }
        }
        Ok(saved)
    }
}

fn check_not_blank(value: &str, what: &str) -> BlobResult<()> {
    if value.trim().is_empty() {
        return Err(BlobError::invalid(format!("Empty string: {}", what)));
    }
    Ok(())
}

fn check_digest(digest: &str) -> BlobResult<()> {
    check_not_blank(digest, "digest")
}

fn check_total(total_pieces: u32) -> BlobResult<()> {
    if total_pieces == 0 {
        return Err(BlobError::invalid("Total pieces must be at least 1"));
    }
    Ok(())
}
