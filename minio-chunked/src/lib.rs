//! # minio-chunked: resumable chunked uploads for S3-compatible stores
//!
//! `minio-chunked` fronts MinIO (or any S3-compatible store) with resumable
//! chunked uploads: clients split a large file into indexed chunks, upload them
//! in any order and across retries, then ask the store to compose the chunks
//! into one object. The chunks are staged in a reserved bucket under the
//! file's digest and removed after a successful compose.
//!
//! ## Quick Start
//!
//! ```rust
//! use minio_chunked::prelude::*;
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = MemoryBlobStore::new();
//! store.make_bucket("videos").await?;
//! let uploader = ChunkedUploader::new(store.clone(), UploadConfig::default());
//!
//! for (index, data) in [&b"AAA"[..], &b"BBB"[..]].into_iter().enumerate() {
//!     let body: ByteStream = Box::pin(futures::stream::once(async move {
//!         Ok(Bytes::from_static(data))
//!     }));
//!     let result = uploader.upload_chunk(body, index as u32, 2, "d41d8cd9").await?;
//!     if result.all_completed {
//!         uploader.compose("videos", "movie.mp4", 2, "d41d8cd9").await?;
//!     }
//! }
//!
//! assert_eq!(store.object("videos", "movie.mp4").unwrap(), b"AAABBB".to_vec());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   MinioAdapter   │  ← Convenience surface
//! ├──────────────────┤
//! │ ChunkedUploader  │  ← Chunk protocol, compose, cleanup
//! ├──────────────────┤
//! │    BlobStore     │  ← Storage primitives (S3, memory, custom)
//! └──────────────────┘
//! ```
//!
//! The uploader keeps no state between calls. Everything it knows about an
//! upload comes from listing the staging bucket, so any number of uploader
//! instances may serve the same uploads.

pub mod adapter;
mod config;
pub mod content_type;
mod error;
mod memory_store;
pub mod path;
mod s3_store;
pub mod store;
mod types;
mod uploader;

pub use adapter::MinioAdapter;
pub use config::{UploadConfig, DEFAULT_STAGING_BUCKET};
pub use content_type::content_type_for;
pub use error::{BlobError, BlobResult};
pub use memory_store::{MemoryBlobStore, MemoryStoreError};
pub use s3_store::{S3CompatibleStore, S3Config, S3StoreError};
pub use store::{BlobStore, ManagedBlobStore};
pub use types::{
    BucketInfo, ByteRange, ByteStream, ComposeSource, DeleteFailure, DeleteStream, EntryStream,
    FragResult, ObjectEntry, ObjectPut, ObjectStat, WriteResponse,
};
pub use uploader::ChunkedUploader;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobError, BlobResult, BlobStore, ByteStream, ChunkedUploader, FragResult,
        ManagedBlobStore, MemoryBlobStore, MinioAdapter, UploadConfig,
    };
}
