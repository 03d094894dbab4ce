use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::pin::Pin;

use crate::BlobResult;

/// Stream of bytes for object content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Lazy listing of a bucket
pub type EntryStream = Pin<Box<dyn Stream<Item = BlobResult<ObjectEntry>> + Send>>;

/// Lazy report of objects a batch delete could not remove
pub type DeleteStream = Pin<Box<dyn Stream<Item = BlobResult<DeleteFailure>> + Send>>;

/// Outcome of uploading one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragResult {
    /// True only for the call that uploaded the last missing chunk
    pub all_completed: bool,
    /// Indices still missing, ascending; `None` once completed
    pub remain_index: Option<BTreeSet<u32>>,
    pub message: String,
}

impl FragResult {
    pub fn completed() -> Self {
        Self {
            all_completed: true,
            remain_index: None,
            message: "completed".to_string(),
        }
    }

    pub fn exists(index: u32, remain_index: BTreeSet<u32>) -> Self {
        Self {
            all_completed: false,
            remain_index: Some(remain_index),
            message: format!("index [{}] exists", index),
        }
    }

    pub fn uploaded(index: u32, remain_index: BTreeSet<u32>) -> Self {
        Self {
            all_completed: false,
            remain_index: Some(remain_index),
            message: format!("index [{}] has been uploaded", index),
        }
    }
}

/// One item of a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub name: String,
    /// Common prefix reported by a non-recursive listing
    pub is_dir: bool,
}

impl ObjectEntry {
    pub fn object<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Source object for a compose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeSource {
    pub bucket: String,
    pub object: String,
}

impl ComposeSource {
    pub fn new<B: Into<String>, O: Into<String>>(bucket: B, object: O) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }
}

/// Result of a successful write (put, copy or compose)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub bucket: String,
    pub object: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

impl WriteResponse {
    pub fn new<B: Into<String>, O: Into<String>>(bucket: B, object: O) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
            etag: None,
            version_id: None,
        }
    }

    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_version_id<S: Into<String>>(mut self, version_id: S) -> Self {
        self.version_id = Some(version_id.into());
        self
    }
}

/// An object a batch delete failed to remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub object_name: String,
    pub message: String,
}

/// Options for a single put
#[derive(Debug, Clone, Default)]
pub struct ObjectPut {
    pub size_hint: Option<u64>,
    pub content_type: Option<String>,
}

impl ObjectPut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Object metadata without content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStat {
    pub bucket: String,
    pub object: String,
    pub size_bytes: u64,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A bucket as reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
}

/// Byte window for a ranged read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    /// None means "to end of object"
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length: Some(length),
        }
    }

    pub fn from_offset(offset: u64) -> Self {
        Self {
            offset,
            length: None,
        }
    }

    /// HTTP `Range` header value, `None` for an empty window
    pub fn to_header(&self) -> Option<String> {
        match self.length {
            Some(0) => None,
            Some(len) => {
                let last = self.offset.saturating_add(len - 1);
                Some(format!("bytes={}-{}", self.offset, last))
            }
            None => Some(format!("bytes={}-", self.offset)),
        }
    }

    /// Clamp this window to an object of `total_size` bytes
    pub fn slice_bounds(&self, total_size: u64) -> (usize, usize) {
        let start = self.offset.min(total_size);
        let end = match self.length {
            Some(len) => start.saturating_add(len).min(total_size),
            None => total_size,
        };
        (start as usize, end as usize)
    }
}
