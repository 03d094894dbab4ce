/// Bucket that holds chunks awaiting compose unless configured otherwise
pub const DEFAULT_STAGING_BUCKET: &str = "temp-bucket";

/// Configuration for the chunked uploader
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Reserved bucket for staged chunks, shared by every session of the process
    pub staging_bucket: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            staging_bucket: DEFAULT_STAGING_BUCKET.to_string(),
        }
    }
}

impl UploadConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from the environment.
    ///
    /// `MINIO_UTIL_STAGING_BUCKET` replaces the staging bucket when set and non-blank.
    pub fn from_env() -> Self {
        match std::env::var("MINIO_UTIL_STAGING_BUCKET") {
            Ok(bucket) if !bucket.trim().is_empty() => Self::default().with_staging_bucket(bucket),
            _ => Self::default(),
        }
    }

    /// Set the staging bucket
    pub fn with_staging_bucket<S: Into<String>>(mut self, bucket: S) -> Self {
        self.staging_bucket = bucket.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_temp_bucket() {
        assert_eq!(UploadConfig::default().staging_bucket, "temp-bucket");
    }

    #[test]
    fn builder_overrides_staging_bucket() {
        let config = UploadConfig::new().with_staging_bucket("chunks");
        assert_eq!(config.staging_bucket, "chunks");
    }
}
