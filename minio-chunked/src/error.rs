use thiserror::Error;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob operations
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("The fragment index is not complete for '{digest}': expected {expected} pieces, found {found}")]
    IncompleteUpload {
        digest: String,
        expected: u32,
        found: usize,
    },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Never returned from an operation; built only to be logged.
    #[error("Failed to remove staged object '{object}': {message}")]
    Cleanup { object: String, message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create an incomplete upload error
    pub fn incomplete<S: Into<String>>(digest: S, expected: u32, found: usize) -> Self {
        Self::IncompleteUpload {
            digest: digest.into(),
            expected,
            found,
        }
    }

    /// Create a cleanup warning for a staged object that could not be removed
    pub fn cleanup<O: Into<String>, M: Into<String>>(object: O, message: M) -> Self {
        Self::Cleanup {
            object: object.into(),
            message: message.into(),
        }
    }

    /// True for errors raised before any I/O happened
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_upload_message_names_counts() {
        let err = BlobError::incomplete("abc", 3, 2);
        assert_eq!(
            err.to_string(),
            "The fragment index is not complete for 'abc': expected 3 pieces, found 2"
        );
    }

    #[test]
    fn only_invalid_counts_as_validation() {
        assert!(BlobError::invalid("Empty string").is_validation());
        assert!(!BlobError::not_found("bkt/obj").is_validation());
    }
}
