//! Error types for the check-in pipeline.

/// Top-level error type for a check-in run.
#[derive(Debug, thiserror::Error)]
pub enum CheckinError {
    /// Missing or invalid configuration (no credentials, unreadable file).
    #[error("config error: {0}")]
    Config(String),

    /// Network-level failure after exhausting the retry budget.
    #[error("network error: {0}")]
    Network(String),

    /// Response envelope could not be decoded in any supported mode.
    ///
    /// Carries a printable preview of the offending bytes for diagnostics.
    #[error("decode error: {reason} (body starts with {preview:?})")]
    Decode { reason: String, preview: String },

    /// Bad credentials or every authentication fallback exhausted.
    #[error("auth error: {0}")]
    Auth(String),

    /// The remote accepted the request but returned a non-zero code.
    #[error("api error (code {code}): {message}")]
    Api { code: i64, message: String },

    /// No eligible article found within the discovery budget.
    #[error("no eligible article found after scanning {scanned} candidates")]
    NoArticle { scanned: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckinError {
    /// Build a [`CheckinError::Decode`] with a bounded preview of the raw body.
    pub fn decode(reason: impl Into<String>, raw: &[u8]) -> Self {
        let preview: String = String::from_utf8_lossy(raw).chars().take(80).collect();
        Self::Decode {
            reason: reason.into(),
            preview,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CheckinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_preview_is_bounded() {
        let raw = vec![b'x'; 500];
        let err = CheckinError::decode("not base64", &raw);
        match err {
            CheckinError::Decode { preview, .. } => assert_eq!(preview.chars().count(), 80),
            other => panic!("unexpected variant: {other}"),
        }
    }

    #[test]
    fn decode_preview_survives_invalid_utf8() {
        let err = CheckinError::decode("not zlib", &[0xff, 0xfe, 0x00, 0x41]);
        assert!(err.to_string().contains("not zlib"));
    }
}
