//! Error types for the RIFF/AVI layer.

use thiserror::Error;

/// Result type for AVI operations
pub type Result<T> = std::result::Result<T, AviError>;

/// Errors that can occur while writing or reading AVI containers.
#[derive(Error, Debug)]
pub enum AviError {
    /// A chunk, list or codec tag was not exactly four bytes.
    #[error("Invalid tag {0:?}: a FourCC must be exactly 4 bytes")]
    InvalidTag(String),

    /// I/O error from the underlying sink or source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Write or close on a handle that was already closed.
    #[error("Chunk '{tag}' at offset {offset} is already closed")]
    UseAfterClose { tag: String, offset: u64 },

    /// Write or close on a handle that is not the innermost open one.
    #[error("Chunk '{tag}' at offset {offset} is not the innermost open chunk (open: '{open}')")]
    OutOfOrder {
        tag: String,
        offset: u64,
        open: String,
    },

    /// Payload does not fit the 32-bit RIFF size field.
    #[error("Chunk '{tag}' payload of {size} bytes exceeds the 32-bit size field")]
    ChunkTooLarge { tag: String, size: u64 },

    /// The in-place header rewrite did not reproduce the original length.
    #[error("Header list rewrite changed size: expected end at {expected}, got {actual}")]
    HeaderSizeChanged { expected: u64, actual: u64 },

    /// The writer was already finalized.
    #[error("AVI writer is already finalized")]
    Finalized,

    /// Invalid construction parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Source does not start with a RIFF header.
    #[error("Invalid RIFF header")]
    InvalidRiff,

    /// RIFF form type is not `AVI `.
    #[error("Invalid AVI signature")]
    InvalidAvi,

    /// Chunk present but malformed.
    #[error("Invalid chunk '{}': {message}", String::from_utf8_lossy(id))]
    InvalidChunk { id: [u8; 4], message: String },

    /// Required chunk missing.
    #[error("Missing required chunk: {0}")]
    MissingChunk(&'static str),

    /// Not enough bytes for the requested structure.
    #[error("Insufficient data: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AviError::InvalidRiff;
        assert!(err.to_string().contains("RIFF"));

        let err = AviError::InvalidChunk {
            id: *b"avih",
            message: "Header too short".into(),
        };
        assert!(err.to_string().contains("avih"));

        let err = AviError::InvalidTag("abc".into());
        assert!(err.to_string().contains("\"abc\""));

        let err = AviError::InsufficientData {
            needed: 100,
            available: 50,
        };
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink gone");
        let err: AviError = io.into();
        assert!(matches!(err, AviError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
