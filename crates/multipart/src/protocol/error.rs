use std::io;
use thiserror::Error;

/// The error type for every failure in a multipart decode.
///
/// All violations are fatal to the current parse: there is no retry or
/// partial recovery, and callers are expected to map a failed decode to a
/// 4xx response. The variants fall into three documented categories (plus
/// io), exposed via [`MultipartError::category`]; the `Display` messages
/// identify exactly which invariant was violated and are stable strings
/// that test suites match on.
#[derive(Error, Debug)]
pub enum MultipartError {
    /// The boundary handed to the parser violates RFC 2046 section 5.1.1.
    #[error("Invalid multipart boundary")]
    InvalidBoundary,

    /// Strict mode only: bytes appeared before the first delimiter line.
    #[error("Unexpected data in front of first delimiter")]
    UnexpectedPreamble,

    /// A delimiter line was terminated by a bare LF instead of CRLF.
    #[error("Invalid line break after delimiter")]
    InvalidLineBreak,

    /// A header line had no colon or an empty name, or carried an
    /// unusable Content-Length value.
    #[error("Malformed segment header")]
    MalformedHeader,

    /// A header name contained bytes outside the token character set.
    #[error("Invalid segment header name")]
    InvalidHeaderName,

    /// A folded continuation line appeared before any header line.
    #[error("Unexpected segment header continuation")]
    UnexpectedContinuation,

    /// Header bytes could not be decoded under the configured charset.
    #[error("Segment header failed to decode")]
    HeaderDecodeFailed,

    /// The segment carried no Content-Disposition header at all.
    #[error("Missing Content-Disposition segment header")]
    MissingDisposition,

    /// The Content-Disposition type was not `form-data`.
    #[error("Invalid Content-Disposition segment header: Wrong type")]
    WrongDispositionType,

    /// Strict mode only: the Content-Disposition `name` option is missing.
    #[error("Invalid Content-Disposition segment header: Missing name option")]
    MissingDispositionName,

    /// The segment body ended at a delimiter before reaching the byte count
    /// declared by its own Content-Length header.
    #[error("Segment size does not match Content-Length header")]
    SegmentSizeMismatch,

    /// The segment body grew past the byte count declared by its own
    /// Content-Length header.
    #[error("Segment Content-Length exceeded")]
    SegmentLengthExceeded,

    /// Strict mode only: bytes appeared after the terminal delimiter.
    #[error("Unexpected data after end of multipart stream")]
    UnexpectedEpilogue,

    /// End of input before the terminal delimiter was seen.
    #[error("Unexpected end of multipart stream")]
    UnexpectedEnd,

    /// End of input while the declared overall Content-Length had not been
    /// consumed yet.
    #[error("Unexpected end of multipart stream (declared Content-Length not reached)")]
    UnexpectedEndBeforeLength,

    /// A part's content could not be decoded under its resolved charset.
    #[error("Segment value failed to decode")]
    ValueDecodeFailed,

    /// One logical header (including folded continuations) exceeded the
    /// configured size ceiling.
    #[error("Maximum segment header size exceeded")]
    HeaderSizeLimitExceeded,

    /// A segment declared more headers than the configured ceiling.
    #[error("Maximum number of segment headers exceeded")]
    HeaderCountLimitExceeded,

    /// The stream contained more segments than the configured ceiling.
    #[error("Maximum segment count exceeded")]
    SegmentCountLimitExceeded,

    /// One segment body grew past the configured ceiling.
    #[error("Maximum segment size exceeded")]
    SegmentSizeLimitExceeded,

    /// More bytes were submitted than the declared overall Content-Length.
    #[error("Content-Length limit exceeded")]
    ContentLengthLimitExceeded,

    /// Buffering one more fragment would push the aggregate in-memory usage
    /// across all parts past the configured ceiling.
    #[error("Memory limit reached")]
    MemoryLimitReached,

    /// Spilling one more fragment would push the aggregate on-disk usage
    /// across all parts past the configured ceiling.
    #[error("Disk limit reached")]
    DiskLimitReached,

    /// The parser was invoked again after end of input was signaled.
    #[error("Parser closed")]
    ParserClosed,

    /// An io failure while spooling or copying part content.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Coarse classification of a [`MultipartError`].
///
/// Grammar, limit and usage violations surface identically to callers (same
/// error kind) but are worth distinguishing in tests and documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Framing or grammar violations: bad delimiters, bad headers.
    Grammar,
    /// Resource-limit violations: a defense against adversarial or buggy
    /// clients.
    Limit,
    /// Protocol-usage violations: driving the parser after it was closed.
    Usage,
    /// Failures of the underlying storage, not of the wire data.
    Io,
}

impl MultipartError {
    /// Returns the coarse category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            MultipartError::InvalidBoundary
            | MultipartError::UnexpectedPreamble
            | MultipartError::InvalidLineBreak
            | MultipartError::MalformedHeader
            | MultipartError::InvalidHeaderName
            | MultipartError::UnexpectedContinuation
            | MultipartError::HeaderDecodeFailed
            | MultipartError::MissingDisposition
            | MultipartError::WrongDispositionType
            | MultipartError::MissingDispositionName
            | MultipartError::SegmentSizeMismatch
            | MultipartError::SegmentLengthExceeded
            | MultipartError::UnexpectedEpilogue
            | MultipartError::UnexpectedEnd
            | MultipartError::UnexpectedEndBeforeLength
            | MultipartError::ValueDecodeFailed => ErrorCategory::Grammar,

            MultipartError::HeaderSizeLimitExceeded
            | MultipartError::HeaderCountLimitExceeded
            | MultipartError::SegmentCountLimitExceeded
            | MultipartError::SegmentSizeLimitExceeded
            | MultipartError::ContentLengthLimitExceeded
            | MultipartError::MemoryLimitReached
            | MultipartError::DiskLimitReached => ErrorCategory::Limit,

            MultipartError::ParserClosed => ErrorCategory::Usage,

            MultipartError::Io { .. } => ErrorCategory::Io,
        }
    }

    /// Returns true for resource-limit violations.
    pub fn is_limit(&self) -> bool {
        self.category() == ErrorCategory::Limit
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_stable() {
        assert_eq!(MultipartError::UnexpectedEnd.to_string(), "Unexpected end of multipart stream");
        assert_eq!(
            MultipartError::UnexpectedEndBeforeLength.to_string(),
            "Unexpected end of multipart stream (declared Content-Length not reached)"
        );
        assert_eq!(MultipartError::ParserClosed.to_string(), "Parser closed");
        assert_eq!(MultipartError::MemoryLimitReached.to_string(), "Memory limit reached");
        assert_eq!(
            MultipartError::MissingDispositionName.to_string(),
            "Invalid Content-Disposition segment header: Missing name option"
        );
    }

    #[test]
    fn categories() {
        assert_eq!(MultipartError::InvalidLineBreak.category(), ErrorCategory::Grammar);
        assert_eq!(MultipartError::SegmentCountLimitExceeded.category(), ErrorCategory::Limit);
        assert!(MultipartError::DiskLimitReached.is_limit());
        assert_eq!(MultipartError::ParserClosed.category(), ErrorCategory::Usage);
        assert_eq!(MultipartError::io(io::Error::other("boom")).category(), ErrorCategory::Io);
    }
}
