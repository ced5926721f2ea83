use std::io;

use crate::Digest;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: Digest, actual: Digest },

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("stream closed after {read} bytes before it could be verified")]
    Unverified { read: u64 },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("illegal state: {0}")]
    IllegalState(&'static str),
}

impl VerificationError {
    /// Carry this error across an `io::Read` boundary.
    ///
    /// Underlying I/O failures are returned as-is; verification failures
    /// become `InvalidData` errors that [`VerificationError::from_io`] can
    /// recover.
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Io(err) => err,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }

    /// Recover a verification failure previously passed through `into_io`.
    pub fn from_io(err: io::Error) -> Self {
        if !Self::is_wrapped(&err) {
            return Self::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Self>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(inner)) => Self::Io(io::Error::new(kind, inner)),
            None => Self::IllegalState("io error lost its payload"),
        }
    }

    /// Borrow the verification failure carried by `err`, if any.
    pub fn find(err: &io::Error) -> Option<&Self> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }

    fn is_wrapped(err: &io::Error) -> bool { Self::find(err).is_some() }

    /// Whether this is an integrity failure rather than a stream fault.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::DigestMismatch { .. } | Self::SizeMismatch { .. } | Self::Unverified { .. }
        )
    }

    // io::Error is not Clone, so a stored failure is rebuilt on each report.
    pub(crate) fn replay(&self) -> Self {
        match self {
            Self::DigestMismatch { expected, actual } => Self::DigestMismatch {
                expected: expected.clone(),
                actual:   actual.clone(),
            },
            Self::SizeMismatch { expected, actual } => Self::SizeMismatch {
                expected: *expected,
                actual:   *actual,
            },
            Self::Unverified { read } => Self::Unverified { read: *read },
            Self::Io(err) => Self::Io(io::Error::new(err.kind(), err.to_string())),
            Self::IllegalState(msg) => Self::IllegalState(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, VerificationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Algorithm;

    #[test]
    fn io_round_trip_preserves_mismatch() {
        let err = VerificationError::SizeMismatch {
            expected: 4,
            actual:   5,
        };
        let io_err = err.into_io();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        assert!(VerificationError::find(&io_err).is_some());

        match VerificationError::from_io(io_err) {
            VerificationError::SizeMismatch { expected, actual } => {
                assert_eq!((expected, actual), (4, 5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn plain_io_errors_pass_through() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "peer went away");
        let err = VerificationError::from_io(io_err);
        assert!(!err.is_integrity());

        let io_err = err.into_io();
        assert_eq!(io_err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(io_err.to_string(), "peer went away");
    }

    #[test]
    fn replay_keeps_digests() {
        let expected = Digest::compute(Algorithm::Sha256, b"a");
        let actual = Digest::compute(Algorithm::Sha256, b"b");
        let err = VerificationError::DigestMismatch {
            expected: expected.clone(),
            actual:   actual.clone(),
        };
        assert_eq!(err.replay().to_string(), err.to_string());
        assert!(err.replay().is_integrity());
    }
}
