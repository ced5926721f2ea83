use std::fmt;
use std::io;

use ocilayer_verify::{Digest, DigestError, VerificationError};

#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("failed to open content of layer {digest}: {source}")]
    Open { digest: Digest, source: io::Error },

    #[error("malformed layer digest: {0}")]
    MalformedDigest(#[from] DigestError),

    #[error("layer verification failed: {0}")]
    Verification(VerificationError),

    #[error("corrupt compressed layer data: {0}")]
    CorruptData(io::Error),

    #[error("invalid layer descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),

    #[error(transparent)]
    Io(io::Error),
}

impl LayerError {
    /// Classify an error returned by a layer reader's `read`.
    pub fn from_io(err: io::Error) -> Self {
        if VerificationError::find(&err).is_some() {
            return VerificationError::from_io(err).into();
        }
        Self::from_stream_io(err)
    }

    fn from_stream_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<CorruptData>()) {
            return Self::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<CorruptData>()) {
            Some(Ok(corrupt)) => Self::CorruptData(corrupt.0),
            Some(Err(inner)) => Self::Io(io::Error::new(kind, inner)),
            None => Self::Io(io::Error::from(kind)),
        }
    }

    /// Whether the layer content failed its integrity check.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Verification(err) if err.is_integrity())
    }
}

impl From<VerificationError> for LayerError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::Io(err) => Self::from_stream_io(err),
            other => Self::Verification(other),
        }
    }
}

impl From<io::Error> for LayerError {
    fn from(err: io::Error) -> Self { Self::from_io(err) }
}

/// Marks a decoder failure while it travels inside an `io::Error`.
#[derive(Debug)]
pub(crate) struct CorruptData(pub(crate) io::Error);

impl CorruptData {
    pub(crate) fn wrap(err: io::Error) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, Self(err))
    }
}

impl fmt::Display for CorruptData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "corrupt compressed data: {}", self.0)
    }
}

impl std::error::Error for CorruptData {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> { Some(&self.0) }
}

pub type Result<T> = std::result::Result<T, LayerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ocilayer_verify::Algorithm;

    #[test]
    fn classifies_verification_failures() {
        let err = VerificationError::DigestMismatch {
            expected: Digest::compute(Algorithm::Sha256, b"a"),
            actual:   Digest::compute(Algorithm::Sha256, b"b"),
        }
        .into_io();

        let err = LayerError::from_io(err);
        assert!(err.is_integrity());
        assert!(matches!(
            err,
            LayerError::Verification(VerificationError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn classifies_corrupt_data() {
        let err = CorruptData::wrap(io::Error::new(io::ErrorKind::InvalidInput, "bad header"));
        match LayerError::from_io(err) {
            LayerError::CorruptData(inner) => {
                assert_eq!(inner.kind(), io::ErrorKind::InvalidInput);
                assert_eq!(inner.to_string(), "bad header");
            }
            other => panic!("expected CorruptData, got {other:?}"),
        }
    }

    #[test]
    fn plain_io_stays_io() {
        let err = LayerError::from_io(io::Error::new(io::ErrorKind::TimedOut, "slow disk"));
        assert!(matches!(err, LayerError::Io(ref e) if e.kind() == io::ErrorKind::TimedOut));
        assert!(!err.is_integrity());
    }

    #[test]
    fn verification_io_variant_is_reclassified() {
        let corrupt = CorruptData::wrap(io::Error::new(io::ErrorKind::InvalidInput, "bad"));
        let err: LayerError = VerificationError::Io(corrupt).into();
        assert!(matches!(err, LayerError::CorruptData(_)));
    }
}
