use std::io::{self, Read};

use crate::hasher::{AnyHasher, Hasher};
use crate::{Digest, Result, VerificationError};

/// What closing a reader that has not reached end-of-stream means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClosePolicy {
    /// Report [`VerificationError::Unverified`] if any unread bytes remain.
    #[default]
    Strict,
    /// Read the remaining bytes internally, then verify them.
    Drain,
}

enum State {
    Streaming(AnyHasher),
    Verified,
    Failed(VerificationError),
}

/// Streaming reader that hashes data as it passes through and checks it
/// against an expected digest (and optionally a size) at end-of-stream.
///
/// Verification failures surface from [`Read::read`] as `InvalidData` errors
/// carrying a [`VerificationError`]. Errors from the wrapped reader are
/// returned unchanged.
pub struct VerifiedReader<R> {
    reader:        R,
    expected:      Digest,
    expected_size: Option<u64>,
    policy:        ClosePolicy,
    bytes_read:    u64,
    state:         State,
}

impl<R> VerifiedReader<R> {
    /// Wrap `reader`. `expected_size` of `None` skips the size check.
    pub fn new(reader: R, expected: Digest, expected_size: Option<u64>) -> Self {
        let hasher = expected.algorithm().hasher();
        Self {
            reader,
            expected,
            expected_size,
            policy: ClosePolicy::default(),
            bytes_read: 0,
            state: State::Streaming(hasher),
        }
    }

    pub fn with_policy(mut self, policy: ClosePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn expected(&self) -> &Digest { &self.expected }

    pub fn expected_size(&self) -> Option<u64> { self.expected_size }

    pub fn policy(&self) -> ClosePolicy { self.policy }

    /// Bytes handed to the caller so far.
    pub fn bytes_read(&self) -> u64 { self.bytes_read }

    pub fn is_verified(&self) -> bool { matches!(self.state, State::Verified) }

    pub fn is_failed(&self) -> bool { matches!(self.state, State::Failed(_)) }

    fn fail(&mut self, err: VerificationError) -> VerificationError {
        tracing::warn!(
            digest = %self.expected,
            bytes = self.bytes_read,
            error = %err,
            "blob verification failed"
        );
        self.state = State::Failed(err.replay());
        err
    }

    fn conclude(&mut self) -> Result<()> {
        let hasher = match std::mem::replace(&mut self.state, State::Verified) {
            State::Streaming(hasher) => hasher,
            State::Verified => return Ok(()),
            State::Failed(err) => {
                let replay = err.replay();
                self.state = State::Failed(err);
                return Err(replay);
            }
        };

        if let Some(expected) = self.expected_size {
            if expected != self.bytes_read {
                return Err(self.fail(VerificationError::SizeMismatch {
                    expected,
                    actual: self.bytes_read,
                }));
            }
        }

        let actual = match Digest::from_bytes(self.expected.algorithm(), &hasher.finalize()) {
            Ok(actual) => actual,
            Err(_) => {
                return Err(self.fail(VerificationError::IllegalState(
                    "hasher output does not match its algorithm",
                )));
            }
        };
        if actual != self.expected {
            return Err(self.fail(VerificationError::DigestMismatch {
                expected: self.expected.clone(),
                actual,
            }));
        }

        tracing::debug!(digest = %self.expected, bytes = self.bytes_read, "blob verified");
        Ok(())
    }
}

impl<R: Read> VerifiedReader<R> {
    /// Settle verification according to the close policy.
    ///
    /// Returns the number of bytes that were verified. Never succeeds for a
    /// stream whose tail was not hashed.
    pub fn finish(&mut self) -> Result<u64> {
        match &self.state {
            State::Verified => return Ok(self.bytes_read),
            State::Failed(err) => return Err(err.replay()),
            State::Streaming(_) => {}
        }

        match self.policy {
            ClosePolicy::Strict => {
                let mut peek = [0u8; 1];
                loop {
                    match self.read(&mut peek) {
                        Ok(0) => return Ok(self.bytes_read),
                        Ok(_) => {
                            let read = self.bytes_read - 1;
                            return Err(self.fail(VerificationError::Unverified { read }));
                        }
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                        Err(err) => return Err(VerificationError::from_io(err)),
                    }
                }
            }
            ClosePolicy::Drain => {
                io::copy(&mut *self, &mut io::sink()).map_err(VerificationError::from_io)?;
                Ok(self.bytes_read)
            }
        }
    }

    /// Finish verification and release the underlying reader.
    pub fn close(mut self) -> Result<u64> { self.finish() }
}

impl<R: Read> Read for VerifiedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.state {
            State::Verified => return Ok(0),
            State::Failed(err) => return Err(err.replay().into_io()),
            State::Streaming(_) => {}
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let n = self.reader.read(buf)?;
        if n == 0 {
            self.conclude().map_err(VerificationError::into_io)?;
            return Ok(0);
        }

        self.bytes_read += n as u64;
        if let Some(expected) = self.expected_size {
            if self.bytes_read > expected {
                let err = VerificationError::SizeMismatch {
                    expected,
                    actual: self.bytes_read,
                };
                return Err(self.fail(err).into_io());
            }
        }

        if let State::Streaming(hasher) = &mut self.state {
            hasher.update(&buf[..n]);
        }
        Ok(n)
    }
}

impl<R> Drop for VerifiedReader<R> {
    fn drop(&mut self) {
        if matches!(self.state, State::Streaming(_)) {
            tracing::warn!(
                digest = %self.expected,
                bytes = self.bytes_read,
                "verified stream dropped before verification completed"
            );
        }
    }
}
