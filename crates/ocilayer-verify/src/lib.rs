//! Streaming digest verification for content-addressed blobs.
//!
//! Bytes are hashed as they pass through a [`VerifiedReader`], so a blob is
//! authenticated in the same pass that delivers it, with no buffering of the
//! payload.
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use ocilayer_verify::{Algorithm, Digest, VerifiedReader};
//!
//! let data = b"hello";
//! let expected = Digest::compute(Algorithm::Sha256, data);
//!
//! let mut reader = VerifiedReader::new(&data[..], expected, Some(5));
//! let mut buffer = Vec::new();
//! reader.read_to_end(&mut buffer).unwrap();
//!
//! assert_eq!(buffer, data);
//! reader.close().unwrap();
//! ```

pub use self::digest::{Algorithm, Digest, DigestError};
pub use self::error::{Result, VerificationError};
pub use self::hasher::{AnyHasher, DigestHasher, Hasher, Sha256Hasher};
pub use self::reader::{ClosePolicy, VerifiedReader};

#[cfg(feature = "blake3")]
pub use self::hasher::Blake3Hasher;

mod digest;
mod error;
mod hasher;
mod reader;
