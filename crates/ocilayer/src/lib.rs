//! Verified, lazily-decompressed container image layers.
//!
//! A [`Layer`] binds a [`LayerDescriptor`] (digest, diff-id, size, media type)
//! to a [`ContentSource`]. Reading it never hands out bytes that have not
//! been hashed against the declared digest:
//!
//! - [`Layer::compressed`] wraps the raw blob in a [`VerifiedReader`];
//! - [`Layer::uncompressed`] pipes that verified stream through a
//!   [`Decompressor`] in the same pass.
//!
//! Digest, size and early-close failures surface as
//! [`LayerError::Verification`], decoder failures as
//! [`LayerError::CorruptData`]. Errors returned through `io::Read` can be
//! classified with [`LayerError::from_io`].
//!
//! # Example
//!
//! ```
//! use std::io::Read;
//! use ocilayer::{Layer, MemorySource, media_type};
//!
//! let layer = Layer::from_parts(
//!     "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
//!     "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
//!     Some(5),
//!     media_type::OCI_LAYER,
//!     MemorySource::new(b"hello".to_vec()),
//! )
//! .unwrap();
//!
//! let mut reader = layer.compressed().unwrap();
//! let mut content = Vec::new();
//! reader.read_to_end(&mut content).unwrap();
//!
//! assert_eq!(content, b"hello");
//! assert!(reader.is_verified());
//! ```

pub use ocilayer_verify::{
    Algorithm, ClosePolicy, Digest, DigestError, VerificationError, VerifiedReader,
};

pub use compression::{Compression, Decoder, Decompressor, Detect};
pub use descriptor::LayerDescriptor;
pub use error::{LayerError, Result};
pub use layer::{CompressedReader, Layer, LayerOptions, UncompressedReader};
pub use media_type::MediaType;
pub use source::{ContentSource, FileSource, MemorySource};

pub mod compression;
pub mod media_type;
pub mod source;

mod descriptor;
mod error;
mod layer;
