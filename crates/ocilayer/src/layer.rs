use std::fmt;
use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard};

use ocilayer_verify::{ClosePolicy, Digest, VerificationError, VerifiedReader};

use crate::error::CorruptData;
use crate::{Compression, ContentSource, Decompressor, LayerDescriptor, MediaType, Result};

/// Verified stream of a layer's compressed bytes.
pub type CompressedReader = VerifiedReader<Box<dyn Read + Send>>;

#[derive(Clone, Copy, Debug, Default)]
pub struct LayerOptions {
    close_policy:   ClosePolicy,
    verify_diff_id: bool,
}

impl LayerOptions {
    pub fn new() -> Self { Self::default() }

    /// How readers closed before end-of-stream are settled.
    pub fn close_policy(mut self, close_policy: ClosePolicy) -> Self {
        self.close_policy = close_policy;
        self
    }

    /// Also check the uncompressed stream against the descriptor's diff-id.
    pub fn verify_diff_id(mut self, verify_diff_id: bool) -> Self {
        self.verify_diff_id = verify_diff_id;
        self
    }

    pub fn get_close_policy(&self) -> ClosePolicy { self.close_policy }

    pub fn get_verify_diff_id(&self) -> bool { self.verify_diff_id }
}

/// A layer blob: declared metadata bound to an on-demand content source.
///
/// Metadata accessors never touch the source. Every call to
/// [`Layer::compressed`] or [`Layer::uncompressed`] opens a fresh stream
/// whose bytes are hashed against the declared digest as they are read.
#[derive(Clone)]
pub struct Layer {
    descriptor:   LayerDescriptor,
    source:       Arc<dyn ContentSource>,
    decompressor: Arc<dyn Decompressor>,
    options:      LayerOptions,
}

impl Layer {
    pub fn new(descriptor: LayerDescriptor, source: impl ContentSource + 'static) -> Self {
        Self::with_shared_source(descriptor, Arc::new(source))
    }

    /// Build a layer over a source that other layers may also read from.
    ///
    /// The decompressor follows the media type, falling back to gzip for
    /// media types without a known codec.
    pub fn with_shared_source(descriptor: LayerDescriptor, source: Arc<dyn ContentSource>) -> Self {
        let compression = descriptor
            .media_type()
            .compression()
            .unwrap_or(Compression::Gzip);
        Self {
            descriptor,
            source,
            decompressor: Arc::new(compression),
            options: LayerOptions::default(),
        }
    }

    pub fn from_parts(
        digest: &str,
        diff_id: &str,
        size: Option<u64>,
        media_type: impl Into<MediaType>,
        source: impl ContentSource + 'static,
    ) -> Result<Self> {
        let descriptor = LayerDescriptor::parse(digest, diff_id, size, media_type)?;
        Ok(Self::new(descriptor, source))
    }

    /// Replace the decompressor used by [`Layer::uncompressed`].
    pub fn with_decompressor(mut self, decompressor: impl Decompressor + 'static) -> Self {
        self.decompressor = Arc::new(decompressor);
        self
    }

    pub fn with_options(mut self, options: LayerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn descriptor(&self) -> &LayerDescriptor { &self.descriptor }

    pub fn options(&self) -> LayerOptions { self.options }

    pub fn digest(&self) -> &Digest { self.descriptor.digest() }

    pub fn diff_id(&self) -> &Digest { self.descriptor.diff_id() }

    pub fn size(&self) -> Option<u64> { self.descriptor.size() }

    pub fn media_type(&self) -> &MediaType { self.descriptor.media_type() }

    /// Open the compressed content, verified against the declared digest and size.
    pub fn compressed(&self) -> Result<CompressedReader> {
        let stream = self.source.open().map_err(|source| {
            tracing::warn!(digest = %self.digest(), error = %source, "failed to open layer content");
            crate::LayerError::Open {
                digest: self.digest().clone(),
                source,
            }
        })?;
        tracing::debug!(digest = %self.digest(), size = ?self.size(), "opened layer content");

        Ok(VerifiedReader::new(stream, self.digest().clone(), self.size())
            .with_policy(self.options.close_policy))
    }

    /// Open the decompressed content.
    ///
    /// Decompression runs over the verified compressed stream in the same
    /// pass. End-of-stream is only reported once the compressed bytes have
    /// been fully verified.
    pub fn uncompressed(&self) -> Result<UncompressedReader> {
        let compressed = Arc::new(Mutex::new(self.compressed()?));
        let upstream = Upstream(Arc::clone(&compressed));
        let decoder = self
            .decompressor
            .decompress(Box::new(upstream))
            .map_err(|err| crate::LayerError::from_io(surface(err)))?;

        let stage = DecodeStage {
            decoder,
            compressed,
            policy: self.options.close_policy,
            done: false,
        };
        let inner = if self.options.verify_diff_id {
            Stage::DiffVerified(
                VerifiedReader::new(stage, self.diff_id().clone(), None)
                    .with_policy(self.options.close_policy),
            )
        } else {
            Stage::Plain(stage)
        };
        Ok(UncompressedReader { inner })
    }

    /// Read the whole compressed blob and check it, discarding the bytes.
    pub fn verify(&self) -> Result<u64> {
        let mut reader = self.compressed()?.with_policy(ClosePolicy::Drain);
        io::copy(&mut reader, &mut io::sink())?;
        Ok(reader.close()?)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("descriptor", &self.descriptor)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Decompressed view of a layer.
///
/// Read errors can be classified with [`crate::LayerError::from_io`].
pub struct UncompressedReader {
    inner: Stage,
}

enum Stage {
    Plain(DecodeStage),
    DiffVerified(VerifiedReader<DecodeStage>),
}

impl UncompressedReader {
    /// Settle verification according to the layer's close policy.
    pub fn finish(&mut self) -> Result<()> {
        match &mut self.inner {
            Stage::Plain(stage) => stage.finish(),
            Stage::DiffVerified(reader) => reader.finish().map(|_| ()).map_err(Into::into),
        }
    }

    pub fn close(mut self) -> Result<()> { self.finish() }

    /// Whether every verification configured for this stream has passed.
    pub fn is_verified(&self) -> bool {
        match &self.inner {
            Stage::Plain(stage) => stage.done,
            Stage::DiffVerified(reader) => reader.is_verified(),
        }
    }
}

impl Read for UncompressedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Stage::Plain(stage) => stage.read(buf),
            Stage::DiffVerified(reader) => reader.read(buf),
        }
    }
}

struct DecodeStage {
    decoder:    Box<dyn Read + Send>,
    compressed: Arc<Mutex<CompressedReader>>,
    policy:     ClosePolicy,
    done:       bool,
}

impl DecodeStage {
    fn finish(&mut self) -> Result<()> {
        if self.done {
            return Ok(());
        }
        match self.policy {
            ClosePolicy::Strict => {
                let mut peek = [0u8; 1];
                loop {
                    match self.read(&mut peek) {
                        Ok(0) => return Ok(()),
                        Ok(_) => {
                            let read = lock(&self.compressed)?.bytes_read();
                            tracing::warn!(
                                bytes = read,
                                "uncompressed layer stream closed before end of data"
                            );
                            return Err(VerificationError::Unverified { read }.into());
                        }
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            ClosePolicy::Drain => {
                io::copy(self, &mut io::sink())?;
                Ok(())
            }
        }
    }
}

impl Read for DecodeStage {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }

        let n = self.decoder.read(buf).map_err(surface)?;
        if n > 0 {
            return Ok(n);
        }

        // The decoder may stop short of the blob's end; trailing bytes are
        // still covered by the digest.
        let mut compressed = lock(&self.compressed)?;
        let trailing = io::copy(&mut *compressed, &mut io::sink())?;
        if trailing > 0 {
            tracing::debug!(
                digest = %compressed.expected(),
                bytes = trailing,
                "drained trailing compressed bytes"
            );
        }
        self.done = true;
        Ok(0)
    }
}

/// Feeds the shared compressed stream to the decoder, tagging its errors so
/// they are not mistaken for decoder failures.
struct Upstream(Arc<Mutex<CompressedReader>>);

impl Read for Upstream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut compressed = lock(&self.0)?;
        compressed
            .read(buf)
            .map_err(|err| io::Error::new(err.kind(), UpstreamError(err)))
    }
}

#[derive(Debug)]
struct UpstreamError(io::Error);

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

impl std::error::Error for UpstreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> { Some(&self.0) }
}

/// Restore upstream errors; anything else the decoder raised is corrupt data.
fn surface(err: io::Error) -> io::Error {
    if err.get_ref().is_some_and(|inner| inner.is::<UpstreamError>()) {
        let kind = err.kind();
        return match err.into_inner().map(|inner| inner.downcast::<UpstreamError>()) {
            Some(Ok(upstream)) => upstream.0,
            Some(Err(inner)) => io::Error::new(kind, inner),
            None => io::Error::from(kind),
        };
    }
    match err.kind() {
        io::ErrorKind::Interrupted | io::ErrorKind::Unsupported => err,
        _ => {
            tracing::warn!(error = %err, "layer decompression failed");
            CorruptData::wrap(err)
        }
    }
}

fn lock(shared: &Mutex<CompressedReader>) -> io::Result<MutexGuard<'_, CompressedReader>> {
    shared
        .lock()
        .map_err(|_| io::Error::other("compressed layer stream lock poisoned"))
}
