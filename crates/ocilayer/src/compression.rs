//! Decompression of layer content.
//!
//! A [`Decompressor`] turns the verified compressed stream into the plain
//! stream. [`Compression`] covers the codecs used by image layers, and
//! [`Detect`] picks one from the leading magic bytes.

use std::io::{self, BufRead, BufReader, Read};

/// Turns a compressed stream into a decompressed one.
///
/// Errors while reading the returned stream are treated as corrupt data
/// unless they come from the input stream itself.
pub trait Decompressor: Send + Sync {
    fn decompress(&self, compressed: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>>;
}

/// Compression codec of a layer blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    Uncompressed,
    Gzip,
    Zstd,
    Xz,
}

impl Compression {
    /// Create a decoder for this codec.
    pub fn decoder<R: Read>(self, reader: R) -> io::Result<Decoder<R>> {
        match self {
            Self::Uncompressed => Ok(Decoder::Passthrough(reader)),
            #[cfg(feature = "gzip")]
            Self::Gzip => Ok(Decoder::Gzip(Box::new(flate2::read::MultiGzDecoder::new(
                reader,
            )))),
            #[cfg(not(feature = "gzip"))]
            Self::Gzip => Err(unsupported(self)),
            #[cfg(feature = "zstd")]
            Self::Zstd => Ok(Decoder::Zstd(Box::new(zstd::stream::read::Decoder::new(
                reader,
            )?))),
            #[cfg(not(feature = "zstd"))]
            Self::Zstd => Err(unsupported(self)),
            #[cfg(feature = "xz")]
            Self::Xz => Ok(Decoder::Xz(Box::new(xz2::read::XzDecoder::new(reader)))),
            #[cfg(not(feature = "xz"))]
            Self::Xz => Err(unsupported(self)),
        }
    }

    /// Identify a codec from the first bytes of a blob.
    ///
    /// Returns `None` when no known magic matches; that is not proof the
    /// data is uncompressed.
    pub fn detect(header: &[u8]) -> Option<Self> {
        match header {
            [0x1F, 0x8B, ..] => Some(Self::Gzip),
            [0x28, 0xB5, 0x2F, 0xFD, ..] => Some(Self::Zstd),
            [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, ..] => Some(Self::Xz),
            _ if is_tar_header(header) => Some(Self::Uncompressed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uncompressed => "uncompressed",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Xz => "xz",
        }
    }
}

#[cfg(not(all(feature = "gzip", feature = "zstd", feature = "xz")))]
fn unsupported(codec: Compression) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} support is not enabled", codec.as_str()),
    )
}

fn is_tar_header(data: &[u8]) -> bool {
    data.len() >= 512 && data[257..263] == *b"ustar\0"
}

impl Decompressor for Compression {
    fn decompress(&self, compressed: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        tracing::debug!(compression = self.as_str(), "decompressing layer");
        Ok(Box::new(self.decoder(compressed)?))
    }
}

/// Decoder wrapper over the supported codecs.
pub enum Decoder<R: Read> {
    Passthrough(R),
    #[cfg(feature = "gzip")]
    Gzip(Box<flate2::read::MultiGzDecoder<R>>),
    #[cfg(feature = "zstd")]
    Zstd(Box<zstd::stream::read::Decoder<'static, BufReader<R>>>),
    #[cfg(feature = "xz")]
    Xz(Box<xz2::read::XzDecoder<R>>),
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Passthrough(r) => r.read(buf),
            #[cfg(feature = "gzip")]
            Self::Gzip(d) => d.read(buf),
            #[cfg(feature = "zstd")]
            Self::Zstd(d) => d.read(buf),
            #[cfg(feature = "xz")]
            Self::Xz(d) => d.read(buf),
        }
    }
}

/// Chooses the codec by sniffing magic bytes, falling back to `fallback`.
#[derive(Clone, Copy, Debug)]
pub struct Detect {
    fallback: Compression,
}

impl Detect {
    pub fn new(fallback: Compression) -> Self { Self { fallback } }
}

impl Default for Detect {
    fn default() -> Self { Self::new(Compression::Uncompressed) }
}

impl Decompressor for Detect {
    fn decompress(&self, compressed: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        let mut reader = BufReader::new(compressed);
        let compression = Compression::detect(reader.fill_buf()?).unwrap_or(self.fallback);
        compression.decompress(Box::new(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn decompress_all(decompressor: &dyn Decompressor, data: Vec<u8>) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        decompressor
            .decompress(Box::new(Cursor::new(data)))?
            .read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn detect_gzip() {
        assert_eq!(Compression::detect(&[0x1F, 0x8B, 0x08, 0x00]), Some(Compression::Gzip));
    }

    #[test]
    fn detect_zstd() {
        let header = [0x28, 0xB5, 0x2F, 0xFD, 0x00, 0x00];
        assert_eq!(Compression::detect(&header), Some(Compression::Zstd));
    }

    #[test]
    fn detect_xz() {
        let header = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, 0x00, 0x00];
        assert_eq!(Compression::detect(&header), Some(Compression::Xz));
    }

    #[test]
    fn detect_plain_tar() {
        let mut header = [0u8; 512];
        header[257..263].copy_from_slice(b"ustar\0");
        assert_eq!(Compression::detect(&header), Some(Compression::Uncompressed));
    }

    #[test]
    fn detect_unknown_and_truncated() {
        assert_eq!(Compression::detect(&[0xDE, 0xAD, 0xBE, 0xEF]), None);
        assert_eq!(Compression::detect(&[0u8; 256]), None);
        assert_eq!(Compression::detect(&[]), None);
    }

    #[test]
    fn passthrough_returns_input() {
        let out = decompress_all(&Compression::Uncompressed, b"plain".to_vec()).unwrap();
        assert_eq!(out, b"plain");
    }

    #[test]
    fn gzip_round_trip() {
        let out = decompress_all(&Compression::Gzip, gzip(b"layer tar bytes")).unwrap();
        assert_eq!(out, b"layer tar bytes");
    }

    #[test]
    fn gzip_reads_every_member() {
        let mut data = gzip(b"first ");
        data.extend(gzip(b"second"));
        let out = decompress_all(&Compression::Gzip, data).unwrap();
        assert_eq!(out, b"first second");
    }

    #[test]
    fn gzip_rejects_garbage() {
        assert!(decompress_all(&Compression::Gzip, b"definitely not gzip".to_vec()).is_err());
    }

    #[test]
    fn detect_decompressor_handles_gzip_and_plain() {
        let out = decompress_all(&Detect::default(), gzip(b"sniffed")).unwrap();
        assert_eq!(out, b"sniffed");

        let out = decompress_all(&Detect::default(), b"no magic here".to_vec()).unwrap();
        assert_eq!(out, b"no magic here");
    }

    #[test]
    #[cfg(not(feature = "xz"))]
    fn xz_unsupported_without_feature() {
        let err = Compression::Xz.decoder(Cursor::new(Vec::new())).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
