use sha2::Digest as Sha2Digest;

use crate::Algorithm;

/// Incremental hash state fed by a verifying stream.
pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

pub struct Sha256Hasher(sha2::Sha256);

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().to_vec() }
}

impl Default for Sha256Hasher {
    fn default() -> Self { Self::new() }
}

impl Sha256Hasher {
    pub fn new() -> Self { Self(sha2::Sha256::new()) }

    pub fn digest(data: &[u8]) -> Vec<u8> { sha2::Sha256::digest(data).to_vec() }
}

/// Adapter for any RustCrypto digest (sha384, sha512, ...).
pub struct DigestHasher<D: Sha2Digest + Send>(D);

impl<D: Sha2Digest + Send> DigestHasher<D> {
    pub fn new() -> Self { Self(D::new()) }
}

impl<D: Sha2Digest + Send> Default for DigestHasher<D> {
    fn default() -> Self { Self::new() }
}

impl<D: Sha2Digest + Send> Hasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().to_vec() }
}

#[cfg(feature = "blake3")]
pub struct Blake3Hasher(blake3::Hasher);

#[cfg(feature = "blake3")]
impl Hasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().as_bytes().to_vec() }
}

#[cfg(feature = "blake3")]
impl Default for Blake3Hasher {
    fn default() -> Self { Self::new() }
}

#[cfg(feature = "blake3")]
impl Blake3Hasher {
    pub fn new() -> Self { Self(blake3::Hasher::new()) }

    pub fn digest(data: &[u8]) -> Vec<u8> { blake3::hash(data).as_bytes().to_vec() }
}

/// Hasher selected at runtime from a digest's algorithm.
pub enum AnyHasher {
    Sha256(Sha256Hasher),
    Sha384(DigestHasher<sha2::Sha384>),
    Sha512(DigestHasher<sha2::Sha512>),
    #[cfg(feature = "blake3")]
    Blake3(Blake3Hasher),
}

impl AnyHasher {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Sha256 => Self::Sha256(Sha256Hasher::new()),
            Algorithm::Sha384 => Self::Sha384(DigestHasher::new()),
            Algorithm::Sha512 => Self::Sha512(DigestHasher::new()),
            #[cfg(feature = "blake3")]
            Algorithm::Blake3 => Self::Blake3(Blake3Hasher::new()),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Sha256(_) => Algorithm::Sha256,
            Self::Sha384(_) => Algorithm::Sha384,
            Self::Sha512(_) => Algorithm::Sha512,
            #[cfg(feature = "blake3")]
            Self::Blake3(_) => Algorithm::Blake3,
        }
    }
}

impl Hasher for AnyHasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            #[cfg(feature = "blake3")]
            Self::Blake3(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(h) => h.finalize(),
            Self::Sha384(h) => h.finalize(),
            Self::Sha512(h) => h.finalize(),
            #[cfg(feature = "blake3")]
            Self::Blake3(h) => h.finalize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hasher() {
        let mut hasher = Sha256Hasher::new();
        hasher.update(b"hello world");
        let hash = hasher.finalize();

        let expected =
            hex::decode("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
                .unwrap();
        assert_eq!(hash, expected);
    }

    #[test]
    fn test_chunked_updates_match_one_shot() {
        let mut hasher = AnyHasher::new(Algorithm::Sha512);
        hasher.update(b"hello ");
        hasher.update(b"world");

        let mut whole = DigestHasher::<sha2::Sha512>::new();
        whole.update(b"hello world");

        assert_eq!(hasher.finalize(), whole.finalize());
    }

    #[test]
    fn test_any_hasher_output_lengths() {
        for algorithm in [Algorithm::Sha256, Algorithm::Sha384, Algorithm::Sha512] {
            let hasher = AnyHasher::new(algorithm);
            assert_eq!(hasher.algorithm(), algorithm);
            assert_eq!(hasher.finalize().len(), algorithm.digest_length());
        }
    }
}
