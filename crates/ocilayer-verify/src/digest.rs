//! Content digests in canonical `algorithm:hex` form.

use std::fmt;
use std::str::FromStr;

use crate::hasher::{AnyHasher, Hasher};

/// Hash algorithms accepted in a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Sha256,
    Sha384,
    Sha512,
    #[cfg(feature = "blake3")]
    Blake3,
}

impl Algorithm {
    /// Digest length in bytes.
    pub fn digest_length(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
            #[cfg(feature = "blake3")]
            Self::Blake3 => 32,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            #[cfg(feature = "blake3")]
            Self::Blake3 => "blake3",
        }
    }

    pub fn hasher(&self) -> AnyHasher { AnyHasher::new(*self) }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Algorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            #[cfg(feature = "blake3")]
            "blake3" => Ok(Self::Blake3),
            other => Err(DigestError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    #[error("malformed digest {0:?}: expected <algorithm>:<hex>")]
    Malformed(String),

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid {algorithm} digest length: expected {expected} hex characters, got {actual}")]
    InvalidLength {
        algorithm: Algorithm,
        expected:  usize,
        actual:    usize,
    },

    #[error("digest {0:?} is not lowercase hex")]
    InvalidHex(String),
}

/// A parsed, well-formed content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: Algorithm,
    hex:       String,
}

impl Digest {
    pub fn parse(s: &str) -> Result<Self, DigestError> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| DigestError::Malformed(s.to_string()))?;
        if algorithm.is_empty() || hex.is_empty() {
            return Err(DigestError::Malformed(s.to_string()));
        }

        let algorithm: Algorithm = algorithm.parse()?;
        let expected = algorithm.digest_length() * 2;
        if hex.len() != expected {
            return Err(DigestError::InvalidLength {
                algorithm,
                expected,
                actual: hex.len(),
            });
        }
        if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(DigestError::InvalidHex(s.to_string()));
        }

        Ok(Self {
            algorithm,
            hex: hex.to_string(),
        })
    }

    /// Build a digest from raw hash output.
    pub fn from_bytes(algorithm: Algorithm, bytes: &[u8]) -> Result<Self, DigestError> {
        if bytes.len() != algorithm.digest_length() {
            return Err(DigestError::InvalidLength {
                algorithm,
                expected: algorithm.digest_length() * 2,
                actual:   bytes.len() * 2,
            });
        }
        Ok(Self {
            algorithm,
            hex: hex::encode(bytes),
        })
    }

    /// Hash `data` in one shot.
    pub fn compute(algorithm: Algorithm, data: &[u8]) -> Self {
        let mut hasher = algorithm.hasher();
        hasher.update(data);
        Self {
            algorithm,
            hex: hex::encode(hasher.finalize()),
        }
    }

    pub fn algorithm(&self) -> Algorithm { self.algorithm }

    pub fn hex(&self) -> &str { &self.hex }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl TryFrom<&str> for Digest {
    type Error = DigestError;

    fn try_from(s: &str) -> Result<Self, Self::Error> { Self::parse(s) }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn parse_valid_sha256() {
        let digest = Digest::parse(HELLO).unwrap();
        assert_eq!(digest.algorithm(), Algorithm::Sha256);
        assert_eq!(
            digest.hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(digest.to_string(), HELLO);
    }

    #[test]
    fn compute_matches_known_vector() {
        assert_eq!(Digest::compute(Algorithm::Sha256, b"hello").to_string(), HELLO);
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert!(matches!(
            Digest::parse("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"),
            Err(DigestError::Malformed(_))
        ));
        assert!(matches!(Digest::parse("sha256:"), Err(DigestError::Malformed(_))));
        assert!(matches!(Digest::parse(":abc"), Err(DigestError::Malformed(_))));
    }

    #[test]
    fn parse_rejects_unknown_algorithm() {
        assert_eq!(
            Digest::parse("md5:d41d8cd98f00b204e9800998ecf8427e"),
            Err(DigestError::UnsupportedAlgorithm("md5".to_string()))
        );
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let err = Digest::parse("sha256:abc").unwrap_err();
        assert_eq!(
            err,
            DigestError::InvalidLength {
                algorithm: Algorithm::Sha256,
                expected:  64,
                actual:    3,
            }
        );
    }

    #[test]
    fn parse_rejects_uppercase_and_non_hex() {
        let upper = HELLO.to_uppercase().replacen("SHA256", "sha256", 1);
        assert!(matches!(Digest::parse(&upper), Err(DigestError::InvalidHex(_))));

        let bogus = format!("sha256:{}", "z".repeat(64));
        assert!(matches!(Digest::parse(&bogus), Err(DigestError::InvalidHex(_))));
    }

    #[test]
    fn from_bytes_checks_length() {
        assert!(Digest::from_bytes(Algorithm::Sha512, &[0u8; 32]).is_err());
        let digest = Digest::from_bytes(Algorithm::Sha256, &[0u8; 32]).unwrap();
        assert_eq!(digest.hex(), "0".repeat(64));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_string_form() {
        let digest = Digest::parse(HELLO).unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{HELLO}\""));

        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);

        assert!(serde_json::from_str::<Digest>("\"sha256:nope\"").is_err());
    }
}
