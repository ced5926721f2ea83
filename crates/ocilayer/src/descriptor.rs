use ocilayer_verify::{Digest, DigestError};
use serde::{Deserialize, Serialize};

use crate::{MediaType, Result};

/// Declared metadata of one layer.
///
/// Serializes as `{"MediaType", "Digest", "DiffID", "Size"}`, the shape used
/// by image tarball manifests. A size of `-1`, `null` or a missing field means
/// the size is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    #[serde(rename = "MediaType")]
    media_type: MediaType,
    #[serde(rename = "Digest")]
    digest:     Digest,
    #[serde(rename = "DiffID")]
    diff_id:    Digest,
    #[serde(rename = "Size", default, with = "size_field")]
    size:       Option<u64>,
}

impl LayerDescriptor {
    pub fn new(
        digest: Digest,
        diff_id: Digest,
        size: Option<u64>,
        media_type: impl Into<MediaType>,
    ) -> Self {
        Self {
            media_type: media_type.into(),
            digest,
            diff_id,
            size,
        }
    }

    /// Build a descriptor from unparsed hashes. Fails if either is malformed.
    pub fn parse(
        digest: &str,
        diff_id: &str,
        size: Option<u64>,
        media_type: impl Into<MediaType>,
    ) -> std::result::Result<Self, DigestError> {
        Ok(Self::new(
            Digest::parse(digest)?,
            Digest::parse(diff_id)?,
            size,
            media_type,
        ))
    }

    pub fn from_json(json: &str) -> Result<Self> { Ok(serde_json::from_str(json)?) }

    pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }

    pub fn digest(&self) -> &Digest { &self.digest }

    pub fn diff_id(&self) -> &Digest { &self.diff_id }

    pub fn size(&self) -> Option<u64> { self.size }

    pub fn media_type(&self) -> &MediaType { &self.media_type }
}

mod size_field {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(size: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match size {
            Some(size) => serializer.serialize_u64(*size),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Option::<i64>::deserialize(deserializer)? {
            None | Some(-1) => Ok(None),
            Some(size) => u64::try_from(size).map(Some).map_err(|_| {
                serde::de::Error::custom(format!("invalid layer size {size}: expected -1 or >= 0"))
            }),
        }
    }
}
