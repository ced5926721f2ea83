use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Compression;

pub const DOCKER_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
pub const DOCKER_FOREIGN_LAYER: &str = "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip";
pub const OCI_LAYER: &str = "application/vnd.oci.image.layer.v1.tar";
pub const OCI_LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
pub const OCI_LAYER_ZSTD: &str = "application/vnd.oci.image.layer.v1.tar+zstd";
pub const OCI_RESTRICTED_LAYER: &str = "application/vnd.oci.image.layer.nondistributable.v1.tar";
pub const OCI_RESTRICTED_LAYER_GZIP: &str =
    "application/vnd.oci.image.layer.nondistributable.v1.tar+gzip";
pub const OCI_RESTRICTED_LAYER_ZSTD: &str =
    "application/vnd.oci.image.layer.nondistributable.v1.tar+zstd";

/// Layer media type, kept verbatim as declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaType(String);

impl MediaType {
    pub fn new(media_type: impl Into<String>) -> Self { Self(media_type.into()) }

    pub fn as_str(&self) -> &str { &self.0 }

    /// Compression implied by the media type, if it is a known layer type.
    pub fn compression(&self) -> Option<Compression> {
        match self.as_str() {
            DOCKER_LAYER | DOCKER_FOREIGN_LAYER | OCI_LAYER_GZIP | OCI_RESTRICTED_LAYER_GZIP => {
                Some(Compression::Gzip)
            }
            OCI_LAYER_ZSTD | OCI_RESTRICTED_LAYER_ZSTD => Some(Compression::Zstd),
            OCI_LAYER | OCI_RESTRICTED_LAYER => Some(Compression::Uncompressed),
            _ => None,
        }
    }

    /// Foreign and non-distributable layers must not be pushed to other registries.
    pub fn is_distributable(&self) -> bool {
        !matches!(
            self.as_str(),
            DOCKER_FOREIGN_LAYER
                | OCI_RESTRICTED_LAYER
                | OCI_RESTRICTED_LAYER_GZIP
                | OCI_RESTRICTED_LAYER_ZSTD
        )
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for MediaType {
    fn from(s: String) -> Self { Self(s) }
}

impl AsRef<str> for MediaType {
    fn as_ref(&self) -> &str { &self.0 }
}
