//! Image spec types.

use serde::{Deserialize, Serialize};

use crate::VirtnodeResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The declarative spec for an image resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// The name of the image, unique among active rows within a namespace.
    pub name: String,

    /// The namespace the image belongs to.
    pub namespace: String,

    /// The kind-specific payload.
    #[serde(flatten)]
    pub kind: ImageKind,
}

/// The kind-discriminated payload of an image spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImageKind {
    /// An image fetched from a URL.
    Url(ImageUrlSpec),
}

/// Payload for `url` images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrlSpec {
    /// The URL the image is fetched from.
    pub url: String,

    /// When the image should be pulled.
    pub pull_policy: PullPolicy,
}

/// The pull policy for a `url` image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullPolicy {
    /// Pull only when the image is not already present on the node.
    IfNotPresent,
}

/// An ephemeral request used to resolve a symbolic image reference during one
/// orchestration call. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDetectSpec {
    /// An optional name filter; when absent any active image matches.
    #[serde(default)]
    pub name: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageKind {
    /// Returns the kind discriminator stored in the `kind` column.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
        }
    }

    /// Serializes the kind payload to its canonical JSON form.
    ///
    /// Serializing the typed payload normalizes field order, so semantically
    /// identical specs always compare equal as strings.
    pub fn payload_json(&self) -> VirtnodeResult<String> {
        match self {
            Self::Url(spec) => Ok(serde_json::to_string(spec)?),
        }
    }
}
