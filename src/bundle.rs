//! Signature bundles.
//!
//! A signature bundle is the JSON document a signing service returns for a
//! signing request. It is stored next to the artifacts of an image
//! repository and lists one signature record per signed artifact. Apart
//! from the records, it carries provenance information which is passed
//! through but never used for trust decisions.

use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use crate::error::{ErrorKind, RecordContext, Stage, ValidationError};
use crate::util::base64;


//------------ SignatureBundle -----------------------------------------------

/// The signature bundle of an artifact repository.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct SignatureBundle {
    /// The client that requested the signatures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requestor: Option<RoleInfo>,

    /// The service that created the signatures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<RoleInfo>,

    /// The commit the artifacts were built from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,

    /// The signature records in no particular order.
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub signatures: Vec<SignatureRecord>,

    /// The storage locations of the signed artifacts by name.
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub locations: HashMap<String, String>,
}

impl SignatureBundle {
    /// Decodes a bundle from its JSON representation.
    ///
    /// Unknown fields are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(data).map_err(|err| {
            ValidationError::new(
                ErrorKind::MalformedBundle, Stage::DecodeBundle
            ).with_source(err)
        })
    }

    /// Returns the JSON representation of the bundle.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Returns the first record for the artifact with the given digest.
    ///
    /// The digest is the bare hex-encoded SHA-256 digest of the artifact
    /// and is compared exactly.
    pub fn find_by_hash(
        &self, hex_digest: &str
    ) -> Result<&SignatureRecord, ValidationError> {
        self.signatures.iter().find(|record| {
            record.hash == hex_digest
        }).ok_or_else(|| {
            ValidationError::new(
                ErrorKind::NoMatchingArtifact, Stage::FindArtifact
            )
        })
    }
}


//------------ RoleInfo ------------------------------------------------------

/// A participant in a signing request.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct RoleInfo {
    pub role: String,
    pub host: String,
    pub ip: String,
}


//------------ CommitInfo ----------------------------------------------------

/// The source control commit signed artifacts were built from.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CommitInfo {
    pub repo: String,
    pub team: String,
    pub commit: String,
    pub author: String,
    pub committer: String,
    pub approver: String,
}


//------------ SignatureRecord -----------------------------------------------

/// The signature of a single artifact.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct SignatureRecord {
    pub correlation_id: String,

    /// The artifact name.
    pub name: String,

    /// The format of the signature.
    ///
    /// See [`envelope_format`][Self::envelope_format] for the formats we
    /// can verify.
    pub signature_format: String,

    /// The artifact size in bytes.
    pub size: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,

    /// The name of the digest algorithm used for `hash`.
    pub hash_alg: String,

    /// The hex-encoded digest of the artifact.
    pub hash: String,

    pub sig_id: String,

    /// The signature algorithm as claimed by the signing service.
    ///
    /// This is informational only.
    pub sig_alg: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,

    /// The base 64 encoded signature.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub signature: String,

    #[serde(rename = "signed_url", skip_serializing_if = "String::is_empty")]
    pub signed_artifact_url: String,

    /// The PEM encoded signing certificate.
    pub certificate: String,

    /// The PEM encoded bundle of issuing CA certificates.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ca: String,

    #[serde(rename = "gpg_pubkey", skip_serializing_if = "String::is_empty")]
    pub gpg_public_key: String,
}

impl SignatureRecord {
    /// Returns the envelope format of the signature.
    pub fn envelope_format(&self) -> EnvelopeFormat {
        EnvelopeFormat::from_name(&self.signature_format)
    }

    /// Decodes the signature.
    ///
    /// An empty signature results in an `EmptySignature` error, broken
    /// base 64 in a `Decode` error.
    pub fn decode_signature(&self) -> Result<Vec<u8>, ValidationError> {
        if self.signature.trim().is_empty() {
            return Err(ValidationError::new(
                ErrorKind::EmptySignature, Stage::DecodeSignature
            ).with_record(self.context()))
        }
        base64::Bundle.decode(&self.signature).map_err(|err| {
            ValidationError::new(ErrorKind::Decode, Stage::DecodeSignature)
                .with_record(self.context())
                .with_source(err)
        })
    }

    /// Sets the signature from its binary encoding.
    pub fn set_signature(&mut self, der: &[u8]) {
        self.signature = base64::Bundle.encode(der)
    }

    /// Returns the context for errors relating to this record.
    pub fn context(&self) -> RecordContext {
        RecordContext {
            name: self.name.clone(),
            sig_id: self.sig_id.clone(),
        }
    }
}


//------------ EnvelopeFormat ------------------------------------------------

/// The format of a signature envelope.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum EnvelopeFormat {
    /// A detached CMS signed data object.
    CmsDetached,

    /// A detached PKCS#7 signed data object.
    ///
    /// This is the same as CMS for our purposes.
    Pkcs7Detached,

    /// Any other format.
    Unsupported(String),
}

impl EnvelopeFormat {
    pub fn from_name(name: &str) -> Self {
        match name {
            "cms-detached" => EnvelopeFormat::CmsDetached,
            "pkcs7-detached" => EnvelopeFormat::Pkcs7Detached,
            _ => EnvelopeFormat::Unsupported(name.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        match *self {
            EnvelopeFormat::CmsDetached => "cms-detached",
            EnvelopeFormat::Pkcs7Detached => "pkcs7-detached",
            EnvelopeFormat::Unsupported(ref name) => name,
        }
    }

    /// Returns whether the format is a detached signed data object.
    pub fn is_detached_signed_data(&self) -> bool {
        matches!(
            *self,
            EnvelopeFormat::CmsDetached | EnvelopeFormat::Pkcs7Detached
        )
    }
}

impl fmt::Display for EnvelopeFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


//------------ Helpers -------------------------------------------------------

/// Deserializes a value that may be `null` into its default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where D: Deserializer<'de>, T: Default + Deserialize<'de> {
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}


//============ Tests =========================================================
