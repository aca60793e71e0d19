//! Errors of manifest signature validation.
//!
//! Every failure is terminal for the validation at hand. A
//! [`ValidationError`] says what went wrong via its [`ErrorKind`], where it
//! went wrong via its [`Stage`], and which signature record was involved
//! so the caller can log it without re-deriving anything.

use std::{error, fmt};
use crate::cms::{VerifyError, VerifyErrorKind};


//------------ ErrorKind -----------------------------------------------------

/// The kind of a validation failure.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// The signature bundle could not be parsed.
    MalformedBundle,

    /// No record in the bundle matches the manifest digest.
    NoMatchingArtifact,

    /// The record uses an envelope format we cannot verify.
    UnsupportedFormat,

    /// The signature envelope could not be decoded.
    Decode,

    /// The record does not contain a signature.
    EmptySignature,

    /// The envelope contains the content.
    NotDetached,

    /// The envelope has no signer infos.
    NoSignatures,

    /// A signer lacks signed attributes where they are required.
    MissingSignedAttributes,

    /// Attributes are missing, duplicated, or wrong.
    MalformedAttributes,

    /// The signed message digest doesn’t match the manifest.
    DigestMismatch,

    /// A signer’s certificate wasn’t found.
    NoCertificate,

    /// A signer’s certificate isn’t the expected one.
    SignerMismatch,

    /// The signature algorithm could not be determined.
    UnsupportedAlgorithm,

    /// A signature didn’t verify.
    BadSignature,

    /// A timestamp token doesn’t match its signature.
    TimestampMismatch,

    /// A certificate doesn’t chain to a trust anchor.
    UntrustedCertificate,

    /// The manifest could not be fetched from the registry.
    ManifestLookupFailed,

    /// There is no signature bundle for the manifest.
    SignatureNotFound,
}

impl From<VerifyErrorKind> for ErrorKind {
    fn from(kind: VerifyErrorKind) -> Self {
        match kind {
            VerifyErrorKind::NotDetached => ErrorKind::NotDetached,
            VerifyErrorKind::NoSignatures => ErrorKind::NoSignatures,
            VerifyErrorKind::MissingSignedAttributes => {
                ErrorKind::MissingSignedAttributes
            }
            VerifyErrorKind::MalformedAttributes => {
                ErrorKind::MalformedAttributes
            }
            VerifyErrorKind::DigestMismatch => ErrorKind::DigestMismatch,
            VerifyErrorKind::NoCertificate => ErrorKind::NoCertificate,
            VerifyErrorKind::SignerMismatch => ErrorKind::SignerMismatch,
            VerifyErrorKind::UnsupportedAlgorithm => {
                ErrorKind::UnsupportedAlgorithm
            }
            VerifyErrorKind::BadSignature => ErrorKind::BadSignature,
            VerifyErrorKind::TimestampMismatch => {
                ErrorKind::TimestampMismatch
            }
            VerifyErrorKind::UntrustedCertificate => {
                ErrorKind::UntrustedCertificate
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::ErrorKind::*;

        f.write_str(match *self {
            MalformedBundle => "malformed signature bundle",
            NoMatchingArtifact => "no matching artifact",
            UnsupportedFormat => "unsupported signature format",
            Decode => "invalid signature encoding",
            EmptySignature => "empty signature",
            NotDetached => "signature is not detached",
            NoSignatures => "no signatures",
            MissingSignedAttributes => "missing signed attributes",
            MalformedAttributes => "malformed attributes",
            DigestMismatch => "message digest mismatch",
            NoCertificate => "no certificate for signer",
            SignerMismatch => "unexpected signer",
            UnsupportedAlgorithm => "unsupported signature algorithm",
            BadSignature => "invalid signature",
            TimestampMismatch => "timestamp does not match signature",
            UntrustedCertificate => "untrusted certificate",
            ManifestLookupFailed => "manifest lookup failed",
            SignatureNotFound => "signature not found",
        })
    }
}


//------------ Stage ---------------------------------------------------------

/// The step of the validation that failed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Stage {
    /// Fetching the manifest from the registry.
    FetchManifest,

    /// Fetching the signature bundle from storage.
    FetchSignature,

    /// Decoding the signature bundle.
    DecodeBundle,

    /// Finding the record for the manifest digest.
    FindArtifact,

    /// Checking the record’s certificate against its CA bundle.
    VerifyCertificate,

    /// Decoding the signature envelope.
    DecodeSignature,

    /// Verifying the detached signature.
    VerifySignature,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Stage::FetchManifest => "fetch-manifest",
            Stage::FetchSignature => "fetch-signature",
            Stage::DecodeBundle => "decode-bundle",
            Stage::FindArtifact => "find-artifact",
            Stage::VerifyCertificate => "verify-certificate",
            Stage::DecodeSignature => "decode-signature",
            Stage::VerifySignature => "verify-signature",
        })
    }
}


//------------ RecordContext -------------------------------------------------

/// The signature record a failure relates to.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RecordContext {
    /// The artifact name of the record.
    pub name: String,

    /// The signature identifier of the record.
    pub sig_id: String,
}


//------------ ValidationError -----------------------------------------------

/// Validating a manifest signature failed.
#[derive(Debug)]
pub struct ValidationError {
    kind: ErrorKind,
    stage: Stage,
    record: Option<RecordContext>,
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, stage: Stage) -> Self {
        ValidationError { kind, stage, record: None, source: None }
    }

    /// Adds the record the error relates to.
    pub fn with_record(mut self, record: RecordContext) -> Self {
        self.record = Some(record);
        self
    }

    /// Adds the underlying error.
    pub fn with_source(
        mut self, err: impl error::Error + Send + Sync + 'static
    ) -> Self {
        self.source = Some(Box::new(err));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn record(&self) -> Option<&RecordContext> {
        self.record.as_ref()
    }
}

impl From<VerifyError> for ValidationError {
    fn from(err: VerifyError) -> Self {
        ValidationError::new(err.kind().into(), Stage::VerifySignature)
            .with_source(err)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "stage={}", self.stage)?;
        if let Some(ref record) = self.record {
            write!(
                f, ", artifact={:?}, sig_id={:?}", record.name, record.sig_id
            )?;
        }
        write!(f, ": {}", self.kind)?;
        if let Some(ref err) = self.source {
            write!(f, ": {}", err)?;
        }
        Ok(())
    }
}

impl error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source.as_ref().map(|err| {
            err.as_ref() as &(dyn error::Error + 'static)
        })
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_with_context() {
        let err = ValidationError::new(
            ErrorKind::UntrustedCertificate, Stage::VerifyCertificate
        ).with_record(RecordContext {
            name: "manifest.json".into(),
            sig_id: "42".into(),
        });
        assert_eq!(
            err.to_string(),
            "stage=verify-certificate, artifact=\"manifest.json\", \
             sig_id=\"42\": untrusted certificate"
        );
        assert_eq!(err.record().unwrap().sig_id, "42");
    }

    #[test]
    fn from_verify_error() {
        let err = ValidationError::from(
            VerifyError::from(VerifyErrorKind::DigestMismatch)
        );
        assert_eq!(err.kind(), ErrorKind::DigestMismatch);
        assert_eq!(err.stage(), Stage::VerifySignature);
        assert!(error::Error::source(&err).is_some());
    }
}
