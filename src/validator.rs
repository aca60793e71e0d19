//! Validating manifest signatures.
//!
//! The validator ties everything together. Given the bytes of an image
//! manifest and the signature bundle of its repository, it finds the
//! record for the manifest’s digest, checks that the record’s certificate
//! chains to the record’s CA bundle, and verifies the detached signature
//! over the manifest. The result is the hex-encoded digest the caller can
//! pin the image reference to.

use bytes::Bytes;
use log::debug;
use crate::bundle::{EnvelopeFormat, SignatureBundle, SignatureRecord};
use crate::cert::Cert;
use crate::chain::{CertPool, KeyPurpose, ReferenceTime, VerifyOptions};
use crate::cms::SignedData;
use crate::crypto::sha256_hex;
use crate::error::{ErrorKind, Stage, ValidationError};


//------------ validate_manifest_signature -----------------------------------

/// Validates the signature of a manifest.
///
/// Returns the bare hex-encoded SHA-256 digest of the manifest and `true`
/// if the bundle contains a valid signature for it.
pub fn validate_manifest_signature(
    manifest: &[u8],
    bundle: &[u8],
) -> Result<(String, bool), ValidationError> {
    Validator::default().validate(manifest, bundle)
}


//------------ Validator -----------------------------------------------------

/// A manifest signature validator.
///
/// By default, only the self-signed certificates in a record’s CA bundle
/// are trusted and certificates are checked at the current time. Both can
/// be changed for offline use.
#[derive(Clone, Debug, Default)]
pub struct Validator {
    /// Trust anchors in addition to those of the records.
    trust_anchors: CertPool,

    /// The time for certificate validity checks.
    current_time: ReferenceTime,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds trust anchors beyond those of the CA bundles.
    pub fn with_trust_anchors(mut self, anchors: CertPool) -> Self {
        self.trust_anchors.extend(anchors.iter().cloned());
        self
    }

    /// Sets the time at which certificates need to be valid.
    pub fn with_time(mut self, time: ReferenceTime) -> Self {
        self.current_time = time;
        self
    }

    pub fn trust_anchors(&self) -> &CertPool {
        &self.trust_anchors
    }

    /// Validates the signature of a manifest.
    ///
    /// See [`validate_manifest_signature`] for details.
    pub fn validate(
        &self,
        manifest: &[u8],
        bundle: &[u8],
    ) -> Result<(String, bool), ValidationError> {
        let bundle = SignatureBundle::decode(bundle)?;
        let digest_hex = sha256_hex(manifest);
        let record = bundle.find_by_hash(&digest_hex)?;
        debug!(
            "found record {:?} with format {:?} for digest {}",
            record.name, record.signature_format, digest_hex
        );
        let format = record.envelope_format();
        if format.is_detached_signed_data()
            && record.signature.trim().is_empty()
        {
            return Err(ValidationError::new(
                ErrorKind::EmptySignature, Stage::FetchSignature
            ).with_record(record.context()))
        }

        let options = self.check_certificate(record)?;

        match format {
            EnvelopeFormat::CmsDetached | EnvelopeFormat::Pkcs7Detached => {
                self.verify_detached(manifest, record, options)?;
            }
            EnvelopeFormat::Unsupported(name) => {
                debug!("unsupported signature format {:?}", name);
                return Err(ValidationError::new(
                    ErrorKind::UnsupportedFormat, Stage::VerifySignature
                ).with_record(record.context()))
            }
        }
        debug!("valid signature for {}", digest_hex);
        Ok((digest_hex, true))
    }

    /// Checks that the record’s certificate chains to its CA bundle.
    ///
    /// Neither the validity periods nor the extended key usage are checked
    /// at this point. Returns the verification options for the signature
    /// with the self-signed CA certificates as roots and the others as
    /// intermediates.
    fn check_certificate(
        &self,
        record: &SignatureRecord,
    ) -> Result<VerifyOptions, ValidationError> {
        let untrusted = || {
            ValidationError::new(
                ErrorKind::UntrustedCertificate, Stage::VerifyCertificate
            ).with_record(record.context())
        };
        let leaf = Cert::from_pem(
            record.certificate.as_bytes()
        ).map_err(|err| untrusted().with_source(err))?;
        let ca = Cert::from_pem_bundle(
            record.ca.as_bytes()
        ).map_err(|err| untrusted().with_source(err))?;

        let mut options = VerifyOptions {
            roots: self.trust_anchors.clone(),
            intermediates: CertPool::new(),
            current_time: ReferenceTime::Unchecked,
            key_usage: KeyPurpose::Any,
        };
        for cert in ca {
            if cert.is_self_signed() {
                options.roots.push(cert)
            }
            else {
                options.intermediates.push(cert)
            }
        }
        let chain = options.build_chain(&leaf).map_err(|err| {
            untrusted().with_source(err)
        })?;
        debug!(
            "certificate {} chains to {}",
            leaf.subject(), chain.anchor().subject()
        );
        options.current_time = self.current_time;
        Ok(options)
    }

    /// Decodes and verifies the detached signature of a record.
    fn verify_detached(
        &self,
        manifest: &[u8],
        record: &SignatureRecord,
        options: VerifyOptions,
    ) -> Result<(), ValidationError> {
        let der = record.decode_signature()?;
        let signed = SignedData::decode(Bytes::from(der)).map_err(|err| {
            ValidationError::new(ErrorKind::Decode, Stage::DecodeSignature)
                .with_record(record.context())
                .with_source(err)
        })?;
        signed.verify_detached(manifest, &options, None).map_err(|err| {
            ValidationError::from(err).with_record(record.context())
        })?;
        Ok(())
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::base64;

    const MANIFEST: &[u8] = include_bytes!("../test-data/manifest.bin");

    fn record(format: &str, signature: &[u8]) -> SignatureRecord {
        SignatureRecord {
            name: "manifest.json".into(),
            signature_format: format.into(),
            hash_alg: "SHA256".into(),
            hash: sha256_hex(MANIFEST),
            sig_id: "1".into(),
            signature: base64::Bundle.encode(signature),
            certificate: String::from_utf8(
                include_bytes!("../test-data/leaf.pem").to_vec()
            ).unwrap(),
            ca: String::from_utf8(
                include_bytes!("../test-data/ca.pem").to_vec()
            ).unwrap(),
            .. Default::default()
        }
    }

    fn bundle(records: Vec<SignatureRecord>) -> Vec<u8> {
        SignatureBundle {
            signatures: records,
            .. Default::default()
        }.encode().unwrap()
    }

    fn validator() -> Validator {
        Validator::new().with_time(ReferenceTime::At(
            crate::x509::Time::utc(2026, 10, 18, 12, 0, 0).unwrap()
        ))
    }

    #[test]
    fn valid_signature() {
        let cms = include_bytes!("../test-data/manifest.cms");
        for format in ["cms-detached", "pkcs7-detached"] {
            let (digest, verified) = validator().validate(
                MANIFEST, &bundle(vec![record(format, cms)])
            ).unwrap();
            assert!(verified);
            assert_eq!(digest, sha256_hex(MANIFEST));
        }
        validate_manifest_signature(
            MANIFEST, &bundle(vec![record("cms-detached", cms)])
        ).unwrap();
    }

    #[test]
    fn format_gate() {
        let cms = include_bytes!("../test-data/manifest.cms");
        for format in ["", "gpg", "authenticode", "cms", "CMS-DETACHED"] {
            let err = validator().validate(
                MANIFEST, &bundle(vec![record(format, cms)])
            ).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        }
    }

    #[test]
    fn empty_signature() {
        let mut record = record("cms-detached", b"");
        record.certificate = String::new();
        let err = validator().validate(
            MANIFEST, &bundle(vec![record])
        ).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptySignature);
        assert_eq!(err.stage(), Stage::FetchSignature);
    }

    #[test]
    fn lookup_failures() {
        assert_eq!(
            validator().validate(MANIFEST, b"{").unwrap_err().kind(),
            ErrorKind::MalformedBundle
        );
        assert_eq!(
            validator().validate(MANIFEST, &bundle(vec![])).unwrap_err()
                .kind(),
            ErrorKind::NoMatchingArtifact
        );
        let cms = include_bytes!("../test-data/manifest.cms");
        assert_eq!(
            validator().validate(
                b"other manifest", &bundle(vec![record("cms-detached", cms)])
            ).unwrap_err().kind(),
            ErrorKind::NoMatchingArtifact
        );
    }

    #[test]
    fn untrusted_record_certificate() {
        let cms = include_bytes!("../test-data/manifest-rogue.cms");
        let mut record = record("cms-detached", cms);
        record.certificate = String::from_utf8(
            include_bytes!("../test-data/rogue-leaf.pem").to_vec()
        ).unwrap();
        let err = validator().validate(
            MANIFEST, &bundle(vec![record])
        ).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UntrustedCertificate);
        assert_eq!(err.stage(), Stage::VerifyCertificate);
    }

    #[test]
    fn broken_envelope() {
        let err = validator().validate(
            MANIFEST, &bundle(vec![record("cms-detached", b"\x30\x03\x02")])
        ).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.record().unwrap().name, "manifest.json");
    }

    #[test]
    fn foreign_certificates() {
        let cms = include_bytes!("../test-data/manifest-foreign.cms");
        let mut record = record("cms-detached", cms);
        record.ca = String::from_utf8(
            include_bytes!("../test-data/ca-foreign.pem").to_vec()
        ).unwrap();
        let (digest, verified) = validator().validate(
            MANIFEST, &bundle(vec![record])
        ).unwrap();
        assert!(verified);
        assert_eq!(digest, sha256_hex(MANIFEST));
    }

    #[test]
    fn unsupported_digest() {
        let cms = include_bytes!("../test-data/manifest-sha224.cms");
        let bundle = bundle(vec![record("cms-detached", cms)]);
        for _ in 0..2 {
            let err = validator().validate(MANIFEST, &bundle).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedAlgorithm);
            assert_eq!(err.stage(), Stage::VerifySignature);
        }
    }
}
