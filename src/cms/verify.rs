//! Verifying CMS signatures.
//!
//! Detached signatures are verified against a message supplied by the
//! caller. Each signer info is checked on its own: its signed attributes
//! must bind the message, its signature must verify with the key of the
//! signer certificate, and that certificate must chain to a trust anchor
//! for code signing. An RFC 3161 timestamp token, if present, must cover
//! the signature value and moves the reference time of the chain check to
//! the time asserted by the token.
//!
//! All signers must pass. There is no partial success.

use std::{error, fmt};
use log::debug;
use crate::oid;
use crate::cert::Cert;
use crate::chain::{Chain, ChainError, KeyPurpose, ReferenceTime};
use crate::chain::VerifyOptions;
use crate::crypto::{DigestAlgorithm, SignatureAlgorithm};
use super::signed_data::{SignedData, SignerInfo};
use super::timestamp::{
    CmsTokenValidator, TrustAnchorValidator, verify_timestamp
};


//------------ SignedData ----------------------------------------------------

/// # Verification
///
impl SignedData {
    /// Verifies a detached signature over `message`.
    ///
    /// The envelope’s certificates are added to the intermediates of
    /// `options`. The key usage of `options` is ignored: signers need to be
    /// valid for code signing. If `expected_signer` is given, every signer
    /// certificate must be identical to it.
    ///
    /// Returns one chain per signer info.
    pub fn verify_detached(
        &self,
        message: &[u8],
        options: &VerifyOptions,
        expected_signer: Option<&Cert>,
    ) -> Result<Vec<Chain>, VerifyError> {
        self.verify_detached_with(
            message, options, expected_signer, &CmsTokenValidator
        )
    }

    /// Verifies a detached signature using a custom token validator.
    pub fn verify_detached_with<V: TrustAnchorValidator + ?Sized>(
        &self,
        message: &[u8],
        options: &VerifyOptions,
        expected_signer: Option<&Cert>,
        validator: &V,
    ) -> Result<Vec<Chain>, VerifyError> {
        if !self.is_detached() {
            return Err(VerifyError::new(VerifyErrorKind::NotDetached))
        }
        self.verify_signers(
            message, options, expected_signer, KeyPurpose::CodeSigning,
            validator
        )
    }

    /// Verifies a signature over the encapsulated content.
    ///
    /// Unlike detached verification, the signers need to be valid for the
    /// key usage given in `options`. This is used for timestamp tokens.
    pub fn verify_attached(
        &self,
        options: &VerifyOptions,
    ) -> Result<Vec<Chain>, VerifyError> {
        self.verify_attached_with(options, &CmsTokenValidator)
    }

    /// Verifies an attached signature using a custom token validator.
    pub fn verify_attached_with<V: TrustAnchorValidator + ?Sized>(
        &self,
        options: &VerifyOptions,
        validator: &V,
    ) -> Result<Vec<Chain>, VerifyError> {
        let content = match self.content() {
            Some(content) => content,
            None => {
                return Err(
                    VerifyError::new(VerifyErrorKind::MalformedAttributes)
                )
            }
        };
        self.verify_signers(
            content.as_ref(), options, None, options.key_usage, validator
        )
    }

    fn verify_signers<V: TrustAnchorValidator + ?Sized>(
        &self,
        message: &[u8],
        options: &VerifyOptions,
        expected_signer: Option<&Cert>,
        purpose: KeyPurpose,
        validator: &V,
    ) -> Result<Vec<Chain>, VerifyError> {
        if self.signer_infos().is_empty() {
            return Err(VerifyError::new(VerifyErrorKind::NoSignatures))
        }
        let mut options = VerifyOptions {
            key_usage: purpose,
            ..options.clone()
        };
        options.intermediates.extend(self.certificates().iter().cloned());

        self.signer_infos().iter().enumerate().map(|(index, info)| {
            self.verify_signer(
                info, message, &options, expected_signer, validator
            ).map_err(|err| {
                debug!("signer {} failed verification: {}", index, err);
                err.with_signer(index)
            })
        }).collect()
    }

    fn verify_signer<V: TrustAnchorValidator + ?Sized>(
        &self,
        info: &SignerInfo,
        message: &[u8],
        options: &VerifyOptions,
        expected_signer: Option<&Cert>,
        validator: &V,
    ) -> Result<Chain, VerifyError> {
        self.verify_signed_attrs(info, message)?;
        let signed = info.signed_message(message);
        let cert = self.find_signer_cert(info, expected_signer)?;

        let key = cert.subject_public_key_info();
        let digest = Self::signer_digest(info)?;
        let algorithm = SignatureAlgorithm::for_key(key.algorithm(), digest);
        if algorithm.verification_algorithm(key.algorithm()).is_none() {
            debug!("no scheme for {} key with {}", key.algorithm(), digest);
            return Err(VerifyError::new(
                VerifyErrorKind::UnsupportedAlgorithm
            ))
        }
        key.verify(
            algorithm, signed.as_ref(), info.signature().as_ref()
        ).map_err(|err| {
            if err.is_unsupported_algorithm() {
                VerifyError::new(VerifyErrorKind::UnsupportedAlgorithm)
            }
            else {
                VerifyError::new(VerifyErrorKind::BadSignature)
            }
        })?;

        let mut current_time = options.current_time;
        match info.timestamp_tokens() {
            [] => { }
            [token] => {
                let tst_info = verify_timestamp(
                    token, info.signature().as_ref(), cert, options,
                    validator
                )?;
                if current_time == ReferenceTime::Now {
                    current_time = ReferenceTime::At(tst_info.gen_time());
                }
            }
            _ => {
                debug!("more than one timestamp token");
                return Err(
                    VerifyError::new(VerifyErrorKind::MalformedAttributes)
                )
            }
        }

        let options = VerifyOptions { current_time, ..options.clone() };
        options.build_chain(cert).map_err(VerifyError::untrusted)
    }

    /// Checks the signed attributes of a signer info against the message.
    fn verify_signed_attrs(
        &self,
        info: &SignerInfo,
        message: &[u8],
    ) -> Result<(), VerifyError> {
        let attrs = match info.signed_attrs() {
            Some(attrs) => attrs,
            None => {
                if *self.content_type() != oid::DATA {
                    return Err(VerifyError::new(
                        VerifyErrorKind::MissingSignedAttributes
                    ))
                }
                return Ok(())
            }
        };
        if attrs.has_duplicates() {
            return Err(VerifyError::new(VerifyErrorKind::MalformedAttributes))
        }
        match attrs.content_type() {
            Some(content_type) if content_type == self.content_type() => { }
            _ => {
                return Err(
                    VerifyError::new(VerifyErrorKind::MalformedAttributes)
                )
            }
        }
        let message_digest = match attrs.message_digest() {
            Some(digest) => digest,
            None => {
                return Err(
                    VerifyError::new(VerifyErrorKind::MalformedAttributes)
                )
            }
        };
        let digest = Self::signer_digest(info)?.digest(message);
        if digest.as_ref() != message_digest.as_ref() {
            return Err(VerifyError::new(VerifyErrorKind::DigestMismatch))
        }
        Ok(())
    }

    /// Returns the signer’s digest algorithm if we support it.
    fn signer_digest(
        info: &SignerInfo
    ) -> Result<DigestAlgorithm, VerifyError> {
        info.digest_algorithm().ok_or_else(|| {
            debug!(
                "unsupported digest algorithm {}", info.digest_identifier()
            );
            VerifyError::new(VerifyErrorKind::UnsupportedAlgorithm)
        })
    }

    /// Finds the certificate of the signer.
    ///
    /// The envelope’s certificates are searched first, then the expected
    /// signer. A signer whose certificate is among the unusable ones has
    /// an unsupported algorithm.
    fn find_signer_cert<'a>(
        &'a self,
        info: &SignerInfo,
        expected_signer: Option<&'a Cert>,
    ) -> Result<&'a Cert, VerifyError> {
        let cert = self.certificates().iter().chain(expected_signer).find(
            |cert| info.sid().matches(cert)
        );
        let cert = match cert {
            Some(cert) => cert,
            None => {
                let foreign = self.foreign_certificates().iter().any(|cert| {
                    info.sid().matches_foreign(cert)
                });
                if !foreign {
                    debug!("no certificate for signer {}", info.sid());
                    return Err(
                        VerifyError::new(VerifyErrorKind::NoCertificate)
                    )
                }
                if expected_signer.is_some() {
                    return Err(
                        VerifyError::new(VerifyErrorKind::SignerMismatch)
                    )
                }
                debug!("unusable certificate for signer {}", info.sid());
                return Err(
                    VerifyError::new(VerifyErrorKind::UnsupportedAlgorithm)
                )
            }
        };
        if let Some(expected) = expected_signer {
            if cert != expected {
                return Err(VerifyError::new(VerifyErrorKind::SignerMismatch))
            }
        }
        Ok(cert)
    }
}


//------------ VerifyError ---------------------------------------------------

/// Verification of a CMS signature failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerifyError {
    kind: VerifyErrorKind,

    /// The index of the signer info that failed.
    signer: Option<usize>,

    /// Why the signer’s chain couldn’t be built.
    chain: Option<ChainError>,
}

impl VerifyError {
    pub(crate) fn new(kind: VerifyErrorKind) -> Self {
        VerifyError { kind, signer: None, chain: None }
    }

    fn untrusted(err: ChainError) -> Self {
        VerifyError {
            kind: VerifyErrorKind::UntrustedCertificate,
            signer: None,
            chain: Some(err),
        }
    }

    fn with_signer(self, index: usize) -> Self {
        VerifyError { signer: Some(index), ..self }
    }

    pub fn kind(&self) -> VerifyErrorKind {
        self.kind
    }

    /// Returns the index of the failed signer info if known.
    pub fn signer(&self) -> Option<usize> {
        self.signer
    }

    /// Returns the chain building error for untrusted certificates.
    pub fn chain_error(&self) -> Option<ChainError> {
        self.chain
    }
}

impl From<VerifyErrorKind> for VerifyError {
    fn from(kind: VerifyErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(index) = self.signer {
            write!(f, "signer {}: ", index)?;
        }
        self.kind.fmt(f)?;
        if let Some(err) = self.chain {
            write!(f, ": {}", err)?;
        }
        Ok(())
    }
}

impl error::Error for VerifyError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.chain.as_ref().map(|err| err as &(dyn error::Error + 'static))
    }
}


//------------ VerifyErrorKind -----------------------------------------------

/// The reason verification of a CMS signature failed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VerifyErrorKind {
    /// The envelope contains the content.
    NotDetached,

    /// There are no signer infos.
    NoSignatures,

    /// Signed attributes are required for the content type.
    MissingSignedAttributes,

    /// Signed or unsigned attributes are missing, duplicated, or wrong.
    MalformedAttributes,

    /// The message digest attribute doesn’t match the message.
    DigestMismatch,

    /// The signer’s certificate wasn’t found.
    NoCertificate,

    /// The signer’s certificate isn’t the expected one.
    SignerMismatch,

    /// The key and digest algorithm can’t be combined.
    UnsupportedAlgorithm,

    /// The signature is wrong.
    BadSignature,

    /// A timestamp token doesn’t cover the signature.
    TimestampMismatch,

    /// A certificate doesn’t chain to a trust anchor.
    UntrustedCertificate,
}

impl fmt::Display for VerifyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::VerifyErrorKind::*;

        f.write_str(match *self {
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
        })
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bcder::{encode, Captured, ConstOid, Mode, OctetString, Tag};
    use bcder::encode::PrimitiveContent;
    use bytes::Bytes;
    use crate::chain::CertPool;
    use crate::cms::SignedDataBuilder;
    use crate::x509::Time;

    const MANIFEST: &[u8] = include_bytes!("../../test-data/manifest.bin");

    fn cert(pem: &[u8]) -> Cert {
        Cert::from_pem(pem).unwrap()
    }

    fn options() -> VerifyOptions {
        let roots: CertPool = [
            cert(include_bytes!("../../test-data/root.pem"))
        ].into_iter().collect();
        VerifyOptions {
            current_time: ReferenceTime::At(
                Time::utc(2026, 10, 18, 12, 0, 0).unwrap()
            ),
            ..VerifyOptions::with_roots(roots)
        }
    }

    fn envelope(der: &[u8]) -> SignedData {
        SignedData::decode(der).unwrap()
    }

    fn verify(der: &[u8]) -> Result<Vec<Chain>, VerifyError> {
        envelope(der).verify_detached(MANIFEST, &options(), None)
    }

    fn kind(der: &[u8]) -> VerifyErrorKind {
        verify(der).unwrap_err().kind()
    }

    fn attr(id: ConstOid, values: impl encode::Values) -> Captured {
        Captured::from_values(
            Mode::Der, encode::sequence((id.encode(), encode::set(values)))
        )
    }

    /// Encodes a detached envelope with a single signer.
    ///
    /// The signature value is junk, so verification can at best fail
    /// with a bad signature.
    fn hand_made(
        content_type: ConstOid,
        signer: &Cert,
        digest: DigestAlgorithm,
        attrs: Option<Vec<Captured>>,
    ) -> SignedData {
        let attrs = attrs.map(|attrs| {
            let mut raw = Captured::builder(Mode::Der);
            for attr in attrs {
                raw.extend(attr)
            }
            raw.freeze()
        });
        let der = Captured::from_values(Mode::Der, encode::sequence((
            oid::SIGNED_DATA.encode(),
            encode::sequence_as(Tag::CTX_0, encode::sequence((
                3u8.encode(),
                encode::set(digest.encode()),
                encode::sequence(content_type.encode()),
                encode::sequence_as(Tag::CTX_0, signer.encode_ref()),
                encode::set(encode::sequence((
                    1u8.encode(),
                    encode::sequence((
                        signer.issuer().encode_ref(),
                        signer.serial_number().encode_ref(),
                    )),
                    digest.encode(),
                    attrs.as_ref().map(|attrs| {
                        encode::sequence_as(Tag::CTX_0, attrs)
                    }),
                    encode::sequence((
                        oid::RSA_ENCRYPTION.encode(), ().encode()
                    )),
                    OctetString::encode_slice(b"not a signature"),
                ))),
            ))),
        )));
        SignedData::decode(der.into_bytes()).unwrap()
    }

    fn hand_made_kind(
        content_type: ConstOid,
        attrs: Option<Vec<Captured>>,
    ) -> VerifyErrorKind {
        hand_made(
            content_type,
            &cert(include_bytes!("../../test-data/leaf.pem")),
            DigestAlgorithm::Sha256,
            attrs,
        ).verify_detached(MANIFEST, &options(), None).unwrap_err().kind()
    }

    fn content_type(id: ConstOid) -> Captured {
        attr(oid::CONTENT_TYPE, id.encode())
    }

    fn message_digest(digest: DigestAlgorithm) -> Captured {
        attr(
            oid::MESSAGE_DIGEST,
            OctetString::encode_slice(digest.digest(MANIFEST))
        )
    }

    #[test]
    fn openssl_envelopes() {
        let chains = verify(
            include_bytes!("../../test-data/manifest.cms")
        ).unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 3);
        assert_eq!(
            chains[0].leaf().subject().common_name().as_deref(),
            Some("Test Code Signer")
        );

        verify(include_bytes!("../../test-data/manifest-sha384.cms")).unwrap();
        verify(include_bytes!("../../test-data/manifest-keyid.cms")).unwrap();
        verify(include_bytes!("../../test-data/manifest-noattr.cms")).unwrap();
        verify(include_bytes!("../../test-data/manifest-ec.cms")).unwrap();
    }

    #[test]
    fn attached_rejected() {
        assert_eq!(
            kind(include_bytes!("../../test-data/manifest-attached.cms")),
            VerifyErrorKind::NotDetached
        );
    }

    #[test]
    fn tampered_message() {
        let options = options();
        let signed = envelope(include_bytes!("../../test-data/manifest.cms"));
        assert_eq!(
            signed.verify_detached(
                b"test-manifesT", &options, None
            ).unwrap_err().kind(),
            VerifyErrorKind::DigestMismatch
        );

        let signed = envelope(
            include_bytes!("../../test-data/manifest-noattr.cms")
        );
        assert_eq!(
            signed.verify_detached(
                b"test-manifesT", &options, None
            ).unwrap_err().kind(),
            VerifyErrorKind::BadSignature
        );
    }

    #[test]
    fn signer_certificate_lookup() {
        let leaf = cert(include_bytes!("../../test-data/leaf.pem"));
        let ec_leaf = cert(include_bytes!("../../test-data/ec-leaf.pem"));
        let nocerts = envelope(
            include_bytes!("../../test-data/manifest-nocerts.cms")
        );
        assert_eq!(
            nocerts.verify_detached(
                MANIFEST, &options(), None
            ).unwrap_err().kind(),
            VerifyErrorKind::NoCertificate
        );

        // Without certificates in the envelope, the intermediate must
        // come from the caller.
        let mut with_inter = options();
        with_inter.intermediates.push(
            cert(include_bytes!("../../test-data/inter.pem"))
        );
        nocerts.verify_detached(MANIFEST, &with_inter, Some(&leaf)).unwrap();

        let signed = envelope(include_bytes!("../../test-data/manifest.cms"));
        let err = signed.verify_detached(
            MANIFEST, &options(), Some(&ec_leaf)
        ).unwrap_err();
        assert_eq!(err.kind(), VerifyErrorKind::SignerMismatch);
        assert_eq!(err.signer(), Some(0));
    }

    #[test]
    fn untrusted_signers() {
        let err = verify(
            include_bytes!("../../test-data/manifest-server.cms")
        ).unwrap_err();
        assert_eq!(err.kind(), VerifyErrorKind::UntrustedCertificate);
        assert_eq!(
            err.chain_error(),
            Some(ChainError::UsageMismatch(KeyPurpose::CodeSigning))
        );

        let err = verify(
            include_bytes!("../../test-data/manifest-rogue.cms")
        ).unwrap_err();
        assert_eq!(err.kind(), VerifyErrorKind::UntrustedCertificate);
    }

    #[test]
    fn expired_at_reference_time() {
        let signed = envelope(include_bytes!("../../test-data/manifest.cms"));
        let options = VerifyOptions {
            current_time: ReferenceTime::At(
                Time::utc(2050, 1, 1, 0, 0, 0).unwrap()
            ),
            ..options()
        };
        let err = signed.verify_detached(MANIFEST, &options, None);
        assert_eq!(
            err.unwrap_err().kind(), VerifyErrorKind::UntrustedCertificate
        );
    }

    #[test]
    fn foreign_certificates() {
        let signed = envelope(
            include_bytes!("../../test-data/manifest-foreign.cms")
        );
        assert_eq!(signed.certificates().len(), 2);
        assert_eq!(signed.foreign_certificates().len(), 1);
        let chains = signed.verify_detached(
            MANIFEST, &options(), None
        ).unwrap();
        assert_eq!(chains[0].len(), 3);

        // Foreign certificates survive re-encoding.
        let signed = SignedData::decode(
            signed.to_captured().into_bytes()
        ).unwrap();
        assert_eq!(signed.foreign_certificates().len(), 1);
        assert_eq!(
            signed.foreign_certificates()[0].as_slice(),
            pem::parse(
                include_bytes!("../../test-data/foreign.pem")
            ).unwrap().contents()
        );
        signed.verify_detached(MANIFEST, &options(), None).unwrap();
    }

    #[test]
    fn foreign_signer() {
        assert_eq!(
            kind(include_bytes!("../../test-data/manifest-ed25519.cms")),
            VerifyErrorKind::UnsupportedAlgorithm
        );
        let signed = envelope(
            include_bytes!("../../test-data/manifest-ed25519.cms")
        );
        let leaf = cert(include_bytes!("../../test-data/leaf.pem"));
        assert_eq!(
            signed.verify_detached(
                MANIFEST, &options(), Some(&leaf)
            ).unwrap_err().kind(),
            VerifyErrorKind::SignerMismatch
        );
    }

    #[test]
    fn unsupported_digest() {
        let signed = envelope(
            include_bytes!("../../test-data/manifest-sha224.cms")
        );
        assert_eq!(signed.signer_infos()[0].digest_algorithm(), None);
        assert_eq!(
            signed.signer_infos()[0].digest_identifier().to_string(),
            "2.16.840.1.101.3.4.2.4"
        );
        let err = signed.verify_detached(
            MANIFEST, &options(), None
        ).unwrap_err();
        assert_eq!(err.kind(), VerifyErrorKind::UnsupportedAlgorithm);
        assert_eq!(err.signer(), Some(0));
    }

    #[test]
    fn unsupported_key_and_digest() {
        let ec_leaf = cert(include_bytes!("../../test-data/ec-leaf.pem"));
        let signed = hand_made(
            oid::DATA, &ec_leaf, DigestAlgorithm::Sha512,
            Some(vec![
                content_type(oid::DATA),
                message_digest(DigestAlgorithm::Sha512),
            ])
        );
        assert_eq!(
            signed.verify_detached(
                MANIFEST, &options(), None
            ).unwrap_err().kind(),
            VerifyErrorKind::UnsupportedAlgorithm
        );
    }

    #[test]
    fn no_signatures() {
        let mut builder = SignedDataBuilder::data(
            Bytes::from_static(MANIFEST)
        );
        assert!(builder.detach().is_some());
        let signed = SignedData::decode(
            builder.finalize().to_captured().into_bytes()
        ).unwrap();
        assert!(signed.is_detached());
        assert_eq!(
            signed.verify_detached(
                MANIFEST, &options(), None
            ).unwrap_err().kind(),
            VerifyErrorKind::NoSignatures
        );
    }

    #[test]
    fn signed_attributes() {
        // Well-formed attributes get as far as the signature.
        assert_eq!(
            hand_made_kind(oid::DATA, Some(vec![
                content_type(oid::DATA),
                message_digest(DigestAlgorithm::Sha256),
            ])),
            VerifyErrorKind::BadSignature
        );

        // Plain data may go without, anything else may not.
        assert_eq!(
            hand_made_kind(oid::DATA, None),
            VerifyErrorKind::BadSignature
        );
        assert_eq!(
            hand_made_kind(oid::CT_TST_INFO, None),
            VerifyErrorKind::MissingSignedAttributes
        );

        // Content type must match the envelope.
        assert_eq!(
            hand_made_kind(oid::DATA, Some(vec![
                content_type(oid::CT_TST_INFO),
                message_digest(DigestAlgorithm::Sha256),
            ])),
            VerifyErrorKind::MalformedAttributes
        );
        assert_eq!(
            hand_made_kind(oid::DATA, Some(vec![
                message_digest(DigestAlgorithm::Sha256),
            ])),
            VerifyErrorKind::MalformedAttributes
        );

        // One value each, in one attribute each.
        assert_eq!(
            hand_made_kind(oid::DATA, Some(vec![
                content_type(oid::DATA),
                message_digest(DigestAlgorithm::Sha256),
                message_digest(DigestAlgorithm::Sha256),
            ])),
            VerifyErrorKind::MalformedAttributes
        );
        assert_eq!(
            hand_made_kind(oid::DATA, Some(vec![
                content_type(oid::DATA),
                content_type(oid::DATA),
                message_digest(DigestAlgorithm::Sha256),
            ])),
            VerifyErrorKind::MalformedAttributes
        );
        let digest = DigestAlgorithm::Sha256.digest(MANIFEST);
        assert_eq!(
            hand_made_kind(oid::DATA, Some(vec![
                content_type(oid::DATA),
                attr(oid::MESSAGE_DIGEST, (
                    OctetString::encode_slice(digest.as_ref()),
                    OctetString::encode_slice(digest.as_ref()),
                )),
            ])),
            VerifyErrorKind::MalformedAttributes
        );

        // A digest over something else.
        assert_eq!(
            hand_made_kind(oid::DATA, Some(vec![
                content_type(oid::DATA),
                attr(
                    oid::MESSAGE_DIGEST,
                    OctetString::encode_slice(
                        DigestAlgorithm::Sha256.digest(b"test-manifesT")
                    )
                ),
            ])),
            VerifyErrorKind::DigestMismatch
        );
    }

    #[test]
    fn repeated_verification() {
        let signed = envelope(include_bytes!("../../test-data/manifest.cms"));
        let options = options();
        let first = signed.verify_detached(MANIFEST, &options, None).unwrap();
        let second = signed.verify_detached(MANIFEST, &options, None).unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].leaf(), second[0].leaf());

        let signed = envelope(
            include_bytes!("../../test-data/manifest-sha224.cms")
        );
        assert_eq!(
            signed.verify_detached(MANIFEST, &options, None),
            signed.verify_detached(MANIFEST, &options, None),
        );
    }
}
