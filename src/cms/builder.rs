//! Creating CMS signed data and timestamp tokens.

use std::{error, fmt};
use std::convert::Infallible;
use bcder::{Captured, Mode, Oid};
use bytes::Bytes;
use crate::oid;
use crate::cert::Cert;
use crate::crypto::{
    DigestAlgorithm, KeyError, Signer, SigningError
};
use crate::x509::{Serial, Time};
use super::signed_data::{
    SignedAttrs, SignedData, SignerIdentifier, SignerInfo
};
use super::timestamp::{Accuracy, MessageImprint, TstInfo};


//------------ SignerOptions -------------------------------------------------

/// How a signer info is created.
#[derive(Clone, Debug)]
pub struct SignerOptions {
    /// The digest algorithm for the content and the signature.
    pub digest_algorithm: DigestAlgorithm,

    /// Identify the signer by subject key identifier.
    ///
    /// If the certificate doesn’t have one, issuer and serial number are
    /// used instead.
    pub use_key_id: bool,

    /// Whether to include signed attributes.
    ///
    /// Content other than `id-data` always gets signed attributes.
    pub signed_attributes: bool,

    /// The signing time attribute, if any.
    pub signing_time: Option<Time>,
}

impl Default for SignerOptions {
    fn default() -> Self {
        SignerOptions {
            digest_algorithm: DigestAlgorithm::Sha256,
            use_key_id: false,
            signed_attributes: true,
            signing_time: None,
        }
    }
}


//------------ SignedDataBuilder ---------------------------------------------

/// Creates a CMS signed data envelope.
///
/// The builder starts out with the content. Signers are added one by one,
/// each of them signing the content. Once all signers are present, the
/// content can be removed via [`detach`][Self::detach] to create a detached
/// signature.
#[derive(Clone, Debug)]
pub struct SignedDataBuilder {
    data: SignedData,
}

impl SignedDataBuilder {
    pub fn new(content_type: Oid<Bytes>, content: Bytes) -> Self {
        SignedDataBuilder {
            data: SignedData::new(
                Vec::new(), content_type, Some(content), Vec::new(),
                Vec::new(),
            )
        }
    }

    /// Creates a builder for content of type `id-data`.
    pub fn data(content: Bytes) -> Self {
        Self::new(Oid(Bytes::from_static(oid::DATA.0)), content)
    }

    /// Continues building an existing envelope.
    ///
    /// A detached envelope can only receive timestamps and certificates.
    pub fn from_signed_data(data: SignedData) -> Self {
        SignedDataBuilder { data }
    }

    /// Adds a certificate unless it is already present.
    pub fn add_certificate(&mut self, cert: Cert) {
        self.data.push_certificate(cert)
    }

    /// Adds a signer.
    ///
    /// The key must be the one of `cert`. The certificate is added to the
    /// envelope followed by those in `chain`.
    pub fn add_signer<S: Signer>(
        &mut self,
        signer: &S,
        key: &S::KeyId,
        cert: &Cert,
        chain: &[Cert],
        options: &SignerOptions,
    ) -> Result<(), BuildError<S::Error>> {
        let content = match self.data.content() {
            Some(content) => content.clone(),
            None => return Err(BuildError::AlreadyDetached)
        };
        let public_key = signer.get_key_info(key)?;
        if public_key != *cert.subject_public_key_info() {
            return Err(BuildError::KeyMismatch)
        }
        let signed_attrs = if options.signed_attributes
            || *self.data.content_type() != oid::DATA
        {
            Some(SignedAttrs::new(
                self.data.content_type(),
                options.digest_algorithm.digest(&content).as_ref(),
                options.signing_time,
            ))
        }
        else {
            None
        };
        let digest = options.digest_algorithm;
        let signature = match signed_attrs {
            Some(ref attrs) => {
                signer.sign_digested(key, digest, &attrs.encode_verify())?
            }
            None => signer.sign_digested(key, digest, &content)?
        };

        self.data.push_signer_info(SignerInfo::new(
            SignerIdentifier::for_cert(cert, options.use_key_id),
            options.digest_algorithm,
            signed_attrs,
            Captured::from_values(
                Mode::Der, signature.algorithm().cms_encode()
            ),
            signature.value().clone(),
        ));
        self.data.push_certificate(cert.clone());
        for cert in chain {
            self.data.push_certificate(cert.clone())
        }
        Ok(())
    }

    /// Removes the content from the envelope.
    ///
    /// Returns the content if it was still present. No signers can be
    /// added afterwards.
    pub fn detach(&mut self) -> Option<Bytes> {
        self.data.take_content()
    }

    /// Attaches a timestamp token to the signer info at `index`.
    pub fn add_timestamp(
        &mut self, index: usize, token: SignedData
    ) -> Result<(), BuildError> {
        match self.data.signer_info_mut(index) {
            Some(info) => {
                info.add_timestamp_token(token);
                Ok(())
            }
            None => Err(BuildError::NoSuchSigner)
        }
    }

    pub fn finalize(self) -> SignedData {
        self.data
    }
}


//------------ TimestampTokenBuilder -----------------------------------------

/// Creates RFC 3161 timestamp tokens.
///
/// This acts as a time-stamping authority without the request and
/// response protocol: the token is created directly for a signature value.
/// The generation time is encoded with a precision of one second.
#[derive(Clone, Debug)]
pub struct TimestampTokenBuilder {
    policy: Oid<Bytes>,
    digest_algorithm: DigestAlgorithm,
    serial: Serial,
    gen_time: Time,
    accuracy: Option<Accuracy>,
    nonce: Option<Serial>,
}

impl TimestampTokenBuilder {
    pub fn new(policy: Oid<Bytes>, serial: Serial, gen_time: Time) -> Self {
        TimestampTokenBuilder {
            policy,
            digest_algorithm: DigestAlgorithm::default(),
            serial,
            gen_time,
            accuracy: None,
            nonce: None,
        }
    }

    pub fn set_digest_algorithm(&mut self, alg: DigestAlgorithm) {
        self.digest_algorithm = alg
    }

    pub fn set_accuracy(&mut self, accuracy: Option<Accuracy>) {
        self.accuracy = accuracy
    }

    pub fn set_nonce(&mut self, nonce: Option<Serial>) {
        self.nonce = nonce
    }

    /// Creates a token for `signature` signed by the authority’s key.
    pub fn build<S: Signer>(
        &self,
        signature: &[u8],
        signer: &S,
        key: &S::KeyId,
        cert: &Cert,
        chain: &[Cert],
    ) -> Result<SignedData, BuildError<S::Error>> {
        let mut info = TstInfo::new(
            self.policy.clone(),
            MessageImprint::for_data(self.digest_algorithm, signature),
            self.serial.clone(),
            self.gen_time,
        );
        info.set_accuracy(self.accuracy);
        info.set_nonce(self.nonce.clone());

        let mut builder = SignedDataBuilder::new(
            Oid(Bytes::from_static(oid::CT_TST_INFO.0)),
            info.to_captured().into_bytes(),
        );
        builder.add_signer(
            signer, key, cert, chain,
            &SignerOptions {
                digest_algorithm: self.digest_algorithm,
                signing_time: Some(self.gen_time),
                ..Default::default()
            }
        )?;
        Ok(builder.finalize())
    }
}


//------------ BuildError ----------------------------------------------------

/// Creating signed data failed.
#[derive(Clone, Debug)]
pub enum BuildError<S = Infallible> {
    /// The signer’s key doesn’t match the certificate.
    KeyMismatch,

    /// The content has already been removed.
    AlreadyDetached,

    /// There is no signer info with the given index.
    NoSuchSigner,

    /// Signing failed.
    Signing(SigningError<S>),
}

impl<S> From<SigningError<S>> for BuildError<S> {
    fn from(err: SigningError<S>) -> Self {
        BuildError::Signing(err)
    }
}

impl<S> From<KeyError<S>> for BuildError<S> {
    fn from(err: KeyError<S>) -> Self {
        BuildError::Signing(err.into())
    }
}

impl<S: fmt::Display> fmt::Display for BuildError<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BuildError::KeyMismatch => {
                f.write_str("key does not match certificate")
            }
            BuildError::AlreadyDetached => {
                f.write_str("content already detached")
            }
            BuildError::NoSuchSigner => f.write_str("no such signer"),
            BuildError::Signing(ref err) => err.fmt(f),
        }
    }
}

impl<S: fmt::Display + fmt::Debug> error::Error for BuildError<S> { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::{CertPool, ReferenceTime, VerifyOptions};
    use crate::cms::timestamp::verify_timestamp;
    use crate::cms::VerifyErrorKind;
    use crate::crypto::SoftSigner;

    const MANIFEST: &[u8] = b"test-manifest";

    fn cert(pem: &[u8]) -> Cert {
        Cert::from_pem(pem).unwrap()
    }

    fn options() -> VerifyOptions {
        VerifyOptions {
            current_time: ReferenceTime::At(
                Time::utc(2026, 10, 18, 12, 0, 0).unwrap()
            ),
            ..VerifyOptions::with_roots(
                CertPool::from_pem(
                    include_bytes!("../../test-data/root.pem")
                ).unwrap()
            )
        }
    }

    fn sign(options: &SignerOptions) -> SignedData {
        let signer = SoftSigner::new();
        let key = signer.key_from_pkcs8(
            include_bytes!("../../test-data/leaf.pk8")
        ).unwrap();
        let mut builder = SignedDataBuilder::data(
            Bytes::from_static(MANIFEST)
        );
        builder.add_signer(
            &signer, &key,
            &cert(include_bytes!("../../test-data/leaf.pem")),
            &[cert(include_bytes!("../../test-data/inter.pem"))],
            options
        ).unwrap();
        assert_eq!(
            builder.detach().as_deref(), Some(MANIFEST)
        );
        builder.finalize()
    }

    #[test]
    fn sign_and_verify_detached() {
        let signed = sign(&SignerOptions::default());
        assert_eq!(signed.version(), 1);
        assert_eq!(signed.certificates().len(), 2);
        signed.verify_detached(MANIFEST, &options(), None).unwrap();

        // What we verify must be what we send.
        let signed = SignedData::decode(
            signed.to_captured().into_bytes()
        ).unwrap();
        assert!(signed.is_detached());
        signed.verify_detached(MANIFEST, &options(), None).unwrap();
    }

    #[test]
    fn signer_variants() {
        let signed = sign(&SignerOptions {
            digest_algorithm: DigestAlgorithm::Sha384,
            use_key_id: true,
            signing_time: Some(Time::utc(2026, 10, 18, 10, 0, 0).unwrap()),
            ..Default::default()
        });
        assert_eq!(signed.version(), 3);
        let info = &signed.signer_infos()[0];
        assert!(matches!(
            info.sid(), SignerIdentifier::SubjectKeyIdentifier(_)
        ));
        assert_eq!(
            info.signed_attrs().unwrap().signing_time(),
            Time::utc(2026, 10, 18, 10, 0, 0)
        );
        signed.verify_detached(MANIFEST, &options(), None).unwrap();

        let signed = sign(&SignerOptions {
            signed_attributes: false,
            ..Default::default()
        });
        assert!(signed.signer_infos()[0].signed_attrs().is_none());
        signed.verify_detached(MANIFEST, &options(), None).unwrap();
    }

    #[test]
    fn key_mismatch_and_detached() {
        let signer = SoftSigner::new();
        let key = signer.key_from_pkcs8(
            include_bytes!("../../test-data/leaf.pk8")
        ).unwrap();
        let mut builder = SignedDataBuilder::data(
            Bytes::from_static(MANIFEST)
        );
        assert!(matches!(
            builder.add_signer(
                &signer, &key,
                &cert(include_bytes!("../../test-data/ec-leaf.pem")),
                &[], &SignerOptions::default()
            ),
            Err(BuildError::KeyMismatch)
        ));
        assert!(matches!(
            builder.add_timestamp(0, sign(&SignerOptions::default())),
            Err(BuildError::NoSuchSigner)
        ));
        builder.detach();
        assert!(builder.detach().is_none());
        assert!(matches!(
            builder.add_signer(
                &signer, &key,
                &cert(include_bytes!("../../test-data/leaf.pem")),
                &[], &SignerOptions::default()
            ),
            Err(BuildError::AlreadyDetached)
        ));
    }

    #[test]
    fn build_timestamp_token() {
        let signed = sign(&SignerOptions::default());
        let signature = signed.signer_infos()[0].signature().clone();

        let signer = SoftSigner::new();
        let key = signer.key_from_pem(
            include_bytes!("../../test-data/tsa.key")
        ).unwrap();
        let tsa = cert(include_bytes!("../../test-data/tsa.pem"));
        let gen_time = Time::utc(2026, 10, 18, 11, 0, 0).unwrap();
        let mut token = TimestampTokenBuilder::new(
            Oid(Bytes::from_static(&[42, 3, 4, 1])),
            Serial::from(7u64),
            gen_time,
        );
        token.set_accuracy(Some(Accuracy::from_seconds(1)));
        let token = token.build(
            signature.as_ref(), &signer, &key, &tsa,
            &[cert(include_bytes!("../../test-data/inter.pem"))]
        ).unwrap();
        assert_eq!(token.version(), 3);

        let leaf = cert(include_bytes!("../../test-data/leaf.pem"));
        let info = verify_timestamp(
            &token, signature.as_ref(), &leaf, &options(),
            &crate::cms::CmsTokenValidator
        ).unwrap();
        assert_eq!(info.gen_time(), gen_time);
        assert_eq!(info.accuracy(), Some(Accuracy::from_seconds(1)));

        assert_eq!(
            verify_timestamp(
                &token, b"other signature", &leaf, &options(),
                &crate::cms::CmsTokenValidator
            ).unwrap_err().kind(),
            VerifyErrorKind::TimestampMismatch
        );

        let mut builder = SignedDataBuilder::from_signed_data(signed);
        builder.add_timestamp(0, token).unwrap();
        let signed = builder.finalize();
        assert_eq!(signed.signer_infos()[0].timestamp_tokens().len(), 1);
        signed.verify_detached(MANIFEST, &options(), None).unwrap();
    }
}
