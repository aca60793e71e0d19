//! X.509 certificates.
//!
//! This module contains the [`Cert`] type for certificates as they appear
//! in signature bundles and CMS envelopes. Only the parts of a certificate
//! needed for building and verifying chains are decoded: names, validity,
//! the public key, and the extensions for basic constraints, key usage,
//! extended key usage, and key identifiers. Unknown non-critical
//! extensions are ignored, unknown critical extensions are an error.
//!
//! [`TbsCert`] doubles as a builder for certificates which is used to
//! create test PKIs and time-stamping certificates.

use std::{borrow, error, fmt, ops};
use std::convert::Infallible;
use bcder::{decode, encode};
use bcder::{BitString, Captured, Mode, OctetString, Oid, Tag};
use bcder::decode::{ContentError, DecodeError, IntoSource, Source};
use bcder::encode::PrimitiveContent;
use bytes::Bytes;
use log::debug;
use crate::oid;
use crate::crypto::{
    KeyIdentifier, PublicKey, SignatureAlgorithm, Signer, SigningError,
    VerificationError,
};
use crate::x509::{
    encode_extension, Name, Serial, SignedStructure, Time, Validity,
    ValidityPeriodError,
};


//------------ Cert ----------------------------------------------------------

/// An X.509 certificate.
///
/// Besides the decoded content, the value keeps the certificate’s encoding
/// as it was received. Two certificates compare equal if these encodings
/// are identical.
///
/// If a certificate is stored in a file, you can use [`decode`] for DER
/// or [`from_pem`] and [`from_pem_bundle`] for PEM. If the certificate is
/// part of some other structure, [`take_from`] and [`take_opt_from`] can
/// be used during parsing of that structure.
///
/// [`decode`]: Self::decode
/// [`from_pem`]: Self::from_pem
/// [`from_pem_bundle`]: Self::from_pem_bundle
/// [`take_from`]: Self::take_from
/// [`take_opt_from`]: Self::take_opt_from
#[derive(Clone, Debug)]
pub struct Cert {
    /// The certificate’s encoding.
    raw: Bytes,

    /// The outer structure of the certificate.
    signed: SignedStructure,

    /// The actual data of the certificate.
    tbs: TbsCert,
}


/// # Decoding and Encoding
///
impl Cert {
    /// Decodes a source as a DER encoded certificate.
    pub fn decode<S: IntoSource>(
        source: S,
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Der.decode(source, Self::take_from)
    }

    /// Takes an encoded certificate from the beginning of a value.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        Self::from_captured(cons.capture_one()?)
    }

    /// Takes an optional certificate from the beginning of a value.
    pub fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let captured = cons.capture(|cons| {
            cons.take_opt_sequence(|cons| cons.skip_all()).map(|_| ())
        })?;
        if captured.as_slice().is_empty() {
            Ok(None)
        }
        else {
            Self::from_captured(captured).map(Some)
        }
    }

    fn from_captured<E>(
        captured: Captured
    ) -> Result<Self, DecodeError<E>> {
        Self::decode_captured(captured).map_err(DecodeError::convert)
    }

    fn decode_captured(
        captured: Captured
    ) -> Result<Self, DecodeError<Infallible>> {
        let raw = captured.as_slice().to_vec().into();
        let (signed, tbs) = captured.decode(|cons| {
            cons.take_sequence(|cons| {
                let signed = SignedStructure::from_constructed(cons)?;
                let tbs = signed.data().clone().decode(
                    TbsCert::from_constructed
                )?;
                Ok((signed, tbs))
            })
        })?;
        Ok(Cert { raw, signed, tbs })
    }

    /// Decodes the first certificate in PEM encoded data.
    ///
    /// Blocks with a label other than “CERTIFICATE” are skipped. The first
    /// certificate block must contain a certificate we can use.
    pub fn from_pem(pem: &[u8]) -> Result<Self, CertDecodeError> {
        let block = pem_blocks(pem)?.into_iter().next().ok_or(
            CertDecodeError(CertDecodeErrorKind::Empty)
        )?;
        Self::decode(Bytes::from(block.into_contents())).map_err(|err| {
            CertDecodeError(CertDecodeErrorKind::Der(err))
        })
    }

    /// Decodes all usable certificates in PEM encoded data.
    ///
    /// Blocks with a label other than “CERTIFICATE” are skipped. So are
    /// well-formed certificates we can’t use, such as those with keys of
    /// an unsupported algorithm. Data without any usable certificate
    /// results in an empty vec.
    pub fn from_pem_bundle(
        pem: &[u8]
    ) -> Result<Vec<Self>, CertDecodeError> {
        let mut res = Vec::new();
        for block in pem_blocks(pem)? {
            let cert = Mode::Der.decode(
                Bytes::from(block.into_contents()), AnyCert::take_from
            ).map_err(|err| {
                CertDecodeError(CertDecodeErrorKind::Der(err))
            })?;
            if let AnyCert::Known(cert) = cert {
                res.push(cert)
            }
        }
        Ok(res)
    }

    /// Returns a value encoder for a reference to the certificate.
    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        self.signed.encode_ref()
    }

    /// Returns the certificate’s encoding as it was received.
    pub fn as_slice(&self) -> &[u8] {
        self.raw.as_ref()
    }

    /// Returns a captured encoding of the certificate.
    pub fn to_captured(&self) -> Captured {
        Captured::from_values(Mode::Der, self.encode_ref())
    }

    /// Returns the PEM encoding of the certificate.
    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", self.raw.to_vec()))
    }
}


/// # Verification
///
impl Cert {
    /// Verifies that the certificate is valid at the given time.
    pub fn verify_validity(
        &self, now: Time
    ) -> Result<(), ValidityPeriodError> {
        self.tbs.validity.verify_at(now)
    }

    /// Returns whether the certificate claims to be issued by `issuer`.
    ///
    /// This compares the issuer name with the issuer’s subject and, if
    /// both identifiers are present, the authority key identifier with
    /// the issuer’s subject key identifier. It does not check the
    /// signature.
    pub fn claims_issuer(&self, issuer: &Cert) -> bool {
        if self.tbs.issuer != issuer.tbs.subject {
            return false
        }
        match (
            self.tbs.authority_key_identifier.as_ref(),
            issuer.tbs.subject_key_identifier.as_ref()
        ) {
            (Some(aki), Some(ski)) => aki == ski,
            _ => true
        }
    }

    /// Verifies the certificate’s signature with the issuer’s key.
    pub fn verify_signature(
        &self,
        issuer: &Cert,
    ) -> Result<(), VerificationError> {
        self.signed.verify_signature(
            issuer.subject_public_key_info()
        )
    }

    /// Returns whether this is a self-signed certificate.
    ///
    /// A certificate is self-signed if it names itself as the issuer and
    /// its signature verifies with its own key.
    pub fn is_self_signed(&self) -> bool {
        self.claims_issuer(self) && self.verify_signature(self).is_ok()
    }
}


//--- Deref, AsRef, and Borrow

impl ops::Deref for Cert {
    type Target = TbsCert;

    fn deref(&self) -> &Self::Target {
        &self.tbs
    }
}

impl AsRef<Cert> for Cert {
    fn as_ref(&self) -> &Self {
        self
    }
}

impl AsRef<TbsCert> for Cert {
    fn as_ref(&self) -> &TbsCert {
        &self.tbs
    }
}

impl borrow::Borrow<TbsCert> for Cert {
    fn borrow(&self) -> &TbsCert {
        &self.tbs
    }
}


//--- PartialEq and Eq

impl PartialEq for Cert {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Cert { }


//------------ ForeignCert ---------------------------------------------------

/// A certificate we can’t use.
///
/// Certificate sets may contain certificates with key or signature
/// algorithms we don’t support. These can never be part of a chain but
/// mustn’t spoil the rest of the set either. Only the fields needed for
/// telling whether a signer refers to such a certificate are decoded.
#[derive(Clone, Debug)]
pub struct ForeignCert {
    raw: Captured,
    issuer: Name,
    serial_number: Serial,
    subject_key_identifier: Option<KeyIdentifier>,
}

impl ForeignCert {
    pub fn issuer(&self) -> &Name {
        &self.issuer
    }

    pub fn serial_number(&self) -> &Serial {
        &self.serial_number
    }

    pub fn subject_key_identifier(&self) -> Option<&KeyIdentifier> {
        self.subject_key_identifier.as_ref()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.raw.as_slice()
    }

    /// Returns a value encoder producing the certificate as received.
    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        &self.raw
    }

    fn from_captured(
        raw: Captured
    ) -> Result<Self, DecodeError<Infallible>> {
        let (issuer, serial_number, subject_key_identifier) = {
            raw.clone().decode(|cons| {
                cons.take_sequence(|cons| {
                    let res = cons.take_sequence(Self::take_tbs_fields)?;
                    cons.skip_all()?;
                    Ok(res)
                })
            })?
        };
        Ok(ForeignCert {
            raw, issuer, serial_number, subject_key_identifier
        })
    }

    /// Takes issuer, serial number and subject key identifier.
    ///
    /// Everything else in the to-be-signed certificate is skipped.
    fn take_tbs_fields<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<(Name, Serial, Option<KeyIdentifier>), DecodeError<S::Error>>
    {
        cons.take_opt_constructed_if(Tag::CTX_0, |c| c.skip_all())?;
        let serial_number = Serial::take_from(cons)?;
        cons.take_sequence(|c| c.skip_all())?; // signature
        let issuer = Name::take_from(cons)?;
        cons.take_sequence(|c| c.skip_all())?; // validity
        cons.take_sequence(|c| c.skip_all())?; // subject
        cons.take_sequence(|c| c.skip_all())?; // subjectPublicKeyInfo
        cons.take_opt_value_if(Tag::CTX_1, |c| {
            c.as_primitive()?.skip_all()
        })?;
        cons.take_opt_value_if(Tag::CTX_2, |c| {
            c.as_primitive()?.skip_all()
        })?;

        let mut key_id = None;
        cons.take_opt_constructed_if(Tag::CTX_3, |cons| {
            cons.take_sequence(|cons| {
                while let Some(()) = cons.take_opt_sequence(|cons| {
                    let id = Oid::take_from(cons)?;
                    cons.take_opt_bool()?;
                    let value = OctetString::take_from(cons)?;
                    if id == oid::CE_SUBJECT_KEY_IDENTIFIER {
                        key_id = Some(
                            Mode::Der.decode(
                                value.into_source(), KeyIdentifier::take_from
                            ).map_err(DecodeError::convert)?
                        );
                    }
                    Ok(())
                })? { }
                Ok(())
            })
        })?;
        Ok((issuer, serial_number, key_id))
    }
}


//------------ AnyCert -------------------------------------------------------

/// A certificate from a certificate set, usable or not.
#[derive(Clone, Debug)]
pub enum AnyCert {
    Known(Cert),
    Foreign(ForeignCert),
}

impl AnyCert {
    /// Takes a certificate from the beginning of a value.
    ///
    /// A value that isn’t a usable certificate but still has the basic
    /// structure of one becomes a foreign certificate. Anything else is
    /// an error.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        Self::from_captured(cons.capture_one()?)
    }

    /// Takes an optional certificate from the beginning of a value.
    pub fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let captured = cons.capture(|cons| {
            cons.take_opt_sequence(|cons| cons.skip_all()).map(|_| ())
        })?;
        if captured.as_slice().is_empty() {
            Ok(None)
        }
        else {
            Self::from_captured(captured).map(Some)
        }
    }

    fn from_captured<E>(
        captured: Captured
    ) -> Result<Self, DecodeError<E>> {
        let err = match Cert::decode_captured(captured.clone()) {
            Ok(cert) => return Ok(AnyCert::Known(cert)),
            Err(err) => err,
        };
        match ForeignCert::from_captured(captured) {
            Ok(cert) => {
                debug!(
                    "ignoring certificate {} issued by {}: {}",
                    cert.serial_number(), cert.issuer(), err
                );
                Ok(AnyCert::Foreign(cert))
            }
            Err(_) => Err(err.convert()),
        }
    }
}


//------------ TbsCert -------------------------------------------------------

/// The data of a certificate.
#[derive(Clone, Debug)]
pub struct TbsCert {
    /// The serial number.
    serial_number: Serial,

    /// The algorithm used for signing the certificate.
    signature: SignatureAlgorithm,

    /// The name of the issuer.
    issuer: Name,

    /// The validity of the certificate.
    validity: Validity,

    /// The name of the subject of this certificate.
    subject: Name,

    /// Information about the public key of this certificate.
    subject_public_key_info: PublicKey,

    /// Basic Constraints extension.
    ///
    /// The field indicates whether the extension is present and, if so,
    /// whether the "cA" boolean is set.
    basic_ca: Option<bool>,

    /// The path length constraint of the Basic Constraints extension.
    path_len: Option<u64>,

    /// Subject Key Identifier extension.
    subject_key_identifier: Option<KeyIdentifier>,

    /// Authority Key Identifier extension.
    authority_key_identifier: Option<KeyIdentifier>,

    /// Key Usage extension.
    key_usage: Option<KeyUsage>,

    /// Extended Key Usage extension.
    extended_key_usage: Option<ExtendedKeyUsage>,
}


/// # Creation and Conversion
///
impl TbsCert {
    /// Creates a new value from the necessary data.
    ///
    /// The subject key identifier is derived from the public key. All
    /// other extensions are absent and can be added via the setters.
    pub fn new(
        serial_number: Serial,
        signature: SignatureAlgorithm,
        issuer: Name,
        validity: Validity,
        subject: Name,
        subject_public_key_info: PublicKey,
    ) -> Self {
        Self {
            serial_number,
            signature,
            issuer,
            validity,
            subject,
            subject_key_identifier: Some(
                subject_public_key_info.key_identifier()
            ),
            subject_public_key_info,
            basic_ca: None,
            path_len: None,
            authority_key_identifier: None,
            key_usage: None,
            extended_key_usage: None,
        }
    }

    /// Converts the value into a signed certificate.
    pub fn into_cert<S: Signer>(
        self,
        signer: &S,
        key: &S::KeyId,
    ) -> Result<Cert, SigningError<S::Error>> {
        let data = Captured::from_values(Mode::Der, self.encode_ref());
        let signature = signer.sign(key, self.signature, &data)?;
        let signed = SignedStructure::new(data, signature);
        Ok(Cert {
            raw: Captured::from_values(
                Mode::Der, signed.encode_ref()
            ).into_bytes(),
            signed,
            tbs: self
        })
    }
}


/// # Data Access
///
impl TbsCert {
    pub fn serial_number(&self) -> &Serial {
        &self.serial_number
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature
    }

    pub fn issuer(&self) -> &Name {
        &self.issuer
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn subject(&self) -> &Name {
        &self.subject
    }

    pub fn subject_public_key_info(&self) -> &PublicKey {
        &self.subject_public_key_info
    }

    /// Returns the cA flag of the Basic Constraints extension.
    ///
    /// Returns `None` if the extension is missing.
    pub fn basic_ca(&self) -> Option<bool> {
        self.basic_ca
    }

    pub fn set_basic_ca(&mut self, value: Option<bool>) {
        self.basic_ca = value
    }

    pub fn path_len(&self) -> Option<u64> {
        self.path_len
    }

    pub fn set_path_len(&mut self, value: Option<u64>) {
        self.path_len = value
    }

    pub fn subject_key_identifier(&self) -> Option<&KeyIdentifier> {
        self.subject_key_identifier.as_ref()
    }

    pub fn authority_key_identifier(&self) -> Option<&KeyIdentifier> {
        self.authority_key_identifier.as_ref()
    }

    pub fn set_authority_key_identifier(
        &mut self, id: Option<KeyIdentifier>
    ) {
        self.authority_key_identifier = id
    }

    pub fn key_usage(&self) -> Option<KeyUsage> {
        self.key_usage
    }

    pub fn set_key_usage(&mut self, key_usage: Option<KeyUsage>) {
        self.key_usage = key_usage
    }

    pub fn extended_key_usage(&self) -> Option<&ExtendedKeyUsage> {
        self.extended_key_usage.as_ref()
    }

    pub fn set_extended_key_usage(&mut self, eku: Option<ExtendedKeyUsage>) {
        self.extended_key_usage = eku
    }

    /// Returns whether this is a CA certificate.
    pub fn is_ca(&self) -> bool {
        self.basic_ca.unwrap_or(false)
    }
}


/// # Decoding and Encoding
///
impl TbsCert {
    /// Parses the content of a Certificate sequence.
    pub fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            // version [0] EXPLICIT Version DEFAULT v1.
            let version = cons.take_opt_constructed_if(
                Tag::CTX_0, |c| c.take_u8()
            )?.unwrap_or(0);
            if version > 2 {
                return Err(cons.content_err("unknown certificate version"))
            }

            let serial_number = Serial::take_from(cons)?;
            let signature = SignatureAlgorithm::x509_take_from(cons)?;
            let issuer = Name::take_from(cons)?;
            let validity = Validity::take_from(cons)?;
            let subject = Name::take_from(cons)?;
            let subject_public_key_info = PublicKey::take_from(cons)?;

            // issuerUniqueID and subjectUniqueID
            cons.take_opt_value_if(Tag::CTX_1, |c| {
                c.as_primitive()?.skip_all()
            })?;
            cons.take_opt_value_if(Tag::CTX_2, |c| {
                c.as_primitive()?.skip_all()
            })?;

            let mut ext = Extensions::default();
            cons.take_opt_constructed_if(Tag::CTX_3, |c| {
                c.take_sequence(|cons| Self::take_extensions(cons, &mut ext))
            })?;

            Ok(Self {
                serial_number,
                signature,
                issuer,
                validity,
                subject,
                subject_public_key_info,
                basic_ca: ext.basic_ca,
                path_len: ext.path_len,
                subject_key_identifier: ext.subject_key_id,
                authority_key_identifier: ext.authority_key_id,
                key_usage: ext.key_usage,
                extended_key_usage: ext.extended_key_usage,
            })
        })
    }

    /// Parses the sequence of extensions.
    fn take_extensions<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        ext: &mut Extensions,
    ) -> Result<(), DecodeError<S::Error>> {
        while let Some(()) = cons.take_opt_sequence(|cons| {
            let id = Oid::take_from(cons)?;
            let critical = cons.take_opt_bool()?.unwrap_or(false);
            let value = OctetString::take_from(cons)?;
            Mode::Der.decode(value.into_source(), |content| {
                if id == oid::CE_BASIC_CONSTRAINTS {
                    Self::take_basic_constraints(
                        content, &mut ext.basic_ca, &mut ext.path_len
                    )
                } else if id == oid::CE_SUBJECT_KEY_IDENTIFIER {
                    Self::take_subject_key_identifier(
                        content, &mut ext.subject_key_id
                    )
                } else if id == oid::CE_AUTHORITY_KEY_IDENTIFIER {
                    Self::take_authority_key_identifier(
                        content, &mut ext.authority_key_id
                    )
                } else if id == oid::CE_KEY_USAGE {
                    Self::take_key_usage(content, &mut ext.key_usage)
                } else if id == oid::CE_EXTENDED_KEY_USAGE {
                    Self::take_extended_key_usage(
                        content, &mut ext.extended_key_usage
                    )
                } else if critical {
                    Err(content.content_err(
                        UnexpectedCriticalExtension::new(id)
                    ))
                } else {
                    // RFC 5280 says we can ignore non-critical
                    // extensions we don’t know of.
                    content.skip_all()
                }
            }).map_err(DecodeError::convert)?;
            Ok(())
        })? { }
        Ok(())
    }

    /// Parses the Basic Constraints extension.
    ///
    /// ```text
    /// BasicConstraints        ::= SEQUENCE {
    ///     cA                      BOOLEAN DEFAULT FALSE,
    ///     pathLenConstraint       INTEGER (0..MAX) OPTIONAL
    /// }
    /// ```
    fn take_basic_constraints<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        basic_ca: &mut Option<bool>,
        path_len: &mut Option<u64>,
    ) -> Result<(), DecodeError<S::Error>> {
        if basic_ca.is_some() {
            Err(cons.content_err("duplicate Basic Constraints extension"))
        }
        else {
            cons.take_sequence(|cons| {
                *basic_ca = Some(cons.take_opt_bool()?.unwrap_or(false));
                *path_len = cons.take_opt_u64()?;
                Ok(())
            })
        }
    }

    /// Parses the Subject Key Identifier extension.
    ///
    /// ```text
    /// SubjectKeyIdentifier ::= KeyIdentifier
    /// ```
    fn take_subject_key_identifier<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        subject_key_id: &mut Option<KeyIdentifier>,
    ) -> Result<(), DecodeError<S::Error>> {
        if subject_key_id.is_some() {
            Err(cons.content_err(
                "duplicate Subject Key Identifier extension"
            ))
        }
        else {
            *subject_key_id = Some(KeyIdentifier::take_from(cons)?);
            Ok(())
        }
    }

    /// Parses the Authority Key Identifier extension.
    ///
    /// ```text
    /// AuthorityKeyIdentifier ::= SEQUENCE {
    ///   keyIdentifier             [0] KeyIdentifier           OPTIONAL,
    ///   authorityCertIssuer       [1] GeneralNames            OPTIONAL,
    ///   authorityCertSerialNumber [2] CertificateSerialNumber OPTIONAL  }
    /// ```
    ///
    /// Only the key identifier is used for chain building, the other two
    /// fields are skipped.
    fn take_authority_key_identifier<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        authority_key_id: &mut Option<KeyIdentifier>,
    ) -> Result<(), DecodeError<S::Error>> {
        if authority_key_id.is_some() {
            return Err(cons.content_err(
                "duplicate Authority Key Identifier extension"
            ))
        }
        *authority_key_id = cons.take_sequence(|cons| {
            let res = cons.take_opt_value_if(
                Tag::CTX_0, KeyIdentifier::from_content
            )?;
            cons.skip_all()?;
            Ok(res)
        })?;
        Ok(())
    }

    /// Parses the Key Usage extension.
    ///
    /// ```text
    /// KeyUsage ::= BIT STRING {
    ///      digitalSignature        (0),
    ///      nonRepudiation          (1),
    ///      keyEncipherment         (2),
    ///      dataEncipherment        (3),
    ///      keyAgreement            (4),
    ///      keyCertSign             (5),
    ///      cRLSign                 (6),
    ///      encipherOnly            (7),
    ///      decipherOnly            (8) }
    /// ```
    fn take_key_usage<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        key_usage: &mut Option<KeyUsage>
    ) -> Result<(), DecodeError<S::Error>> {
        if key_usage.is_some() {
            Err(cons.content_err("duplicate Key Usage extension"))
        }
        else {
            *key_usage = Some(KeyUsage::from_bits(
                &BitString::take_from(cons)?
            ));
            Ok(())
        }
    }

    /// Parses the Extended Key Usage extension.
    ///
    /// ```text
    /// ExtKeyUsageSyntax ::= SEQUENCE SIZE (1..MAX) OF KeyPurposeId
    /// KeyPurposeId ::= OBJECT IDENTIFIER
    /// ```
    fn take_extended_key_usage<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        extended_key_usage: &mut Option<ExtendedKeyUsage>
    ) -> Result<(), DecodeError<S::Error>> {
        if extended_key_usage.is_some() {
            Err(cons.content_err("duplicate Extended Key Usage extension"))
        }
        else {
            *extended_key_usage = Some(ExtendedKeyUsage::take_from(cons)?);
            Ok(())
        }
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            encode::sequence_as(Tag::CTX_0, 2u8.encode()), // version
            self.serial_number.encode_ref(),
            self.signature.x509_encode(),
            self.issuer.encode_ref(),
            self.validity.encode(),
            self.subject.encode_ref(),
            self.subject_public_key_info.encode_ref(),
            // no issuerUniqueID
            // no subjectUniqueID
            // extensions
            encode::sequence_as(Tag::CTX_3, encode::sequence((
                // Basic Constraints
                self.basic_ca.map(|ca| {
                    encode_extension(
                        &oid::CE_BASIC_CONSTRAINTS, true,
                        encode::sequence((
                            if ca {
                                Some(ca.encode())
                            }
                            else {
                                None
                            },
                            self.path_len.map(|len| len.encode()),
                        ))
                    )
                }),

                // Subject Key Identifier
                self.subject_key_identifier.as_ref().map(|id| {
                    encode_extension(
                        &oid::CE_SUBJECT_KEY_IDENTIFIER, false,
                        id.encode_ref(),
                    )
                }),

                // Authority Key Identifier
                self.authority_key_identifier.as_ref().map(|id| {
                    encode_extension(
                        &oid::CE_AUTHORITY_KEY_IDENTIFIER, false,
                        encode::sequence(id.encode_ref_as(Tag::CTX_0))
                    )
                }),

                // Key Usage
                self.key_usage.map(|usage| {
                    encode_extension(
                        &oid::CE_KEY_USAGE, true,
                        usage.encode()
                    )
                }),

                // Extended Key Usage
                self.extended_key_usage.as_ref().map(|eku| {
                    encode_extension(
                        &oid::CE_EXTENDED_KEY_USAGE, false,
                        encode::sequence(eku.encode_ref())
                    )
                }),
            )))
        ))
    }
}


//------------ Extensions ----------------------------------------------------

/// The extensions collected while parsing a certificate.
#[derive(Default)]
struct Extensions {
    basic_ca: Option<bool>,
    path_len: Option<u64>,
    subject_key_id: Option<KeyIdentifier>,
    authority_key_id: Option<KeyIdentifier>,
    key_usage: Option<KeyUsage>,
    extended_key_usage: Option<ExtendedKeyUsage>,
}


//------------ KeyUsage ------------------------------------------------------

/// The key usage bits of a certificate.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct KeyUsage(u16);

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: Self = KeyUsage(1 << 0);
    pub const NON_REPUDIATION: Self = KeyUsage(1 << 1);
    pub const KEY_ENCIPHERMENT: Self = KeyUsage(1 << 2);
    pub const DATA_ENCIPHERMENT: Self = KeyUsage(1 << 3);
    pub const KEY_AGREEMENT: Self = KeyUsage(1 << 4);
    pub const KEY_CERT_SIGN: Self = KeyUsage(1 << 5);
    pub const CRL_SIGN: Self = KeyUsage(1 << 6);
    pub const ENCIPHER_ONLY: Self = KeyUsage(1 << 7);
    pub const DECIPHER_ONLY: Self = KeyUsage(1 << 8);

    /// The usage of a CA certificate.
    pub fn ca() -> Self {
        Self::KEY_CERT_SIGN | Self::CRL_SIGN
    }

    /// The usage of an end-entity certificate creating signatures.
    pub fn ee() -> Self {
        Self::DIGITAL_SIGNATURE
    }

    fn from_bits(bits: &BitString) -> Self {
        let mut res = 0;
        for i in 0..9 {
            if bits.bit(i) {
                res |= 1 << i;
            }
        }
        KeyUsage(res)
    }

    /// Returns whether all the bits in `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns a value encoder for the key usage.
    ///
    /// The value is encoded as a bit string without trailing zero bits.
    pub fn encode(self) -> impl encode::Values {
        // Bit 0 is the most significant bit of the first octet.
        let mut octets = [0u8; 2];
        for i in 0..9 {
            if self.0 & (1 << i) != 0 {
                octets[i >> 3] |= 0x80 >> (i & 7);
            }
        }
        let len = if octets[1] != 0 { 2 }
                  else if octets[0] != 0 { 1 }
                  else { 0 };
        let unused = match len {
            0 => 0,
            len => octets[len - 1].trailing_zeros() as u8
        };
        BitString::new(
            unused, Bytes::copy_from_slice(&octets[..len])
        ).encode()
    }
}

impl ops::BitOr for KeyUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        KeyUsage(self.0 | rhs.0)
    }
}


//------------ ExtendedKeyUsage ----------------------------------------------

/// The key purposes of a certificate’s Extended Key Usage extension.
#[derive(Clone, Debug)]
pub struct ExtendedKeyUsage {
    content: Captured,
    purposes: Vec<Oid>,
}

impl ExtendedKeyUsage {
    /// Creates the extension from a list of key purposes.
    pub fn new(purposes: &[&'static bcder::ConstOid]) -> Self {
        let purposes: Vec<Oid> = purposes.iter().map(|oid| {
            Oid(Bytes::from_static(oid.0))
        }).collect();
        let content = Captured::from_values(
            Mode::Der,
            encode::slice(&purposes, |oid| oid.clone().encode())
        );
        ExtendedKeyUsage { content, purposes }
    }

    fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let mut purposes = Vec::new();
        let content = cons.take_sequence(|cons| cons.capture(|cons| {
            while let Some(oid) = Oid::take_opt_from(cons)? {
                purposes.push(oid);
            }
            if purposes.is_empty() {
                Err(cons.content_err(
                    "empty Extended Key Usage extension"
                ))
            }
            else {
                Ok(())
            }
        }))?;
        Ok(ExtendedKeyUsage { content, purposes })
    }

    fn encode_ref(&self) -> impl encode::Values + '_ {
        &self.content
    }

    /// Returns whether the purpose is explicitly listed.
    pub fn contains(&self, purpose: &bcder::ConstOid) -> bool {
        self.purposes.iter().any(|item| item == purpose)
    }

    /// Returns whether `anyExtendedKeyUsage` is listed.
    pub fn is_any(&self) -> bool {
        self.contains(&oid::ANY_EXTENDED_KEY_USAGE)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Oid> + '_ {
        self.purposes.iter()
    }
}


//============ Error Types ===================================================

//------------ UnexpectedCriticalExtension -----------------------------------

/// An unknown critical certificate extension was encountered.
#[derive(Clone, Debug)]
struct UnexpectedCriticalExtension {
    oid: Oid<Bytes>,
}

impl UnexpectedCriticalExtension {
    fn new(oid: Oid<Bytes>) -> Self {
       UnexpectedCriticalExtension { oid }
    }
}

impl From<UnexpectedCriticalExtension> for ContentError {
    fn from(err: UnexpectedCriticalExtension) -> Self {
        ContentError::from_boxed(Box::new(err))
    }
}

impl fmt::Display for UnexpectedCriticalExtension {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unexpected critical extension {}", self.oid)
    }
}


//------------ CertDecodeError -----------------------------------------------

/// Decoding PEM encoded certificates failed.
#[derive(Debug)]
pub struct CertDecodeError(CertDecodeErrorKind);

#[derive(Debug)]
enum CertDecodeErrorKind {
    /// The PEM encoding is broken.
    Pem(pem::PemError),

    /// A certificate block contains an invalid certificate.
    Der(DecodeError<Infallible>),

    /// There is no certificate block at all.
    Empty,
}

impl fmt::Display for CertDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            CertDecodeErrorKind::Pem(ref err) => {
                write!(f, "invalid PEM data: {}", err)
            }
            CertDecodeErrorKind::Der(ref err) => {
                write!(f, "invalid certificate: {}", err)
            }
            CertDecodeErrorKind::Empty => {
                f.write_str("no certificate found")
            }
        }
    }
}

impl error::Error for CertDecodeError { }


//------------ pem_blocks ----------------------------------------------------

/// Returns the certificate blocks of PEM encoded data.
fn pem_blocks(pem: &[u8]) -> Result<Vec<pem::Pem>, CertDecodeError> {
    Ok(pem::parse_many(pem).map_err(|err| {
        CertDecodeError(CertDecodeErrorKind::Pem(err))
    })?.into_iter().filter(|block| block.tag() == "CERTIFICATE").collect())
}


//============ Tests =========================================================
