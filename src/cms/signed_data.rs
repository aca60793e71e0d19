//! CMS signed data.
//!
//! This module implements the parts of [RFC 5652] needed for detached
//! signatures: the `ContentInfo` wrapper, `SignedData`, and `SignerInfo`
//! with their signed and unsigned attributes. Envelopes are decoded in
//! BER mode since signing tools don’t necessarily produce DER. Encoding
//! always produces DER.
//!
//! [RFC 5652]: https://tools.ietf.org/html/rfc5652

use std::fmt;
use std::convert::Infallible;
use bcder::{decode, encode};
use bcder::{Captured, Mode, OctetString, Oid, Tag};
use bcder::decode::{DecodeError, IntoSource, Source};
use bcder::encode::PrimitiveContent;
use bytes::Bytes;
use crate::oid;
use crate::cert::{AnyCert, Cert, ForeignCert};
use crate::crypto::{DigestAlgorithm, DigestIdentifier, KeyIdentifier};
use crate::x509::{Name, Serial, Time};


//------------ SignedData ----------------------------------------------------

/// A CMS signed data envelope.
///
/// ```text
/// ContentInfo ::= SEQUENCE {
///     contentType ContentType,
///     content [0] EXPLICIT ANY DEFINED BY contentType }
///
/// SignedData ::= SEQUENCE {
///     version CMSVersion,
///     digestAlgorithms DigestAlgorithmIdentifiers,
///     encapContentInfo EncapsulatedContentInfo,
///     certificates [0] IMPLICIT CertificateSet OPTIONAL,
///     crls [1] IMPLICIT RevocationInfoChoices OPTIONAL,
///     signerInfos SignerInfos }
///
/// EncapsulatedContentInfo ::= SEQUENCE {
///     eContentType ContentType,
///     eContent [0] EXPLICIT OCTET STRING OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct SignedData {
    version: u8,
    digest_algorithms: Vec<DigestIdentifier>,
    content_type: Oid<Bytes>,
    content: Option<Bytes>,
    certificates: Vec<Cert>,

    /// Certificates from the set that we can’t use.
    foreign_certificates: Vec<ForeignCert>,

    /// The revocation information, kept only for re-encoding.
    crls: Option<Captured>,

    signer_infos: Vec<SignerInfo>,
}

/// # Creation and Data Access
///
impl SignedData {
    pub(crate) fn new(
        digest_algorithms: Vec<DigestIdentifier>,
        content_type: Oid<Bytes>,
        content: Option<Bytes>,
        certificates: Vec<Cert>,
        signer_infos: Vec<SignerInfo>,
    ) -> Self {
        let version = if content_type != oid::DATA
            || signer_infos.iter().any(|info| info.version == 3)
        {
            3
        }
        else {
            1
        };
        SignedData {
            version,
            digest_algorithms,
            content_type,
            content,
            certificates,
            foreign_certificates: Vec::new(),
            crls: None,
            signer_infos,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn digest_algorithms(&self) -> &[DigestIdentifier] {
        &self.digest_algorithms
    }

    /// Returns the content type of the encapsulated content.
    pub fn content_type(&self) -> &Oid<Bytes> {
        &self.content_type
    }

    /// Returns the encapsulated content if present.
    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    /// Returns whether the envelope is a detached signature.
    pub fn is_detached(&self) -> bool {
        self.content.is_none()
    }

    /// Returns the certificates in the order they appear in the envelope.
    pub fn certificates(&self) -> &[Cert] {
        &self.certificates
    }

    /// Returns the certificates that were skipped as unusable.
    pub fn foreign_certificates(&self) -> &[ForeignCert] {
        &self.foreign_certificates
    }

    pub fn signer_infos(&self) -> &[SignerInfo] {
        &self.signer_infos
    }

    /// Returns a mutable reference to the signer info at `index`.
    pub(crate) fn signer_info_mut(
        &mut self, index: usize
    ) -> Option<&mut SignerInfo> {
        self.signer_infos.get_mut(index)
    }

    /// Appends a signer info and registers its digest algorithm.
    pub(crate) fn push_signer_info(&mut self, info: SignerInfo) {
        if !self.digest_algorithms.contains(&info.digest_algorithm) {
            self.digest_algorithms.push(info.digest_algorithm.clone())
        }
        if info.version == 3 {
            self.version = 3
        }
        self.signer_infos.push(info)
    }

    pub(crate) fn push_certificate(&mut self, cert: Cert) {
        if !self.certificates.contains(&cert) {
            self.certificates.push(cert)
        }
    }

    /// Removes the encapsulated content, making the signature detached.
    pub(crate) fn take_content(&mut self) -> Option<Bytes> {
        self.content.take()
    }
}

/// # Decoding and Encoding
///
impl SignedData {
    /// Decodes a `ContentInfo` containing signed data.
    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Ber.decode(source, Self::take_from)
    }

    /// Takes a `ContentInfo` containing signed data from a value.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| { // ContentInfo
            let content_type = Oid::take_from(cons)?;
            if content_type != oid::SIGNED_DATA {
                return Err(cons.content_err("not a CMS signed data object"))
            }
            cons.take_constructed_if(Tag::CTX_0, |cons| {
                cons.take_sequence(Self::from_constructed)
            })
        })
    }

    /// Parses the content of the `SignedData` sequence.
    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let version = cons.take_u8()?;
        if !(1..=5).contains(&version) {
            return Err(cons.content_err("unknown signed data version"))
        }
        let digest_algorithms = DigestIdentifier::take_set_from(cons)?;
        let (content_type, content) = cons.take_sequence(|cons| {
            Ok((
                Oid::take_from(cons)?,
                cons.take_opt_constructed_if(
                    Tag::CTX_0, OctetString::take_from
                )?.map(OctetString::into_bytes)
            ))
        })?;
        let mut certificates = Vec::new();
        let mut foreign_certificates = Vec::new();
        cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
            while let Some(cert) = AnyCert::take_opt_from(cons)? {
                match cert {
                    AnyCert::Known(cert) => certificates.push(cert),
                    AnyCert::Foreign(cert) => foreign_certificates.push(cert),
                }
            }
            // Other certificate choices are of no use to us.
            cons.skip_all()
        })?;
        let crls = cons.take_opt_constructed_if(
            Tag::CTX_1, |cons| cons.capture_all()
        )?;
        let signer_infos = cons.take_set(|cons| {
            let mut res = Vec::new();
            while let Some(info) = SignerInfo::take_opt_from(cons)? {
                res.push(info)
            }
            Ok(res)
        })?;
        Ok(SignedData {
            version,
            digest_algorithms,
            content_type,
            content,
            certificates,
            foreign_certificates,
            crls,
            signer_infos,
        })
    }

    /// Returns a value encoder for a reference to the envelope.
    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            oid::SIGNED_DATA.encode(),
            encode::sequence_as(Tag::CTX_0, encode::sequence((
                self.version.encode(),
                DigestIdentifier::encode_set(&self.digest_algorithms),
                encode::sequence((
                    self.content_type.encode_ref(),
                    self.content.as_ref().map(|content| {
                        encode::sequence_as(
                            Tag::CTX_0,
                            OctetString::encode_slice(content.as_ref())
                        )
                    })
                )),
                if self.certificates.is_empty()
                    && self.foreign_certificates.is_empty()
                {
                    None
                }
                else {
                    Some(encode::sequence_as(
                        Tag::CTX_0,
                        (
                            encode::iter(
                                self.certificates.iter().map(Cert::encode_ref)
                            ),
                            encode::iter(
                                self.foreign_certificates.iter().map(
                                    ForeignCert::encode_ref
                                )
                            ),
                        )
                    ))
                },
                self.crls.as_ref().map(|crls| {
                    encode::sequence_as(Tag::CTX_1, crls)
                }),
                encode::set(
                    encode::iter(
                        self.signer_infos.iter().map(SignerInfo::encode_ref)
                    )
                )
            )))
        ))
    }

    /// Returns the DER encoding of the envelope.
    pub fn to_captured(&self) -> Captured {
        Captured::from_values(Mode::Der, self.encode_ref())
    }
}


//------------ SignerInfo ----------------------------------------------------

/// The information about a single signer.
///
/// ```text
/// SignerInfo ::= SEQUENCE {
///     version CMSVersion,
///     sid SignerIdentifier,
///     digestAlgorithm DigestAlgorithmIdentifier,
///     signedAttrs [0] IMPLICIT SignedAttributes OPTIONAL,
///     signatureAlgorithm SignatureAlgorithmIdentifier,
///     signature SignatureValue,
///     unsignedAttrs [1] IMPLICIT UnsignedAttributes OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct SignerInfo {
    version: u8,
    sid: SignerIdentifier,
    digest_algorithm: DigestIdentifier,
    signed_attrs: Option<SignedAttrs>,

    /// The complete signature algorithm identifier.
    ///
    /// The algorithm actually used for verification is derived from the
    /// certificate’s key and the digest algorithm, so this is kept only
    /// for re-encoding.
    signature_algorithm: Captured,

    signature: Bytes,
    unsigned_attrs: Option<UnsignedAttrs>,
}

impl SignerInfo {
    pub(crate) fn new(
        sid: SignerIdentifier,
        digest_algorithm: DigestAlgorithm,
        signed_attrs: Option<SignedAttrs>,
        signature_algorithm: Captured,
        signature: Bytes,
    ) -> Self {
        SignerInfo {
            version: sid.version(),
            sid,
            digest_algorithm: digest_algorithm.into(),
            signed_attrs,
            signature_algorithm,
            signature,
            unsigned_attrs: None,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn sid(&self) -> &SignerIdentifier {
        &self.sid
    }

    /// Returns the digest algorithm if it is one we support.
    pub fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        self.digest_algorithm.algorithm()
    }

    pub fn digest_identifier(&self) -> &DigestIdentifier {
        &self.digest_algorithm
    }

    pub fn signed_attrs(&self) -> Option<&SignedAttrs> {
        self.signed_attrs.as_ref()
    }

    pub fn signature_algorithm(&self) -> &Captured {
        &self.signature_algorithm
    }

    /// Returns the signature value.
    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    pub fn unsigned_attrs(&self) -> Option<&UnsignedAttrs> {
        self.unsigned_attrs.as_ref()
    }

    /// Returns the timestamp tokens in the unsigned attributes.
    pub fn timestamp_tokens(&self) -> &[SignedData] {
        match self.unsigned_attrs {
            Some(ref attrs) => attrs.timestamp_tokens(),
            None => &[]
        }
    }

    /// Adds a timestamp token to the unsigned attributes.
    pub(crate) fn add_timestamp_token(&mut self, token: SignedData) {
        let mut tokens = self.timestamp_tokens().to_vec();
        tokens.push(token);
        self.unsigned_attrs = Some(UnsignedAttrs::with_timestamp_tokens(
            tokens
        ));
    }

    /// Returns the octets the signature was calculated over.
    ///
    /// This is the DER encoding of the signed attributes if present or
    /// `message` otherwise.
    pub fn signed_message<'a>(&self, message: &'a [u8]) -> SignedMessage<'a> {
        match self.signed_attrs {
            Some(ref attrs) => SignedMessage::Attrs(attrs.encode_verify()),
            None => SignedMessage::Content(message)
        }
    }

    fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let version = cons.take_u8()?;
            let sid = SignerIdentifier::take_from(cons)?;
            let digest_algorithm = DigestIdentifier::take_from(cons)?;
            let signed_attrs = SignedAttrs::take_opt_from(cons)?;
            let signature_algorithm = cons.capture(|cons| {
                cons.take_sequence(|cons| cons.skip_all())
            })?;
            let signature = OctetString::take_from(cons)?.into_bytes();
            let unsigned_attrs = cons.take_opt_constructed_if(
                Tag::CTX_1, |cons| cons.capture_all()
            )?;
            let unsigned_attrs = match unsigned_attrs {
                Some(raw) => {
                    Some(
                        UnsignedAttrs::from_captured(raw).map_err(
                            DecodeError::convert
                        )?
                    )
                }
                None => None
            };
            Ok(SignerInfo {
                version,
                sid,
                digest_algorithm,
                signed_attrs,
                signature_algorithm,
                signature,
                unsigned_attrs,
            })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.version.encode(),
            self.sid.encode_ref(),
            self.digest_algorithm.encode_ref(),
            self.signed_attrs.as_ref().map(|attrs| attrs.encode_ref()),
            &self.signature_algorithm,
            OctetString::encode_slice(self.signature.as_ref()),
            self.unsigned_attrs.as_ref().map(|attrs| attrs.encode_ref()),
        ))
    }
}


//------------ SignedMessage -------------------------------------------------

/// The octets a signer’s signature was calculated over.
#[derive(Clone, Debug)]
pub enum SignedMessage<'a> {
    /// The re-encoded signed attributes.
    Attrs(Bytes),

    /// The content itself.
    Content(&'a [u8]),
}

impl AsRef<[u8]> for SignedMessage<'_> {
    fn as_ref(&self) -> &[u8] {
        match *self {
            SignedMessage::Attrs(ref attrs) => attrs.as_ref(),
            SignedMessage::Content(content) => content,
        }
    }
}


//------------ SignerIdentifier ----------------------------------------------

/// The identifier of a signer’s certificate.
///
/// ```text
/// SignerIdentifier ::= CHOICE {
///     issuerAndSerialNumber IssuerAndSerialNumber,
///     subjectKeyIdentifier [0] SubjectKeyIdentifier }
///
/// IssuerAndSerialNumber ::= SEQUENCE {
///     issuer Name,
///     serialNumber CertificateSerialNumber }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SignerIdentifier {
    IssuerAndSerial(Name, Serial),
    SubjectKeyIdentifier(KeyIdentifier),
}

impl SignerIdentifier {
    /// Returns the identifier for a certificate.
    ///
    /// If `use_key_id` is true and the certificate has a subject key
    /// identifier, that is used. Otherwise issuer and serial number are
    /// used.
    pub fn for_cert(cert: &Cert, use_key_id: bool) -> Self {
        match cert.subject_key_identifier() {
            Some(id) if use_key_id => {
                SignerIdentifier::SubjectKeyIdentifier(id.clone())
            }
            _ => {
                SignerIdentifier::IssuerAndSerial(
                    cert.issuer().clone(), cert.serial_number().clone()
                )
            }
        }
    }

    /// Returns whether the identifier refers to the given certificate.
    pub fn matches(&self, cert: &Cert) -> bool {
        self.matches_fields(
            cert.issuer(), cert.serial_number(),
            cert.subject_key_identifier()
        )
    }

    /// Returns whether the identifier refers to an unusable certificate.
    pub fn matches_foreign(&self, cert: &ForeignCert) -> bool {
        self.matches_fields(
            cert.issuer(), cert.serial_number(),
            cert.subject_key_identifier()
        )
    }

    fn matches_fields(
        &self,
        issuer: &Name,
        serial: &Serial,
        key_id: Option<&KeyIdentifier>,
    ) -> bool {
        match *self {
            SignerIdentifier::IssuerAndSerial(ref name, ref number) => {
                issuer == name && serial == number
            }
            SignerIdentifier::SubjectKeyIdentifier(ref id) => {
                key_id == Some(id)
            }
        }
    }

    /// Returns the signer info version implied by the identifier.
    fn version(&self) -> u8 {
        match *self {
            SignerIdentifier::IssuerAndSerial(..) => 1,
            SignerIdentifier::SubjectKeyIdentifier(_) => 3,
        }
    }

    fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        if let Some(id) = cons.take_opt_value_if(
            Tag::CTX_0, KeyIdentifier::from_content
        )? {
            return Ok(SignerIdentifier::SubjectKeyIdentifier(id))
        }
        cons.take_sequence(|cons| {
            Ok(SignerIdentifier::IssuerAndSerial(
                Name::take_from(cons)?,
                Serial::take_from(cons)?,
            ))
        })
    }

    fn encode_ref(&self) -> impl encode::Values + '_ {
        match *self {
            SignerIdentifier::IssuerAndSerial(ref issuer, ref serial) => {
                encode::Choice2::One(encode::sequence((
                    issuer.encode_ref(),
                    serial.encode_ref(),
                )))
            }
            SignerIdentifier::SubjectKeyIdentifier(ref id) => {
                encode::Choice2::Two(id.encode_ref_as(Tag::CTX_0))
            }
        }
    }
}

impl fmt::Display for SignerIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SignerIdentifier::IssuerAndSerial(ref issuer, ref serial) => {
                write!(f, "issuer {}, serial {}", issuer, serial)
            }
            SignerIdentifier::SubjectKeyIdentifier(ref id) => {
                write!(f, "key identifier {}", id)
            }
        }
    }
}


//------------ SignedAttrs ---------------------------------------------------

/// The signed attributes of a signer info.
///
/// These attributes, in their DER encoded form, are what the signature is
/// calculated over. Annoyingly, the encoding uses the signed attribute set
/// with a tag for SET OF, not \[0\] as it would be found in the actual
/// data.
///
/// The value keeps the captured content of the attribute set as it was
/// received, i.e., without the tag and length of the set itself. Values of
/// the content type, message digest, and signing time attributes are
/// collected while parsing. Since each of them must appear exactly once,
/// they are kept as lists so that verification can reject duplicates.
/// Other attributes are ignored.
#[derive(Clone, Debug)]
pub struct SignedAttrs {
    raw: Captured,
    content_type: Vec<Oid<Bytes>>,
    message_digest: Vec<Bytes>,
    signing_time: Vec<Time>,
}

impl SignedAttrs {
    /// Creates the signed attributes for a new signature.
    ///
    /// In DER, the elements of a SET OF are ordered by their encoding. All
    /// attributes are sequences, so they start with the same octet and the
    /// comparison essentially happens on their lengths.
    pub(crate) fn new(
        content_type: &Oid<Bytes>,
        message_digest: &[u8],
        signing_time: Option<Time>,
    ) -> Self {
        let mut attrs = vec![
            Captured::from_values(Mode::Der, encode::sequence((
                oid::CONTENT_TYPE.encode(),
                encode::set(content_type.encode_ref()),
            ))),
            Captured::from_values(Mode::Der, encode::sequence((
                oid::MESSAGE_DIGEST.encode(),
                encode::set(OctetString::encode_slice(message_digest)),
            ))),
        ];
        if let Some(time) = signing_time {
            attrs.push(Captured::from_values(Mode::Der, encode::sequence((
                oid::SIGNING_TIME.encode(),
                encode::set(time.encode_varied()),
            ))));
        }
        attrs.sort_by(|left, right| left.as_slice().cmp(right.as_slice()));

        let mut raw = Captured::builder(Mode::Der);
        for attr in attrs {
            raw.extend(attr)
        }
        SignedAttrs {
            raw: raw.freeze(),
            content_type: vec![content_type.clone()],
            message_digest: vec![Bytes::copy_from_slice(message_digest)],
            signing_time: signing_time.into_iter().collect(),
        }
    }

    /// Takes the optional signed attributes from a signer info.
    fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let mut content_type = Vec::new();
        let mut message_digest = Vec::new();
        let mut signing_time = Vec::new();
        let raw = cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
            cons.capture(|cons| {
                while let Some(()) = cons.take_opt_sequence(|cons| {
                    let oid = Oid::take_from(cons)?;
                    cons.take_set(|cons| {
                        if oid == oid::CONTENT_TYPE {
                            while let Some(value) = Oid::take_opt_from(cons)? {
                                content_type.push(value)
                            }
                        }
                        else if oid == oid::MESSAGE_DIGEST {
                            while let Some(value) =
                                OctetString::take_opt_from(cons)?
                            {
                                message_digest.push(value.into_bytes())
                            }
                        }
                        else if oid == oid::SIGNING_TIME {
                            while let Some(value) =
                                Time::take_opt_from(cons)?
                            {
                                signing_time.push(value)
                            }
                        }
                        cons.skip_all()
                    })
                })? { }
                Ok(())
            })
        })?;
        Ok(raw.map(|raw| {
            SignedAttrs { raw, content_type, message_digest, signing_time }
        }))
    }

    /// Returns the content type if the attribute has exactly one value.
    pub fn content_type(&self) -> Option<&Oid<Bytes>> {
        Self::single(&self.content_type)
    }

    /// Returns the message digest if the attribute has exactly one value.
    pub fn message_digest(&self) -> Option<&Bytes> {
        Self::single(&self.message_digest)
    }

    /// Returns the signing time if the attribute has exactly one value.
    pub fn signing_time(&self) -> Option<Time> {
        Self::single(&self.signing_time).copied()
    }

    /// Returns whether any of the known attributes has several values.
    pub fn has_duplicates(&self) -> bool {
        self.content_type.len() > 1
            || self.message_digest.len() > 1
            || self.signing_time.len() > 1
    }

    fn single<T>(values: &[T]) -> Option<&T> {
        match values {
            [value] => Some(value),
            _ => None
        }
    }

    /// Returns the raw content of the attribute set.
    pub fn as_slice(&self) -> &[u8] {
        self.raw.as_slice()
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence_as(Tag::CTX_0, &self.raw)
    }

    /// Creates the message for verification.
    ///
    /// This is the content of the attributes with the tag and length of a
    /// SET OF in front.
    pub fn encode_verify(&self) -> Bytes {
        Captured::from_values(Mode::Der, encode::set(&self.raw)).into_bytes()
    }
}


//------------ UnsignedAttrs -------------------------------------------------

/// The unsigned attributes of a signer info.
///
/// Only timestamp tokens are decoded, all other attributes are kept as
/// part of the raw content.
#[derive(Clone, Debug)]
pub struct UnsignedAttrs {
    raw: Captured,
    timestamp_tokens: Vec<SignedData>,
}

impl UnsignedAttrs {
    fn with_timestamp_tokens(tokens: Vec<SignedData>) -> Self {
        let raw = Captured::from_values(Mode::Der, encode::sequence((
            oid::AA_TIME_STAMP_TOKEN.encode(),
            encode::set(
                encode::iter(tokens.iter().map(SignedData::encode_ref))
            )
        )));
        UnsignedAttrs { raw, timestamp_tokens: tokens }
    }

    fn from_captured(raw: Captured) -> Result<Self, DecodeError<Infallible>> {
        let mut tokens = Vec::new();
        raw.clone().decode(|cons| {
            while let Some(()) = cons.take_opt_sequence(|cons| {
                let oid = Oid::take_from(cons)?;
                cons.take_set(|cons| {
                    if oid == oid::AA_TIME_STAMP_TOKEN {
                        loop {
                            let token = cons.capture(|cons| {
                                cons.take_opt_sequence(|cons| {
                                    cons.skip_all()
                                }).map(|_| ())
                            })?;
                            if token.as_slice().is_empty() {
                                break
                            }
                            tokens.push(token)
                        }
                    }
                    cons.skip_all()
                })
            })? { }
            Ok(())
        })?;
        let timestamp_tokens = tokens.into_iter().map(|token| {
            token.decode(SignedData::take_from)
        }).collect::<Result<_, _>>()?;
        Ok(UnsignedAttrs { raw, timestamp_tokens })
    }

    pub fn timestamp_tokens(&self) -> &[SignedData] {
        &self.timestamp_tokens
    }

    pub fn as_slice(&self) -> &[u8] {
        self.raw.as_slice()
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence_as(Tag::CTX_1, &self.raw)
    }
}
