//! RFC 3161 timestamp tokens.
//!
//! A timestamp token is a CMS signed data object whose content is a
//! `TSTInfo` structure. It is attached to a signer info as the unsigned
//! `id-aa-timeStampToken` attribute and proves that the signature value
//! existed at the time asserted by the time-stamping authority.

use std::fmt;
use bcder::{decode, encode};
use bcder::{Captured, Mode, OctetString, Oid, Tag};
use bcder::decode::{DecodeError, IntoSource, Source};
use bcder::encode::PrimitiveContent;
use bytes::Bytes;
use chrono::TimeDelta;
use log::debug;
use crate::oid;
use crate::cert::Cert;
use crate::chain::{Chain, KeyPurpose, ReferenceTime, VerifyOptions};
use crate::crypto::DigestAlgorithm;
use crate::x509::{Serial, Time};
use super::signed_data::SignedData;
use super::verify::{VerifyError, VerifyErrorKind};


//------------ TrustAnchorValidator ------------------------------------------

/// A type that can verify the signature of a timestamp token.
///
/// The token is an attached CMS signature made by a time-stamping
/// authority. Implementations decide which authorities are trusted.
pub trait TrustAnchorValidator {
    /// Verifies the token’s signature and the chain of its signer.
    ///
    /// The options carry the trust anchors and intermediates of the
    /// enclosing verification with the key usage set to time stamping.
    fn verify_token(
        &self,
        token: &SignedData,
        options: &VerifyOptions,
    ) -> Result<Vec<Chain>, VerifyError>;
}


//------------ CmsTokenValidator ---------------------------------------------

/// The default token validator.
///
/// Verifies the token as an attached CMS signature against the trust
/// anchors of the enclosing verification.
#[derive(Clone, Copy, Debug, Default)]
pub struct CmsTokenValidator;

impl TrustAnchorValidator for CmsTokenValidator {
    fn verify_token(
        &self,
        token: &SignedData,
        options: &VerifyOptions,
    ) -> Result<Vec<Chain>, VerifyError> {
        token.verify_attached_with(options, self)
    }
}


//------------ verify_timestamp ----------------------------------------------

/// Verifies a timestamp token for a signer’s signature.
///
/// Checks that the token is validly signed by a time-stamping authority,
/// that its message imprint covers `signature`, and that the asserted time
/// lies within the validity period of `signer`. Returns the token’s
/// content upon success.
///
/// Unless `options` asks for a fixed time, the authority’s certificates
/// are checked at the time asserted by the token.
pub fn verify_timestamp<V: TrustAnchorValidator + ?Sized>(
    token: &SignedData,
    signature: &[u8],
    signer: &Cert,
    options: &VerifyOptions,
    validator: &V,
) -> Result<TstInfo, VerifyError> {
    if *token.content_type() != oid::CT_TST_INFO {
        return Err(VerifyError::new(VerifyErrorKind::MalformedAttributes))
    }
    let tst_info = match token.content() {
        Some(content) => {
            TstInfo::decode(content.clone()).map_err(|err| {
                debug!("invalid TSTInfo in timestamp token: {}", err);
                VerifyError::new(VerifyErrorKind::MalformedAttributes)
            })?
        }
        None => {
            return Err(
                VerifyError::new(VerifyErrorKind::MalformedAttributes)
            )
        }
    };

    let token_options = VerifyOptions {
        current_time: match options.current_time {
            ReferenceTime::Now => ReferenceTime::At(tst_info.gen_time()),
            other => other,
        },
        key_usage: KeyPurpose::TimeStamping,
        ..options.clone()
    };
    validator.verify_token(token, &token_options)?;

    let imprint = tst_info.message_imprint();
    if imprint.digest_algorithm().digest(signature).as_ref()
        != imprint.hashed_message().as_ref()
    {
        return Err(VerifyError::new(VerifyErrorKind::TimestampMismatch))
    }

    let (earliest, latest) = tst_info.time_window();
    if !signer.validity().covers(earliest, latest) {
        debug!(
            "timestamp {} outside validity of {}",
            tst_info.gen_time(), signer.subject()
        );
        return Err(VerifyError::new(VerifyErrorKind::UntrustedCertificate))
    }
    debug!("valid timestamp {} for {}", tst_info.gen_time(), signer.subject());
    Ok(tst_info)
}


//------------ TstInfo -------------------------------------------------------

/// The content of a timestamp token.
///
/// ```text
/// TSTInfo ::= SEQUENCE  {
///     version                      INTEGER  { v1(1) },
///     policy                       TSAPolicyId,
///     messageImprint               MessageImprint,
///     serialNumber                 INTEGER,
///     genTime                      GeneralizedTime,
///     accuracy                     Accuracy                 OPTIONAL,
///     ordering                     BOOLEAN             DEFAULT FALSE,
///     nonce                        INTEGER                  OPTIONAL,
///     tsa                          [0] GeneralName          OPTIONAL,
///     extensions                   [1] IMPLICIT Extensions  OPTIONAL }
/// ```
#[derive(Clone, Debug)]
pub struct TstInfo {
    policy: Oid<Bytes>,
    message_imprint: MessageImprint,
    serial_number: Serial,
    gen_time: Time,
    accuracy: Option<Accuracy>,
    ordering: bool,
    nonce: Option<Serial>,

    /// The encoded name of the authority including the explicit tag.
    tsa: Option<Captured>,

    /// The content of the extensions.
    extensions: Option<Captured>,
}

impl TstInfo {
    pub fn new(
        policy: Oid<Bytes>,
        message_imprint: MessageImprint,
        serial_number: Serial,
        gen_time: Time,
    ) -> Self {
        TstInfo {
            policy,
            message_imprint,
            serial_number,
            gen_time,
            accuracy: None,
            ordering: false,
            nonce: None,
            tsa: None,
            extensions: None,
        }
    }

    pub fn policy(&self) -> &Oid<Bytes> {
        &self.policy
    }

    pub fn message_imprint(&self) -> &MessageImprint {
        &self.message_imprint
    }

    pub fn serial_number(&self) -> &Serial {
        &self.serial_number
    }

    /// Returns the time asserted by the authority.
    pub fn gen_time(&self) -> Time {
        self.gen_time
    }

    pub fn accuracy(&self) -> Option<Accuracy> {
        self.accuracy
    }

    pub fn set_accuracy(&mut self, accuracy: Option<Accuracy>) {
        self.accuracy = accuracy
    }

    pub fn ordering(&self) -> bool {
        self.ordering
    }

    pub fn nonce(&self) -> Option<&Serial> {
        self.nonce.as_ref()
    }

    pub fn set_nonce(&mut self, nonce: Option<Serial>) {
        self.nonce = nonce
    }

    /// Returns the earliest and latest time the token may refer to.
    ///
    /// This is the generation time widened by the accuracy.
    pub fn time_window(&self) -> (Time, Time) {
        match self.accuracy {
            Some(accuracy) => {
                let delta = accuracy.to_delta();
                (self.gen_time - delta, self.gen_time + delta)
            }
            None => (self.gen_time, self.gen_time)
        }
    }

    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Ber.decode(source, Self::take_from)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            cons.skip_u8_if(1)?;
            let policy = Oid::take_from(cons)?;
            let message_imprint = MessageImprint::take_from(cons)?;
            let serial_number = Serial::take_from(cons)?;
            let gen_time = Time::take_generalized_from(cons)?;
            let accuracy = Accuracy::take_opt_from(cons)?;
            let ordering = cons.take_opt_bool()?.unwrap_or(false);
            let nonce = Serial::take_opt_from(cons)?;
            let tsa = cons.capture(|cons| {
                cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
                    cons.skip_all()
                }).map(|_| ())
            })?;
            let extensions = cons.take_opt_constructed_if(
                Tag::CTX_1, |cons| cons.capture_all()
            )?;
            Ok(TstInfo {
                policy,
                message_imprint,
                serial_number,
                gen_time,
                accuracy,
                ordering,
                nonce,
                tsa: if tsa.as_slice().is_empty() {
                    None
                }
                else {
                    Some(tsa)
                },
                extensions,
            })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            1u8.encode(),
            self.policy.encode_ref(),
            self.message_imprint.encode_ref(),
            self.serial_number.encode_ref(),
            self.gen_time.encode_generalized_time(),
            self.accuracy.map(Accuracy::encode),
            if self.ordering { Some(true.encode()) } else { None },
            self.nonce.as_ref().map(|nonce| nonce.encode_ref()),
            self.tsa.as_ref(),
            self.extensions.as_ref().map(|ext| {
                encode::sequence_as(Tag::CTX_1, ext)
            }),
        ))
    }

    pub fn to_captured(&self) -> Captured {
        Captured::from_values(Mode::Der, self.encode_ref())
    }
}


//------------ MessageImprint ------------------------------------------------

/// The digest of the timestamped data.
///
/// ```text
/// MessageImprint ::= SEQUENCE  {
///     hashAlgorithm                AlgorithmIdentifier,
///     hashedMessage                OCTET STRING  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageImprint {
    digest_algorithm: DigestAlgorithm,
    hashed_message: Bytes,
}

impl MessageImprint {
    /// Creates the imprint of the given data.
    pub fn for_data(digest_algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        MessageImprint {
            digest_algorithm,
            hashed_message: Bytes::copy_from_slice(
                digest_algorithm.digest(data).as_ref()
            ),
        }
    }

    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    pub fn hashed_message(&self) -> &Bytes {
        &self.hashed_message
    }

    fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            Ok(MessageImprint {
                digest_algorithm: DigestAlgorithm::take_from(cons)?,
                hashed_message: OctetString::take_from(cons)?.into_bytes(),
            })
        })
    }

    fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.digest_algorithm.encode(),
            OctetString::encode_slice(self.hashed_message.as_ref()),
        ))
    }
}


//------------ Accuracy ------------------------------------------------------

/// The accuracy of the time in a timestamp token.
///
/// ```text
/// Accuracy ::= SEQUENCE {
///     seconds        INTEGER              OPTIONAL,
///     millis     [0] INTEGER  (1..999)    OPTIONAL,
///     micros     [1] INTEGER  (1..999)    OPTIONAL  }
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Accuracy {
    pub seconds: u64,
    pub millis: u16,
    pub micros: u16,
}

const MAX_ACCURACY_SECONDS: u64 = 100 * 366 * 86_400;

impl Accuracy {
    pub fn from_seconds(seconds: u64) -> Self {
        Accuracy { seconds, millis: 0, micros: 0 }
    }

    /// Returns the accuracy as a time delta.
    ///
    /// Seconds are capped at about a century.
    pub fn to_delta(self) -> TimeDelta {
        let seconds = i64::try_from(
            self.seconds.min(MAX_ACCURACY_SECONDS)
        ).unwrap_or(0);
        TimeDelta::seconds(seconds)
            + TimeDelta::milliseconds(i64::from(self.millis))
            + TimeDelta::microseconds(i64::from(self.micros))
    }

    fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            let seconds = cons.take_opt_u64()?.unwrap_or(0);
            let millis = Self::take_opt_fraction(cons, Tag::CTX_0)?;
            let micros = Self::take_opt_fraction(cons, Tag::CTX_1)?;
            Ok(Accuracy { seconds, millis, micros })
        })
    }

    fn take_opt_fraction<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        tag: Tag,
    ) -> Result<u16, DecodeError<S::Error>> {
        let res = cons.take_opt_primitive_if(tag, |prim| {
            prim.to_u16()
        })?;
        match res {
            Some(value) if !(1..=999).contains(&value) => {
                Err(cons.content_err("invalid accuracy"))
            }
            Some(value) => Ok(value),
            None => Ok(0)
        }
    }

    fn encode(self) -> impl encode::Values {
        encode::sequence((
            if self.seconds != 0 { Some(self.seconds.encode()) } else { None },
            if self.millis != 0 {
                Some(self.millis.encode_as(Tag::CTX_0))
            }
            else {
                None
            },
            if self.micros != 0 {
                Some(self.micros.encode_as(Tag::CTX_1))
            }
            else {
                None
            },
        ))
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "±{}", self.to_delta())
    }
}

