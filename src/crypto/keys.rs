//! Types and parameters of keys.

use std::{error, fmt, io, str};
use bcder::{decode, encode};
use bcder::{BitString, Mode, OctetString, Oid, Tag};
use bcder::decode::{DecodeError, IntoSource, Source};
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use ring::error::Unspecified;
use untrusted::Input;
use crate::oid;
use crate::util::hex;
use super::digest::sha1_digest;
use super::signature::SignatureAlgorithm;


//------------ PublicKeyFormat -----------------------------------------------

/// The formats of public keys we can verify signatures with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PublicKeyFormat {
    /// An RSA key of at least 2048 bits.
    Rsa,

    /// An ECDSA key on the P-256 curve.
    EcdsaP256,

    /// An ECDSA key on the P-384 curve.
    EcdsaP384,
}

/// # ASN.1 Algorithm Identifiers
///
/// The format of the public key is identified in certificates through a
/// algorithm identifier defined with this ASN.1:
///
/// ```txt
/// AlgorithmIdentifier ::= SEQUENCE {
///      algorithm          OBJECT IDENTIFIER,
///      parameters         ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// For RSA keys, the object identifier needs to be that of `rsaEncryption`
/// defined by [RFC 4055] and the parameters must be present and NULL.
/// When parsing, we generously also allow it to be absent altogether.
///
/// For ECDSA keys, the object identifier needs to be `ecPublicKey` defined
/// by [RFC 5480] with the parameter being the object identifier of a named
/// curve, either `secp256r1` or `secp384r1`.
///
/// [RFC 4055]: https://tools.ietf.org/html/rfc4055
/// [RFC 5480]: https://tools.ietf.org/html/rfc5480
impl PublicKeyFormat {
    /// Takes and returns a algorithm identifier.
    ///
    /// Returns a malformed error if the algorithm isn’t one of the allowed
    /// algorithms or if the value isn’t correctly encoded.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    /// Parses the algorithm identifier from the contents of its sequence.
    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let alg = Oid::take_from(cons)?;
        if alg == oid::RSA_ENCRYPTION {
            cons.take_opt_null()?;
            Ok(PublicKeyFormat::Rsa)
        }
        else if alg == oid::EC_PUBLIC_KEY {
            let curve = Oid::take_from(cons)?;
            if curve == oid::SECP256R1 {
                Ok(PublicKeyFormat::EcdsaP256)
            }
            else if curve == oid::SECP384R1 {
                Ok(PublicKeyFormat::EcdsaP384)
            }
            else {
                Err(cons.content_err("unsupported elliptic curve"))
            }
        }
        else {
            Err(cons.content_err("unsupported public key algorithm"))
        }
    }

    /// Provides an encoder for the algorihm identifier.
    pub fn encode(self) -> impl encode::Values {
        match self {
            PublicKeyFormat::Rsa => {
                encode::Choice3::One(
                    encode::sequence((
                        oid::RSA_ENCRYPTION.encode(),
                        ().encode(),
                    ))
                )
            }
            PublicKeyFormat::EcdsaP256 => {
                encode::Choice3::Two(
                    encode::sequence((
                        oid::EC_PUBLIC_KEY.encode(),
                        oid::SECP256R1.encode(),
                    ))
                )
            }
            PublicKeyFormat::EcdsaP384 => {
                encode::Choice3::Three(
                    encode::sequence((
                        oid::EC_PUBLIC_KEY.encode(),
                        oid::SECP384R1.encode(),
                    ))
                )
            }
        }
    }
}


//--- Display

impl fmt::Display for PublicKeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            PublicKeyFormat::Rsa => "RSA",
            PublicKeyFormat::EcdsaP256 => "ECDSA P-256",
            PublicKeyFormat::EcdsaP384 => "ECDSA P-384",
        })
    }
}


//------------ PublicKey -----------------------------------------------------

/// A public key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKey {
    algorithm: PublicKeyFormat,
    bits: Bytes,
}

impl PublicKey {
    /// Creates a public key from its format and the subject public key.
    ///
    /// For RSA, `bits` is the DER encoded `RSAPublicKey`. For ECDSA, it is
    /// the uncompressed curve point.
    pub fn new(algorithm: PublicKeyFormat, bits: Bytes) -> Self {
        PublicKey { algorithm, bits }
    }

    pub fn algorithm(&self) -> PublicKeyFormat {
        self.algorithm
    }

    pub fn bits(&self) -> &[u8] {
        self.bits.as_ref()
    }

    /// Returns the key identifier as the SHA-1 hash of the key bits.
    ///
    /// This is method 1 of section 4.2.1.2 of RFC 5280.
    pub fn key_identifier(&self) -> KeyIdentifier {
        KeyIdentifier::from(sha1_digest(self.bits()).as_ref())
    }

    /// Verifies a signature using this public key.
    ///
    /// The concrete signature scheme follows from the key format and the
    /// digest algorithm of `algorithm`. If that combination isn’t
    /// supported, the unsupported algorithm error is returned.
    pub fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), VerificationError> {
        let alg = algorithm.verification_algorithm(self.algorithm).ok_or(
            VerificationError::unsupported(algorithm, self.algorithm)
        )?;
        alg.verify(
            Input::from(self.bits()),
            Input::from(message),
            Input::from(signature),
        ).map_err(Into::into)
    }
}


/// # As `SubjectPublicKeyInfo`
///
/// Public keys are included in X.509 certificates as `SubjectPublicKeyInfo`
/// structures. As these are contain the same information as `PublicKey`,
/// it can be decoded from and encoded to such sequences.
impl PublicKey {
    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Der.decode(source, Self::take_from)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            Ok(PublicKey {
                algorithm: PublicKeyFormat::take_from(cons)?,
                bits: BitString::take_from(cons)?.octet_bytes(),
            })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.algorithm.encode(),
            BitString::new(0, self.bits.clone()).encode(),
        ))
    }

    /// Returns a bytes values of the encoded the *subjectPublicKeyInfo*.
    pub fn to_info_bytes(&self) -> Bytes {
        self.encode_ref().to_captured(Mode::Der).into_bytes()
    }
}


//------------ KeyIdentifier -------------------------------------------------

/// A key identifier.
///
/// Key identifiers are used in the subject and authority key identifier
/// extensions of certificates and as signer identifiers in CMS. While we
/// generate them as the SHA-1 hash over the public key’s bits, issuers are
/// free to pick any method, so identifiers of any length are accepted.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct KeyIdentifier(Bytes);

impl KeyIdentifier {
    /// Returns an octet slice of the key identifer’s value.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Takes an encoded key identifier from a constructed value.
    ///
    /// ```text
    /// KeyIdentifier ::= OCTET STRING
    /// ```
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_value_if(Tag::OCTET_STRING, Self::from_content)
    }

    /// Parses an encoded key identifer from a encoded content.
    pub fn from_content<S: decode::Source>(
        content: &mut decode::Content<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let res = OctetString::from_content(content)?;
        if res.is_empty() {
            return Err(content.content_err("empty key identifier"))
        }
        Ok(KeyIdentifier(res.into_bytes()))
    }
}


//--- From and FromStr

impl From<&[u8]> for KeyIdentifier {
    fn from(value: &[u8]) -> Self {
        KeyIdentifier(Bytes::copy_from_slice(value))
    }
}

impl From<Bytes> for KeyIdentifier {
    fn from(value: Bytes) -> Self {
        KeyIdentifier(value)
    }
}

impl str::FromStr for KeyIdentifier {
    type Err = RepresentationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match hex::decode(value) {
            Some(res) if !res.is_empty() => Ok(KeyIdentifier(res.into())),
            _ => Err(RepresentationError)
        }
    }
}


//--- AsRef

impl AsRef<[u8]> for KeyIdentifier {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}


//--- Display and Debug

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode_string(self.as_slice()))
    }
}

impl fmt::Debug for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyIdentifier({})", self)
    }
}


//--- PrimitiveContent

impl PrimitiveContent for KeyIdentifier {
    const TAG: Tag = Tag::OCTET_STRING;

    fn encoded_len(&self, _mode: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: io::Write>(
        &self,
        _mode: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(self.0.as_ref())
    }
}


//------------ RepresentationError -------------------------------------------

/// A key identifier string wasn’t a non-empty sequence of hex digits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RepresentationError;

impl fmt::Display for RepresentationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid key identifier representation")
    }
}

impl error::Error for RepresentationError { }


//------------ VerificationError ---------------------------------------------

/// An error happened while verifying a signature.
///
/// Apart from whether the combination of key and algorithm was supported
/// at all, no further information is provided. This is on purpose.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VerificationError {
    unsupported: Option<(SignatureAlgorithm, PublicKeyFormat)>,
}

impl VerificationError {
    fn unsupported(
        algorithm: SignatureAlgorithm, key: PublicKeyFormat
    ) -> Self {
        VerificationError { unsupported: Some((algorithm, key)) }
    }

    /// Returns whether the key and algorithm didn’t fit together.
    pub fn is_unsupported_algorithm(self) -> bool {
        self.unsupported.is_some()
    }
}

impl From<Unspecified> for VerificationError {
    fn from(_: Unspecified) -> Self {
        VerificationError { unsupported: None }
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.unsupported {
            Some((alg, key)) => {
                write!(f, "unsupported signature algorithm {} for {} key",
                    alg, key
                )
            }
            None => f.write_str("signature verification failed")
        }
    }
}

impl error::Error for VerificationError { }


//============ Tests =========================================================
