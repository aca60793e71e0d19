//! Digest algorithm and operations.

use std::{fmt, io};
use bcder::{decode, encode};
use bcder::{Captured, ConstOid, Oid};
use bcder::decode::DecodeError;
use bcder::encode::PrimitiveContent;
use bytes::Bytes;
use ring::digest;
use crate::oid;
use crate::util::hex;

// Re-export the things from ring for actual digest generation.
pub use ring::digest::Digest;


//------------ Functions -----------------------------------------------------

/// Returns the canonical digest string for `data`.
///
/// This is the SHA-256 digest of the data as lowercase hex digits with the
/// algorithm name and a colon in front, i.e., `sha256:` followed by 64 hex
/// characters. This is the form registries use for content-addressed image
/// references.
pub fn digest_of(data: &[u8]) -> String {
    format!("{}:{}", DigestAlgorithm::Sha256.name(), sha256_hex(data))
}

/// Returns the SHA-256 digest of `data` as bare lowercase hex digits.
///
/// Signature bundles use this form to identify the artifact a signature
/// record covers.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode_string(DigestAlgorithm::Sha256.digest(data).as_ref())
}

/// Returns the SHA-1 digest of `data`.
///
/// This is only used for deriving key identifiers.
pub fn sha1_digest(data: &[u8]) -> Digest {
    digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, data)
}


//------------ DigestAlgorithm -----------------------------------------------

/// The digest algorithms understood when verifying signatures.
///
/// SHA-1 is only accepted because older signing tools still produce it.
/// The preferred algorithm, returned by the `Default` implementation, is
/// SHA-256.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum DigestAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}


/// # Creating Digest Values
///
impl DigestAlgorithm {
    /// Returns the digest of `data` using this algorithm.
    pub fn digest(self, data: &[u8]) -> Digest {
        digest::digest(self.ring_algorithm(), data)
    }

    /// Returns a digest context for multi-step calculation of the digest.
    pub fn start(self) -> Context {
        Context(digest::Context::new(self.ring_algorithm()))
    }

    /// Returns the length of a digest value in octets.
    pub fn output_len(self) -> usize {
        self.ring_algorithm().output_len()
    }

    /// Returns the conventional lowercase name of the algorithm.
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    fn ring_algorithm(self) -> &'static digest::Algorithm {
        match self {
            DigestAlgorithm::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            DigestAlgorithm::Sha256 => &digest::SHA256,
            DigestAlgorithm::Sha384 => &digest::SHA384,
            DigestAlgorithm::Sha512 => &digest::SHA512,
        }
    }
}


/// # ASN.1 Values
///
/// Digest algorithms appear in CMS either alone or in sets with the following
/// syntax:
///
/// ```txt
/// DigestAlgorithmIdentifiers ::= SET OF DigestAlgorithmIdentifier
/// DigestAlgorithmIdentifier  ::= AlgorithmIdentifier
/// AlgorithmIdentifier        ::= SEQUENCE {
///      algorithm                 OBJECT IDENTIFIER,
///      parameters                ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// The _parameters_ field may either be absent or `NULL`. When encoding,
/// it is always `NULL`.
impl DigestAlgorithm {
    /// Takes and returns a single digest algorithm identifier.
    ///
    /// Returns a malformed error if the algorithm isn’t one of the supported
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
        let id = Oid::take_from(cons)?;
        let res = match Self::from_oid(&id) {
            Some(res) => res,
            None => {
                return Err(cons.content_err(
                    UnsupportedDigestAlgorithm::new(id)
                ))
            }
        };
        cons.take_opt_null()?;
        Ok(res)
    }

    /// Returns the algorithm for the given object identifier if supported.
    pub fn from_oid<T: AsRef<[u8]>>(id: &Oid<T>) -> Option<Self> {
        if *id == oid::SHA256 {
            Some(DigestAlgorithm::Sha256)
        }
        else if *id == oid::SHA384 {
            Some(DigestAlgorithm::Sha384)
        }
        else if *id == oid::SHA512 {
            Some(DigestAlgorithm::Sha512)
        }
        else if *id == oid::SHA1 {
            Some(DigestAlgorithm::Sha1)
        }
        else {
            None
        }
    }

    /// Returns the object identifier of the algorithm.
    pub fn oid(self) -> ConstOid {
        match self {
            DigestAlgorithm::Sha1 => oid::SHA1,
            DigestAlgorithm::Sha256 => oid::SHA256,
            DigestAlgorithm::Sha384 => oid::SHA384,
            DigestAlgorithm::Sha512 => oid::SHA512,
        }
    }

    /// Provides an encoder for a single algorithm identifier.
    pub fn encode(self) -> impl encode::Values {
        encode::sequence((
            self.oid().encode(),
            ().encode(),
        ))
    }
}


//--- Display

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}


//------------ DigestIdentifier ----------------------------------------------

/// A digest algorithm identifier found in a CMS envelope.
///
/// Envelopes may name digest algorithms we can’t calculate. Such an
/// identifier is kept as is so that the envelope still decodes. Whoever
/// needs the digest can then report the algorithm as unsupported.
#[derive(Clone, Debug)]
pub enum DigestIdentifier {
    /// One of the digest algorithms we support.
    Supported(DigestAlgorithm),

    /// Some other algorithm with its parameters, if present.
    Unsupported(Oid<Bytes>, Option<Captured>),
}

impl DigestIdentifier {
    /// Returns the algorithm if it is supported.
    pub fn algorithm(&self) -> Option<DigestAlgorithm> {
        match *self {
            DigestIdentifier::Supported(alg) => Some(alg),
            DigestIdentifier::Unsupported(..) => None,
        }
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    /// Takes a set of identifiers. The set may be empty.
    pub fn take_set_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Vec<Self>, DecodeError<S::Error>> {
        cons.take_set(|cons| {
            let mut res = Vec::new();
            while let Some(id) = cons.take_opt_sequence(
                Self::from_constructed
            )? {
                res.push(id)
            }
            Ok(res)
        })
    }

    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let id = Oid::take_from(cons)?;
        match DigestAlgorithm::from_oid(&id) {
            Some(alg) => {
                cons.take_opt_null()?;
                Ok(DigestIdentifier::Supported(alg))
            }
            None => {
                let params = cons.capture_all()?;
                let params = if params.as_slice().is_empty() {
                    None
                }
                else {
                    Some(params)
                };
                Ok(DigestIdentifier::Unsupported(id, params))
            }
        }
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        match *self {
            DigestIdentifier::Supported(alg) => {
                encode::Choice2::One(alg.encode())
            }
            DigestIdentifier::Unsupported(ref id, ref params) => {
                encode::Choice2::Two(
                    encode::sequence((id.encode_ref(), params.as_ref()))
                )
            }
        }
    }

    pub fn encode_set(ids: &[Self]) -> impl encode::Values + '_ {
        encode::set(encode::iter(ids.iter().map(Self::encode_ref)))
    }
}

impl From<DigestAlgorithm> for DigestIdentifier {
    fn from(alg: DigestAlgorithm) -> Self {
        DigestIdentifier::Supported(alg)
    }
}

impl PartialEq for DigestIdentifier {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                DigestIdentifier::Supported(left),
                DigestIdentifier::Supported(right)
            ) => left == right,
            (
                DigestIdentifier::Unsupported(left, left_params),
                DigestIdentifier::Unsupported(right, right_params)
            ) => {
                left == right
                    && left_params.as_ref().map(Captured::as_slice)
                        == right_params.as_ref().map(Captured::as_slice)
            }
            _ => false
        }
    }
}

impl Eq for DigestIdentifier { }

impl fmt::Display for DigestIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DigestIdentifier::Supported(alg) => fmt::Display::fmt(&alg, f),
            DigestIdentifier::Unsupported(ref id, _) => {
                fmt::Display::fmt(id, f)
            }
        }
    }
}


//------------ Context -------------------------------------------------------

#[derive(Clone)]
pub struct Context(digest::Context);

impl Context {
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data)
    }

    pub fn finish(self) -> Digest {
        self.0.finish()
    }
}

impl io::Write for Context {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}


//------------ UnsupportedDigestAlgorithm ------------------------------------

/// A digest algorithm identifier names an algorithm we don’t support.
#[derive(Clone, Debug)]
pub struct UnsupportedDigestAlgorithm(Oid);

impl UnsupportedDigestAlgorithm {
    fn new(id: Oid) -> Self {
        UnsupportedDigestAlgorithm(id)
    }
}

impl From<UnsupportedDigestAlgorithm> for decode::ContentError {
    fn from(err: UnsupportedDigestAlgorithm) -> Self {
        decode::ContentError::from_boxed(Box::new(err))
    }
}

impl fmt::Display for UnsupportedDigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unsupported digest algorithm {}", self.0)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bcder::Mode;
    use bcder::encode::Values;

    #[test]
    fn digest_of_test_manifest() {
        let res = digest_of(b"test-manifest");
        assert!(res.starts_with("sha256:"));
        assert_eq!(res.len(), "sha256:".len() + 64);
        assert_eq!(&res["sha256:".len()..], sha256_hex(b"test-manifest"));
        assert!(
            res["sha256:".len()..].bytes().all(|ch| {
                ch.is_ascii_digit() || (b'a'..=b'f').contains(&ch)
            })
        );
    }

    #[test]
    fn digest_of_distinguishes_content() {
        assert_eq!(digest_of(b"abc"), digest_of(b"abc"));
        assert_ne!(digest_of(b"abc"), digest_of(b"abd"));
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn context_matches_one_shot() {
        for alg in [
            DigestAlgorithm::Sha1, DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384, DigestAlgorithm::Sha512
        ] {
            let mut ctx = alg.start();
            ctx.update(b"test-");
            ctx.update(b"manifest");
            assert_eq!(
                ctx.finish().as_ref(),
                alg.digest(b"test-manifest").as_ref()
            );
            assert_eq!(alg.digest(b"").as_ref().len(), alg.output_len());
        }
    }

    #[test]
    fn decode_identifiers() {
        // SHA-384 without parameters.
        let der = b"\x30\x0b\x06\x09\x60\x86\x48\x01\x65\x03\x04\x02\x02";
        assert_eq!(
            Mode::Der.decode(der.as_ref(), DigestAlgorithm::take_from)
                .unwrap(),
            DigestAlgorithm::Sha384
        );

        // MD5 is not supported.
        let der = b"\x30\x0c\x06\x08\x2a\x86\x48\x86\xf7\x0d\x02\x05\x05\x00";
        assert!(
            Mode::Der.decode(der.as_ref(), DigestAlgorithm::take_from)
                .is_err()
        );

        let encoded = DigestAlgorithm::Sha256.encode().to_captured(Mode::Der);
        assert_eq!(
            Mode::Der.decode(encoded.as_slice(), DigestAlgorithm::take_from)
                .unwrap(),
            DigestAlgorithm::Sha256
        );
    }

    #[test]
    fn keep_unsupported_identifiers() {
        // MD5 with NULL parameters and SHA-224 without.
        let md5 = b"\x30\x0c\x06\x08\x2a\x86\x48\x86\xf7\x0d\x02\x05\x05\x00";
        let sha224 = b"\x30\x0b\x06\x09\x60\x86\x48\x01\x65\x03\x04\x02\x04";
        for der in [md5.as_ref(), sha224.as_ref()] {
            let id = Mode::Der.decode(
                der, DigestIdentifier::take_from
            ).unwrap();
            assert!(id.algorithm().is_none());
            assert_eq!(
                id.encode_ref().to_captured(Mode::Der).as_slice(), der
            );
        }
        let id = Mode::Der.decode(
            sha224.as_ref(), DigestIdentifier::take_from
        ).unwrap();
        assert_eq!(id.to_string(), "2.16.840.1.101.3.4.2.4");

        let id = DigestIdentifier::from(DigestAlgorithm::Sha384);
        assert_eq!(id.algorithm(), Some(DigestAlgorithm::Sha384));
        assert_eq!(
            Mode::Der.decode(
                id.encode_ref().to_captured(Mode::Der).as_slice(),
                DigestIdentifier::take_from
            ).unwrap(),
            id
        );
    }
}
