//! Signature algorithms and operations.

use std::fmt;
use bcder::{decode, encode};
use bcder::{ConstOid, Oid, Tag};
use bcder::decode::DecodeError;
use bcder::encode::PrimitiveContent;
use bytes::Bytes;
use ring::signature::{self, VerificationAlgorithm};
use crate::oid;
use super::digest::DigestAlgorithm;
use super::keys::PublicKeyFormat;


//------------ SignatureAlgorithm --------------------------------------------

/// A signature algorithm.
///
/// Signature algorithms are a combination of a signature scheme and a
/// digest algorithm. Which concrete parameters are used for the scheme
/// depends on the key, so this type only records the family. The actual
/// algorithm used for verification is determined by combining it with the
/// format of the public key via [`verification_algorithm`].
///
/// [`verification_algorithm`]: Self::verification_algorithm
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureAlgorithm {
    /// RSA with PKCS#1 1.5 padding using the given digest.
    RsaPkcs1(DigestAlgorithm),

    /// ECDSA using the given digest.
    Ecdsa(DigestAlgorithm),
}

impl SignatureAlgorithm {
    /// Returns the algorithm used by a key of the given format.
    ///
    /// This is how CMS signatures are treated: the signer info only
    /// names the digest algorithm reliably, the rest is derived from the
    /// signer’s certificate.
    pub fn for_key(key: PublicKeyFormat, digest: DigestAlgorithm) -> Self {
        match key {
            PublicKeyFormat::Rsa => SignatureAlgorithm::RsaPkcs1(digest),
            PublicKeyFormat::EcdsaP256 | PublicKeyFormat::EcdsaP384 => {
                SignatureAlgorithm::Ecdsa(digest)
            }
        }
    }

    /// Returns the digest algorithm of the signature algorithm.
    pub fn digest_algorithm(self) -> DigestAlgorithm {
        match self {
            SignatureAlgorithm::RsaPkcs1(digest) => digest,
            SignatureAlgorithm::Ecdsa(digest) => digest,
        }
    }

    /// Returns whether a key of the given format can be used.
    pub fn is_compatible(self, key: PublicKeyFormat) -> bool {
        matches!(
            (self, key),
            (SignatureAlgorithm::RsaPkcs1(_), PublicKeyFormat::Rsa)
            | (SignatureAlgorithm::Ecdsa(_), PublicKeyFormat::EcdsaP256)
            | (SignatureAlgorithm::Ecdsa(_), PublicKeyFormat::EcdsaP384)
        )
    }

    /// Returns the verification algorithm for a key of the given format.
    ///
    /// Returns `None` if the combination isn’t supported.
    pub fn verification_algorithm(
        self, key: PublicKeyFormat
    ) -> Option<&'static dyn VerificationAlgorithm> {
        use self::SignatureAlgorithm::*;
        use super::digest::DigestAlgorithm::*;

        Some(match (self, key) {
            (RsaPkcs1(Sha1), PublicKeyFormat::Rsa) => {
                &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY
            }
            (RsaPkcs1(Sha256), PublicKeyFormat::Rsa) => {
                &signature::RSA_PKCS1_2048_8192_SHA256
            }
            (RsaPkcs1(Sha384), PublicKeyFormat::Rsa) => {
                &signature::RSA_PKCS1_2048_8192_SHA384
            }
            (RsaPkcs1(Sha512), PublicKeyFormat::Rsa) => {
                &signature::RSA_PKCS1_2048_8192_SHA512
            }
            (Ecdsa(Sha256), PublicKeyFormat::EcdsaP256) => {
                &signature::ECDSA_P256_SHA256_ASN1
            }
            (Ecdsa(Sha384), PublicKeyFormat::EcdsaP256) => {
                &signature::ECDSA_P256_SHA384_ASN1
            }
            (Ecdsa(Sha256), PublicKeyFormat::EcdsaP384) => {
                &signature::ECDSA_P384_SHA256_ASN1
            }
            (Ecdsa(Sha384), PublicKeyFormat::EcdsaP384) => {
                &signature::ECDSA_P384_SHA384_ASN1
            }
            _ => return None
        })
    }
}


/// # ASN.1 Values
///
/// Signature algorithm identifiers appear in certificates as well as in
/// signer infos of CMS signed data.
///
/// ```txt
/// SignatureAlgorithmIdentifier ::= AlgorithmIdentifier
/// AlgorithmIdentifier          ::= SEQUENCE {
///      algorithm                   OBJECT IDENTIFIER,
///      parameters                  ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// In certificates, the identifier names both the scheme and the digest,
/// e.g., `sha256WithRSAEncryption` from [RFC 4055] or `ecdsa-with-SHA256`
/// from [RFC 5758]. The parameters for the RSA identifiers are NULL or
/// absent, for ECDSA they must be absent.
///
/// In signer infos, RSA signatures are commonly identified by
/// `rsaEncryption` from [RFC 3370] with the digest given separately. Since
/// verification derives the algorithm from the certificate anyway, that
/// identifier is only produced here, never interpreted.
///
/// [RFC 3370]: https://tools.ietf.org/html/rfc3370
/// [RFC 4055]: https://tools.ietf.org/html/rfc4055
/// [RFC 5758]: https://tools.ietf.org/html/rfc5758
impl SignatureAlgorithm {
    /// Takes a signature algorithm identifier for X.509 objects.
    pub fn x509_take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::x509_from_constructed)
    }

    /// Parses the algorithm identifier for X.509 objects.
    fn x509_from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let id = Oid::take_from(cons)?;
        let res = match Self::from_x509_oid(&id) {
            Some(res) => res,
            None => {
                return Err(cons.content_err(
                    "unsupported signature algorithm"
                ))
            }
        };
        if let SignatureAlgorithm::RsaPkcs1(_) = res {
            cons.take_opt_primitive_if(Tag::NULL, |_| Ok(()))?;
        }
        Ok(res)
    }

    fn from_x509_oid(id: &Oid) -> Option<Self> {
        use self::SignatureAlgorithm::*;
        use super::digest::DigestAlgorithm::*;

        if *id == oid::SHA256_WITH_RSA_ENCRYPTION {
            Some(RsaPkcs1(Sha256))
        }
        else if *id == oid::SHA384_WITH_RSA_ENCRYPTION {
            Some(RsaPkcs1(Sha384))
        }
        else if *id == oid::SHA512_WITH_RSA_ENCRYPTION {
            Some(RsaPkcs1(Sha512))
        }
        else if *id == oid::SHA1_WITH_RSA_ENCRYPTION {
            Some(RsaPkcs1(Sha1))
        }
        else if *id == oid::ECDSA_WITH_SHA256 {
            Some(Ecdsa(Sha256))
        }
        else if *id == oid::ECDSA_WITH_SHA384 {
            Some(Ecdsa(Sha384))
        }
        else if *id == oid::ECDSA_WITH_SHA512 {
            Some(Ecdsa(Sha512))
        }
        else if *id == oid::ECDSA_WITH_SHA1 {
            Some(Ecdsa(Sha1))
        }
        else {
            None
        }
    }

    /// Returns the object identifier for X.509 objects.
    fn x509_oid(self) -> ConstOid {
        use self::SignatureAlgorithm::*;
        use super::digest::DigestAlgorithm::*;

        match self {
            RsaPkcs1(Sha1) => oid::SHA1_WITH_RSA_ENCRYPTION,
            RsaPkcs1(Sha256) => oid::SHA256_WITH_RSA_ENCRYPTION,
            RsaPkcs1(Sha384) => oid::SHA384_WITH_RSA_ENCRYPTION,
            RsaPkcs1(Sha512) => oid::SHA512_WITH_RSA_ENCRYPTION,
            Ecdsa(Sha1) => oid::ECDSA_WITH_SHA1,
            Ecdsa(Sha256) => oid::ECDSA_WITH_SHA256,
            Ecdsa(Sha384) => oid::ECDSA_WITH_SHA384,
            Ecdsa(Sha512) => oid::ECDSA_WITH_SHA512,
        }
    }

    /// Provides an encoder for X.509 objects.
    pub fn x509_encode(self) -> impl encode::Values {
        encode::sequence((
            self.x509_oid().encode(),
            match self {
                SignatureAlgorithm::RsaPkcs1(_) => Some(().encode()),
                SignatureAlgorithm::Ecdsa(_) => None,
            }
        ))
    }

    /// Provides an encoder for the identifier in CMS signer infos.
    ///
    /// For RSA this is `rsaEncryption` with NULL parameters, for ECDSA the
    /// same identifier as for X.509 objects.
    pub fn cms_encode(self) -> impl encode::Values {
        match self {
            SignatureAlgorithm::RsaPkcs1(_) => {
                encode::Choice2::One(
                    encode::sequence((
                        oid::RSA_ENCRYPTION.encode(),
                        ().encode(),
                    ))
                )
            }
            SignatureAlgorithm::Ecdsa(_) => {
                encode::Choice2::Two(self.x509_encode())
            }
        }
    }
}


//--- Display

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SignatureAlgorithm::RsaPkcs1(digest) => {
                write!(f, "RSA PKCS#1 v1.5 with {}", digest)
            }
            SignatureAlgorithm::Ecdsa(digest) => {
                write!(f, "ECDSA with {}", digest)
            }
        }
    }
}


//------------ Signature -----------------------------------------------------

/// A signature value together with the algorithm that created it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature {
    algorithm: SignatureAlgorithm,
    value: Bytes
}

impl Signature {
    pub fn new(algorithm: SignatureAlgorithm, value: Bytes) -> Self {
        Signature { algorithm, value }
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn unwrap(self) -> (SignatureAlgorithm, Bytes) {
        (self.algorithm, self.value)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use bcder::Mode;
    use bcder::encode::Values;

    #[test]
    fn derive_from_key_and_digest() {
        assert_eq!(
            SignatureAlgorithm::for_key(
                PublicKeyFormat::Rsa, DigestAlgorithm::Sha384
            ),
            SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha384)
        );
        let ecdsa = SignatureAlgorithm::for_key(
            PublicKeyFormat::EcdsaP384, DigestAlgorithm::Sha256
        );
        assert!(ecdsa.verification_algorithm(PublicKeyFormat::EcdsaP384)
            .is_some());
        assert!(ecdsa.verification_algorithm(PublicKeyFormat::Rsa).is_none());
        assert!(
            SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha512)
                .verification_algorithm(PublicKeyFormat::EcdsaP256)
                .is_none()
        );
        assert!(!ecdsa.is_compatible(PublicKeyFormat::Rsa));
    }

    #[test]
    fn x509_identifiers() {
        for alg in [
            SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha256),
            SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha512),
            SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha384),
            SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha1),
        ] {
            let encoded = alg.x509_encode().to_captured(Mode::Der);
            assert_eq!(
                Mode::Der.decode(
                    encoded.as_slice(), SignatureAlgorithm::x509_take_from
                ).unwrap(),
                alg
            );
        }

        // sha256WithRSAEncryption without the NULL parameters.
        let der = b"\x30\x0b\x06\x09\x2a\x86\x48\x86\xf7\x0d\x01\x01\x0b";
        assert_eq!(
            Mode::Der.decode(
                der.as_ref(), SignatureAlgorithm::x509_take_from
            ).unwrap(),
            SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha256)
        );
    }
}
