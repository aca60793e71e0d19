//! A signer keeping its keys in memory.
//!
//! The signer is built atop _ring_ and is mostly useful for tests and
//! tooling that produce signatures with software keys, such as a build
//! pipeline signing its own manifests. It is not needed for verification.

use std::io;
use std::sync::{Arc, RwLock};
use bytes::Bytes;
use ring::rand;
use ring::rand::SecureRandom;
use ring::signature::{self, EcdsaKeyPair, KeyPair as _, RsaKeyPair};
use crate::crypto::digest::DigestAlgorithm;
use super::keys::{PublicKey, PublicKeyFormat};
use super::signer::{KeyError, Signer, SigningError};
use super::signature::{Signature, SignatureAlgorithm};


//------------ SoftSigner ----------------------------------------------------

/// A software signer.
///
/// Keeps the keys in memory. ECDSA keys can be created by the signer
/// itself, RSA keys need to be imported from PKCS#8.
pub struct SoftSigner {
    keys: RwLock<Vec<Arc<KeyPair>>>,
    rng: rand::SystemRandom,
}

impl SoftSigner {
    pub fn new() -> SoftSigner {
        SoftSigner {
            keys: Default::default(),
            rng: rand::SystemRandom::new(),
        }
    }

    /// Imports a key from its unencrypted PKCS#8 DER encoding.
    pub fn key_from_pkcs8(&self, der: &[u8]) -> Result<KeyId, io::Error> {
        self.insert_key(KeyPair::from_pkcs8(der, &self.rng)?)
    }

    /// Imports a key from a PEM encoded “PRIVATE KEY” block.
    pub fn key_from_pem(&self, pem: &[u8]) -> Result<KeyId, io::Error> {
        let pem = pem::parse(pem).map_err(|err| {
            io::Error::new(io::ErrorKind::InvalidData, err)
        })?;
        if pem.tag() != "PRIVATE KEY" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected PKCS#8 private key, got {}", pem.tag())
            ))
        }
        self.key_from_pkcs8(pem.contents())
    }

    fn insert_key(&self, key: KeyPair) -> Result<KeyId, io::Error> {
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        let res = keys.len();
        keys.push(key.into());
        Ok(KeyId(res))
    }

    fn get_key(&self, id: KeyId) -> Result<Arc<KeyPair>, KeyError<io::Error>> {
        self.keys.read().map_err(|_| poisoned())?.get(id.0).cloned()
            .ok_or(KeyError::KeyNotFound)
    }
}

impl Signer for SoftSigner {
    type KeyId = KeyId;
    type Error = io::Error;

    fn create_key(
        &self, algorithm: PublicKeyFormat
    ) -> Result<Self::KeyId, Self::Error> {
        self.insert_key(KeyPair::generate(algorithm, &self.rng)?)
    }

    fn get_key_info(
        &self,
        id: &Self::KeyId
    ) -> Result<PublicKey, KeyError<Self::Error>> {
        Ok(self.get_key(*id)?.public_key())
    }

    fn sign<D: AsRef<[u8]> + ?Sized>(
        &self,
        key: &Self::KeyId,
        algorithm: SignatureAlgorithm,
        data: &D
    ) -> Result<Signature, SigningError<Self::Error>> {
        self.get_key(*key)?.sign(algorithm, data.as_ref(), &self.rng)
    }

    fn rand(&self, target: &mut [u8]) -> Result<(), Self::Error> {
        self.rng.fill(target).map_err(|_|
            io::Error::new(io::ErrorKind::Other, "rng error")
        )
    }
}


impl Default for SoftSigner {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "key store lock poisoned")
}


//------------ KeyId ---------------------------------------------------------

/// This signer’s key identifier.
//
//  We wrap this in a newtype so that people won’t start mucking about with
//  the integers.
#[derive(Clone, Copy, Debug)]
pub struct KeyId(usize);


//------------ KeyPair -------------------------------------------------------

/// A key pair kept by the signer.
enum KeyPair {
    Rsa(RsaKeyPair),
    Ecdsa(PublicKeyFormat, EcdsaKeyPair),
}

impl KeyPair {
    fn generate(
        algorithm: PublicKeyFormat, rng: &rand::SystemRandom
    ) -> Result<Self, io::Error> {
        let alg = match algorithm {
            PublicKeyFormat::EcdsaP256 => {
                &signature::ECDSA_P256_SHA256_ASN1_SIGNING
            }
            PublicKeyFormat::EcdsaP384 => {
                &signature::ECDSA_P384_SHA384_ASN1_SIGNING
            }
            PublicKeyFormat::Rsa => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "RSA keys cannot be generated, import them instead"
                ))
            }
        };
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(alg, rng).map_err(|_| {
            io::Error::new(io::ErrorKind::Other, "key generation failed")
        })?;
        let key = EcdsaKeyPair::from_pkcs8(
            alg, pkcs8.as_ref(), rng
        ).map_err(rejected)?;
        Ok(KeyPair::Ecdsa(algorithm, key))
    }

    fn from_pkcs8(
        der: &[u8], rng: &rand::SystemRandom
    ) -> Result<Self, io::Error> {
        if let Ok(key) = EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P256_SHA256_ASN1_SIGNING, der, rng
        ) {
            return Ok(KeyPair::Ecdsa(PublicKeyFormat::EcdsaP256, key))
        }
        if let Ok(key) = EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P384_SHA384_ASN1_SIGNING, der, rng
        ) {
            return Ok(KeyPair::Ecdsa(PublicKeyFormat::EcdsaP384, key))
        }
        RsaKeyPair::from_pkcs8(der).map(KeyPair::Rsa).map_err(rejected)
    }

    fn public_key(&self) -> PublicKey {
        match *self {
            KeyPair::Rsa(ref key) => {
                PublicKey::new(
                    PublicKeyFormat::Rsa,
                    Bytes::copy_from_slice(key.public_key().as_ref())
                )
            }
            KeyPair::Ecdsa(format, ref key) => {
                PublicKey::new(
                    format,
                    Bytes::copy_from_slice(key.public_key().as_ref())
                )
            }
        }
    }

    fn sign(
        &self,
        algorithm: SignatureAlgorithm,
        data: &[u8],
        rng: &rand::SystemRandom,
    ) -> Result<Signature, SigningError<io::Error>> {
        let value = match (self, algorithm) {
            (KeyPair::Rsa(key), SignatureAlgorithm::RsaPkcs1(digest)) => {
                let padding = rsa_padding(digest).ok_or(
                    SigningError::IncompatibleKey
                )?;
                let mut res = vec![0u8; key.public().modulus_len()];
                key.sign(padding, rng, data, &mut res).map_err(|_| {
                    io::Error::new(io::ErrorKind::Other, "signing failed")
                })?;
                Bytes::from(res)
            }
            (
                KeyPair::Ecdsa(format, key),
                SignatureAlgorithm::Ecdsa(digest)
            ) => {
                // Each key pair is bound to the digest of its curve.
                let expected = match format {
                    PublicKeyFormat::EcdsaP384 => DigestAlgorithm::Sha384,
                    _ => DigestAlgorithm::Sha256,
                };
                if digest != expected {
                    return Err(SigningError::IncompatibleKey)
                }
                let sig = key.sign(rng, data).map_err(|_| {
                    io::Error::new(io::ErrorKind::Other, "signing failed")
                })?;
                Bytes::copy_from_slice(sig.as_ref())
            }
            _ => return Err(SigningError::IncompatibleKey)
        };
        Ok(Signature::new(algorithm, value))
    }
}

fn rsa_padding(
    digest: DigestAlgorithm
) -> Option<&'static dyn signature::RsaEncoding> {
    match digest {
        DigestAlgorithm::Sha256 => Some(&signature::RSA_PKCS1_SHA256),
        DigestAlgorithm::Sha384 => Some(&signature::RSA_PKCS1_SHA384),
        DigestAlgorithm::Sha512 => Some(&signature::RSA_PKCS1_SHA512),
        DigestAlgorithm::Sha1 => None,
    }
}

fn rejected(err: ring::error::KeyRejected) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}


//============ Tests =========================================================

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn info_and_sign() {
        let s = SoftSigner::new();
        let ki = s.create_key(PublicKeyFormat::EcdsaP256).unwrap();
        let data = b"foobar";
        let info = s.get_key_info(&ki).unwrap();
        let alg = SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha256);
        let sig = s.sign(&ki, alg, data).unwrap();
        info.verify(alg, data, sig.value()).unwrap();
        assert!(info.verify(alg, b"barfoo", sig.value()).is_err());

        let sig = s.sign_digested(&ki, DigestAlgorithm::Sha256, data).unwrap();
        assert_eq!(sig.algorithm(), alg);
        info.verify(alg, data, sig.value()).unwrap();

        assert!(matches!(
            s.get_key_info(&KeyId(17)), Err(KeyError::KeyNotFound)
        ));
        assert!(matches!(
            s.sign_digested(&KeyId(17), DigestAlgorithm::Sha256, data),
            Err(SigningError::KeyNotFound)
        ));
    }

    #[test]
    fn incompatible_algorithm() {
        let s = SoftSigner::new();
        let ki = s.create_key(PublicKeyFormat::EcdsaP384).unwrap();
        assert!(matches!(
            s.sign(
                &ki, SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha256),
                b"foo"
            ),
            Err(SigningError::IncompatibleKey)
        ));
        assert!(matches!(
            s.sign(
                &ki, SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha256),
                b"foo"
            ),
            Err(SigningError::IncompatibleKey)
        ));
        assert!(s.create_key(PublicKeyFormat::Rsa).is_err());
    }

    #[test]
    fn rsa_from_pem() {
        let s = SoftSigner::new();
        let ki = s.key_from_pem(
            include_bytes!("../../test-data/leaf.key")
        ).unwrap();
        let info = s.get_key_info(&ki).unwrap();
        assert_eq!(info.algorithm(), PublicKeyFormat::Rsa);
        let alg = SignatureAlgorithm::RsaPkcs1(DigestAlgorithm::Sha256);
        let sig = s.sign(&ki, alg, b"foobar").unwrap();
        assert_eq!(sig.value().len(), 256);
        info.verify(alg, b"foobar", sig.value()).unwrap();
    }

    #[test]
    fn ecdsa_from_pkcs8() {
        let s = SoftSigner::new();
        let ki = s.key_from_pkcs8(
            include_bytes!("../../test-data/ec-leaf.pk8")
        ).unwrap();
        let info = s.get_key_info(&ki).unwrap();
        assert_eq!(info.algorithm(), PublicKeyFormat::EcdsaP256);
        let alg = SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha256);
        let sig = s.sign(&ki, alg, b"foobar").unwrap();
        info.verify(alg, b"foobar", sig.value()).unwrap();
    }
}
