//! The interface to whatever holds the private keys.
//!
//! Creating CMS envelopes and timestamp tokens needs private keys. These
//! are never handled directly. Instead, a [`Signer`] keeps them and hands
//! out key identifiers.

use std::{error, fmt};
use super::digest::DigestAlgorithm;
use super::keys::{PublicKey, PublicKeyFormat};
use super::signature::{Signature, SignatureAlgorithm};


//------------ Signer --------------------------------------------------------

/// A key store that can sign.
pub trait Signer {
    /// The identifier of a key in the store.
    type KeyId;

    /// A failure of the store itself.
    type Error: fmt::Debug + fmt::Display;

    /// Generates a new key pair of the given format.
    fn create_key(
        &self,
        format: PublicKeyFormat
    ) -> Result<Self::KeyId, Self::Error>;

    /// Returns the public half of a key.
    fn get_key_info(
        &self,
        key: &Self::KeyId
    ) -> Result<PublicKey, KeyError<Self::Error>>;

    /// Signs `data` with a key using the given algorithm.
    ///
    /// Fails with `IncompatibleKey` if the algorithm can’t be used with
    /// the key.
    fn sign<D: AsRef<[u8]> + ?Sized>(
        &self,
        key: &Self::KeyId,
        algorithm: SignatureAlgorithm,
        data: &D
    ) -> Result<Signature, SigningError<Self::Error>>;

    /// Fills `target` with random bytes.
    fn rand(&self, target: &mut [u8]) -> Result<(), Self::Error>;

    /// Signs `data` using the scheme of the key’s format with `digest`.
    ///
    /// This is how signer infos are signed: the envelope chooses the
    /// digest, the key determines the rest.
    fn sign_digested<D: AsRef<[u8]> + ?Sized>(
        &self,
        key: &Self::KeyId,
        digest: DigestAlgorithm,
        data: &D
    ) -> Result<Signature, SigningError<Self::Error>> {
        let format = self.get_key_info(key)?.algorithm();
        self.sign(key, SignatureAlgorithm::for_key(format, digest), data)
    }
}


//------------ KeyError ------------------------------------------------------

/// Accessing a key failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeyError<S> {
    /// There is no key with this identifier.
    KeyNotFound,

    /// The store failed.
    Signer(S)
}

impl<S> From<S> for KeyError<S> {
    fn from(err: S) -> Self {
        KeyError::Signer(err)
    }
}

impl<S: fmt::Display> fmt::Display for KeyError<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            KeyError::KeyNotFound => f.write_str("unknown key"),
            KeyError::Signer(ref err) => write!(f, "key store: {}", err),
        }
    }
}

impl<S: fmt::Display + fmt::Debug> error::Error for KeyError<S> { }


//------------ SigningError --------------------------------------------------

/// Creating a signature failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SigningError<S> {
    /// There is no key with this identifier.
    KeyNotFound,

    /// The signature algorithm doesn’t fit the key.
    IncompatibleKey,

    /// The store failed.
    Signer(S)
}

impl<S> From<S> for SigningError<S> {
    fn from(err: S) -> Self {
        SigningError::Signer(err)
    }
}

impl<S> From<KeyError<S>> for SigningError<S> {
    fn from(err: KeyError<S>) -> Self {
        match err {
            KeyError::KeyNotFound => SigningError::KeyNotFound,
            KeyError::Signer(err) => SigningError::Signer(err)
        }
    }
}

impl<S: fmt::Display> fmt::Display for SigningError<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SigningError::KeyNotFound => f.write_str("unknown key"),
            SigningError::IncompatibleKey => {
                f.write_str("signature algorithm does not fit the key")
            }
            SigningError::Signer(ref err) => write!(f, "key store: {}", err),
        }
    }
}

impl<S: fmt::Display + fmt::Debug> error::Error for SigningError<S> { }
