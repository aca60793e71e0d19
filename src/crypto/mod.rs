//! Digests, keys, and signatures.
//!
//! Verification only needs the digest, key, and signature types. Creating
//! signatures happens through the [`Signer`] trait, with [`SoftSigner`]
//! as an implementation keeping keys in memory.

pub use self::digest::{
    Digest, DigestAlgorithm, DigestIdentifier, digest_of, sha256_hex
};
pub use self::keys::{
    KeyIdentifier, PublicKey, PublicKeyFormat, VerificationError
};
pub use self::signer::{KeyError, Signer, SigningError};
pub use self::signature::{Signature, SignatureAlgorithm};
pub use self::softsigner::SoftSigner;

pub mod digest;
pub mod keys;
pub mod signer;
pub mod signature;
pub mod softsigner;
