//! Cryptographic Message Syntax.
//!
//! Only the signed data content type is supported. [`SignedData`] decodes
//! and encodes envelopes and, via the methods in the `verify` module,
//! checks detached and attached signatures. [`SignedDataBuilder`] creates
//! new envelopes. RFC 3161 timestamp tokens, which are signed data
//! envelopes themselves, live in the [`timestamp`] module.

pub use self::builder::{
    BuildError, SignedDataBuilder, SignerOptions, TimestampTokenBuilder
};
pub use self::signed_data::{
    SignedAttrs, SignedData, SignedMessage, SignerIdentifier, SignerInfo,
    UnsignedAttrs,
};
pub use self::timestamp::{
    Accuracy, CmsTokenValidator, MessageImprint, TrustAnchorValidator,
    TstInfo, verify_timestamp,
};
pub use self::verify::{VerifyError, VerifyErrorKind};

pub mod builder;
pub mod signed_data;
pub mod timestamp;
mod verify;
