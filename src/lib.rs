//! Signed container image manifests.
//!
//! Before a deployment is admitted to a cluster, the manifests of its
//! container images have to be shown to be signed by a trusted authority.
//! The signatures are detached CMS signed data objects created by a signing
//! service and collected in a JSON signature bundle stored next to the
//! images of a repository.
//!
//! This crate contains everything needed to check such signatures. The
//! [`validator`] module is the entry point: given a manifest and a bundle,
//! [`validate_manifest_signature`] returns the digest to pin the image to
//! if and only if the bundle contains a valid signature for the manifest.
//! The [`admission`] module uses it to turn deployments into JSON patches.
//!
//! The building blocks are available, too. The [`cms`] module parses,
//! verifies, and creates CMS signed data objects and RFC 3161 timestamp
//! tokens. Certificates live in [`cert`] and chains are built by the
//! [`chain`] module. The [`crypto`] module provides digests, public keys,
//! and a software signer.

pub use self::error::{ErrorKind, Stage, ValidationError};
pub use self::validator::{Validator, validate_manifest_signature};

pub mod admission;
pub mod bundle;
pub mod cert;
pub mod chain;
pub mod cms;
pub mod config;
pub mod crypto;
pub mod error;
pub mod oid;
pub mod util;
pub mod validator;
pub mod x509;
