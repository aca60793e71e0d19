//! Building and verifying certificate chains.
//!
//! A chain runs from a leaf certificate through zero or more intermediate
//! certificates to a trust anchor. The anchors and the intermediates are
//! kept in [`CertPool`]s which, together with the reference time and the
//! required key purpose, make up the [`VerifyOptions`].

use std::{error, fmt, slice};
use log::debug;
use crate::cert::{Cert, CertDecodeError, KeyUsage};
use crate::oid;
use crate::x509::{Time, ValidityPeriodError};


/// The maximum number of certificates in a chain, including the leaf.
const MAX_CHAIN_LEN: usize = 10;


//------------ CertPool ------------------------------------------------------

/// A set of certificates.
///
/// Certificates are kept in the order they were added. Adding a
/// certificate that is already present is a no-op.
#[derive(Clone, Debug, Default)]
pub struct CertPool {
    certs: Vec<Cert>,
}

impl CertPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pool from all certificates in PEM encoded data.
    pub fn from_pem(pem: &[u8]) -> Result<Self, CertDecodeError> {
        let mut res = Self::new();
        res.extend(Cert::from_pem_bundle(pem)?);
        Ok(res)
    }

    pub fn push(&mut self, cert: Cert) {
        if !self.contains(&cert) {
            self.certs.push(cert)
        }
    }

    /// Returns whether a certificate with identical encoding is present.
    pub fn contains(&self, cert: &Cert) -> bool {
        self.certs.iter().any(|item| item == cert)
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Cert> {
        self.certs.iter()
    }

    /// Returns the certificates that claim to have issued `cert`.
    pub fn issuers_of<'a>(
        &'a self, cert: &'a Cert
    ) -> impl Iterator<Item = &'a Cert> + 'a {
        self.certs.iter().filter(move |item| cert.claims_issuer(item))
    }
}

impl Extend<Cert> for CertPool {
    fn extend<T: IntoIterator<Item = Cert>>(&mut self, iter: T) {
        iter.into_iter().for_each(|cert| self.push(cert))
    }
}

impl FromIterator<Cert> for CertPool {
    fn from_iter<T: IntoIterator<Item = Cert>>(iter: T) -> Self {
        let mut res = Self::new();
        res.extend(iter);
        res
    }
}

impl<'a> IntoIterator for &'a CertPool {
    type Item = &'a Cert;
    type IntoIter = slice::Iter<'a, Cert>;

    fn into_iter(self) -> Self::IntoIter {
        self.certs.iter()
    }
}


//------------ ReferenceTime -------------------------------------------------

/// The time at which certificates need to be valid.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReferenceTime {
    /// The current wall-clock time.
    #[default]
    Now,

    /// A fixed point in time.
    At(Time),

    /// Validity periods are not checked at all.
    Unchecked,
}

impl ReferenceTime {
    /// Returns the actual time to check against, if any.
    pub fn resolve(self) -> Option<Time> {
        match self {
            ReferenceTime::Now => Some(Time::now()),
            ReferenceTime::At(time) => Some(time),
            ReferenceTime::Unchecked => None,
        }
    }
}

impl From<Time> for ReferenceTime {
    fn from(time: Time) -> Self {
        ReferenceTime::At(time)
    }
}


//------------ KeyPurpose ----------------------------------------------------

/// The purpose a leaf certificate must be valid for.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum KeyPurpose {
    /// Any purpose, the extended key usage is not checked.
    #[default]
    Any,

    /// Signing code and other artifacts.
    CodeSigning,

    /// Issuing RFC 3161 timestamps.
    TimeStamping,
}

impl KeyPurpose {
    /// Returns whether a certificate may be used for this purpose.
    ///
    /// A certificate without the Extended Key Usage extension or with the
    /// `anyExtendedKeyUsage` purpose may be used for everything.
    pub fn is_permitted_by(self, cert: &Cert) -> bool {
        let purpose = match self {
            KeyPurpose::Any => return true,
            KeyPurpose::CodeSigning => &oid::KP_CODE_SIGNING,
            KeyPurpose::TimeStamping => &oid::KP_TIME_STAMPING,
        };
        match cert.extended_key_usage() {
            Some(eku) => eku.is_any() || eku.contains(purpose),
            None => true,
        }
    }
}

impl fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            KeyPurpose::Any => "any",
            KeyPurpose::CodeSigning => "code signing",
            KeyPurpose::TimeStamping => "time stamping",
        })
    }
}


//------------ VerifyOptions -------------------------------------------------

/// The parameters for verifying a certificate chain.
#[derive(Clone, Debug, Default)]
pub struct VerifyOptions {
    /// The trust anchors.
    pub roots: CertPool,

    /// Untrusted certificates that may be used to reach an anchor.
    pub intermediates: CertPool,

    /// The time at which all certificates of the chain must be valid.
    pub current_time: ReferenceTime,

    /// The purpose the chain needs to be valid for.
    pub key_usage: KeyPurpose,
}

impl VerifyOptions {
    /// Creates options with the given trust anchors and defaults otherwise.
    pub fn with_roots(roots: CertPool) -> Self {
        VerifyOptions { roots, ..Default::default() }
    }

    /// Builds a chain from `leaf` to one of the trust anchors.
    ///
    /// The first chain found is returned. If there is none, the error
    /// describes the reason the most promising candidate failed.
    pub fn build_chain(&self, leaf: &Cert) -> Result<Chain, ChainError> {
        let now = self.current_time.resolve();
        if let Some(now) = now {
            leaf.verify_validity(now).map_err(ChainError::Validity)?;
        }
        if !self.key_usage.is_permitted_by(leaf) {
            return Err(ChainError::UsageMismatch(self.key_usage))
        }
        if self.roots.contains(leaf) {
            return Ok(Chain(vec![leaf.clone()]))
        }
        let mut path = vec![leaf.clone()];
        self.extend_path(&mut path, now)?;
        debug!(
            "built chain of {} certificates for {}",
            path.len(), leaf.subject()
        );
        Ok(Chain(path))
    }

    /// Tries to extend `path` until it reaches an anchor.
    ///
    /// On success, `path` contains the complete chain.
    fn extend_path(
        &self, path: &mut Vec<Cert>, now: Option<Time>
    ) -> Result<(), ChainError> {
        if path.len() >= MAX_CHAIN_LEN {
            return Err(ChainError::TooLong)
        }
        let Some(cert) = path.last().cloned() else {
            return Err(ChainError::UnknownIssuer)
        };
        let mut err = ChainError::UnknownIssuer;
        let candidates = self.roots.issuers_of(&cert).map(|c| (c, true))
            .chain(self.intermediates.issuers_of(&cert).map(|c| (c, false)));
        for (candidate, is_root) in candidates {
            if path.contains(candidate) {
                continue
            }
            // Intermediates below the candidate, the leaf doesn’t count.
            let depth = path.len() - 1;
            if let Err(candidate_err) = self.check_issuer(
                &cert, candidate, depth, now
            ) {
                debug!(
                    "rejected {} as issuer of {}: {}",
                    candidate.subject(), cert.subject(), candidate_err
                );
                err = candidate_err;
                continue
            }
            path.push(candidate.clone());
            if is_root {
                return Ok(())
            }
            match self.extend_path(path, now) {
                Ok(()) => return Ok(()),
                Err(path_err) => {
                    err = path_err;
                    path.pop();
                }
            }
        }
        Err(err)
    }

    /// Checks whether `issuer` can be the issuer of `cert`.
    fn check_issuer(
        &self,
        cert: &Cert,
        issuer: &Cert,
        depth: usize,
        now: Option<Time>,
    ) -> Result<(), ChainError> {
        if !issuer.is_ca() {
            return Err(ChainError::NotCa)
        }
        if let Some(usage) = issuer.key_usage() {
            if !usage.contains(KeyUsage::KEY_CERT_SIGN) {
                return Err(ChainError::NotCa)
            }
        }
        if let Some(len) = issuer.path_len() {
            if depth as u64 > len {
                return Err(ChainError::PathLenExceeded)
            }
        }
        if let Some(now) = now {
            issuer.verify_validity(now).map_err(ChainError::Validity)?;
        }
        if !self.key_usage.is_permitted_by(issuer) {
            return Err(ChainError::UsageMismatch(self.key_usage))
        }
        cert.verify_signature(issuer).map_err(|_| ChainError::BadSignature)
    }
}


//------------ Chain ---------------------------------------------------------

/// A verified certificate chain.
///
/// The chain starts with the leaf and ends with the trust anchor. If the
/// leaf itself is an anchor, the chain consists of the leaf only.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Chain(Vec<Cert>);

impl Chain {
    pub fn leaf(&self) -> &Cert {
        &self.0[0]
    }

    pub fn anchor(&self) -> &Cert {
        &self.0[self.0.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> slice::Iter<'_, Cert> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Cert> {
        self.0
    }
}

impl AsRef<[Cert]> for Chain {
    fn as_ref(&self) -> &[Cert] {
        self.0.as_ref()
    }
}


//------------ ChainError ----------------------------------------------------

/// The reason a chain could not be built.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChainError {
    /// No issuer leads to a trust anchor.
    UnknownIssuer,

    /// A certificate isn’t valid at the reference time.
    Validity(ValidityPeriodError),

    /// A certificate isn’t allowed for the requested purpose.
    UsageMismatch(KeyPurpose),

    /// An issuing certificate isn’t a CA certificate.
    NotCa,

    /// An issuer’s path length constraint is violated.
    PathLenExceeded,

    /// A certificate’s signature didn’t verify with the issuer’s key.
    BadSignature,

    /// The chain exceeds the maximum length.
    TooLong,
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ChainError::UnknownIssuer => {
                f.write_str("certificate signed by unknown authority")
            }
            ChainError::Validity(err) => err.fmt(f),
            ChainError::UsageMismatch(purpose) => {
                write!(f, "certificate not valid for {}", purpose)
            }
            ChainError::NotCa => {
                f.write_str("issuing certificate is not a CA")
            }
            ChainError::PathLenExceeded => {
                f.write_str("path length constraint exceeded")
            }
            ChainError::BadSignature => {
                f.write_str("certificate signature invalid")
            }
            ChainError::TooLong => f.write_str("certificate chain too long"),
        }
    }
}

impl error::Error for ChainError { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn cert(pem: &[u8]) -> Cert {
        Cert::from_pem(pem).unwrap()
    }

    fn root() -> Cert {
        cert(include_bytes!("../test-data/root.pem"))
    }

    fn inter() -> Cert {
        cert(include_bytes!("../test-data/inter.pem"))
    }

    fn options(purpose: KeyPurpose) -> VerifyOptions {
        VerifyOptions {
            roots: [root()].into_iter().collect(),
            intermediates: [inter()].into_iter().collect(),
            current_time: ReferenceTime::At(
                Time::utc(2026, 10, 18, 12, 0, 0).unwrap()
            ),
            key_usage: purpose,
        }
    }

    #[test]
    fn pool_dedup() {
        let mut pool = CertPool::from_pem(
            include_bytes!("../test-data/ca.pem")
        ).unwrap();
        assert_eq!(pool.len(), 2);
        pool.push(root());
        assert_eq!(pool.len(), 2);
        assert!(pool.contains(&inter()));
        assert_eq!(pool.issuers_of(&inter()).count(), 1);
    }

    #[test]
    fn code_signing_chain() {
        let leaf = cert(include_bytes!("../test-data/leaf.pem"));
        let chain = options(KeyPurpose::CodeSigning).build_chain(
            &leaf
        ).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.leaf(), &leaf);
        assert_eq!(chain.anchor(), &root());
    }

    #[test]
    fn usage_mismatch() {
        let server = cert(include_bytes!("../test-data/server.pem"));
        assert!(
            server.extended_key_usage().unwrap().contains(&oid::KP_SERVER_AUTH)
        );
        assert_eq!(
            options(KeyPurpose::CodeSigning).build_chain(&server),
            Err(ChainError::UsageMismatch(KeyPurpose::CodeSigning))
        );
        assert!(options(KeyPurpose::Any).build_chain(&server).is_ok());
        let tsa = cert(include_bytes!("../test-data/tsa.pem"));
        assert!(
            options(KeyPurpose::TimeStamping).build_chain(&tsa).is_ok()
        );
    }

    #[test]
    fn unknown_issuer() {
        let rogue = cert(include_bytes!("../test-data/rogue-leaf.pem"));
        assert_eq!(
            options(KeyPurpose::CodeSigning).build_chain(&rogue),
            Err(ChainError::UnknownIssuer)
        );

        // Without the intermediate there is no path either.
        let leaf = cert(include_bytes!("../test-data/leaf.pem"));
        let mut opts = options(KeyPurpose::CodeSigning);
        opts.intermediates = CertPool::new();
        assert_eq!(opts.build_chain(&leaf), Err(ChainError::UnknownIssuer));
    }

    #[test]
    fn validity_window() {
        let leaf = cert(include_bytes!("../test-data/leaf.pem"));
        let mut opts = options(KeyPurpose::CodeSigning);
        opts.current_time = ReferenceTime::At(
            Time::utc(2051, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(matches!(
            opts.build_chain(&leaf), Err(ChainError::Validity(_))
        ));
        opts.current_time = ReferenceTime::Unchecked;
        assert!(opts.build_chain(&leaf).is_ok());
    }

    #[test]
    fn anchor_as_leaf() {
        let opts = options(KeyPurpose::Any);
        let chain = opts.build_chain(&root()).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn issuer_must_be_ca() {
        use crate::cert::TbsCert;
        use crate::crypto::{
            DigestAlgorithm, PublicKeyFormat, SignatureAlgorithm, Signer,
            SoftSigner,
        };
        use crate::x509::{Name, Validity};

        let signer = SoftSigner::new();
        let alg = SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha256);
        let validity = Validity::new(
            Time::five_minutes_ago(), Time::years_from_now(1)
        );
        let issuer_key = signer.create_key(PublicKeyFormat::EcdsaP256)
            .unwrap();
        let issuer_name = Name::from_parts(None, "Not A CA");
        let mut issuer = TbsCert::new(
            1u64.into(), alg, issuer_name.clone(), validity,
            issuer_name.clone(), signer.get_key_info(&issuer_key).unwrap(),
        );
        issuer.set_basic_ca(Some(false));
        let issuer = issuer.into_cert(&signer, &issuer_key).unwrap();

        let leaf_key = signer.create_key(PublicKeyFormat::EcdsaP256)
            .unwrap();
        let leaf = TbsCert::new(
            2u64.into(), alg, issuer_name, validity,
            Name::from_parts(None, "Leaf"),
            signer.get_key_info(&leaf_key).unwrap(),
        ).into_cert(&signer, &issuer_key).unwrap();

        let opts = VerifyOptions::with_roots(
            [issuer].into_iter().collect()
        );
        assert_eq!(opts.build_chain(&leaf), Err(ChainError::NotCa));
    }
}
