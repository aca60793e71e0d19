//! Validating manifest signatures end to end.

use bytes::Bytes;
use bcder::{ConstOid, Oid};
use manifest_sig::{ErrorKind, Stage, Validator, validate_manifest_signature};
use manifest_sig::bundle::{SignatureBundle, SignatureRecord};
use manifest_sig::cert::{Cert, ExtendedKeyUsage, KeyUsage, TbsCert};
use manifest_sig::chain::{CertPool, ReferenceTime, VerifyOptions};
use manifest_sig::cms::{
    SignedData, SignedDataBuilder, SignerOptions, TimestampTokenBuilder,
    VerifyErrorKind,
};
use manifest_sig::crypto::{
    DigestAlgorithm, PublicKeyFormat, SignatureAlgorithm, Signer, SoftSigner,
    sha256_hex,
};
use manifest_sig::crypto::softsigner::KeyId;
use manifest_sig::oid;
use manifest_sig::x509::{Name, Serial, Time, Validity};

const MANIFEST: &[u8] = include_bytes!("../test-data/manifest.bin");


//------------ Fixture Bundles -----------------------------------------------

fn pem(data: &[u8]) -> String {
    String::from_utf8(data.to_vec()).unwrap()
}

fn fixture_record(signature: &[u8]) -> SignatureRecord {
    let mut record = SignatureRecord {
        name: "manifest.json".into(),
        signature_format: "cms-detached".into(),
        hash_alg: "SHA256".into(),
        hash: sha256_hex(MANIFEST),
        sig_id: "fixture".into(),
        certificate: pem(include_bytes!("../test-data/leaf.pem")),
        ca: pem(include_bytes!("../test-data/ca.pem")),
        .. Default::default()
    };
    record.set_signature(signature);
    record
}

fn encode(records: Vec<SignatureRecord>) -> Vec<u8> {
    SignatureBundle {
        signatures: records,
        .. Default::default()
    }.encode().unwrap()
}

fn fixture_time() -> Validator {
    Validator::new().with_time(ReferenceTime::At(
        Time::utc(2026, 10, 18, 12, 0, 0).unwrap()
    ))
}

#[test]
fn fixture_bundle() {
    let bundle = encode(vec![
        fixture_record(include_bytes!("../test-data/manifest.cms"))
    ]);
    let (digest, verified) = validate_manifest_signature(
        MANIFEST, &bundle
    ).unwrap();
    assert!(verified);
    assert_eq!(digest, sha256_hex(MANIFEST));
    assert_eq!(digest.len(), 64);
    assert!(digest.bytes().all(|ch| matches!(ch, b'0'..=b'9' | b'a'..=b'f')));

    // Same inputs, same outcome.
    assert_eq!(
        validate_manifest_signature(MANIFEST, &bundle).unwrap(),
        (digest, true)
    );
}

#[test]
fn first_matching_record_wins() {
    let good = fixture_record(include_bytes!("../test-data/manifest.cms"));
    let mut bad = fixture_record(b"\x30\x00");
    bad.sig_id = "broken".into();

    fixture_time().validate(
        MANIFEST, &encode(vec![good.clone(), bad.clone()])
    ).unwrap();
    let err = fixture_time().validate(
        MANIFEST, &encode(vec![bad, good])
    ).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(err.record().unwrap().sig_id, "broken");
}

#[test]
fn tampered_manifest() {
    let mut record = fixture_record(
        include_bytes!("../test-data/manifest.cms")
    );
    let tampered = b"test-manifesT";
    record.hash = sha256_hex(tampered);
    let err = fixture_time().validate(
        tampered, &encode(vec![record])
    ).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DigestMismatch);
    assert_eq!(err.stage(), Stage::VerifySignature);
}

#[test]
fn fixture_timestamp_token() {
    let token = SignedData::decode(
        Bytes::from_static(include_bytes!("../test-data/manifest.tst"))
    ).unwrap();
    let signed = SignedData::decode(
        Bytes::from_static(include_bytes!("../test-data/manifest.cms"))
    ).unwrap();
    let mut builder = SignedDataBuilder::from_signed_data(signed);
    builder.add_timestamp(0, token).unwrap();
    let signed = builder.finalize();

    let options = VerifyOptions {
        current_time: ReferenceTime::At(
            Time::utc(2026, 10, 18, 20, 0, 0).unwrap()
        ),
        .. VerifyOptions::with_roots(
            CertPool::from_pem(include_bytes!("../test-data/root.pem"))
                .unwrap()
        )
    };
    signed.verify_detached(MANIFEST, &options, None).unwrap();

    // The envelope survives the trip through a bundle.
    let bundle = encode(vec![fixture_record(signed.to_captured().as_slice())]);
    fixture_time().validate(MANIFEST, &bundle).unwrap();
}


//------------ In-memory PKI -------------------------------------------------

/// A root CA, a code signer, and a time-stamping authority.
struct Pki {
    signer: SoftSigner,
    root: Cert,
    leaf_key: KeyId,
    leaf: Cert,
    tsa_key: KeyId,
    tsa: Cert,
}

impl Pki {
    /// Creates a PKI whose code signer was only valid during 2020.
    fn new() -> Self {
        let signer = SoftSigner::new();
        let alg = SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha256);
        let long = Validity::new(
            Time::utc(2019, 1, 1, 0, 0, 0).unwrap(),
            Time::utc(2049, 12, 31, 0, 0, 0).unwrap(),
        );

        let root_key = signer.create_key(PublicKeyFormat::EcdsaP256).unwrap();
        let root_pub = signer.get_key_info(&root_key).unwrap();
        let root_name = Name::from_parts(Some("Test"), "In-memory Root");
        let mut root = TbsCert::new(
            1u64.into(), alg, root_name.clone(), long, root_name,
            root_pub.clone(),
        );
        root.set_basic_ca(Some(true));
        root.set_key_usage(Some(KeyUsage::ca()));
        let root = root.into_cert(&signer, &root_key).unwrap();

        let issue = |
            serial: u64, name: &str, validity: Validity,
            purpose: &'static ConstOid
        | {
            let key = signer.create_key(PublicKeyFormat::EcdsaP256).unwrap();
            let mut tbs = TbsCert::new(
                Serial::from(serial), alg, root.subject().clone(), validity,
                Name::from_parts(Some("Test"), name),
                signer.get_key_info(&key).unwrap(),
            );
            tbs.set_authority_key_identifier(
                Some(root_pub.key_identifier())
            );
            tbs.set_key_usage(Some(KeyUsage::ee()));
            tbs.set_extended_key_usage(
                Some(ExtendedKeyUsage::new(&[purpose]))
            );
            (key, tbs.into_cert(&signer, &root_key).unwrap())
        };
        let (leaf_key, leaf) = issue(
            2, "Expired Code Signer",
            Validity::new(
                Time::utc(2020, 1, 1, 0, 0, 0).unwrap(),
                Time::utc(2021, 1, 1, 0, 0, 0).unwrap(),
            ),
            &oid::KP_CODE_SIGNING,
        );
        let (tsa_key, tsa) = issue(
            3, "Time Stamping Authority", long, &oid::KP_TIME_STAMPING
        );

        Pki { signer, root, leaf_key, leaf, tsa_key, tsa }
    }

    /// Signs the manifest and attaches a token for each generation time.
    fn sign(&self, gen_times: &[Time]) -> SignedData {
        let mut builder = SignedDataBuilder::data(
            Bytes::from_static(MANIFEST)
        );
        builder.add_signer(
            &self.signer, &self.leaf_key, &self.leaf, &[],
            &SignerOptions {
                signing_time: Some(Time::utc(2020, 6, 1, 0, 0, 0).unwrap()),
                .. Default::default()
            }
        ).unwrap();
        builder.detach();
        let signed = builder.finalize();
        let signature = signed.signer_infos()[0].signature().clone();

        let mut builder = SignedDataBuilder::from_signed_data(signed);
        for (serial, gen_time) in gen_times.iter().enumerate() {
            let token = TimestampTokenBuilder::new(
                Oid(Bytes::from_static(&[42, 3, 4, 1])),
                Serial::from(serial as u64 + 1),
                *gen_time,
            ).build(
                signature.as_ref(), &self.signer, &self.tsa_key, &self.tsa,
                &[]
            ).unwrap();
            builder.add_timestamp(0, token).unwrap();
        }
        builder.finalize()
    }

    fn record(&self, signed: &SignedData) -> SignatureRecord {
        let mut record = SignatureRecord {
            name: "manifest.json".into(),
            signature_format: "pkcs7-detached".into(),
            hash_alg: "SHA256".into(),
            hash: sha256_hex(MANIFEST),
            sig_id: "in-memory".into(),
            certificate: self.leaf.to_pem(),
            ca: self.root.to_pem(),
            .. Default::default()
        };
        record.set_signature(signed.to_captured().as_slice());
        record
    }

    fn options(&self, time: ReferenceTime) -> VerifyOptions {
        VerifyOptions {
            current_time: time,
            .. VerifyOptions::with_roots(
                [self.root.clone()].into_iter().collect()
            )
        }
    }
}

fn mid_2020() -> Time {
    Time::utc(2020, 6, 1, 12, 0, 0).unwrap()
}

#[test]
fn expired_signer_without_timestamp() {
    let pki = Pki::new();
    let signed = pki.sign(&[]);
    let err = signed.verify_detached(
        MANIFEST, &pki.options(ReferenceTime::Now), None
    ).unwrap_err();
    assert_eq!(err.kind(), VerifyErrorKind::UntrustedCertificate);

    // Still fine back when the certificate was valid.
    signed.verify_detached(
        MANIFEST, &pki.options(ReferenceTime::At(mid_2020())), None
    ).unwrap();

    let err = Validator::new().validate(
        MANIFEST, &encode(vec![pki.record(&signed)])
    ).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UntrustedCertificate);
    assert_eq!(err.stage(), Stage::VerifySignature);
}

#[test]
fn timestamp_moves_reference_time() {
    let pki = Pki::new();
    let signed = pki.sign(&[mid_2020()]);
    let chains = signed.verify_detached(
        MANIFEST, &pki.options(ReferenceTime::Now), None
    ).unwrap();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].anchor(), &pki.root);

    let (digest, verified) = Validator::new().validate(
        MANIFEST, &encode(vec![pki.record(&signed)])
    ).unwrap();
    assert!(verified);
    assert_eq!(digest, sha256_hex(MANIFEST));

    // An explicit time is never overridden.
    let err = signed.verify_detached(
        MANIFEST,
        &pki.options(ReferenceTime::At(
            Time::utc(2026, 10, 18, 12, 0, 0).unwrap()
        )),
        None
    ).unwrap_err();
    assert_eq!(err.kind(), VerifyErrorKind::UntrustedCertificate);
}

#[test]
fn timestamp_outside_validity() {
    let pki = Pki::new();
    let signed = pki.sign(&[Time::utc(2022, 3, 1, 0, 0, 0).unwrap()]);
    let err = signed.verify_detached(
        MANIFEST, &pki.options(ReferenceTime::Now), None
    ).unwrap_err();
    assert_eq!(err.kind(), VerifyErrorKind::UntrustedCertificate);
    assert_eq!(err.signer(), Some(0));
}

#[test]
fn two_timestamps() {
    let pki = Pki::new();
    let signed = pki.sign(&[mid_2020(), mid_2020()]);
    assert_eq!(signed.signer_infos()[0].timestamp_tokens().len(), 2);
    let err = signed.verify_detached(
        MANIFEST, &pki.options(ReferenceTime::Now), None
    ).unwrap_err();
    assert_eq!(err.kind(), VerifyErrorKind::MalformedAttributes);

    let err = Validator::new().validate(
        MANIFEST, &encode(vec![pki.record(&signed)])
    ).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedAttributes);
}

#[test]
fn extra_trust_anchors() {
    let pki = Pki::new();
    let signed = pki.sign(&[mid_2020()]);
    let mut record = pki.record(&signed);
    record.ca = String::new();

    let err = Validator::new().validate(
        MANIFEST, &encode(vec![record.clone()])
    ).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UntrustedCertificate);
    assert_eq!(err.stage(), Stage::VerifyCertificate);

    let validator = Validator::new().with_trust_anchors(
        [pki.root.clone()].into_iter().collect()
    );
    validator.validate(MANIFEST, &encode(vec![record])).unwrap();
}
