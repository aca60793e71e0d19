#![no_main]

use libfuzzer_sys::fuzz_target;
use manifest_sig::bundle::SignatureBundle;
use manifest_sig::cert::Cert;
use manifest_sig::cms::{SignedData, TstInfo};

fuzz_target!(|data: &[u8]| {
    let (which, data) = match data.split_first() {
        Some((first, data)) => (*first, data),
        None => return,
    };

    match which % 5 {
        0 => { let _ = Cert::decode(data); },
        1 => { let _ = SignedData::decode(data); },
        2 => { let _ = TstInfo::decode(data); },
        3 => { let _ = Cert::from_pem_bundle(data); },
        4 => { let _ = SignatureBundle::decode(data); },
        _ => panic!("what?"),
    }
});
