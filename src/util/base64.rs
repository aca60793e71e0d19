//! Handling of Base 64-encoded data.
//!
//! This module provides the flavors of Base 64 used in this crate. Each
//! flavor is a struct that knows how a certain context expects its data to
//! be encoded, so you don’t have to remember the details but just pick the
//! context.
use std::borrow::Cow;
use base64::Engine;
use base64::engine::general_purpose::{GeneralPurpose, STANDARD};

pub use base64::DecodeError;


//------------ Bundle --------------------------------------------------------

/// The flavor used for signatures stored in signature bundles.
///
/// This uses the standard alphabet with padding. When decoding, line
/// breaks are skipped since signing services like to wrap long values.
pub struct Bundle;

impl Bundle {
    const ENGINE: GeneralPurpose = STANDARD;

    pub fn decode(self, input: &str) -> Result<Vec<u8>, DecodeError> {
        let input = if input.contains(&['\r', '\n'][..]) {
            Cow::Owned(input.replace(&['\r', '\n'][..], ""))
        }
        else {
            Cow::Borrowed(input)
        };
        Self::ENGINE.decode(input.as_bytes())
    }

    pub fn encode(self, data: &[u8]) -> String {
        Self::ENGINE.encode(data)
    }
}


//------------ Serde ---------------------------------------------------------

/// The flavor used for binary data in JSON documents.
///
/// This is what the Kubernetes API expects for byte fields. It uses the
/// standard alphabet with padding and no white space allowed.
pub struct Serde;

impl Serde {
    const ENGINE: GeneralPurpose = STANDARD;

    pub fn decode(self, input: &str) -> Result<Vec<u8>, DecodeError> {
        Self::ENGINE.decode(input)
    }

    pub fn encode(self, data: &[u8]) -> String {
        Self::ENGINE.encode(data)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bundle_skips_line_breaks() {
        assert_eq!(
            Bundle.decode("dGVzdC1t\r\nYW5pZmVzdA==\n").unwrap(),
            b"test-manifest"
        );
        assert_eq!(Bundle.encode(b"test-manifest"), "dGVzdC1tYW5pZmVzdA==");
        assert!(Bundle.decode("not base64!").is_err());
    }

    #[test]
    fn serde_rejects_line_breaks() {
        assert_eq!(Serde.decode("dGVzdA==").unwrap(), b"test");
        assert!(Serde.decode("dGVz\ndA==").is_err());
    }
}
