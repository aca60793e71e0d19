//! Converting from and to hex strings.

use std::str;


/// Encodes a octet sequence as a lowercase hex string.
///
/// The function uses `dest` as the buffer for encoding which therefore must
/// be exactly twice the length of `src`. It returns a reference to this
/// buffer as a `&str`.
///
/// # Panics
///
/// The function panics if `dest` is shorter than twice the length of `src`.
pub fn encode<'a>(src: &[u8], dest: &'a mut [u8]) -> &'a str {
    let dest = &mut dest[..src.len() * 2];
    for (s, d) in src.iter().zip(dest.chunks_mut(2)) {
        d.copy_from_slice(&encode_u8(*s));
    }
    // Only ASCII digits have been written.
    unsafe { str::from_utf8_unchecked(dest) }
}

/// Encodes a octet sequence into a newly allocated lowercase hex string.
pub fn encode_string(src: &[u8]) -> String {
    let mut res = vec![0u8; src.len() * 2];
    encode(src, &mut res);
    // Only ASCII digits have been written.
    unsafe { String::from_utf8_unchecked(res) }
}

pub fn encode_u8(ch: u8) -> [u8; 2] {
    [DIGITS[usize::from(ch >> 4)], DIGITS[usize::from(ch & 0x0F)]]
}

/// Decodes a hex string of either case into octets.
///
/// Returns `None` if the string has an odd length or contains anything
/// other than hex digits.
pub fn decode(src: &str) -> Option<Vec<u8>> {
    if src.len() % 2 != 0 {
        return None
    }
    src.as_bytes().chunks(2).map(|pair| {
        Some((decode_digit(pair[0])? << 4) | decode_digit(pair[1])?)
    }).collect()
}

fn decode_digit(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None
    }
}

const DIGITS: &[u8] = b"0123456789abcdef";


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_lowercase() {
        assert_eq!(encode_string(b"\x00\x0f\xa5\xff"), "000fa5ff");
        let mut buf = [0u8; 4];
        assert_eq!(encode(b"\xab\xcd", &mut buf), "abcd");
    }

    #[test]
    fn decode_both_cases() {
        assert_eq!(decode("00ffAb"), Some(vec![0x00, 0xff, 0xab]));
        assert_eq!(decode("abc"), None);
        assert_eq!(decode("zz"), None);
        assert_eq!(decode(""), Some(Vec::new()));
    }
}
