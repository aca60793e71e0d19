//! The X.509 building blocks shared by certificates and CMS.
//!
//! Names, serial numbers, and times appear both in certificates and in
//! signer identifiers and timestamp tokens. [`SignedStructure`] is the
//! signed outer shell of a certificate.

use std::{error, fmt, io, ops};
use std::str::FromStr;
use bcder::{decode, encode};
use bcder::{BitString, Captured, ConstOid, Integer, Mode, OctetString, Oid};
use bcder::Tag;
use bcder::decode::{DecodeError, IntoSource, Source};
use bcder::encode::PrimitiveContent;
use bcder::string::{PrintableString, Utf8String};
use bytes::Bytes;
use chrono::{Datelike, DateTime, TimeDelta, Timelike, TimeZone, Utc};
use crate::oid;
use crate::crypto::{PublicKey, Signature, SignatureAlgorithm, Signer};
use crate::crypto::VerificationError;
use crate::util::hex;


//------------ encode_extension ----------------------------------------------

/// Returns an encoder for a single certificate extension.
pub fn encode_extension<V: encode::Values>(
    oid: &'static ConstOid,
    critical: bool,
    content: V
) -> impl encode::Values {
    encode::sequence((
        oid.encode(),
        if critical {
            Some(critical.encode())
        }
        else {
            None
        },
        OctetString::encode_wrapped(Mode::Der, content)
    ))
}


//------------ Name ----------------------------------------------------------

/// A distinguished name.
///
/// Names are only ever compared, so we keep the raw encoding around. Two
/// names are equal if their encodings are identical, which is what
/// RFC 5280 asks for in practice.
#[derive(Clone, Debug)]
pub struct Name(Captured);

impl Name {
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.capture(|cons| {
            cons.take_sequence(|cons| { // RDNSequence
                while let Some(()) = cons.take_opt_set(|cons| {
                    let mut empty_set = true;
                    while let Some(()) = cons.take_opt_sequence(|cons| {
                        empty_set = false;
                        Oid::skip_in(cons)?;
                        if cons.skip_one()?.is_none() {
                            return Err(cons.content_err(
                                "invalid name"
                            ))
                        }
                        Ok(())
                    })? { }
                    if empty_set {
                        return Err(cons.content_err(
                            "empty relative distinguished name"
                        ));
                    }
                    Ok(())
                })? { }
                Ok(())
            })
        }).map(Name)
    }

    /// Creates a name from an optional organization and a common name.
    pub fn from_parts(organization: Option<&str>, common_name: &str) -> Self {
        let org = organization.map(|org| {
            encode::set(
                encode::sequence((
                    oid::AT_ORGANIZATION_NAME.encode(),
                    org.as_bytes().encode_as(Tag::UTF8_STRING),
                ))
            )
        });
        let values = encode::sequence((
            org,
            encode::set(
                encode::sequence((
                    oid::AT_COMMON_NAME.encode(),
                    common_name.as_bytes().encode_as(Tag::UTF8_STRING),
                ))
            )
        ));
        Name(Captured::from_values(Mode::Der, values))
    }

    /// Returns the first common name of the name if there is one.
    ///
    /// Only printable and UTF-8 strings are considered.
    pub fn common_name(&self) -> Option<String> {
        self.0.clone().decode(|cons| {
            let mut res = None;
            cons.take_sequence(|cons| {
                while let Some(()) = cons.take_opt_set(|cons| {
                    while let Some(()) = cons.take_opt_sequence(|cons| {
                        let id = Oid::take_from(cons)?;
                        if id != oid::AT_COMMON_NAME {
                            return cons.skip_all()
                        }
                        let value = Self::take_string(cons)?;
                        if res.is_none() {
                            res = value;
                        }
                        Ok(())
                    })? { }
                    Ok(())
                })? { }
                Ok(())
            })?;
            Ok(res)
        }).ok().flatten()
    }

    fn take_string<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<String>, DecodeError<S::Error>> {
        cons.take_value(|tag, content| {
            if tag == Tag::PRINTABLE_STRING {
                PrintableString::from_content(content).map(|s| {
                    Some(s.to_string())
                })
            }
            else if tag == Tag::UTF8_STRING {
                Utf8String::from_content(content).map(|s| {
                    Some(s.to_string())
                })
            }
            else {
                content.as_primitive()?.skip_all().map(|_| None)
            }
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        &self.0
    }
}

//--- PartialEq and Eq

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl Eq for Name {}

//--- Display

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.common_name() {
            Some(name) => write!(f, "CN={}", name),
            None => f.write_str("<unnamed>")
        }
    }
}


//------------ Serial --------------------------------------------------------

/// A certificate serial number.
///
/// Serial numbers are also how signer identifiers and timestamp tokens
/// refer to things. Decoding accepts any integer, including the negative
/// and overlong ones RFC 5280 forbids. The value keeps the content octets
/// of the encoded integer.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Serial(Bytes);

impl Serial {
    /// Creates a random serial number of 128 bits.
    pub fn random<S: Signer>(signer: &S) -> Result<Self, S::Error> {
        let mut res = [0u8; 16];
        signer.rand(&mut res)?;
        res[0] &= 0x7F;
        Ok(Self::from_unsigned(&res))
    }

    /// Creates the minimal encoding of an unsigned big-endian integer.
    fn from_unsigned(s: &[u8]) -> Self {
        let s = match s.iter().position(|&ch| ch != 0) {
            Some(start) => &s[start..],
            None => return Serial(Bytes::from_static(b"\0")),
        };
        let mut res = Vec::with_capacity(s.len() + 1);
        if s[0] & 0x80 != 0 {
            res.push(0);
        }
        res.extend_from_slice(s);
        Serial(res.into())
    }

    /// Returns the content octets of the encoded integer.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        Integer::take_from(cons).map(|int| Serial(int.into_bytes()))
    }

    pub fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_primitive_if(Tag::INTEGER, Integer::from_primitive).map(
            |int| int.map(|int| Serial(int.into_bytes()))
        )
    }
}

//--- From

impl From<u64> for Serial {
    fn from(value: u64) -> Self {
        Self::from_unsigned(&value.to_be_bytes())
    }
}

//--- PrimitiveContent

impl PrimitiveContent for Serial {
    const TAG: Tag = Tag::INTEGER;

    fn encoded_len(&self, _mode: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: io::Write>(
        &self,
        _mode: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(self.0.as_ref())
    }
}

//--- Display

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode_string(self.as_slice()))
    }
}


//------------ SignedStructure -----------------------------------------------

/// The outer shell of a certificate.
///
/// This is the sequence of the to-be-signed data, the signature algorithm,
/// and the signature value. The to-be-signed data is kept as captured
/// since that is what the signature covers.
#[derive(Clone, Debug)]
pub struct SignedStructure {
    data: Captured,
    signature: Signature,
}

impl SignedStructure {
    pub fn new(data: Captured, signature: Signature) -> Self {
        Self { data, signature }
    }

    pub fn data(&self) -> &Captured {
        &self.data
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Der.decode(source, Self::take_from)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    pub fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        Ok(SignedStructure {
            data: cons.capture_one()?,
            signature: Signature::new(
                SignatureAlgorithm::x509_take_from(cons)?,
                BitString::take_from(cons)?.octet_bytes()
            )
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            &self.data,
            self.signature.algorithm().x509_encode(),
            BitString::new(0, self.signature.value().clone()).encode(),
        ))
    }

    pub fn verify_signature(
        &self,
        public_key: &PublicKey
    ) -> Result<(), VerificationError> {
        public_key.verify(
            self.signature.algorithm(),
            self.data.as_slice(),
            self.signature.value()
        )
    }
}

//--- PartialEq and Eq

impl PartialEq for SignedStructure {
    fn eq(&self, other: &Self) -> bool {
        self.data.as_slice() == other.data.as_slice() &&
            self.signature == other.signature
    }
}

impl Eq for SignedStructure {}


//------------ Time ----------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Time(DateTime<Utc>);

impl Time {
    pub fn new(dt: DateTime<Utc>) -> Self {
        Time(dt)
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn five_minutes_ago() -> Self {
        Self::now() - TimeDelta::minutes(5)
    }

    pub fn years_from_now(years: i64) -> Self {
        Self::now() + TimeDelta::days(365 * years)
    }

    /// Creates a time value from its components.
    ///
    /// Returns `None` if the components don’t form a valid time.
    pub fn utc(
        year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec).single().map(
            Time
        )
    }

    /// Takes a UTCTime or GeneralizedTime value.
    ///
    /// GeneralizedTime values may contain fractional seconds as produced
    /// by time-stamping authorities. These are accepted in certificates,
    /// too, even though RFC 5280 forbids them there.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_primitive(|tag, prim| {
            match tag {
                Tag::UTC_TIME => Self::from_utc_time(prim),
                Tag::GENERALIZED_TIME => Self::from_generalized_time(prim),
                _ => {
                    Err(prim.content_err(
                        "malformed time value"
                    ))
                }
            }
        })
    }

    pub fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let res = cons.take_opt_primitive_if(
            Tag::UTC_TIME, |prim| Self::from_utc_time(prim)
        )?;
        if let Some(res) = res {
            return Ok(Some(res))
        }
        cons.take_opt_primitive_if(
            Tag::GENERALIZED_TIME, |prim| Self::from_generalized_time(prim)
        )
    }

    /// Takes a value that must be a GeneralizedTime.
    pub fn take_generalized_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_primitive_if(
            Tag::GENERALIZED_TIME, |prim| Self::from_generalized_time(prim)
        )
    }

    fn from_utc_time<S: decode::Source>(
        prim: &mut S
    ) -> Result<Self, DecodeError<S::Error>> {
        // YYMMDDHHMMSSZ, years from 1950 to 2049.
        let year = read_digits(prim, 2)?;
        let year = if year >= 50 { year + 1900 } else { year + 2000 };
        let res = Self::take_date_time(prim, year)?;
        if prim.take_u8()? != b'Z' {
            return Err(prim.content_err("malformed time value"))
        }
        res.ok_or_else(|| prim.content_err("invalid time value"))
    }

    fn from_generalized_time<S: decode::Source>(
        prim: &mut S
    ) -> Result<Self, DecodeError<S::Error>> {
        // YYYYMMDDHHMMSS[.f*]Z
        let year = read_digits(prim, 4)?;
        let res = Self::take_date_time(prim, year)?;
        let mut nanos = 0;
        let mut ch = prim.take_u8()?;
        if ch == b'.' {
            let mut scale = 100_000_000;
            let mut digits = 0;
            loop {
                ch = prim.take_u8()?;
                if !ch.is_ascii_digit() {
                    break
                }
                nanos += u32::from(ch - b'0') * scale;
                scale /= 10;
                digits += 1;
            }
            if digits == 0 {
                return Err(prim.content_err("malformed time value"))
            }
        }
        if ch != b'Z' {
            return Err(prim.content_err("malformed time value"))
        }
        res.and_then(|time| {
            time.0.with_nanosecond(nanos).map(Time)
        }).ok_or_else(|| prim.content_err("invalid time value"))
    }

    /// Takes month, day, hour, minute, and second of a time value.
    fn take_date_time<S: decode::Source>(
        prim: &mut S, year: u32
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        let mut parts = [0u32; 5];
        for part in &mut parts {
            *part = read_digits(prim, 2)?;
        }
        let [month, day, hour, min, sec] = parts;
        Ok(Self::utc(year as i32, month, day, hour, min, sec))
    }

    /// Encodes the value as a UTCTime.
    ///
    /// The value must be between 1950 and 2049.
    pub fn encode_utc_time(self) -> impl encode::Values {
        TimeContent { time: self, generalized: false }.into_values()
    }

    pub fn encode_generalized_time(self) -> impl encode::Values {
        TimeContent { time: self, generalized: true }.into_values()
    }

    /// Encodes the value in the form RFC 5280 asks for.
    ///
    /// That is UTCTime for years between 1950 and 2049 and
    /// GeneralizedTime otherwise.
    pub fn encode_varied(self) -> impl encode::Values {
        TimeContent {
            time: self,
            generalized: !(1950..2050).contains(&self.year()),
        }.into_values()
    }
}


//--- Deref and AsRef

impl ops::Deref for Time {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<DateTime<Utc>> for Time {
    fn as_ref(&self) -> &DateTime<Utc> {
        &self.0
    }
}


//--- From and FromStr

impl From<DateTime<Utc>> for Time {
    fn from(time: DateTime<Utc>) -> Self {
        Time(time)
    }
}

impl From<Time> for DateTime<Utc> {
    fn from(time: Time) -> Self {
        time.0
    }
}

impl FromStr for Time {
    type Err = chrono::format::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FromStr::from_str(s).map(Time)
    }
}


//--- Add and Sub

impl ops::Add<TimeDelta> for Time {
    type Output = Self;

    fn add(self, duration: TimeDelta) -> Self::Output {
        Self::new(self.0 + duration)
    }
}

impl ops::Sub<TimeDelta> for Time {
    type Output = Self;

    fn sub(self, duration: TimeDelta) -> Self::Output {
        Self::new(self.0 - duration)
    }
}


//--- Display

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}


/// Reads a decimal number of exactly `len` ASCII digits.
fn read_digits<S: decode::Source>(
    source: &mut S, len: usize
) -> Result<u32, DecodeError<S::Error>> {
    let mut res = 0;
    for _ in 0..len {
        let ch = source.take_u8()?;
        if !ch.is_ascii_digit() {
            return Err(source.content_err("malformed time value"))
        }
        res = res * 10 + u32::from(ch - b'0');
    }
    Ok(res)
}


//------------ TimeContent ---------------------------------------------------

/// The content of a UTCTime or GeneralizedTime value.
///
/// Fractional seconds are never encoded.
struct TimeContent {
    time: Time,
    generalized: bool,
}

impl TimeContent {
    fn into_values(self) -> impl encode::Values {
        let tag = if self.generalized {
            Tag::GENERALIZED_TIME
        }
        else {
            Tag::UTC_TIME
        };
        self.encode_as(tag)
    }
}

impl PrimitiveContent for TimeContent {
    const TAG: Tag = Tag::UTC_TIME;

    fn encoded_len(&self, _: Mode) -> usize {
        if self.generalized { 15 } else { 13 }
    }

    fn write_encoded<W: io::Write>(
        &self, _: Mode, target: &mut W
    ) -> Result<(), io::Error> {
        let time = self.time.0;
        if self.generalized {
            write!(target, "{:04}", time.year())?;
        }
        else {
            write!(target, "{:02}", time.year() % 100)?;
        }
        write!(
            target, "{:02}{:02}{:02}{:02}{:02}Z",
            time.month(), time.day(),
            time.hour(), time.minute(), time.second()
        )
    }
}


//------------ Validity ------------------------------------------------------

#[derive(Clone, Debug, Copy, Eq, Hash, PartialEq)]
pub struct Validity {
    not_before: Time,
    not_after: Time,
}

impl Validity {
    pub fn new(not_before: Time, not_after: Time) -> Self {
        Validity { not_before, not_after }
    }

    pub fn not_before(self) -> Time {
        self.not_before
    }

    pub fn not_after(self) -> Time {
        self.not_after
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            Ok(Validity::new(
                Time::take_from(cons)?,
                Time::take_from(cons)?,
            ))
        })
    }

    /// Checks that `now` falls within the period, both ends included.
    pub fn verify_at(self, now: Time) -> Result<(), ValidityPeriodError> {
        if now < self.not_before {
            Err(ValidityPeriodError::NotYetValid(self.not_before))
        }
        else if now > self.not_after {
            Err(ValidityPeriodError::Expired(self.not_after))
        }
        else {
            Ok(())
        }
    }

    /// Returns whether the whole of `[start, end]` lies within the period.
    pub fn covers(self, start: Time, end: Time) -> bool {
        self.not_before <= start && end <= self.not_after
    }

    pub fn encode(self) -> impl encode::Values {
        encode::sequence((
            self.not_before.encode_varied(),
            self.not_after.encode_varied(),
        ))
    }
}


//------------ ValidityPeriodError -------------------------------------------

/// A certificate is outside of its period of validity.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidityPeriodError {
    /// The period only starts at the given time.
    NotYetValid(Time),

    /// The period ended at the given time.
    Expired(Time),
}

impl ValidityPeriodError {
    pub fn is_too_new(self) -> bool {
        matches!(self, ValidityPeriodError::NotYetValid(_))
    }
}

impl fmt::Display for ValidityPeriodError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ValidityPeriodError::NotYetValid(time) => {
                write!(f, "certificate not valid before {}", time)
            }
            ValidityPeriodError::Expired(time) => {
                write!(f, "certificate expired at {}", time)
            }
        }
    }
}

impl error::Error for ValidityPeriodError { }


//============ Tests =========================================================
