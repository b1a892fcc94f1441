//! Host names.
//!
//! Address lookups only ever deal with one kind of domain name: the
//! absolute name of a host given by a user in its dotted text form. The
//! [`HostName`] type defined here holds such a name after checking that it
//! can be encoded into a DNS question, i.e., that it consists of non-empty
//! labels of at most 63 octets each and is no longer than 253 octets in
//! total.
//!
//! Comparison of host names is case-insensitive for ASCII letters, as is
//! the case for all domain names.

use super::wire::{ParseError, Parser};
use core::{fmt, hash, str};

//------------ HostName ------------------------------------------------------

/// A validated host name in dotted text form.
///
/// The name is kept without a trailing dot. A single trailing dot is
/// accepted when creating a value and silently removed.
#[derive(Clone)]
pub struct HostName(String);

impl HostName {
    /// The maximum length of a host name in its text form.
    pub const MAX_LEN: usize = 253;

    /// The maximum length of a single label.
    pub const MAX_LABEL_LEN: usize = 63;

    /// Creates a host name from a string after checking it.
    pub fn from_text(s: &str) -> Result<Self, NameError> {
        let s = s.strip_suffix('.').unwrap_or(s);
        if s.len() > Self::MAX_LEN {
            return Err(NameError::TooLong);
        }
        for label in s.split('.') {
            if label.is_empty() {
                return Err(NameError::EmptyLabel);
            }
            if label.len() > Self::MAX_LABEL_LEN {
                return Err(NameError::LongLabel);
            }
        }
        Ok(HostName(s.into()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns an iterator over the labels of the name.
    ///
    /// The root label is not included.
    pub fn labels(&self) -> impl Iterator<Item = &[u8]> {
        self.0.split('.').map(str::as_bytes)
    }

    /// Returns the length of the name in wire format.
    pub fn compose_len(&self) -> usize {
        // One length octet per label plus the root label replaces the dots.
        self.0.len() + 2
    }

    /// Appends the uncompressed wire format of the name to `target`.
    pub fn compose(&self, target: &mut Vec<u8>) {
        for label in self.labels() {
            target.push(label.len() as u8);
            target.extend_from_slice(label);
        }
        target.push(0);
    }

    /// Parses an uncompressed name from wire format.
    ///
    /// Since there is no way to represent them in a `HostName`, compressed
    /// names, the root name, and labels containing a dot or non-UTF-8 data
    /// are rejected as form errors.
    pub fn parse(parser: &mut Parser) -> Result<Self, ParseError> {
        let mut res = String::new();
        loop {
            let len = parser.parse_u8()? as usize;
            if len == 0 {
                break;
            }
            if len > Self::MAX_LABEL_LEN {
                return Err(ParseError::form_error("compressed or bad label"));
            }
            let label = parser.parse_octets(len)?;
            if label.contains(&b'.') {
                return Err(ParseError::form_error("dot in label"));
            }
            let label = str::from_utf8(label).map_err(|_| {
                ParseError::form_error("label is not valid text")
            })?;
            if !res.is_empty() {
                res.push('.');
            }
            res.push_str(label);
            if res.len() > Self::MAX_LEN {
                return Err(ParseError::form_error("long host name"));
            }
        }
        if res.is_empty() {
            return Err(ParseError::form_error("root name"));
        }
        Ok(HostName(res))
    }
}

//--- FromStr

impl str::FromStr for HostName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

//--- PartialEq, Eq, and Hash

impl PartialEq for HostName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for HostName {}

impl hash::Hash for HostName {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        for ch in self.0.bytes() {
            state.write_u8(ch.to_ascii_lowercase())
        }
    }
}

//--- Display and Debug

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for HostName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HostName({})", self.0)
    }
}

//------------ NameError -----------------------------------------------------

/// A string could not be turned into a host name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameError {
    /// The name is longer than 253 octets.
    TooLong,

    /// The name contains an empty label.
    EmptyLabel,

    /// A label is longer than 63 octets.
    LongLabel,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Self::TooLong => "host name longer than 253 bytes",
            Self::EmptyLabel => "empty host name label",
            Self::LongLabel => "host name label longer than 63 bytes",
        })
    }
}

impl std::error::Error for NameError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_text() {
        assert_eq!(
            HostName::from_text("www.example.com.").unwrap().as_str(),
            "www.example.com"
        );
        assert_eq!(HostName::from_text(""), Err(NameError::EmptyLabel));
        assert_eq!(HostName::from_text("."), Err(NameError::EmptyLabel));
        assert_eq!(
            HostName::from_text("www..com"),
            Err(NameError::EmptyLabel)
        );
        assert_eq!(
            HostName::from_text(&"a".repeat(64)),
            Err(NameError::LongLabel)
        );
        assert!(HostName::from_text(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn length_limit() {
        // 63 + 1 + 63 + 1 + 63 + 1 + 61 = 253
        let ok = format!(
            "{}.{}.{}.{}",
            "a".repeat(63),
            "b".repeat(63),
            "c".repeat(63),
            "d".repeat(61)
        );
        assert_eq!(ok.len(), 253);
        assert!(HostName::from_text(&ok).is_ok());
        let long = format!("{}d", ok);
        assert_eq!(HostName::from_text(&long), Err(NameError::TooLong));
    }

    #[test]
    fn compose() {
        let name = HostName::from_text("www.example.com").unwrap();
        let mut buf = Vec::new();
        name.compose(&mut buf);
        assert_eq!(buf, b"\x03www\x07example\x03com\x00");
        assert_eq!(buf.len(), name.compose_len());
    }

    #[test]
    fn parse() {
        let mut parser = Parser::from_ref(b"\x03www\x07example\x03com\x00\xff");
        let name = HostName::parse(&mut parser).unwrap();
        assert_eq!(name.as_str(), "www.example.com");
        assert_eq!(parser.remaining(), 1);

        assert!(HostName::parse(&mut Parser::from_ref(b"\x00")).is_err());
        assert!(HostName::parse(&mut Parser::from_ref(b"\xc0\x0c")).is_err());
        assert_eq!(
            HostName::parse(&mut Parser::from_ref(b"\x03ww")),
            Err(ParseError::ShortInput)
        );
    }

    #[test]
    fn eq_ignores_case() {
        assert_eq!(
            HostName::from_text("Example.COM").unwrap(),
            HostName::from_text("example.com").unwrap()
        );
        assert_ne!(
            HostName::from_text("example.com").unwrap(),
            HostName::from_text("example.org").unwrap()
        );
    }
}
