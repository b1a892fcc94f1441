//! A single question in a DNS message.
//!
//! This module defines the type `Question` which represents an entry in
//! the question section of a DNS message.

use super::iana::{Class, Rtype};
use super::name::HostName;
use super::wire::{ParseError, Parser};
use core::fmt;

//------------ Question ------------------------------------------------------

/// A question in a DNS message.
///
/// In DNS, a question describes what is requested in a query. It consists
/// of three elements: a domain name, a record type, and a class. This type
/// represents such a question for a host name.
///
/// Two questions are equal if their names are equal ignoring ASCII case
/// and their types and classes are equal. This is exactly what needs to be
/// checked when matching the question echoed in a response.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Question {
    /// The domain name of the question.
    qname: HostName,

    /// The record type of the question.
    qtype: Rtype,

    /// The class of the quesiton.
    qclass: Class,
}

/// # Creation and Conversion
///
impl Question {
    /// Creates a new question from its three componets.
    pub fn new(qname: HostName, qtype: Rtype, qclass: Class) -> Self {
        Question {
            qname,
            qtype,
            qclass,
        }
    }

    /// Creates a new question from a name and record type, assuming class IN.
    pub fn new_in(qname: HostName, qtype: Rtype) -> Self {
        Question::new(qname, qtype, Class::IN)
    }

    /// Converts the question into the qname.
    pub fn into_qname(self) -> HostName {
        self.qname
    }
}

/// # Field Access
///
impl Question {
    /// Returns a reference to the domain nmae in the question,
    pub fn qname(&self) -> &HostName {
        &self.qname
    }

    /// Returns the record type of the question.
    pub fn qtype(&self) -> Rtype {
        self.qtype
    }

    /// Returns the class of the question.
    pub fn qclass(&self) -> Class {
        self.qclass
    }
}

/// # Parsing and Composing
///
impl Question {
    /// Parses a question from the current position of `parser`.
    pub fn parse(parser: &mut Parser) -> Result<Self, ParseError> {
        let qname = HostName::parse(parser)?;
        let qtype = Rtype::from_int(parser.parse_u16_be()?);
        let qclass = Class::from_int(parser.parse_u16_be()?);
        Ok(Question::new(qname, qtype, qclass))
    }

    /// Returns the length of the wire format of the question.
    pub fn compose_len(&self) -> usize {
        self.qname.compose_len() + 4
    }

    /// Appends the wire format of the question to `target`.
    pub fn compose(&self, target: &mut Vec<u8>) {
        self.qname.compose(target);
        self.qtype.compose(target);
        self.qclass.compose(target);
    }
}

//--- Display

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.\t{}\t{}", self.qname, self.qclass, self.qtype)
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn question(name: &str, qtype: Rtype) -> Question {
        Question::new_in(HostName::from_text(name).unwrap(), qtype)
    }

    #[test]
    fn compose() {
        let mut buf = Vec::new();
        question("example.test", Rtype::AAAA).compose(&mut buf);
        assert_eq!(buf, b"\x07example\x04test\x00\x00\x1c\x00\x01");
    }

    #[test]
    fn parse_compose_parse() {
        for name in ["a", "example.test", "WWW.Example.Org", &"x".repeat(63)] {
            let q = question(name, Rtype::A);
            let mut buf = Vec::new();
            q.compose(&mut buf);
            assert_eq!(buf.len(), q.compose_len());
            let parsed = Question::parse(&mut Parser::from_ref(&buf)).unwrap();
            assert_eq!(parsed, q);
            let mut again = Vec::new();
            parsed.compose(&mut again);
            assert_eq!(again, buf);
        }
    }

    #[test]
    fn eq_ignores_name_case() {
        assert_eq!(
            question("Example.Test", Rtype::A),
            question("example.test", Rtype::A)
        );
        assert_ne!(
            question("example.test", Rtype::A),
            question("example.test", Rtype::AAAA)
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            format!("{}", question("example.test", Rtype::A)),
            "example.test.\tIN\tA"
        );
    }
}
