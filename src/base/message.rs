//! Address queries and their responses.
//!
//! This module provides the two kinds of DNS messages an address lookup
//! deals with. [`QueryMessage`] builds the query datagram for a single
//! question. [`Reply`] takes apart a response to such a query: it checks
//! the header and the echoed question and then looks through the answer
//! section for the first record of the requested address type.
//!
//! Responses are only ever inspected as far as necessary. The authority
//! and additional sections are never looked at and domain names in the
//! answer section are skipped rather than decompressed.

use super::header::{Header, HeaderSection};
use super::iana::{Opcode, Rcode, Rtype};
use super::question::Question;
use super::wire::{ParseError, Parser};
use core::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

//------------ QueryMessage --------------------------------------------------

/// A standard recursive query with exactly one question.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryMessage {
    id: u16,
    question: Question,
}

impl QueryMessage {
    /// The maximum size of a message sent or received over UDP.
    pub const MAX_LEN: usize = 512;

    /// Creates a new query message.
    pub fn new(id: u16, question: Question) -> Self {
        QueryMessage { id, question }
    }

    /// Returns the message ID.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns a reference to the question.
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// Appends the wire format of the message to `target`.
    ///
    /// Since a host name is at most 253 octets long, the message never
    /// exceeds [`MAX_LEN`][Self::MAX_LEN].
    pub fn compose(&self, target: &mut Vec<u8>) {
        let mut section = HeaderSection::new();
        *section.header_mut() = Header::query(self.id);
        section.counts_mut().set_qdcount(1);
        section.compose(target);
        self.question.compose(target);
    }

    /// Returns the wire format of the message as a new vec.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut res = Vec::with_capacity(
            HeaderSection::LEN + self.question.compose_len(),
        );
        self.compose(&mut res);
        debug_assert!(res.len() <= Self::MAX_LEN);
        res
    }

    /// Parses a query message.
    ///
    /// The message must not have the QR bit set and must contain exactly
    /// one question. Any other sections are ignored.
    pub fn parse(msg: &[u8]) -> Result<Self, ParseError> {
        let mut parser = Parser::from_ref(msg);
        let section = HeaderSection::parse(&mut parser)?;
        if section.header().qr() {
            return Err(ParseError::form_error("not a query"));
        }
        if section.counts().qdcount() != 1 {
            return Err(ParseError::form_error("qdcount not 1"));
        }
        let question = Question::parse(&mut parser)?;
        Ok(QueryMessage::new(section.header().id(), question))
    }
}

//------------ Reply ---------------------------------------------------------

/// A response to a [`QueryMessage`].
///
/// A value can only be created for a standard query response with exactly
/// one question. Whether the question is the one asked needs to be checked
/// by comparing [`question`][Self::question] before looking at the
/// [`answer`][Self::answer].
#[derive(Clone, Debug)]
pub struct Reply<'a> {
    section: HeaderSection,
    question: Question,

    /// A parser positioned right after the question.
    answers: Parser<'a>,
}

impl<'a> Reply<'a> {
    /// Takes apart the header and question of a response.
    pub fn from_slice(msg: &'a [u8]) -> Result<Self, ParseError> {
        let mut parser = Parser::from_ref(msg);
        let section = HeaderSection::parse(&mut parser)?;
        if !section.header().qr() {
            return Err(ParseError::form_error("not a response"));
        }
        if section.header().opcode() != Opcode::QUERY {
            return Err(ParseError::form_error("not a standard query"));
        }
        if section.counts().qdcount() != 1 {
            return Err(ParseError::form_error("qdcount not 1"));
        }
        let question = Question::parse(&mut parser)?;
        Ok(Reply {
            section,
            question,
            answers: parser,
        })
    }

    /// Returns the message ID of the response.
    pub fn id(&self) -> u16 {
        self.section.header().id()
    }

    /// Returns the header of the response.
    pub fn header(&self) -> Header {
        *self.section.header()
    }

    /// Returns the question echoed by the response.
    pub fn question(&self) -> &Question {
        &self.question
    }

    /// Returns the first address of the question’s record type.
    ///
    /// A response code of NXDOMAIN or an empty answer section result in
    /// [`AnswerError::NoSuchHost`]. If there are answers but none of them
    /// is of the requested type, [`AnswerError::NoRecord`] is returned.
    pub fn answer(&self) -> Result<IpAddr, AnswerError> {
        match self.header().rcode() {
            Rcode::NOERROR => {}
            Rcode::NXDOMAIN => return Err(AnswerError::NoSuchHost),
            rcode => return Err(AnswerError::Rcode(rcode)),
        }
        let ancount = self.section.counts().ancount();
        if ancount == 0 {
            return Err(AnswerError::NoSuchHost);
        }
        let qtype = self.question.qtype();
        let mut parser = self.answers;
        for _ in 0..ancount {
            skip_name(&mut parser)?;
            let rtype = Rtype::from_int(parser.parse_u16_be()?);
            parser.advance(2 + 4)?; // class and TTL
            let rdlen = parser.parse_u16_be()? as usize;
            let rdata = parser.parse_octets(rdlen)?;
            if rtype != qtype {
                continue;
            }
            if Some(rdlen) != rtype.address_len() {
                return Err(
                    ParseError::form_error("bad address record length").into()
                );
            }
            return Ok(parse_address(rdata));
        }
        Err(AnswerError::NoRecord)
    }
}

/// Skips over a possibly compressed domain name.
fn skip_name(parser: &mut Parser) -> Result<(), ParseError> {
    loop {
        let len = parser.parse_u8()?;
        match len & 0xC0 {
            0x00 if len == 0 => return Ok(()),
            0x00 => parser.advance(len as usize)?,
            0xC0 => {
                // The pointer ends the name.
                return parser.advance(1);
            }
            _ => return Err(ParseError::form_error("bad label type")),
        }
    }
}

fn parse_address(rdata: &[u8]) -> IpAddr {
    if rdata.len() == 4 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(rdata);
        Ipv4Addr::from(buf).into()
    } else {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(rdata);
        Ipv6Addr::from(buf).into()
    }
}

//------------ AnswerError ---------------------------------------------------

/// A response didn’t contain the requested address.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnswerError {
    /// The name does not exist or there were no answers at all.
    NoSuchHost,

    /// There were answers but none of the requested type.
    NoRecord,

    /// The server responded with an error.
    Rcode(Rcode),

    /// The answer section was malformed.
    Parse(ParseError),
}

impl From<ParseError> for AnswerError {
    fn from(err: ParseError) -> Self {
        AnswerError::Parse(err)
    }
}

impl fmt::Display for AnswerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AnswerError::NoSuchHost => f.write_str("no such host"),
            AnswerError::NoRecord => f.write_str("no record of requested type"),
            AnswerError::Rcode(rcode) => {
                write!(f, "server responded with {}", rcode)
            }
            AnswerError::Parse(ref err) => err.fmt(f),
        }
    }
}

impl std::error::Error for AnswerError {}

//============ Testing =======================================================
