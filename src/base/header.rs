//! The header of a DNS message.
//!
//! Each DNS message starts with a twelve octet long header section
//! containing some general information related to the message as well as
//! the number of records in each of the four sections that follow the header.
//! Its content and format are defined in section 4.1.1 of [RFC 1035].
//!
//! The header has been split into two separate types: [`Header`] contains
//! the ID, the flags, the opcode, and the response code while
//! [`HeaderCounts`] contains the section counts. The [`HeaderSection`] type
//! wraps both of them into a single type.
//!
//! [RFC 1035]: https://tools.ietf.org/html/rfc1035

use super::iana::{Opcode, Rcode};
use super::wire::{ParseError, Parser};

//------------ Header --------------------------------------------------

/// The first part of the header of a DNS message.
///
/// This type represents the information contained in the first four octets
/// of the header: the message ID, opcode, rcode, and the various flags. It
/// keeps those four octets in wire representation, i.e., in network byte
/// order. The data is layed out like this:
///
/// ```text
///                                 1  1  1  1  1  1
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|Z |AD|CD|   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Header {
    /// The actual header in its wire format representation.
    ///
    /// This means that the ID field is in big endian.
    inner: [u8; 4],
}

/// # Creation and Conversion
///
impl Header {
    /// Creates a new header.
    ///
    /// The new header has all fields as either zero or false. Thus, the
    /// opcode will be [`Opcode::QUERY`] and the response code will be
    /// [`Rcode::NOERROR`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the header of a recursive standard query with the given ID.
    ///
    /// Only the RD flag is set, which results in the flags octets being
    /// `0x0100`.
    pub fn query(id: u16) -> Self {
        let mut res = Self::new();
        res.set_id(id);
        res.set_rd(true);
        res
    }

    /// Returns a reference to the underlying octets slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }
}

/// # Field Access
///
impl Header {
    /// Returns the value of the ID field.
    ///
    /// The ID field is an identifier chosen by whoever created a query
    /// and is copied into a response by a server. It allows matching
    /// incoming responses to their queries.
    pub fn id(self) -> u16 {
        u16::from_be_bytes([self.inner[0], self.inner[1]])
    }

    /// Sets the value of the ID field.
    pub fn set_id(&mut self, value: u16) {
        self.inner[..2].copy_from_slice(&value.to_be_bytes())
    }

    /// Returns whether the QR bit is set.
    ///
    /// The bit is set in responses and clear in queries.
    pub fn qr(self) -> bool {
        self.get_bit(2, 7)
    }

    /// Sets the value of the QR bit.
    pub fn set_qr(&mut self, set: bool) {
        self.set_bit(2, 7, set)
    }

    /// Returns the value of the Opcode field.
    pub fn opcode(self) -> Opcode {
        Opcode::from_int((self.inner[2] >> 3) & 0x0F)
    }

    /// Sets the value of the opcode field.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.inner[2] = self.inner[2] & 0x87 | ((opcode.to_int() & 0x0F) << 3);
    }

    /// Returns whether the RD bit is set.
    pub fn rd(self) -> bool {
        self.get_bit(2, 0)
    }

    /// Sets the value of the RD bit.
    pub fn set_rd(&mut self, set: bool) {
        self.set_bit(2, 0, set)
    }

    /// Returns whether the RA bit is set.
    pub fn ra(self) -> bool {
        self.get_bit(3, 7)
    }

    /// Sets the value of the RA bit.
    pub fn set_ra(&mut self, set: bool) {
        self.set_bit(3, 7, set)
    }

    /// Returns the value of the RCODE field.
    ///
    /// The *response code* is used in a response to indicate what happened
    /// when processing the query. See the [`Rcode`] type for information on
    /// possible values and their meaning.
    pub fn rcode(self) -> Rcode {
        Rcode::masked(self.inner[3])
    }

    /// Sets the value of the RCODE field.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.inner[3] = self.inner[3] & 0xF0 | (rcode.to_int() & 0x0F);
    }

    //--- Internal helpers

    /// Returns the value of the bit at the given position.
    ///
    /// The argument `offset` gives the byte offset of the underlying bytes
    /// slice and `bit` gives the number of the bit with the most significant
    /// bit being 7.
    fn get_bit(self, offset: usize, bit: usize) -> bool {
        self.inner[offset] & (1 << bit) != 0
    }

    /// Sets or resets the given bit.
    fn set_bit(&mut self, offset: usize, bit: usize, set: bool) {
        if set {
            self.inner[offset] |= 1 << bit
        } else {
            self.inner[offset] &= !(1 << bit)
        }
    }
}

//------------ HeaderCounts -------------------------------------------------

/// The section count part of the header section of a DNS message.
///
/// This part consists of four 16 bit counters for the number of entries in
/// the four sections of a DNS message, kept in network byte order:
///
/// ```text
///                                 1  1  1  1  1  1
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    QDCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    ANCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    NSCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    ARCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeaderCounts {
    inner: [u8; 8],
}

impl HeaderCounts {
    /// Creates a new value with all counters set to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to the raw octets slice of the header counts.
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Returns the value of the QDCOUNT field.
    pub fn qdcount(self) -> u16 {
        self.get_u16(0)
    }

    /// Sets the value of the QDCOUNT field.
    pub fn set_qdcount(&mut self, value: u16) {
        self.set_u16(0, value)
    }

    /// Returns the value of the ANCOUNT field.
    pub fn ancount(self) -> u16 {
        self.get_u16(2)
    }

    /// Sets the value of the ANCOUNT field.
    pub fn set_ancount(&mut self, value: u16) {
        self.set_u16(2, value)
    }

    /// Returns the value of the NSCOUNT field.
    pub fn nscount(self) -> u16 {
        self.get_u16(4)
    }

    /// Sets the value of the NSCOUNT field.
    pub fn set_nscount(&mut self, value: u16) {
        self.set_u16(4, value)
    }

    /// Returns the value of the ARCOUNT field.
    pub fn arcount(self) -> u16 {
        self.get_u16(6)
    }

    /// Sets the value of the ARCOUNT field.
    pub fn set_arcount(&mut self, value: u16) {
        self.set_u16(6, value)
    }

    fn get_u16(self, offset: usize) -> u16 {
        u16::from_be_bytes([self.inner[offset], self.inner[offset + 1]])
    }

    fn set_u16(&mut self, offset: usize, value: u16) {
        self.inner[offset..offset + 2].copy_from_slice(&value.to_be_bytes())
    }
}

//------------ HeaderSection -------------------------------------------------

/// The complete header section of a DNS message.
///
/// Consists of a [`Header`] directly followed by a [`HeaderCounts`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeaderSection {
    header: Header,
    counts: HeaderCounts,
}

impl HeaderSection {
    /// The length of the header section in octets.
    pub const LEN: usize = 12;

    /// Creates a new header section with all fields zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to the header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns a mutable reference to the header.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Returns a reference to the header counts.
    pub fn counts(&self) -> &HeaderCounts {
        &self.counts
    }

    /// Returns a mutable reference to the header counts.
    pub fn counts_mut(&mut self) -> &mut HeaderCounts {
        &mut self.counts
    }

    /// Parses a header section from the beginning of a parser.
    pub fn parse(parser: &mut Parser) -> Result<Self, ParseError> {
        let octets = parser.parse_octets(Self::LEN)?;
        let mut res = Self::new();
        res.header.inner.copy_from_slice(&octets[..4]);
        res.counts.inner.copy_from_slice(&octets[4..]);
        Ok(res)
    }

    /// Appends the wire format of the header section to `target`.
    pub fn compose(&self, target: &mut Vec<u8>) {
        target.extend_from_slice(self.header.as_slice());
        target.extend_from_slice(self.counts.as_slice());
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn query_flags() {
        let header = Header::query(0x1234);
        assert_eq!(header.as_slice(), b"\x12\x34\x01\x00");
        assert!(header.rd());
        assert!(!header.qr());
        assert_eq!(header.opcode(), Opcode::QUERY);
    }

    #[test]
    fn bits() {
        let mut header = Header::new();
        header.set_qr(true);
        assert_eq!(header.as_slice()[2], 0x80);
        header.set_opcode(Opcode::STATUS);
        assert_eq!(header.opcode(), Opcode::STATUS);
        assert!(header.qr());
        header.set_rcode(Rcode::NXDOMAIN);
        header.set_ra(true);
        assert_eq!(header.rcode(), Rcode::NXDOMAIN);
        assert_eq!(header.as_slice()[3], 0x83);
        header.set_qr(false);
        assert!(!header.qr());
    }

    #[test]
    fn section_parse_compose() {
        let mut section = HeaderSection::new();
        *section.header_mut() = Header::query(7);
        section.counts_mut().set_qdcount(1);
        section.counts_mut().set_arcount(0x0102);
        let mut buf = Vec::new();
        section.compose(&mut buf);
        assert_eq!(
            buf,
            b"\x00\x07\x01\x00\x00\x01\x00\x00\x00\x00\x01\x02"
        );
        let parsed = HeaderSection::parse(&mut Parser::from_ref(&buf)).unwrap();
        assert_eq!(parsed, section);
        assert_eq!(parsed.counts().arcount(), 0x0102);
    }

    #[test]
    fn section_short() {
        assert_eq!(
            HeaderSection::parse(&mut Parser::from_ref(&[0u8; 11])),
            Err(ParseError::ShortInput)
        );
    }
}
