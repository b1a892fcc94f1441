//! Creating and consuming data in wire format.
//!
//! Messages handled by this crate are small and always live in a single
//! octets slice, so parsing happens through the simple [`Parser`] cursor
//! defined here. Composing appends to a `Vec<u8>`.

use core::fmt;

//------------ Parser --------------------------------------------------------

/// A bounds-checked cursor over an octets slice.
///
/// All the `parse_*` methods advance the cursor past the data they read and
/// return [`ParseError::ShortInput`] if there isn’t enough data left. In
/// that case, the position stays where it was.
#[derive(Clone, Copy, Debug)]
pub struct Parser<'a> {
    octets: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser atop the given slice, starting at its beginning.
    pub fn from_ref(octets: &'a [u8]) -> Self {
        Parser { octets, pos: 0 }
    }

    /// Returns a reference to the complete underlying slice.
    pub fn as_slice(&self) -> &'a [u8] {
        self.octets
    }

    /// Returns the current position of the parser.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the number of octets left to parse.
    pub fn remaining(&self) -> usize {
        self.octets.len() - self.pos
    }

    /// Returns a slice of the next `len` octets without advancing.
    pub fn peek(&self, len: usize) -> Result<&'a [u8], ParseError> {
        self.check_len(len)?;
        Ok(&self.octets[self.pos..self.pos + len])
    }

    /// Advances the parser by `len` octets.
    pub fn advance(&mut self, len: usize) -> Result<(), ParseError> {
        self.check_len(len)?;
        self.pos += len;
        Ok(())
    }

    /// Takes the next `len` octets.
    pub fn parse_octets(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let res = self.peek(len)?;
        self.pos += len;
        Ok(res)
    }

    pub fn parse_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.parse_octets(1)?[0])
    }

    pub fn parse_u16_be(&mut self) -> Result<u16, ParseError> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.parse_octets(2)?);
        Ok(u16::from_be_bytes(buf))
    }

    pub fn parse_u32_be(&mut self) -> Result<u32, ParseError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.parse_octets(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn check_len(&self, len: usize) -> Result<(), ParseError> {
        if self.remaining() < len {
            Err(ParseError::ShortInput)
        } else {
            Ok(())
        }
    }
}

//============ Error Types ===================================================

//------------ ParseError ----------------------------------------------------

/// An error happened while parsing data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// An attempt was made to go beyond the end of the parser.
    ShortInput,

    /// A formatting error occurred.
    ///
    /// The string describes what exactly was wrong.
    Form(&'static str),
}

impl ParseError {
    /// Creates a new parse error as a form error with the given message.
    pub fn form_error(msg: &'static str) -> Self {
        ParseError::Form(msg)
    }
}

//--- Display and Error

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::ShortInput => f.write_str("unexpected end of input"),
            ParseError::Form(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ParseError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_ints() {
        let mut parser = Parser::from_ref(b"\x01\x02\x03\x04\x05\x06\x07");
        assert_eq!(parser.parse_u8(), Ok(1));
        assert_eq!(parser.parse_u16_be(), Ok(0x0203));
        assert_eq!(parser.parse_u32_be(), Ok(0x04050607));
        assert_eq!(parser.remaining(), 0);
        assert_eq!(parser.parse_u8(), Err(ParseError::ShortInput));
    }

    #[test]
    fn short_input_keeps_position() {
        let mut parser = Parser::from_ref(b"\x01\x02\x03");
        parser.advance(2).unwrap();
        assert_eq!(parser.parse_u16_be(), Err(ParseError::ShortInput));
        assert_eq!(parser.pos(), 2);
        assert_eq!(parser.peek(1), Ok(&b"\x03"[..]));
        assert_eq!(parser.advance(2), Err(ParseError::ShortInput));
    }
}
