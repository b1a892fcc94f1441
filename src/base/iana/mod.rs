//! IANA Definitions for DNS.
//!
//! This module contains types for the few parameters defined in IANA
//! registries that an address lookup needs: record types, classes,
//! opcodes, and response codes.
//!
//! All types defined hereunder follow the same basic structure. They are
//! newtypes around the raw integer with associated constants for the
//! well-defined values. Since values outside the defined set can and do
//! appear on the wire, any integer can be converted into a value.
//!
//! There are two methods `from_int()` and `to_int()` to convert from and
//! to raw integer values as well as implementations of the `From` trait
//! for these. `Display` prints the mnemonic if there is one.

pub use self::class::Class;
pub use self::opcode::Opcode;
pub use self::rcode::Rcode;
pub use self::rtype::Rtype;

#[macro_use]
mod macros;

pub mod class;
pub mod opcode;
pub mod rcode;
pub mod rtype;
