//! Basics.
//!
//! This module provides the types for the small slice of DNS data an
//! address lookup needs: the message header, host names, questions, and
//! the query and response messages built from them.
//!
//!
//! ## Parsing and Composing Messages
//!
//! In order to easily distinguish the process of creating and disecting
//! wire-format messages from other forms of representation conversion, we
//! use the term *parsing* for extracting data from a wire-format
//! representation and *composing* for producing such a representation.
//!
//! Both parsing and composing happen on buffers holding a complete DNS
//! message. Since messages sent over UDP are limited to 512 octets, this is
//! never a problem. Parsing happens through the [`Parser`][wire::Parser]
//! cursor of the [wire] module, composing simply appends to a `Vec<u8>`.
//!
//! The [`QueryMessage`][message::QueryMessage] type composes the query for
//! a single question while [`Reply`][message::Reply] disects the response
//! and finds the requested address.
//!
//!
//! # Types for DNS Data
//!
//! * [header](header/index.html) for the header of DNS messages,
//! * [iana](iana/index.html) for the registered values of record types,
//!   classes, opcodes, and response codes,
//! * [name](name/index.html) for host names,
//! * [question](question/index.html) for questions, and
//! * [message](message/index.html) for queries and their responses.

pub use self::header::{Header, HeaderCounts, HeaderSection};
pub use self::message::{AnswerError, QueryMessage, Reply};
pub use self::name::{HostName, NameError};
pub use self::question::Question;
pub use self::wire::ParseError;

pub mod header;
pub mod iana;
pub mod message;
pub mod name;
pub mod question;
pub mod wire;
