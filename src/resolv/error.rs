//! Errors and results.
//!
//! There are two kinds of errors. A [`StartError`] is returned right away
//! when a lookup cannot be started. A [`LookupError`] is the negative
//! outcome of a lookup that was started and is delivered to the completion
//! callback.

use crate::base::name::NameError;
use std::net::IpAddr;
use std::{error, fmt, io, result};

//------------ StartError ----------------------------------------------------

/// A lookup could not be started.
#[derive(Debug)]
pub enum StartError {
    /// A lookup is already in progress on this handle.
    AlreadyInProgress,

    /// The host name cannot be used in a query.
    BadName(NameError),

    /// All transaction IDs are in use by active requests.
    TooManyRequests,

    /// The resolver service has been shut down.
    ShutDown,

    /// The worker thread could not be started.
    Spawn(io::Error),
}

impl error::Error for StartError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            StartError::BadName(ref err) => Some(err),
            StartError::Spawn(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<NameError> for StartError {
    fn from(err: NameError) -> Self {
        StartError::BadName(err)
    }
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::StartError::*;

        match *self {
            AlreadyInProgress => f.write_str("lookup already in progress"),
            BadName(ref err) => write!(f, "bad host name: {}", err),
            TooManyRequests => f.write_str("too many active requests"),
            ShutDown => f.write_str("resolver has been shut down"),
            Spawn(ref err) => write!(f, "cannot start worker: {}", err),
        }
    }
}

//------------ LookupError ---------------------------------------------------

/// A lookup didn’t produce an address.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LookupError {
    /// The response from the server was broken or signalled an error.
    DnsError,

    /// The host name does not exist or has no address.
    NoSuchHost,

    /// There was no response in time.
    Timeout,

    /// Something else went wrong.
    ///
    /// This happens if there is no server to ask, the socket failed, or the
    /// resolver was shut down while the request was outstanding.
    Error,
}

impl error::Error for LookupError {}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            LookupError::DnsError => "DNS error",
            LookupError::NoSuchHost => "no such host",
            LookupError::Timeout => "lookup timed out",
            LookupError::Error => "lookup failed",
        })
    }
}

//------------ Result --------------------------------------------------------

/// The outcome of a lookup as given to the completion callback.
pub type LookupResult = result::Result<IpAddr, LookupError>;
