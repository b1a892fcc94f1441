//! A callback-driven resolver for host addresses.
//!
//! The resolver asks one DNS server for the address of a host name, first
//! for an IPv6 address and, if there is none, for an IPv4 address. All
//! lookups of a [`ResolverService`] are handled by a single worker thread
//! that is started on demand and exits once it runs out of work.
//!
//! A lookup is started via a [`HostLookup`] handle. Its result, either an
//! [`IpAddr`][std::net::IpAddr] or a [`LookupError`], is given to the
//! handle’s callback on the worker thread.
//!
//! The server to ask can be given per lookup. Otherwise, the first name
//! server from the system’s resolver configuration is used, see
//! [`ResolvConf`], unless [`ServiceConf`] names a different one.

pub use self::clock::{ManualTicks, SystemTicks, Ticks};
pub use self::conf::{ResolvConf, ServiceConf};
pub use self::error::{LookupError, LookupResult, StartError};
pub use self::lookup::HostLookup;
pub use self::service::ResolverService;

pub mod clock;
pub mod conf;
pub mod error;
pub mod lookup;
pub mod service;
mod table;
mod timeout;
mod worker;
