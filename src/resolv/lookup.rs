//! Looking up host addresses.

use super::error::{LookupResult, StartError};
use super::service::{Inner, ResolverService};
use super::table::{Callback, HandleId};
use crate::base::iana::Rtype;
use crate::base::name::HostName;
use crate::base::question::Question;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

//------------ HostLookup ----------------------------------------------------

/// A handle for looking up the address of a host.
///
/// A handle can have at most one lookup outstanding at a time. When it
/// completes, the handle’s callback is called with the result. Once that
/// has happened, the handle can be used for another lookup.
///
/// The lookup first asks for an IPv6 address. If the host doesn’t have one,
/// it asks for an IPv4 address instead. The first address found is the
/// result.
///
/// The callback is called on the resolver’s worker thread. It should
/// return quickly since no other responses are processed while it runs.
/// If the result is needed on some other thread, the callback has to send
/// it there, for instance via a channel or a
/// [`MessageQueue`][crate::poll::MessageQueue].
///
/// Dropping the handle cancels an outstanding lookup.
pub struct HostLookup {
    inner: Arc<Inner>,
    handle: HandleId,
    callback: Callback,
}

impl HostLookup {
    /// Creates a new lookup handle for the given service.
    pub fn new<F>(service: &ResolverService, callback: F) -> Self
    where
        F: Fn(LookupResult) + Send + Sync + 'static,
    {
        HostLookup {
            inner: service.inner().clone(),
            handle: HandleId::next(),
            callback: Arc::new(callback),
        }
    }

    /// Starts looking up the address of `host`.
    ///
    /// If no response arrives within `timeout`, the lookup completes with
    /// [`LookupError::Timeout`][super::LookupError::Timeout]. The server to
    /// ask can be given via `server`. Otherwise the service’s default
    /// server is used.
    ///
    /// Fails if a lookup is already outstanding on this handle, if `host`
    /// isn’t a valid host name, or if there are too many lookups
    /// outstanding.
    pub fn resolve(
        &self,
        host: &str,
        timeout: Duration,
        server: Option<SocketAddr>,
    ) -> Result<(), StartError> {
        let name = HostName::from_text(host)?;
        self.inner.start(
            self.handle,
            Question::new_in(name, Rtype::AAAA),
            timeout,
            server,
            self.callback.clone(),
        )
    }

    /// Cancels an outstanding lookup.
    ///
    /// Returns `true` if there was a lookup and it has been cancelled. In
    /// this case, the callback will not be called for it.
    ///
    /// Returns `false` if there was no outstanding lookup. If the callback
    /// is running right now, this waits for it to finish unless called
    /// from within a callback.
    pub fn cancel(&self) -> bool {
        self.inner.cancel(self.handle)
    }

    /// Returns whether a lookup is currently outstanding.
    pub fn is_pending(&self) -> bool {
        self.inner.is_pending(self.handle)
    }
}

impl Drop for HostLookup {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for HostLookup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HostLookup")
            .field("handle", &self.handle)
            .finish()
    }
}
