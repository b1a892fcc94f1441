//! The operating system specific selectors.
//!
//! Each selector provides the same four operations: registering a file
//! descriptor under a token with some interest, changing that interest,
//! deregistering, and waiting for events. A timeout of `None` means to wait
//! forever. An interrupted wait returns without any events.

use super::Readiness;
use std::os::unix::io::RawFd;
use std::{fmt, io};

#[cfg(any(target_os = "linux", target_os = "android"))]
mod epoll;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "dragonfly",
))]
mod kqueue;

mod pollfd;

//------------ Backend -------------------------------------------------------

/// The mechanism used by a wait set to wait for readiness.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Backend {
    /// Linux’s epoll.
    Epoll,

    /// The kernel event queues of the BSDs and Apple’s systems.
    Kqueue,

    /// The portable poll(2) call.
    Poll,
}

impl Backend {
    /// Returns whether the backend can be used on this platform.
    pub fn is_available(self) -> bool {
        match self {
            Backend::Epoll => {
                cfg!(any(target_os = "linux", target_os = "android"))
            }
            Backend::Kqueue => cfg!(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "dragonfly",
            )),
            Backend::Poll => true,
        }
    }

    /// Returns all backends available on this platform.
    pub fn available() -> Vec<Backend> {
        [Backend::Epoll, Backend::Kqueue, Backend::Poll]
            .into_iter()
            .filter(|backend| backend.is_available())
            .collect()
    }
}

impl Default for Backend {
    fn default() -> Self {
        if Backend::Epoll.is_available() {
            Backend::Epoll
        } else if Backend::Kqueue.is_available() {
            Backend::Kqueue
        } else {
            Backend::Poll
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Backend::Epoll => "epoll",
            Backend::Kqueue => "kqueue",
            Backend::Poll => "poll",
        })
    }
}

//------------ Selector ------------------------------------------------------

pub enum Selector {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    Epoll(epoll::Selector),

    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "dragonfly",
    ))]
    Kqueue(kqueue::Selector),

    Poll(pollfd::Selector),
}

/// Dispatches a method call to whichever selector is in use.
macro_rules! dispatch {
    ($self:expr, $sel:ident => $call:expr) => {
        match $self {
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Selector::Epoll($sel) => $call,
            #[cfg(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "dragonfly",
            ))]
            Selector::Kqueue($sel) => $call,
            Selector::Poll($sel) => $call,
        }
    };
}

impl Selector {
    pub fn new(backend: Backend, capacity: usize) -> io::Result<Self> {
        match backend {
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Backend::Epoll => epoll::Selector::new(capacity).map(Selector::Epoll),
            #[cfg(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "dragonfly",
            ))]
            Backend::Kqueue => {
                kqueue::Selector::new(capacity).map(Selector::Kqueue)
            }
            Backend::Poll => Ok(Selector::Poll(pollfd::Selector::new(capacity))),
            #[allow(unreachable_patterns)]
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} is not available on this platform", backend),
            )),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            #[cfg(any(target_os = "linux", target_os = "android"))]
            Selector::Epoll(_) => Backend::Epoll,
            #[cfg(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "dragonfly",
            ))]
            Selector::Kqueue(_) => Backend::Kqueue,
            Selector::Poll(_) => Backend::Poll,
        }
    }

    pub fn register(
        &mut self,
        fd: RawFd,
        token: usize,
        interest: Readiness,
    ) -> io::Result<()> {
        dispatch!(self, sel => sel.register(fd, token, interest))
    }

    pub fn reregister(
        &mut self,
        fd: RawFd,
        token: usize,
        interest: Readiness,
    ) -> io::Result<()> {
        dispatch!(self, sel => sel.reregister(fd, token, interest))
    }

    pub fn deregister(&mut self, fd: RawFd, token: usize) -> io::Result<()> {
        dispatch!(self, sel => sel.deregister(fd, token))
    }

    /// Waits for events and appends them to `events`.
    ///
    /// Each token appears at most once in `events`.
    pub fn select(
        &mut self,
        events: &mut Vec<(usize, Readiness)>,
        timeout_ms: Option<libc::c_int>,
    ) -> io::Result<()> {
        dispatch!(self, sel => sel.select(events, timeout_ms))
    }
}

/// Turns an interrupted system call into a successful empty result.
fn interrupted_ok(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::Interrupted {
        Ok(())
    } else {
        Err(err)
    }
}
