//! Waiting for readiness of file descriptors.
//!
//! This module provides a small, blocking readiness multiplexer. Anything
//! that can become ready for reading or writing and is backed by a file
//! descriptor can implement the [`Waitable`] trait. A [`WaitSet`] holds a
//! bounded number of waitables and blocks the calling thread until at least
//! one of them becomes ready or a timeout passes.
//!
//! Each waitable carries a [`WaitableState`] which, among other things,
//! holds its current [`Readiness`]. When a wait returns, the readiness of
//! every waitable the operating system reported is replaced with what was
//! reported. The readiness of all other waitables is left alone. Waitables
//! themselves clear readiness bits once they learn they are no longer
//! ready, typically right before performing a non-blocking operation.
//!
//! Three backends are available: epoll on Linux and Android, kqueue on the
//! BSDs and Apple systems, and poll(2) everywhere. [`WaitSet::new`] picks
//! the best one for the platform, [`WaitSet::with_backend`] allows choosing
//! explicitly.
//!
//! Two waitables are provided. A [`MessageQueue`] is a thread-safe FIFO
//! that is readable whenever it isn’t empty. It is used to deliver commands
//! into a thread that otherwise sleeps in a wait set. A [`UdpWaitable`] is
//! a non-blocking UDP socket.
//!
//! A waitable can be registered with at most one wait set at a time. It
//! must be removed before it is dropped and a wait set must be empty when
//! it is dropped. Both rules are enforced by panicking.

#![cfg(unix)]

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{fmt, io, ops, thread};

/// Calls a libc function and turns a return value of -1 into an error.
macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
        #[allow(unused_unsafe)]
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

pub use self::queue::MessageQueue;
pub use self::sys::Backend;
pub use self::udp::UdpWaitable;

pub mod queue;
mod sys;
pub mod udp;

//------------ Readiness -----------------------------------------------------

/// A set of readiness flags.
///
/// The same type is used both for what a waitable is ready for and what a
/// caller is interested in. For the latter, only [`READ`][Self::READ] and
/// [`WRITE`][Self::WRITE] are meaningful. Errors are always reported.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct Readiness(u8);

impl Readiness {
    /// No flags at all.
    pub const NONE: Readiness = Readiness(0);

    /// Ready for reading.
    pub const READ: Readiness = Readiness(0b001);

    /// Ready for writing.
    pub const WRITE: Readiness = Readiness(0b010);

    /// An error condition is pending.
    pub const ERROR: Readiness = Readiness(0b100);

    /// Both reading and writing.
    pub const READ_WRITE: Readiness = Readiness(0b011);

    const ALL: u8 = 0b111;

    /// Creates a value from its raw bits, ignoring unknown bits.
    pub const fn from_bits(bits: u8) -> Self {
        Readiness(bits & Self::ALL)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns whether no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns whether all flags of `other` are set in `self`.
    pub const fn contains(self, other: Readiness) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether any flag of `other` is set in `self`.
    pub const fn intersects(self, other: Readiness) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_readable(self) -> bool {
        self.intersects(Self::READ)
    }

    pub const fn is_writable(self) -> bool {
        self.intersects(Self::WRITE)
    }

    pub const fn is_error(self) -> bool {
        self.intersects(Self::ERROR)
    }

    /// Returns `self` with all the flags in `other` removed.
    pub const fn without(self, other: Readiness) -> Self {
        Readiness(self.0 & !other.0)
    }
}

impl ops::BitOr for Readiness {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        Readiness(self.0 | other.0)
    }
}

impl ops::BitAnd for Readiness {
    type Output = Self;

    fn bitand(self, other: Self) -> Self {
        Readiness(self.0 & other.0)
    }
}

impl ops::BitOrAssign for Readiness {
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for (flag, name) in [
            (Self::READ, "READ"),
            (Self::WRITE, "WRITE"),
            (Self::ERROR, "ERROR"),
        ] {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("NONE")?;
        }
        Ok(())
    }
}

//------------ Waitable ------------------------------------------------------

/// Something that can be registered with a [`WaitSet`].
pub trait Waitable {
    /// Returns the file descriptor the operating system should watch.
    fn raw_fd(&self) -> RawFd;

    /// Returns the readiness state of the waitable.
    fn state(&self) -> &WaitableState;

    /// Returns the interest the waitable can make use of.
    ///
    /// A wait set drops any other interest when registering the waitable.
    fn interest_mask(&self) -> Readiness {
        Readiness::READ_WRITE
    }

    /// Returns the current readiness of the waitable.
    fn readiness(&self) -> Readiness {
        self.state().readiness()
    }
}

//------------ WaitableState -------------------------------------------------

/// The state every waitable keeps.
///
/// This contains the readiness flags, whether the waitable currently is
/// registered with a wait set, and a word of user data that a wait set
/// reports for triggered waitables.
///
/// The wait set keeps a shared reference to the state so it can update
/// the readiness. Dropping the state while it is still registered is a
/// programming error and results in a panic.
pub struct WaitableState {
    shared: Arc<SharedState>,
}

struct SharedState {
    readiness: AtomicU8,
    registered: AtomicBool,
    user_data: AtomicUsize,
}

impl WaitableState {
    /// Creates a new, unregistered state with no readiness.
    pub fn new() -> Self {
        WaitableState {
            shared: Arc::new(SharedState {
                readiness: AtomicU8::new(0),
                registered: AtomicBool::new(false),
                user_data: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the current readiness.
    pub fn readiness(&self) -> Readiness {
        Readiness::from_bits(self.shared.readiness.load(Ordering::Acquire))
    }

    /// Adds the given flags to the readiness.
    pub fn insert(&self, flags: Readiness) {
        self.shared.readiness.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Removes the given flags from the readiness.
    pub fn clear(&self, flags: Readiness) {
        self.shared.readiness.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Returns whether the waitable is currently registered.
    pub fn is_registered(&self) -> bool {
        self.shared.registered.load(Ordering::Acquire)
    }

    /// Returns the user data.
    pub fn user_data(&self) -> usize {
        self.shared.user_data.load(Ordering::Relaxed)
    }

    /// Sets the user data reported for this waitable by [`WaitSet::wait`].
    pub fn set_user_data(&self, data: usize) {
        self.shared.user_data.store(data, Ordering::Relaxed)
    }
}

impl Default for WaitableState {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WaitableState {
    fn drop(&mut self) {
        if self.is_registered() && !thread::panicking() {
            panic!("waitable dropped while still registered in a wait set");
        }
    }
}

impl fmt::Debug for WaitableState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WaitableState")
            .field("readiness", &self.readiness())
            .field("registered", &self.is_registered())
            .field("user_data", &self.user_data())
            .finish()
    }
}

//------------ WaitSet -------------------------------------------------------

/// A bounded set of waitables to wait on.
pub struct WaitSet {
    /// The registered waitables. The index is the token given to the
    /// selector.
    slots: Vec<Option<Slot>>,

    /// The number of occupied slots.
    len: usize,

    selector: sys::Selector,

    /// Events reported by the selector.
    events: Vec<(usize, Readiness)>,
}

struct Slot {
    fd: RawFd,
    shared: Arc<SharedState>,
}

impl WaitSet {
    /// Creates a new wait set for up to `capacity` waitables.
    ///
    /// The best backend for the current platform is used.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        Self::with_backend(capacity, Backend::default())
    }

    /// Creates a new wait set using the given backend.
    ///
    /// Fails with an error of kind `Unsupported` if the backend isn’t
    /// available on this platform.
    pub fn with_backend(
        capacity: usize,
        backend: Backend,
    ) -> Result<Self, Error> {
        Ok(WaitSet {
            slots: (0..capacity).map(|_| None).collect(),
            len: 0,
            selector: sys::Selector::new(backend, capacity)?,
            events: Vec::with_capacity(capacity),
        })
    }

    /// Returns the backend used by the wait set.
    pub fn backend(&self) -> Backend {
        self.selector.backend()
    }

    /// Returns the maximum number of waitables.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of registered waitables.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether there are no waitables registered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Registers a waitable with the given interest.
    pub fn add<W: Waitable + ?Sized>(
        &mut self,
        waitable: &W,
        interest: Readiness,
    ) -> Result<(), Error> {
        let state = waitable.state();
        if state.is_registered() {
            return Err(Error::AlreadyRegistered);
        }
        let token = match self.slots.iter().position(Option::is_none) {
            Some(token) => token,
            None => return Err(Error::Full),
        };
        let fd = waitable.raw_fd();
        let interest = interest & waitable.interest_mask();
        self.selector.register(fd, token, interest)?;
        state.shared.registered.store(true, Ordering::Release);
        self.slots[token] = Some(Slot {
            fd,
            shared: state.shared.clone(),
        });
        self.len += 1;
        Ok(())
    }

    /// Changes the interest of a registered waitable.
    pub fn change<W: Waitable + ?Sized>(
        &mut self,
        waitable: &W,
        interest: Readiness,
    ) -> Result<(), Error> {
        let token = self.find(waitable.state())?;
        let fd = self.fd(token);
        let interest = interest & waitable.interest_mask();
        self.selector.reregister(fd, token, interest)?;
        Ok(())
    }

    /// Removes a registered waitable.
    pub fn remove<W: Waitable + ?Sized>(
        &mut self,
        waitable: &W,
    ) -> Result<(), Error> {
        let token = self.find(waitable.state())?;
        let fd = self.fd(token);
        let res = self.selector.deregister(fd, token);
        // The waitable is forgotten even if the selector complained so it
        // can always be dropped afterwards.
        if let Some(slot) = self.slots[token].take() {
            slot.shared.registered.store(false, Ordering::Release);
        }
        self.len -= 1;
        res.map_err(Into::into)
    }

    /// Waits until at least one waitable becomes ready.
    ///
    /// If `timeout` is `None`, waits forever. Otherwise waits at least for
    /// the given duration, rounded up to whole milliseconds, before giving
    /// up. If `triggered` is given, it is cleared and filled with the user
    /// data of each waitable that became ready.
    ///
    /// Returns the number of waitables that became ready which is zero if
    /// the timeout passed. Fails with [`Error::Empty`] if there are no
    /// waitables registered.
    pub fn wait(
        &mut self,
        timeout: Option<Duration>,
        mut triggered: Option<&mut Vec<usize>>,
    ) -> Result<usize, Error> {
        if let Some(triggered) = triggered.as_mut() {
            triggered.clear();
        }
        if self.is_empty() {
            return Err(Error::Empty);
        }
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let timeout_ms = match deadline {
                Some(deadline) => {
                    let left =
                        deadline.saturating_duration_since(Instant::now());
                    Some(ceil_millis(left))
                }
                None => None,
            };
            self.events.clear();
            self.selector.select(&mut self.events, timeout_ms)?;
            if !self.events.is_empty() {
                break;
            }
            match deadline {
                Some(deadline) if Instant::now() >= deadline => break,
                _ => {}
            }
        }

        let mut count = 0;
        for &(token, readiness) in &self.events {
            let slot = match self.slots.get(token) {
                Some(Some(slot)) => slot,
                _ => continue,
            };
            slot.shared.readiness.store(readiness.bits(), Ordering::Release);
            if readiness.is_empty() {
                continue;
            }
            count += 1;
            if let Some(triggered) = triggered.as_mut() {
                triggered.push(slot.shared.user_data.load(Ordering::Relaxed));
            }
        }
        Ok(count)
    }

    fn find(&self, state: &WaitableState) -> Result<usize, Error> {
        self.slots
            .iter()
            .position(|slot| match slot {
                Some(slot) => Arc::ptr_eq(&slot.shared, &state.shared),
                None => false,
            })
            .ok_or(Error::NotRegistered)
    }

    fn fd(&self, token: usize) -> RawFd {
        match self.slots[token] {
            Some(ref slot) => slot.fd,
            None => unreachable!(),
        }
    }
}

impl Drop for WaitSet {
    fn drop(&mut self) {
        if !self.is_empty() && !thread::panicking() {
            panic!(
                "wait set dropped with {} waitables still registered",
                self.len
            );
        }
    }
}

impl fmt::Debug for WaitSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WaitSet")
            .field("backend", &self.backend())
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .finish()
    }
}

/// Converts a duration into milliseconds, rounding up.
fn ceil_millis(duration: Duration) -> libc::c_int {
    let millis = duration
        .as_secs()
        .saturating_mul(1000)
        .saturating_add(u64::from((duration.subsec_nanos() + 999_999) / 1_000_000));
    libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
}

//------------ Error ---------------------------------------------------------

/// An error happened while using a wait set.
#[derive(Debug)]
pub enum Error {
    /// The wait set already holds as many waitables as it can.
    Full,

    /// The waitable already is registered with a wait set.
    AlreadyRegistered,

    /// The waitable is not registered with this wait set.
    NotRegistered,

    /// There is nothing to wait for.
    Empty,

    /// The operating system reported an error.
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Full => f.write_str("wait set is full"),
            Error::AlreadyRegistered => {
                f.write_str("waitable already registered")
            }
            Error::NotRegistered => f.write_str("waitable not registered"),
            Error::Empty => f.write_str("wait set is empty"),
            Error::Io(ref err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

//============ Testing =======================================================
