//! A waitable message queue.
//!
//! A [`MessageQueue`] is an unbounded FIFO that can be pushed to from any
//! thread. It is readable exactly while it contains items, which makes it
//! possible to deliver commands to a thread sleeping in a
//! [`WaitSet`][super::WaitSet].
//!
//! To wake up the operating system’s selector, the queue keeps a signal
//! descriptor: an eventfd on Linux and Android and a self-pipe everywhere
//! else. It is signalled when the queue becomes non-empty and drained when
//! the queue becomes empty again.
//!
//! The queue supports a single consumer only. Popping from more than one
//! thread at the same time leads to unspecified ordering of wake-ups.

use super::{Readiness, Waitable, WaitableState};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::{fmt, io};
use tracing::warn;

//------------ MessageQueue --------------------------------------------------

/// A thread-safe FIFO that is a waitable.
pub struct MessageQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
    signal: Signal,
    state: WaitableState,
}

impl<T> MessageQueue<T> {
    /// Creates a new, empty queue.
    ///
    /// This fails if the signal descriptor cannot be created.
    pub fn new() -> io::Result<Self> {
        Ok(MessageQueue {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            signal: Signal::new()?,
            state: WaitableState::new(),
        })
    }

    /// Appends an item to the end of the queue.
    ///
    /// This never blocks for longer than it takes to acquire the queue’s
    /// lock.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock();
        let was_empty = items.is_empty();
        items.push_back(item);
        if was_empty {
            self.state.insert(Readiness::READ);
            if let Err(err) = self.signal.notify() {
                warn!("Failed to signal message queue: {err}");
            }
        }
        self.available.notify_one();
    }

    /// Takes the first item from the queue if there is one.
    pub fn pop_nonblocking(&self) -> Option<T> {
        let mut items = self.items.lock();
        let res = items.pop_front();
        if res.is_some() && items.is_empty() {
            self.drained();
        }
        res
    }

    /// Takes the first item from the queue, waiting for one if necessary.
    pub fn pop(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                if items.is_empty() {
                    self.drained();
                }
                return item;
            }
            self.available.wait(&mut items);
        }
    }

    /// Returns the number of items currently in the queue.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns whether the queue currently is empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Resets readiness after the queue became empty.
    ///
    /// Must be called with the items lock held.
    fn drained(&self) {
        self.state.clear(Readiness::READ);
        if let Err(err) = self.signal.drain() {
            warn!("Failed to reset message queue signal: {err}");
        }
    }
}

impl<T> Waitable for MessageQueue<T> {
    fn raw_fd(&self) -> RawFd {
        self.signal.raw_fd()
    }

    fn state(&self) -> &WaitableState {
        &self.state
    }

    /// A queue is only ever ready for reading.
    fn interest_mask(&self) -> Readiness {
        Readiness::READ
    }
}

impl<T> fmt::Debug for MessageQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("len", &self.len())
            .field("state", &self.state)
            .finish()
    }
}

//------------ Signal --------------------------------------------------------

#[cfg(any(target_os = "linux", target_os = "android"))]
use self::eventfd::Signal;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
use self::pipe::Signal;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod eventfd {
    use std::io;
    use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};

    /// A signal based on an eventfd.
    pub struct Signal {
        fd: OwnedFd,
    }

    impl Signal {
        pub fn new() -> io::Result<Self> {
            let fd = syscall!(eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK))?;
            Ok(Signal {
                fd: unsafe { OwnedFd::from_raw_fd(fd) },
            })
        }

        pub fn raw_fd(&self) -> RawFd {
            self.fd.as_raw_fd()
        }

        pub fn notify(&self) -> io::Result<()> {
            let buf = 1u64.to_ne_bytes();
            match syscall!(write(
                self.fd.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
            )) {
                Ok(_) => Ok(()),
                // The counter is about to overflow, so it is set anyway.
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        pub fn drain(&self) -> io::Result<()> {
            let mut buf = [0u8; 8];
            match syscall!(read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )) {
                Ok(_) => Ok(()),
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
mod pipe {
    use std::io;
    use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};

    /// A signal based on a non-blocking self-pipe.
    pub struct Signal {
        read: OwnedFd,
        write: OwnedFd,
    }

    impl Signal {
        pub fn new() -> io::Result<Self> {
            let mut fds = [0 as libc::c_int; 2];
            syscall!(pipe(fds.as_mut_ptr()))?;
            let (read, write) = unsafe {
                (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))
            };
            for fd in [&read, &write] {
                syscall!(fcntl(fd.as_raw_fd(), libc::F_SETFL, libc::O_NONBLOCK))?;
                syscall!(fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC))?;
            }
            Ok(Signal { read, write })
        }

        pub fn raw_fd(&self) -> RawFd {
            self.read.as_raw_fd()
        }

        pub fn notify(&self) -> io::Result<()> {
            let buf = [1u8];
            match syscall!(write(
                self.write.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
            )) {
                Ok(_) => Ok(()),
                // A full pipe is readable, which is all we want.
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        pub fn drain(&self) -> io::Result<()> {
            let mut buf = [0u8; 64];
            loop {
                match syscall!(read(
                    self.read.as_raw_fd(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )) {
                    Ok(0) => return Ok(()),
                    Ok(_) => continue,
                    Err(ref err)
                        if err.kind() == io::ErrorKind::WouldBlock =>
                    {
                        return Ok(())
                    }
                    Err(ref err)
                        if err.kind() == io::ErrorKind::Interrupted =>
                    {
                        continue
                    }
                    Err(err) => return Err(err),
                }
            }
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::poll::WaitSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_and_readiness() {
        let queue = MessageQueue::new().unwrap();
        assert!(queue.is_empty());
        assert!(queue.readiness().is_empty());
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.readiness(), Readiness::READ);
        assert_eq!(queue.pop_nonblocking(), Some(1));
        assert_eq!(queue.readiness(), Readiness::READ);
        assert_eq!(queue.pop(), 2);
        assert!(queue.readiness().is_empty());
        assert_eq!(queue.pop_nonblocking(), None);
    }

    #[test]
    fn signal_follows_emptiness() {
        let queue = MessageQueue::new().unwrap();
        let mut set = WaitSet::new(1).unwrap();
        set.add(&queue, Readiness::READ).unwrap();
        assert_eq!(set.wait(Some(Duration::ZERO), None).unwrap(), 0);
        queue.push("a");
        assert_eq!(set.wait(Some(Duration::ZERO), None).unwrap(), 1);
        assert_eq!(queue.pop_nonblocking(), Some("a"));
        assert_eq!(set.wait(Some(Duration::ZERO), None).unwrap(), 0);
        set.remove(&queue).unwrap();
    }

    #[test]
    fn blocking_pop() {
        let queue = Arc::new(MessageQueue::new().unwrap());
        let pusher = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.push(7u32);
            })
        };
        assert_eq!(queue.pop(), 7);
        pusher.join().unwrap();
    }
}
