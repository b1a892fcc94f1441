//! The poll(2) selector.

use super::{interrupted_ok, Readiness};
use std::io;
use std::os::unix::io::RawFd;

//------------ Selector ------------------------------------------------------

pub struct Selector {
    fds: Vec<libc::pollfd>,

    /// The token for each element of `fds`.
    tokens: Vec<usize>,
}

impl Selector {
    pub fn new(capacity: usize) -> Self {
        Selector {
            fds: Vec::with_capacity(capacity),
            tokens: Vec::with_capacity(capacity),
        }
    }

    pub fn register(
        &mut self,
        fd: RawFd,
        token: usize,
        interest: Readiness,
    ) -> io::Result<()> {
        self.fds.push(libc::pollfd {
            fd,
            events: interest_to_poll(interest),
            revents: 0,
        });
        self.tokens.push(token);
        Ok(())
    }

    pub fn reregister(
        &mut self,
        _fd: RawFd,
        token: usize,
        interest: Readiness,
    ) -> io::Result<()> {
        let idx = self.index(token)?;
        self.fds[idx].events = interest_to_poll(interest);
        Ok(())
    }

    pub fn deregister(&mut self, _fd: RawFd, token: usize) -> io::Result<()> {
        let idx = self.index(token)?;
        self.fds.swap_remove(idx);
        self.tokens.swap_remove(idx);
        Ok(())
    }

    fn index(&self, token: usize) -> io::Result<usize> {
        self.tokens.iter().position(|&item| item == token).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "unknown poll token")
        })
    }

    pub fn select(
        &mut self,
        events: &mut Vec<(usize, Readiness)>,
        timeout_ms: Option<libc::c_int>,
    ) -> io::Result<()> {
        if let Err(err) = syscall!(poll(
            self.fds.as_mut_ptr(),
            self.fds.len() as libc::nfds_t,
            timeout_ms.unwrap_or(-1),
        )) {
            return interrupted_ok(err);
        }
        for (pollfd, &token) in self.fds.iter_mut().zip(&self.tokens) {
            if pollfd.revents != 0 {
                events.push((token, poll_to_readiness(pollfd.revents)));
                pollfd.revents = 0;
            }
        }
        Ok(())
    }
}

fn interest_to_poll(interest: Readiness) -> libc::c_short {
    let mut res = 0;
    if interest.is_readable() {
        res |= libc::POLLIN | libc::POLLPRI;
    }
    if interest.is_writable() {
        res |= libc::POLLOUT;
    }
    res
}

fn poll_to_readiness(revents: libc::c_short) -> Readiness {
    let mut res = Readiness::NONE;
    if revents & (libc::POLLIN | libc::POLLPRI | libc::POLLHUP) != 0 {
        res |= Readiness::READ;
    }
    if revents & libc::POLLOUT != 0 {
        res |= Readiness::WRITE;
    }
    if revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
        res |= Readiness::ERROR;
    }
    res
}

//============ Testing =======================================================
