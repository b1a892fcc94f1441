//! The epoll selector.

use super::{interrupted_ok, Readiness};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::io;

//------------ Selector ------------------------------------------------------

pub struct Selector {
    ep: OwnedFd,
    events: Vec<libc::epoll_event>,
}

impl Selector {
    pub fn new(capacity: usize) -> io::Result<Self> {
        let ep = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
        Ok(Selector {
            ep: unsafe { OwnedFd::from_raw_fd(ep) },
            events: Vec::with_capacity(capacity.max(1)),
        })
    }

    pub fn register(
        &mut self,
        fd: RawFd,
        token: usize,
        interest: Readiness,
    ) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, token, interest)
    }

    pub fn reregister(
        &mut self,
        fd: RawFd,
        token: usize,
        interest: Readiness,
    ) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, token, interest)
    }

    pub fn deregister(&mut self, fd: RawFd, token: usize) -> io::Result<()> {
        // Kernels before 2.6.9 require a non-null event even for removal.
        self.ctl(libc::EPOLL_CTL_DEL, fd, token, Readiness::NONE)
    }

    fn ctl(
        &self,
        op: libc::c_int,
        fd: RawFd,
        token: usize,
        interest: Readiness,
    ) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: interest_to_epoll(interest),
            u64: token as u64,
        };
        syscall!(epoll_ctl(self.ep.as_raw_fd(), op, fd, &mut event))?;
        Ok(())
    }

    pub fn select(
        &mut self,
        events: &mut Vec<(usize, Readiness)>,
        timeout_ms: Option<libc::c_int>,
    ) -> io::Result<()> {
        self.events.clear();
        let n = match syscall!(epoll_wait(
            self.ep.as_raw_fd(),
            self.events.as_mut_ptr(),
            self.events.capacity() as libc::c_int,
            timeout_ms.unwrap_or(-1),
        )) {
            Ok(n) => n as usize,
            Err(err) => return interrupted_ok(err),
        };
        unsafe { self.events.set_len(n) };
        for event in &self.events {
            let (bits, token) = (event.events, event.u64);
            events.push((token as usize, epoll_to_readiness(bits)));
        }
        Ok(())
    }
}

fn interest_to_epoll(interest: Readiness) -> u32 {
    let mut res = 0;
    if interest.is_readable() {
        res |= (libc::EPOLLIN | libc::EPOLLPRI) as u32;
    }
    if interest.is_writable() {
        res |= libc::EPOLLOUT as u32;
    }
    res
}

fn epoll_to_readiness(bits: u32) -> Readiness {
    let mut res = Readiness::NONE;
    if bits & (libc::EPOLLIN | libc::EPOLLPRI | libc::EPOLLHUP) as u32 != 0 {
        res |= Readiness::READ;
    }
    if bits & libc::EPOLLOUT as u32 != 0 {
        res |= Readiness::WRITE;
    }
    if bits & libc::EPOLLERR as u32 != 0 {
        res |= Readiness::ERROR;
    }
    res
}

//============ Testing =======================================================
