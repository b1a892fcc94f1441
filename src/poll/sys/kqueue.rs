//! The kqueue selector.
//!
//! Read and write interest are separate filters in kqueue. Registering
//! therefore adds or deletes one kevent per filter and a wait may report
//! two events for the same descriptor which are merged.

use super::{interrupted_ok, Readiness};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::{io, mem, ptr};

//------------ Selector ------------------------------------------------------

pub struct Selector {
    kq: OwnedFd,
    events: Vec<libc::kevent>,
}

impl Selector {
    pub fn new(capacity: usize) -> io::Result<Self> {
        let kq = syscall!(kqueue())?;
        let kq = unsafe { OwnedFd::from_raw_fd(kq) };
        syscall!(fcntl(kq.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC))?;
        Ok(Selector {
            kq,
            // Each descriptor may produce a read and a write event.
            events: Vec::with_capacity(capacity.max(1) * 2),
        })
    }

    pub fn register(
        &mut self,
        fd: RawFd,
        token: usize,
        interest: Readiness,
    ) -> io::Result<()> {
        self.update(fd, token, interest)
    }

    pub fn reregister(
        &mut self,
        fd: RawFd,
        token: usize,
        interest: Readiness,
    ) -> io::Result<()> {
        self.update(fd, token, interest)
    }

    pub fn deregister(&mut self, fd: RawFd, token: usize) -> io::Result<()> {
        self.update(fd, token, Readiness::NONE)
    }

    fn update(
        &self,
        fd: RawFd,
        token: usize,
        interest: Readiness,
    ) -> io::Result<()> {
        let flags = |wanted: bool| {
            if wanted {
                libc::EV_ADD | libc::EV_RECEIPT
            } else {
                libc::EV_DELETE | libc::EV_RECEIPT
            }
        };
        let mut changes = [
            kevent(fd, libc::EVFILT_READ, flags(interest.is_readable()), token),
            kevent(
                fd,
                libc::EVFILT_WRITE,
                flags(interest.is_writable()),
                token,
            ),
        ];
        let n = syscall!(kevent(
            self.kq.as_raw_fd(),
            changes.as_ptr(),
            changes.len() as libc::c_int,
            changes.as_mut_ptr(),
            changes.len() as libc::c_int,
            ptr::null(),
        ))?;

        // With EV_RECEIPT, every change comes back with EV_ERROR set and
        // the error code, which may be zero, in data.
        for change in &changes[..n as usize] {
            if change.flags & libc::EV_ERROR == 0 || change.data == 0 {
                continue;
            }
            let code = change.data as i32;
            if code == libc::ENOENT && change.flags & libc::EV_DELETE != 0 {
                continue;
            }
            return Err(io::Error::from_raw_os_error(code));
        }
        Ok(())
    }

    pub fn select(
        &mut self,
        events: &mut Vec<(usize, Readiness)>,
        timeout_ms: Option<libc::c_int>,
    ) -> io::Result<()> {
        let timespec = timeout_ms.map(|ms| libc::timespec {
            tv_sec: (ms / 1000) as libc::time_t,
            tv_nsec: ((ms % 1000) * 1_000_000) as libc::c_long,
        });
        let timespec_ptr = match timespec {
            Some(ref timespec) => timespec as *const libc::timespec,
            None => ptr::null(),
        };
        self.events.clear();
        let n = match syscall!(kevent(
            self.kq.as_raw_fd(),
            ptr::null(),
            0,
            self.events.as_mut_ptr(),
            self.events.capacity() as libc::c_int,
            timespec_ptr,
        )) {
            Ok(n) => n as usize,
            Err(err) => return interrupted_ok(err),
        };
        unsafe { self.events.set_len(n) };

        let start = events.len();
        for event in &self.events {
            let token = event.udata as usize;
            let mut readiness = match event.filter {
                libc::EVFILT_READ => Readiness::READ,
                libc::EVFILT_WRITE => Readiness::WRITE,
                _ => Readiness::NONE,
            };
            if event.flags & libc::EV_ERROR != 0
                || (event.flags & libc::EV_EOF != 0 && event.fflags != 0)
            {
                readiness |= Readiness::ERROR;
            }
            match events[start..].iter_mut().find(|item| item.0 == token) {
                Some(item) => item.1 |= readiness,
                None => events.push((token, readiness)),
            }
        }
        Ok(())
    }
}

fn kevent(
    fd: RawFd,
    filter: i16,
    flags: u16,
    token: usize,
) -> libc::kevent {
    let mut res: libc::kevent = unsafe { mem::zeroed() };
    res.ident = fd as libc::uintptr_t;
    res.filter = filter;
    res.flags = flags;
    res.udata = token as *mut libc::c_void;
    res
}
