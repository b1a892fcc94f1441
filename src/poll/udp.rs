//! A UDP socket as a waitable.

use super::{Readiness, Waitable, WaitableState};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{
    Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6, UdpSocket,
};
use std::os::unix::io::{AsRawFd, RawFd};
use std::{fmt, io};

//------------ UdpWaitable ---------------------------------------------------

/// A non-blocking UDP socket that can be registered with a wait set.
///
/// Before each send or receive, the corresponding readiness flag is
/// cleared. A wait set sets it again once the socket becomes ready.
///
/// When bound via [`bind_any`][Self::bind_any], the socket is a dual-stack
/// IPv6 socket if the system allows it. IPv4 peers are then addressed via
/// IPv4-mapped IPv6 addresses behind the scenes. Source addresses of
/// received datagrams are always reported in their natural family.
pub struct UdpWaitable {
    sock: UdpSocket,

    /// Whether the socket is an IPv6 socket.
    ipv6: bool,

    state: WaitableState,
}

impl UdpWaitable {
    /// Binds a socket to an ephemeral port on all addresses.
    ///
    /// Tries a dual-stack socket first and falls back to IPv4 only.
    pub fn bind_any() -> io::Result<Self> {
        match Self::bind_dual_stack() {
            Ok(sock) => Ok(sock),
            Err(_) => {
                Self::bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0))
            }
        }
    }

    fn bind_dual_stack() -> io::Result<Self> {
        let sock =
            Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
        sock.set_only_v6(false)?;
        sock.bind(&SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0).into())?;
        sock.set_nonblocking(true)?;
        Ok(UdpWaitable {
            sock: sock.into(),
            ipv6: true,
            state: WaitableState::new(),
        })
    }

    /// Binds a socket to the given address.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let sock = Socket::new(
            Domain::for_address(addr),
            Type::DGRAM,
            Some(Protocol::UDP),
        )?;
        sock.bind(&addr.into())?;
        sock.set_nonblocking(true)?;
        Ok(UdpWaitable {
            sock: sock.into(),
            ipv6: addr.is_ipv6(),
            state: WaitableState::new(),
        })
    }

    /// Returns the local address of the socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.sock.local_addr()
    }

    /// Returns whether the socket can send to `addr`.
    pub fn can_reach(&self, addr: SocketAddr) -> bool {
        self.target_addr(addr).is_some()
    }

    /// Sends a datagram to the given address.
    pub fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.state.clear(Readiness::WRITE);
        let target = self.target_addr(addr).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "address family not supported by socket",
            )
        })?;
        self.sock.send_to(buf, target)
    }

    /// Receives a datagram.
    pub fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.state.clear(Readiness::READ);
        let (len, addr) = self.sock.recv_from(buf)?;
        Ok((len, unmap_addr(addr)))
    }

    /// Takes the pending error of the socket, if any.
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        self.sock.take_error()
    }

    fn target_addr(&self, addr: SocketAddr) -> Option<SocketAddr> {
        match (addr, self.ipv6) {
            (SocketAddr::V4(v4), true) => Some(
                SocketAddrV6::new(v4.ip().to_ipv6_mapped(), v4.port(), 0, 0)
                    .into(),
            ),
            (SocketAddr::V6(_), true) | (SocketAddr::V4(_), false) => {
                Some(addr)
            }
            (SocketAddr::V6(_), false) => {
                match unmap_addr(addr) {
                    addr @ SocketAddr::V4(_) => Some(addr),
                    SocketAddr::V6(_) => None,
                }
            }
        }
    }
}

/// Converts an IPv4-mapped IPv6 address into an IPv4 address.
fn unmap_addr(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
            Some(v4) => SocketAddrV4::new(v4, v6.port()).into(),
            None => addr,
        },
        addr => addr,
    }
}

impl Waitable for UdpWaitable {
    fn raw_fd(&self) -> RawFd {
        self.sock.as_raw_fd()
    }

    fn state(&self) -> &WaitableState {
        &self.state
    }
}

impl fmt::Debug for UdpWaitable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UdpWaitable")
            .field("sock", &self.sock)
            .field("ipv6", &self.ipv6)
            .field("state", &self.state)
            .finish()
    }
}

//============ Testing =======================================================
