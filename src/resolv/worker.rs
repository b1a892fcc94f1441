//! The worker thread.
//!
//! The worker owns a UDP socket and a wait set watching both the socket
//! and the worker’s command queue. Each round it
//!
//! * fails everything if the socket reports an error or sending or
//!   receiving fails,
//! * receives and dispatches responses,
//! * sends queries for the requests on the send list,
//! * times out expired requests,
//!
//! and then sleeps until the socket becomes ready, a command arrives, or
//! the next request expires. Once the table is empty, the worker exits.
//!
//! The state lock is held for each round except while callbacks run. No
//! request key is kept across a callback since the table may change while
//! the lock is released.

use super::error::{LookupError, LookupResult};
use super::service::{Inner, State, ThreadState};
use super::table::RequestKey;
use crate::base::header::HeaderSection;
use crate::base::iana::Rtype;
use crate::base::message::{AnswerError, QueryMessage, Reply};
use crate::poll::{
    self, MessageQueue, Readiness, UdpWaitable, WaitSet, Waitable,
};
use parking_lot::MutexGuard;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

//------------ Command -------------------------------------------------------

/// A message to the worker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Command {
    /// The send list is no longer empty.
    StartSending,

    /// Something changed that the worker should look at.
    Wake,
}

//------------ run -----------------------------------------------------------

/// The body of the worker thread.
pub(super) fn run(
    inner: Arc<Inner>,
    queue: Arc<MessageQueue<Command>>,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        if previous.join().is_err() {
            warn!("Previous resolver worker thread panicked");
        }
    }
    let default_server = inner.conf.discover_server();
    debug!(?default_server, "Resolver worker running");
    match Worker::new(inner.clone(), queue, default_server) {
        Ok(mut worker) => worker.run(),
        Err(err) => {
            warn!("Failed to set up resolver worker: {err}");
            inner.fail_all(&mut inner.state.lock());
        }
    }
    debug!("Resolver worker exiting");
}

//------------ Worker --------------------------------------------------------

struct Worker {
    inner: Arc<Inner>,
    queue: Arc<MessageQueue<Command>>,
    sock: UdpWaitable,
    wait_set: WaitSet,

    /// The server for requests without their own.
    default_server: Option<SocketAddr>,

    /// The current interest for the socket.
    interest: Readiness,

    /// Buffer for composing queries.
    send_buf: Vec<u8>,

    /// Buffer for receiving responses.
    recv_buf: Vec<u8>,
}

impl Worker {
    fn new(
        inner: Arc<Inner>,
        queue: Arc<MessageQueue<Command>>,
        default_server: Option<SocketAddr>,
    ) -> Result<Self, poll::Error> {
        let sock = UdpWaitable::bind_any()?;
        let mut wait_set = WaitSet::new(2)?;
        wait_set.add(&*queue, Readiness::READ)?;
        if let Err(err) = wait_set.add(&sock, Readiness::READ_WRITE) {
            let _ = wait_set.remove(&*queue);
            return Err(err);
        }
        Ok(Worker {
            inner,
            queue,
            sock,
            wait_set,
            default_server,
            interest: Readiness::READ_WRITE,
            send_buf: Vec::with_capacity(QueryMessage::MAX_LEN),
            recv_buf: vec![0; QueryMessage::MAX_LEN],
        })
    }

    fn run(&mut self) {
        let inner = self.inner.clone();
        loop {
            let mut state = inner.state.lock();
            if state.shut_down {
                debug!("Resolver shut down, failing outstanding requests");
                inner.fail_all(&mut state);
                return;
            }

            let readiness = self.sock.readiness();
            if readiness.is_error() {
                match self.sock.take_error() {
                    Ok(Some(err)) | Err(err) => {
                        warn!("Resolver socket failed: {err}")
                    }
                    Ok(None) => warn!("Resolver socket failed"),
                }
                inner.fail_all(&mut state);
                return;
            }
            if readiness.is_readable() {
                if let Err(err) = self.receive(&mut state) {
                    warn!("Failed to receive response: {err}");
                    inner.fail_all(&mut state);
                    return;
                }
            }
            if readiness.is_writable() {
                if let Err(err) = self.send(&mut state) {
                    warn!("Failed to send query: {err}");
                    inner.fail_all(&mut state);
                    return;
                }
            }
            if let Err(err) = self.update_interest(&state) {
                warn!("Failed to update socket interest: {err}");
                inner.fail_all(&mut state);
                return;
            }

            if state.table.check_wrap(inner.conf.ticks.ticks()) {
                debug!("Tick counter wrapped around");
            }
            loop {
                let now = inner.conf.ticks.ticks();
                match state.table.pop_expired(now) {
                    Some(request) => {
                        trace!("Request for {} timed out", request.question);
                        inner.complete(
                            &mut state,
                            request,
                            Err(LookupError::Timeout),
                        );
                    }
                    None => break,
                }
            }

            if state.table.is_empty() {
                state.thread = ThreadState::Exiting;
                return;
            }
            let wait = state
                .table
                .next_wait(inner.conf.ticks.ticks())
                .map(|millis| Duration::from_millis(millis.into()));
            drop(state);

            if let Err(err) = self.wait_set.wait(wait, None) {
                warn!("Failed to wait for resolver socket: {err}");
                inner.fail_all(&mut inner.state.lock());
                return;
            }
            while let Some(command) = self.queue.pop_nonblocking() {
                trace!(?command, "Resolver worker received command");
            }
        }
    }

    /// Asks for writability only while there is something to send.
    fn update_interest(&mut self, state: &State) -> Result<(), poll::Error> {
        let interest = if state.table.has_pending_sends() {
            Readiness::READ_WRITE
        } else {
            Readiness::READ
        };
        if interest != self.interest {
            self.wait_set.change(&self.sock, interest)?;
            self.interest = interest;
        }
        Ok(())
    }

    /// Receives datagrams until there are no more.
    ///
    /// An error other than running out of datagrams is fatal.
    fn receive(&mut self, state: &mut MutexGuard<State>) -> io::Result<()> {
        loop {
            let (len, from) = match self.sock.recv_from(&mut self.recv_buf) {
                Ok(res) => res,
                Err(err) => match err.kind() {
                    io::ErrorKind::WouldBlock => return Ok(()),
                    io::ErrorKind::Interrupted => continue,
                    _ => return Err(err),
                },
            };
            self.dispatch(state, len, from);
        }
    }

    /// Processes a received datagram.
    fn dispatch(
        &self,
        state: &mut MutexGuard<State>,
        len: usize,
        from: SocketAddr,
    ) {
        let data = &self.recv_buf[..len];
        if data.len() <= HeaderSection::LEN {
            trace!(%from, len, "Discarding short datagram");
            return;
        }
        let id = u16::from_be_bytes([data[0], data[1]]);
        let key = match state.table.find_id(id) {
            Some(key) => key,
            None => {
                trace!(%from, id, "Discarding response with unknown ID");
                return;
            }
        };
        let (server, question) = match state.table.get(key) {
            Some(request) => (
                request.server.or(self.default_server),
                request.question.clone(),
            ),
            None => return,
        };
        if server != Some(from) {
            trace!(%from, id, "Discarding response from unexpected source");
            return;
        }

        let reply = match Reply::from_slice(data) {
            Ok(reply) => reply,
            Err(err) => {
                debug!("Malformed response for {question}: {err}");
                self.finish(state, key, Err(LookupError::DnsError));
                return;
            }
        };
        if *reply.question() != question {
            trace!(%from, id, "Discarding response to a different question");
            return;
        }
        let result = match reply.answer() {
            Ok(addr) => Ok(addr),
            Err(AnswerError::NoSuchHost | AnswerError::NoRecord)
                if question.qtype() == Rtype::AAAA =>
            {
                debug!("No IPv6 address for {}, trying IPv4", question.qname());
                self.fall_back(state, key);
                return;
            }
            Err(AnswerError::NoSuchHost) => Err(LookupError::NoSuchHost),
            Err(err) => {
                debug!("Error response for {question}: {err}");
                Err(LookupError::DnsError)
            }
        };
        trace!(id, ?result, "Response for {}", question.qname());
        self.finish(state, key, result);
    }

    /// Re-queues a request for A records.
    fn fall_back(&self, state: &mut MutexGuard<State>, key: RequestKey) {
        if let Some(request) = state.table.get_mut(key) {
            request.fall_back_to_a();
        }
        state.table.requeue(key);
    }

    /// Sends queries until the send list is empty or the socket is full.
    ///
    /// An error other than a full socket is fatal.
    fn send(&mut self, state: &mut MutexGuard<State>) -> io::Result<()> {
        while let Some(key) = state.table.next_send() {
            let (id, server) = match state.table.get(key) {
                Some(request) => {
                    self.send_buf.clear();
                    QueryMessage::new(request.id, request.question.clone())
                        .compose(&mut self.send_buf);
                    (request.id, request.server.or(self.default_server))
                }
                None => {
                    state.table.pop_send();
                    continue;
                }
            };
            let server = match server {
                Some(server) if self.sock.can_reach(server) => server,
                _ => {
                    debug!(id, ?server, "No usable server for request");
                    self.finish(state, key, Err(LookupError::Error));
                    continue;
                }
            };
            match self.sock.send_to(&self.send_buf, server) {
                Ok(_) => {
                    trace!(%server, id, "Sent query");
                    state.table.pop_send();
                }
                Err(err) => match err.kind() {
                    io::ErrorKind::WouldBlock => return Ok(()),
                    io::ErrorKind::Interrupted => {}
                    _ => {
                        debug!(%server, id, "Sending query failed");
                        return Err(err);
                    }
                },
            }
        }
        Ok(())
    }

    /// Removes a request from the table and delivers its result.
    fn finish(
        &self,
        state: &mut MutexGuard<State>,
        key: RequestKey,
        result: LookupResult,
    ) {
        if let Some(request) = state.table.remove(key) {
            self.inner.complete(state, request, result);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(err) = self.wait_set.remove(&*self.queue) {
            warn!("Failed to remove message queue from wait set: {err}");
        }
        if let Err(err) = self.wait_set.remove(&self.sock) {
            warn!("Failed to remove socket from wait set: {err}");
        }
    }
}
