//! The resolver service.
//!
//! A [`ResolverService`] owns everything lookups share: the table of
//! active requests and the worker thread that sends queries and receives
//! responses. The worker is started when the first request arrives and
//! exits again once there are no more requests. A later request starts a
//! new worker which first joins the thread of its predecessor.
//!
//! Two locks are involved. The state lock protects the request table and
//! the worker bookkeeping. The completion lock is held by the worker for
//! as long as it runs a completion callback, with the state lock released.
//! Cancelling a request that isn’t in the table anymore briefly takes the
//! completion lock, which guarantees that a callback that may be running
//! for the request has finished when cancelling returns.

use super::conf::ServiceConf;
use super::error::{LookupError, LookupResult, StartError};
use super::lookup::HostLookup;
use super::table::{Callback, HandleId, PendingRequest, StateTable};
use super::worker::{self, Command};
use crate::base::question::Question;
use crate::poll::MessageQueue;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, warn};

//------------ ResolverService -----------------------------------------------

/// The shared context of all host lookups.
///
/// Lookups are started through a [`HostLookup`] created via
/// [`lookup`][Self::lookup] or [`HostLookup::new`]. Dropping the service
/// shuts it down: outstanding requests complete with
/// [`LookupError::Error`] and the worker thread is joined.
pub struct ResolverService {
    inner: Arc<Inner>,
}

impl ResolverService {
    /// Creates a new service with the default configuration.
    ///
    /// The server to ask is taken from the system’s resolver
    /// configuration.
    pub fn new() -> Self {
        Self::with_conf(ServiceConf::default())
    }

    /// Creates a new service with the given configuration.
    pub fn with_conf(conf: ServiceConf) -> Self {
        let now = conf.ticks.ticks();
        ResolverService {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    table: StateTable::new(now),
                    thread: ThreadState::NotStarted,
                    worker: None,
                    worker_thread: None,
                    shut_down: false,
                }),
                completed: Mutex::new(()),
                conf,
            }),
        }
    }

    /// Returns the configuration of the service.
    pub fn conf(&self) -> &ServiceConf {
        &self.inner.conf
    }

    /// Creates a new lookup handle reporting to `callback`.
    pub fn lookup<F>(&self, callback: F) -> HostLookup
    where
        F: Fn(LookupResult) + Send + Sync + 'static,
    {
        HostLookup::new(self, callback)
    }

    /// Returns the number of requests currently outstanding.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().table.len()
    }

    /// Shuts the service down.
    ///
    /// All outstanding requests complete with [`LookupError::Error`]. New
    /// lookups fail with [`StartError::ShutDown`]. Returns once the worker
    /// thread has finished unless called from within a completion
    /// callback.
    pub fn shutdown(&self) {
        let join = {
            let mut state = self.inner.state.lock();
            if state.shut_down {
                return;
            }
            debug!("Shutting down resolver service");
            state.shut_down = true;
            match state.worker.take() {
                Some(worker) => {
                    worker.queue.push(Command::Wake);
                    Some(worker.join)
                }
                None => None,
            }
        };
        if let Some(join) = join {
            if join.thread().id() == thread::current().id() {
                // The worker exits on its own once the callback returns.
                return;
            }
            if join.join().is_err() {
                warn!("Resolver worker thread panicked");
            }
        }
    }

    pub(super) fn inner(&self) -> &Arc<Inner> {
        &self.inner
    }
}

impl Default for ResolverService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ResolverService {
    fn drop(&mut self) {
        self.shutdown()
    }
}

impl fmt::Debug for ResolverService {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResolverService")
            .field("conf", &self.inner.conf)
            .finish()
    }
}

//------------ Inner ---------------------------------------------------------

/// The part of the service shared with lookup handles and the worker.
pub(super) struct Inner {
    pub(super) conf: ServiceConf,
    pub(super) state: Mutex<State>,
    completed: Mutex<()>,
}

/// The state protected by the state lock.
pub(super) struct State {
    pub(super) table: StateTable,
    pub(super) thread: ThreadState,

    /// The current worker if it hasn’t been joined yet.
    worker: Option<WorkerHandle>,

    /// The thread ID of the current worker.
    worker_thread: Option<ThreadId>,

    pub(super) shut_down: bool,
}

/// The life-cycle of the worker thread.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum ThreadState {
    /// No worker has been started yet.
    NotStarted,

    /// A worker is processing requests.
    Running,

    /// The worker has left its loop and won’t touch the table anymore.
    Exiting,
}

struct WorkerHandle {
    queue: Arc<MessageQueue<Command>>,
    join: JoinHandle<()>,
}

impl Inner {
    /// Adds a new request and makes sure a worker takes care of it.
    pub(super) fn start(
        self: &Arc<Self>,
        handle: HandleId,
        question: Question,
        timeout: Duration,
        server: Option<SocketAddr>,
        callback: Callback,
    ) -> Result<(), StartError> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(StartError::ShutDown);
        }
        if state.table.contains_handle(handle) {
            return Err(StartError::AlreadyInProgress);
        }
        let now = self.conf.ticks.ticks();
        if state.thread != ThreadState::Running && state.table.is_empty() {
            state.table = StateTable::new(now);
        }
        let timeout = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        let (key, was_empty) = state
            .table
            .insert(now, timeout, handle, question, server, callback)?;
        if state.thread == ThreadState::Running {
            if was_empty {
                if let Some(worker) = state.worker.as_ref() {
                    worker.queue.push(Command::StartSending);
                }
            }
            return Ok(());
        }
        if let Err(err) = self.spawn_worker(&mut state) {
            state.table.remove(key);
            return Err(err);
        }
        Ok(())
    }

    /// Cancels the request of the given handle.
    ///
    /// Returns whether the request was still outstanding. If it wasn’t,
    /// waits for a completion callback that may currently be running.
    pub(super) fn cancel(&self, handle: HandleId) -> bool {
        let mut state = self.state.lock();
        if state.table.remove_handle(handle).is_some() {
            if state.table.is_empty() && state.thread == ThreadState::Running
            {
                if let Some(worker) = state.worker.as_ref() {
                    worker.queue.push(Command::Wake);
                }
            }
            return true;
        }
        let on_worker = state.worker_thread == Some(thread::current().id());
        drop(state);
        if !on_worker {
            drop(self.completed.lock());
        }
        false
    }

    /// Returns whether the given handle has an outstanding request.
    pub(super) fn is_pending(&self, handle: HandleId) -> bool {
        self.state.lock().table.contains_handle(handle)
    }

    /// Delivers the result of a request that has left the table.
    ///
    /// The state lock is released while the callback runs and the
    /// completion lock is held instead.
    pub(super) fn complete(
        &self,
        state: &mut MutexGuard<State>,
        request: PendingRequest,
        result: LookupResult,
    ) {
        let completed = self.completed.lock();
        MutexGuard::unlocked(state, move || {
            (request.callback)(result);
            drop(request);
            drop(completed);
        })
    }

    /// Completes all requests with an error and lets the worker exit.
    ///
    /// Each request leaves the table only right before its callback runs,
    /// so the others can still be cancelled in the meantime. Requests added
    /// while callbacks run are failed, too. Returns with the thread marked
    /// as exiting and the table empty.
    pub(super) fn fail_all(&self, state: &mut MutexGuard<State>) {
        while let Some(request) = state.table.pop_any() {
            self.complete(state, request, Err(LookupError::Error));
        }
        state.thread = ThreadState::Exiting;
    }

    fn spawn_worker(
        self: &Arc<Self>,
        state: &mut State,
    ) -> Result<(), StartError> {
        let queue = Arc::new(MessageQueue::new().map_err(StartError::Spawn)?);
        let previous = state.worker.take().map(|worker| worker.join);
        let inner = self.clone();
        let worker_queue = queue.clone();
        debug!("Starting resolver worker");
        let join = thread::Builder::new()
            .name("domain-lookup".into())
            .spawn(move || worker::run(inner, worker_queue, previous))
            .map_err(StartError::Spawn)?;
        state.worker_thread = Some(join.thread().id());
        state.worker = Some(WorkerHandle { queue, join });
        state.thread = ThreadState::Running;
        Ok(())
    }
}
