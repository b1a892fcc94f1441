//! The table of active requests.
//!
//! All requests the worker currently deals with live in a [`StateTable`].
//! The requests themselves are kept in an arena and referenced by
//! [`RequestKey`]. Four indexes point into the arena:
//!
//! * by transaction ID, to match responses to requests,
//! * by handle, so a lookup handle can find and cancel its request,
//! * by expiry time, to time out requests, and
//! * the send list of requests whose query still needs sending.
//!
//! Removing a request always removes it from all indexes at once.

use super::error::{LookupResult, StartError};
use super::timeout::{ExpiryKey, ExpiryTables};
use crate::base::iana::Rtype;
use crate::base::question::Question;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::fmt;
use std::sync::Arc;

//------------ Callback ------------------------------------------------------

/// The completion callback of a lookup.
pub type Callback = Arc<dyn Fn(LookupResult) + Send + Sync>;

//------------ HandleId ------------------------------------------------------

/// The identity of a lookup handle.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct HandleId(u64);

impl HandleId {
    /// Returns a new, process-wide unique handle ID.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        HandleId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

//------------ RequestKey ----------------------------------------------------

/// The index of a request in the arena.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RequestKey(usize);

//------------ PendingRequest ------------------------------------------------

/// A lookup that is waiting for its response.
pub struct PendingRequest {
    /// The handle that started the request.
    pub handle: HandleId,

    /// The question to ask.
    ///
    /// The record type starts out as AAAA and changes to A if there is no
    /// IPv6 address.
    pub question: Question,

    /// The transaction ID of the query.
    pub id: u16,

    /// The server to ask if not the default server.
    pub server: Option<SocketAddr>,

    /// Where to report the result.
    pub callback: Callback,

    /// The key in the expiry tables.
    expiry: ExpiryKey,

    /// Whether the request is on the send list.
    in_send_list: bool,
}

impl PendingRequest {
    /// Switches from asking for AAAA records to A records.
    ///
    /// Returns `false` if the request already asked for A records.
    pub fn fall_back_to_a(&mut self) -> bool {
        if self.question.qtype() != Rtype::AAAA {
            return false;
        }
        self.question = Question::new(
            self.question.qname().clone(),
            Rtype::A,
            self.question.qclass(),
        );
        true
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("handle", &self.handle)
            .field("question", &self.question)
            .field("id", &self.id)
            .field("server", &self.server)
            .field("expiry", &self.expiry)
            .field("in_send_list", &self.in_send_list)
            .finish()
    }
}

//------------ StateTable ----------------------------------------------------

/// The set of active requests.
#[derive(Debug)]
pub struct StateTable {
    arena: Vec<Option<PendingRequest>>,
    free: Vec<usize>,
    by_id: BTreeMap<u16, RequestKey>,
    by_handle: HashMap<HandleId, RequestKey>,
    expiry: ExpiryTables<RequestKey>,
    send_list: VecDeque<RequestKey>,
}

impl StateTable {
    /// Creates a new, empty table at the given tick count.
    pub fn new(now: u32) -> Self {
        StateTable {
            arena: Vec::new(),
            free: Vec::new(),
            by_id: BTreeMap::new(),
            by_handle: HashMap::new(),
            expiry: ExpiryTables::new(now),
            send_list: VecDeque::new(),
        }
    }

    /// Returns the number of active requests.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns whether there are no active requests.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Returns whether the given handle has an active request.
    pub fn contains_handle(&self, handle: HandleId) -> bool {
        self.by_handle.contains_key(&handle)
    }

    /// Adds a new request.
    ///
    /// The request is put at the end of the send list. Returns the key of
    /// the new request and whether the send list was empty before.
    pub fn insert(
        &mut self,
        now: u32,
        timeout: u32,
        handle: HandleId,
        question: Question,
        server: Option<SocketAddr>,
        callback: Callback,
    ) -> Result<(RequestKey, bool), StartError> {
        debug_assert!(!self.contains_handle(handle));
        let id = self.find_free_id().ok_or(StartError::TooManyRequests)?;
        let key = match self.free.pop() {
            Some(idx) => RequestKey(idx),
            None => {
                self.arena.push(None);
                RequestKey(self.arena.len() - 1)
            }
        };
        let expiry = self.expiry.insert(now, timeout, key);
        self.arena[key.0] = Some(PendingRequest {
            handle,
            question,
            id,
            server,
            callback,
            expiry,
            in_send_list: true,
        });
        self.by_id.insert(id, key);
        self.by_handle.insert(handle, key);
        let was_empty = self.send_list.is_empty();
        self.send_list.push_back(key);
        Ok((key, was_empty))
    }

    /// Returns a reference to the request with the given key.
    pub fn get(&self, key: RequestKey) -> Option<&PendingRequest> {
        self.arena.get(key.0).and_then(Option::as_ref)
    }

    /// Returns a mutable reference to the request with the given key.
    pub fn get_mut(&mut self, key: RequestKey) -> Option<&mut PendingRequest> {
        self.arena.get_mut(key.0).and_then(Option::as_mut)
    }

    /// Returns the key of the request with the given transaction ID.
    pub fn find_id(&self, id: u16) -> Option<RequestKey> {
        self.by_id.get(&id).copied()
    }

    /// Returns the key of the request started by the given handle.
    pub fn find_handle(&self, handle: HandleId) -> Option<RequestKey> {
        self.by_handle.get(&handle).copied()
    }

    /// Removes a request from the table and all indexes.
    pub fn remove(&mut self, key: RequestKey) -> Option<PendingRequest> {
        let request = self.arena.get_mut(key.0)?.take()?;
        self.free.push(key.0);
        self.by_id.remove(&request.id);
        self.by_handle.remove(&request.handle);
        self.expiry.remove(request.expiry);
        if request.in_send_list {
            self.send_list.retain(|item| *item != key);
        }
        Some(request)
    }

    /// Removes some request from the table.
    ///
    /// Returns `None` once the table is empty.
    pub fn pop_any(&mut self) -> Option<PendingRequest> {
        let key = *self.by_id.values().next()?;
        self.remove(key)
    }

    /// Removes the request started by the given handle.
    pub fn remove_handle(
        &mut self,
        handle: HandleId,
    ) -> Option<PendingRequest> {
        let key = self.find_handle(handle)?;
        self.remove(key)
    }

    /// Returns a free transaction ID.
    ///
    /// A random ID is tried first. If that is taken, the first free ID
    /// found by [`find_free_id_in`] is used. Returns `None` only if all
    /// possible IDs are in use.
    pub fn find_free_id(&self) -> Option<u16> {
        let id = rand::random();
        if !self.by_id.contains_key(&id) {
            return Some(id);
        }
        find_free_id_in(&self.by_id)
    }

    //--- Send list

    /// Returns whether there are queries waiting to be sent.
    pub fn has_pending_sends(&self) -> bool {
        !self.send_list.is_empty()
    }

    /// Returns the key of the next request whose query needs sending.
    pub fn next_send(&self) -> Option<RequestKey> {
        self.send_list.front().copied()
    }

    /// Removes the first request from the send list after it was sent.
    pub fn pop_send(&mut self) -> Option<RequestKey> {
        let key = self.send_list.pop_front()?;
        if let Some(request) = self.get_mut(key) {
            request.in_send_list = false;
        }
        Some(key)
    }

    /// Puts a request back at the end of the send list.
    ///
    /// Returns whether the send list was empty before.
    pub fn requeue(&mut self, key: RequestKey) -> bool {
        let was_empty = self.send_list.is_empty();
        if let Some(request) = self.get_mut(key) {
            if !request.in_send_list {
                request.in_send_list = true;
                self.send_list.push_back(key);
            }
        }
        was_empty
    }

    //--- Expiry

    /// Checks whether the tick counter has wrapped around.
    ///
    /// If it has, all requests from the epoch that ended are due and will
    /// be returned by [`pop_expired`][Self::pop_expired] first.
    pub fn check_wrap(&mut self, now: u32) -> bool {
        self.expiry.check_wrap(now)
    }

    /// Removes the first request that has expired by `now`.
    pub fn pop_expired(&mut self, now: u32) -> Option<PendingRequest> {
        let key = self.expiry.pop_expired(now)?;
        self.take_unexpiring(key)
    }

    /// Returns how long to wait before the next request expires.
    pub fn next_wait(&self, now: u32) -> Option<u32> {
        self.expiry.next_wait(now)
    }

    /// Removes a request whose expiry entry has already been removed.
    fn take_unexpiring(&mut self, key: RequestKey) -> Option<PendingRequest> {
        let request = self.arena.get_mut(key.0)?.take()?;
        self.free.push(key.0);
        self.by_id.remove(&request.id);
        self.by_handle.remove(&request.handle);
        if request.in_send_list {
            self.send_list.retain(|item| *item != key);
        }
        Some(request)
    }
}

/// Returns the first free ID in a map of used IDs.
///
/// If no IDs are used, this is 0. Otherwise, the ID right before the
/// smallest used ID or right after the largest used ID is preferred. If
/// neither exists, the first gap between used IDs is taken.
pub fn find_free_id_in<T>(used: &BTreeMap<u16, T>) -> Option<u16> {
    let first = match used.keys().next() {
        Some(&first) => first,
        None => return Some(0),
    };
    if first > 0 {
        return Some(first - 1);
    }
    if let Some(&last) = used.keys().next_back() {
        if last < u16::MAX {
            return Some(last + 1);
        }
    }
    let mut prev = first;
    for &id in used.keys().skip(1) {
        if id > prev + 1 {
            return Some(prev + 1);
        }
        prev = id;
    }
    None
}

//============ Testing =======================================================
