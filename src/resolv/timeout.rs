//! Timeouts on a wrapping millisecond clock.
//!
//! Request expiry is measured in the `u32` milliseconds of a
//! [`Ticks`][super::clock::Ticks] source, which wrap around. To keep the
//! order of expiry times meaningful, there are two tables: one for the
//! current epoch of the tick counter and one for the next epoch, i.e., for
//! those expiry times that lie beyond the next wrap-around.
//!
//! A wrap-around is detected by the tick count moving from the upper half
//! of its range into the lower half. When that happens, everything left in
//! the current table has expired and the tables swap roles. The expired
//! values are kept aside and handed out one by one through
//! [`ExpiryTables::pop_expired`]. For this to
//! work, the tick count needs to be checked at least a few times per
//! cycle, which is why waits are limited to [`MAX_WAIT`].

use std::collections::BTreeMap;

/// The longest time in milliseconds the worker may wait without checking
/// for a wrap-around.
pub const MAX_WAIT: u32 = u32::MAX / 4;

/// Tick counts below this value are in the lower half of the range.
const HALF: u32 = u32::MAX / 2;

//------------ ExpiryKey -----------------------------------------------------

/// Identifies an entry in the expiry tables for removal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExpiryKey {
    table: usize,
    expiry: u32,
    seq: u64,
}

impl ExpiryKey {
    /// Returns the tick count at which the entry expires.
    pub fn expiry(self) -> u32 {
        self.expiry
    }
}

//------------ ExpiryTables --------------------------------------------------

/// Values ordered by their expiry time.
#[derive(Clone, Debug)]
pub struct ExpiryTables<T> {
    /// The two tables, keyed by expiry time and insertion order.
    tables: [BTreeMap<(u32, u64), T>; 2],

    /// The index of the table for the current epoch.
    current: usize,

    /// Values left over from an epoch that has ended.
    ended: BTreeMap<(u32, u64), T>,

    /// Whether the last tick count seen was in the lower half.
    lower_half: bool,

    /// The insertion counter.
    seq: u64,
}

impl<T> ExpiryTables<T> {
    /// Creates new, empty tables at the given tick count.
    pub fn new(now: u32) -> Self {
        ExpiryTables {
            tables: [BTreeMap::new(), BTreeMap::new()],
            current: 0,
            ended: BTreeMap::new(),
            lower_half: now < HALF,
            seq: 0,
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.tables[0].len() + self.tables[1].len() + self.ended.len()
    }

    /// Returns whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.tables[0].is_empty()
            && self.tables[1].is_empty()
            && self.ended.is_empty()
    }

    /// Adds a value expiring `timeout` milliseconds after `now`.
    ///
    /// The timeout is limited to [`MAX_WAIT`].
    pub fn insert(&mut self, now: u32, timeout: u32, value: T) -> ExpiryKey {
        let timeout = timeout.min(MAX_WAIT);
        let expiry = now.wrapping_add(timeout);
        let next = self.current ^ 1;
        let table = if now < HALF && !self.lower_half {
            // The counter has wrapped but the worker hasn’t noticed yet.
            // This value belongs with the ones that survive the swap.
            next
        } else if expiry < now {
            next
        } else {
            self.current
        };
        let seq = self.seq;
        self.seq += 1;
        self.tables[table].insert((expiry, seq), value);
        ExpiryKey { table, expiry, seq }
    }

    /// Removes the value with the given key.
    pub fn remove(&mut self, key: ExpiryKey) -> Option<T> {
        let key_pair = (key.expiry, key.seq);
        match self.tables[key.table].remove(&key_pair) {
            Some(value) => Some(value),
            None => self.ended.remove(&key_pair),
        }
    }

    /// Checks for a wrap-around of the tick counter.
    ///
    /// Returns whether the counter has wrapped since the last check. If so,
    /// all values from the epoch that just ended have expired and will be
    /// returned by [`pop_expired`][Self::pop_expired] before anything else.
    pub fn check_wrap(&mut self, now: u32) -> bool {
        let lower_half = now < HALF;
        let wrapped = lower_half && !self.lower_half;
        if wrapped {
            let mut ended = std::mem::take(&mut self.tables[self.current]);
            self.ended.append(&mut ended);
            self.current ^= 1;
        }
        self.lower_half = lower_half;
        wrapped
    }

    /// Returns the first value whose timeout has elapsed by `now`.
    ///
    /// A value has expired once `now` is strictly later than its expiry
    /// time, so it never expires early. Values from an ended epoch have
    /// always expired.
    pub fn pop_expired(&mut self, now: u32) -> Option<T> {
        if let Some((_, value)) = self.ended.pop_first() {
            return Some(value);
        }
        let table = &mut self.tables[self.current];
        let key = match table.keys().next() {
            Some(&key) if key.0 < now => key,
            _ => return None,
        };
        table.remove(&key)
    }

    /// Returns how long to wait at most before the next value expires.
    ///
    /// Returns `None` if there are no values at all. The result is never
    /// larger than [`MAX_WAIT`].
    pub fn next_wait(&self, now: u32) -> Option<u32> {
        let wait = if !self.ended.is_empty() {
            0
        } else if let Some(&(expiry, _)) =
            self.tables[self.current].keys().next()
        {
            expiry.saturating_sub(now).saturating_add(1)
        } else if let Some(&(expiry, _)) =
            self.tables[self.current ^ 1].keys().next()
        {
            expiry.wrapping_sub(now).saturating_add(1)
        } else {
            return None;
        };
        Some(wait.min(MAX_WAIT))
    }
}

//============ Testing =======================================================
