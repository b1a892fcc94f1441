//! Looking up host addresses via the DNS.
//!
//! This crate provides a small, self-contained resolver that looks up the
//! IP address of a host name by asking a single DNS server over UDP. All
//! lookups share one background thread which sends the queries, matches
//! responses, and handles timeouts. Results are delivered through a
//! callback on that thread.
//!
//! # Modules
//!
//! * [base] contains the few DNS types needed for address lookups: host
//!   names, questions, message headers, and the query and response
//!   messages built from them.
//! * [poll] contains a blocking readiness multiplexer, the [`WaitSet`],
//!   with backends for epoll, kqueue, and poll(2), plus a UDP socket and a
//!   thread-safe message queue that can be waited on.
//! * [resolv] contains the resolver itself: the [`ResolverService`] that
//!   owns the worker thread and the [`HostLookup`] handles for starting
//!   and cancelling lookups.
//!
//! # Example
//!
//! ```no_run
//! use domain_lookup::resolv::{HostLookup, ResolverService};
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! let service = ResolverService::new();
//! let (tx, rx) = mpsc::channel();
//! let tx = std::sync::Mutex::new(tx);
//! let lookup = HostLookup::new(&service, move |res| {
//!     let _ = tx.lock().unwrap().send(res);
//! });
//! lookup.resolve("example.com", Duration::from_secs(5), None).unwrap();
//! match rx.recv().unwrap() {
//!     Ok(addr) => println!("example.com has address {addr}"),
//!     Err(err) => println!("lookup failed: {err}"),
//! }
//! ```
//!
//! The crate is only available on Unix systems.
//!
//! [`WaitSet`]: poll::WaitSet
//! [`ResolverService`]: resolv::ResolverService
//! [`HostLookup`]: resolv::HostLookup

#![cfg(unix)]
#![allow(renamed_and_removed_lints)]
#![allow(clippy::unknown_clippy_lints)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod base;
pub mod poll;
pub mod resolv;
