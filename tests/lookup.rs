#![cfg(unix)]

mod common;

use common::{channel, init_logging, Behaviour, StubServer};
use domain_lookup::base::iana::{Rcode, Rtype};
use domain_lookup::resolv::{
    HostLookup, LookupError, LookupResult, ManualTicks, ResolverService,
    ServiceConf, StartError,
};
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const EXAMPLE_V4: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);
const LONG: Duration = Duration::from_secs(5);
const SLOW: Duration = Duration::from_millis(200);

/// Returns a callback that announces itself and then takes a while.
///
/// The name is sent to `started` when the callback begins and added to
/// `finished` once it is done.
fn slow_callback(
    name: &'static str,
    started: &Arc<Mutex<mpsc::Sender<&'static str>>>,
    finished: &Arc<Mutex<Vec<&'static str>>>,
) -> impl Fn(LookupResult) + Send + Sync + 'static {
    let started = started.clone();
    let finished = finished.clone();
    move |_| {
        let _ = started.lock().send(name);
        thread::sleep(SLOW);
        finished.lock().push(name);
    }
}

/// Waits until `cond` becomes true.
fn wait_for(cond: impl Fn() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < LONG, "condition not met in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn resolves_ipv4_after_ipv6() {
    init_logging();
    let server = StubServer::start(Behaviour::Answer(EXAMPLE_V4));
    let service = ResolverService::with_conf(server.conf());
    let (callback, rx) = channel();
    let lookup = HostLookup::new(&service, callback);

    lookup.resolve("example.test", LONG, None).unwrap();
    assert_eq!(rx.recv_timeout(LONG).unwrap(), Ok(IpAddr::V4(EXAMPLE_V4)));
    assert_eq!(server.queries(), [Rtype::AAAA, Rtype::A]);
    assert!(!lookup.is_pending());
    assert_eq!(service.pending(), 0);
}

#[test]
fn resolves_ipv6() {
    init_logging();
    let v6 = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
    let server = StubServer::start(Behaviour::DualStack(EXAMPLE_V4, v6));
    let service = ResolverService::with_conf(server.conf());
    let (callback, rx) = channel();
    let lookup = service.lookup(callback);

    lookup.resolve("example.test.", LONG, None).unwrap();
    assert_eq!(rx.recv_timeout(LONG).unwrap(), Ok(IpAddr::V6(v6)));
    assert_eq!(server.queries(), [Rtype::AAAA]);
}

#[test]
fn per_request_server() {
    init_logging();
    let silent = StubServer::start(Behaviour::Silent);
    let server = StubServer::start(Behaviour::Answer(EXAMPLE_V4));
    let service = ResolverService::with_conf(silent.conf());
    let (callback, rx) = channel();
    let lookup = HostLookup::new(&service, callback);

    lookup
        .resolve("example.test", LONG, Some(server.addr()))
        .unwrap();
    assert_eq!(rx.recv_timeout(LONG).unwrap(), Ok(IpAddr::V4(EXAMPLE_V4)));
    assert!(silent.queries().is_empty());
}

#[test]
fn times_out() {
    init_logging();
    let server = StubServer::start(Behaviour::Silent);
    let service = ResolverService::with_conf(server.conf());
    let (callback, rx) = channel();
    let lookup = HostLookup::new(&service, callback);

    let start = Instant::now();
    lookup
        .resolve("example.test", Duration::from_millis(200), None)
        .unwrap();
    assert_eq!(rx.recv_timeout(LONG).unwrap(), Err(LookupError::Timeout));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");

    // The callback fires exactly once.
    assert_eq!(
        rx.recv_timeout(Duration::from_millis(300)),
        Err(RecvTimeoutError::Timeout)
    );
    assert!(!server.queries().is_empty());
}

#[test]
fn cancel_before_reply() {
    init_logging();
    let server = StubServer::start(Behaviour::Silent);
    let service = ResolverService::with_conf(server.conf());
    let (callback, rx) = channel();
    let lookup = HostLookup::new(&service, callback);

    lookup
        .resolve("example.test", Duration::from_millis(300), None)
        .unwrap();
    assert!(lookup.is_pending());
    assert!(lookup.cancel());
    assert!(!lookup.is_pending());
    assert!(!lookup.cancel());
    assert_eq!(
        rx.recv_timeout(Duration::from_millis(600)),
        Err(RecvTimeoutError::Timeout)
    );
}

#[test]
fn already_in_progress() {
    init_logging();
    let server = StubServer::start(Behaviour::Silent);
    let service = ResolverService::with_conf(server.conf());
    let (callback, rx) = channel();
    let lookup = HostLookup::new(&service, callback);

    lookup
        .resolve("example.test", Duration::from_millis(100), None)
        .unwrap();
    assert!(matches!(
        lookup.resolve("example.test", LONG, None),
        Err(StartError::AlreadyInProgress)
    ));
    assert_eq!(rx.recv_timeout(LONG).unwrap(), Err(LookupError::Timeout));
    assert_eq!(
        rx.recv_timeout(Duration::from_millis(200)),
        Err(RecvTimeoutError::Timeout)
    );
}

#[test]
fn no_such_host() {
    init_logging();
    let server = StubServer::start(Behaviour::Rcode(Rcode::NXDOMAIN));
    let service = ResolverService::with_conf(server.conf());
    let (callback, rx) = channel();
    let lookup = HostLookup::new(&service, callback);

    lookup.resolve("nowhere.test", LONG, None).unwrap();
    assert_eq!(rx.recv_timeout(LONG).unwrap(), Err(LookupError::NoSuchHost));
    assert_eq!(server.queries(), [Rtype::AAAA, Rtype::A]);
}

#[test]
fn dns_errors() {
    init_logging();
    for behaviour in [Behaviour::Rcode(Rcode::SERVFAIL), Behaviour::Truncated]
    {
        let server = StubServer::start(behaviour);
        let service = ResolverService::with_conf(server.conf());
        let (callback, rx) = channel();
        let lookup = HostLookup::new(&service, callback);

        lookup.resolve("example.test", LONG, None).unwrap();
        assert_eq!(
            rx.recv_timeout(LONG).unwrap(),
            Err(LookupError::DnsError),
            "{behaviour:?}"
        );
        assert_eq!(server.queries(), [Rtype::AAAA]);
    }
}

#[test]
fn no_server() {
    init_logging();
    let service = ResolverService::with_conf(ServiceConf {
        resolv_conf: "/nonexistent/resolv.conf".into(),
        default_server: None,
        ..Default::default()
    });
    let (callback, rx) = channel();
    let lookup = HostLookup::new(&service, callback);

    lookup.resolve("example.test", LONG, None).unwrap();
    assert_eq!(rx.recv_timeout(LONG).unwrap(), Err(LookupError::Error));
}

#[test]
fn bad_host_name() {
    let service = ResolverService::with_conf(ServiceConf {
        resolv_conf: "/nonexistent/resolv.conf".into(),
        ..Default::default()
    });
    let lookup = HostLookup::new(&service, |_| {});
    assert!(matches!(
        lookup.resolve("bad..name", LONG, None),
        Err(StartError::BadName(_))
    ));
    assert!(matches!(
        lookup.resolve(&"a".repeat(254), LONG, None),
        Err(StartError::BadName(_))
    ));
    assert!(!lookup.is_pending());
}

#[test]
fn concurrent_lookups() {
    init_logging();
    let server = StubServer::start(Behaviour::Answer(EXAMPLE_V4));
    let service = ResolverService::with_conf(server.conf());
    let (callback, rx) = channel();
    let callback = std::sync::Arc::new(callback);
    let lookups: Vec<_> = (0..20)
        .map(|_| {
            let callback = callback.clone();
            HostLookup::new(&service, move |res| callback(res))
        })
        .collect();
    for (i, lookup) in lookups.iter().enumerate() {
        lookup
            .resolve(&format!("host{i}.example.test"), LONG, None)
            .unwrap();
    }
    for _ in 0..20 {
        assert_eq!(
            rx.recv_timeout(LONG).unwrap(),
            Ok(IpAddr::V4(EXAMPLE_V4))
        );
    }
    assert_eq!(service.pending(), 0);
}

#[test]
fn reuse_after_idle() {
    init_logging();
    let server = StubServer::start(Behaviour::Answer(EXAMPLE_V4));
    let service = ResolverService::with_conf(server.conf());
    let (callback, rx) = channel();
    let lookup = HostLookup::new(&service, callback);

    for _ in 0..3 {
        lookup.resolve("example.test", LONG, None).unwrap();
        assert_eq!(
            rx.recv_timeout(LONG).unwrap(),
            Ok(IpAddr::V4(EXAMPLE_V4))
        );
        // Give the worker time to exit so the next round starts a new one.
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn shutdown_fails_outstanding() {
    init_logging();
    let server = StubServer::start(Behaviour::Silent);
    let service = ResolverService::with_conf(server.conf());
    let (callback, rx) = channel();
    let lookup = HostLookup::new(&service, callback);

    lookup.resolve("example.test", LONG, None).unwrap();
    let start = Instant::now();
    service.shutdown();
    assert!(start.elapsed() < LONG);
    assert_eq!(
        rx.recv_timeout(Duration::from_millis(100)).unwrap(),
        Err(LookupError::Error)
    );
    assert!(matches!(
        lookup.resolve("example.test", LONG, None),
        Err(StartError::ShutDown)
    ));
}

#[test]
fn cancel_waits_for_running_callback() {
    init_logging();
    let server = StubServer::start(Behaviour::Silent);
    let service = ResolverService::with_conf(server.conf());
    let (started_tx, started) = mpsc::channel();
    let started_tx = Arc::new(Mutex::new(started_tx));
    let finished = Arc::new(Mutex::new(Vec::new()));
    let lookup = HostLookup::new(
        &service,
        slow_callback("a", &started_tx, &finished),
    );

    lookup
        .resolve("example.test", Duration::from_millis(50), None)
        .unwrap();
    assert_eq!(started.recv_timeout(LONG).unwrap(), "a");
    // The callback is still sleeping, so this has to wait for it.
    assert!(!lookup.cancel());
    assert_eq!(*finished.lock(), ["a"]);
}

#[test]
fn cancel_while_failing_outstanding() {
    init_logging();
    let server = StubServer::start(Behaviour::Silent);
    let service = Arc::new(ResolverService::with_conf(server.conf()));
    let (started_tx, started) = mpsc::channel();
    let started_tx = Arc::new(Mutex::new(started_tx));
    let finished = Arc::new(Mutex::new(Vec::new()));
    let a = HostLookup::new(
        &service,
        slow_callback("a", &started_tx, &finished),
    );
    let b = HostLookup::new(
        &service,
        slow_callback("b", &started_tx, &finished),
    );
    a.resolve("a.example.test", LONG, None).unwrap();
    b.resolve("b.example.test", LONG, None).unwrap();

    let shutdown = {
        let service = service.clone();
        thread::spawn(move || service.shutdown())
    };
    // While the first callback runs, the other request is still
    // outstanding and cancelling it means it never completes.
    let first = started.recv_timeout(LONG).unwrap();
    let other = if first == "a" { &b } else { &a };
    assert!(other.cancel());
    shutdown.join().unwrap();

    assert_eq!(*finished.lock(), [first]);
    assert!(started.try_recv().is_err());
}

#[test]
fn wrap_around_times_out_old_requests() {
    init_logging();
    let server = StubServer::start(Behaviour::Silent);
    let ticks = ManualTicks::new(u32::MAX - 10_000);
    let service = ResolverService::with_conf(ServiceConf {
        ticks: Arc::new(ticks.clone()),
        ..server.conf()
    });
    let (old_callback, old_rx) = channel();
    let old = HostLookup::new(&service, old_callback);
    let (new_callback, new_rx) = channel();
    let new = HostLookup::new(&service, new_callback);

    // The first expires before the counter wraps, the second after.
    old.resolve("old.example.test", Duration::from_secs(5), None)
        .unwrap();
    new.resolve("new.example.test", Duration::from_secs(20), None)
        .unwrap();
    wait_for(|| server.queries().len() == 2);

    ticks.set(10);
    // Starting another lookup wakes up the worker.
    let (wake_callback, _wake_rx) = channel();
    let wake = HostLookup::new(&service, wake_callback);
    wake.resolve("wake.example.test", LONG, None).unwrap();

    assert_eq!(old_rx.recv_timeout(LONG).unwrap(), Err(LookupError::Timeout));
    assert!(new.is_pending());
    assert!(wake.is_pending());
    assert_eq!(
        new_rx.recv_timeout(Duration::from_millis(100)),
        Err(RecvTimeoutError::Timeout)
    );
    assert!(new.cancel());
    assert!(wake.cancel());
}

#[test]
fn send_failure_fails_everything() {
    init_logging();
    let server = StubServer::start(Behaviour::Silent);
    let service = ResolverService::with_conf(server.conf());
    let (pending_callback, pending_rx) = channel();
    let pending = HostLookup::new(&service, pending_callback);
    pending.resolve("example.test", LONG, None).unwrap();
    wait_for(|| !server.queries().is_empty());

    // Sending to the broadcast address without permission fails.
    let (failing_callback, failing_rx) = channel();
    let failing = HostLookup::new(&service, failing_callback);
    failing
        .resolve(
            "example.test",
            LONG,
            Some(SocketAddr::from(([255, 255, 255, 255], 53))),
        )
        .unwrap();

    assert_eq!(
        failing_rx.recv_timeout(LONG).unwrap(),
        Err(LookupError::Error)
    );
    assert_eq!(
        pending_rx.recv_timeout(LONG).unwrap(),
        Err(LookupError::Error)
    );
    assert_eq!(service.pending(), 0);

    // A new worker takes over for later lookups.
    let answering = StubServer::start(Behaviour::Answer(EXAMPLE_V4));
    pending
        .resolve("example.test", LONG, Some(answering.addr()))
        .unwrap();
    assert_eq!(
        pending_rx.recv_timeout(LONG).unwrap(),
        Ok(IpAddr::V4(EXAMPLE_V4))
    );
}
