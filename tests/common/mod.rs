//! A stub DNS server for testing lookups.

#![allow(dead_code)]

use domain_lookup::base::iana::{Class, Rcode, Rtype};
use domain_lookup::base::{HeaderSection, QueryMessage};
use domain_lookup::resolv::{LookupResult, ServiceConf};
use parking_lot::Mutex;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

//------------ Behaviour -----------------------------------------------------

/// How the stub server answers queries.
#[derive(Clone, Copy, Debug)]
pub enum Behaviour {
    /// Answers A queries with the address and AAAA queries with no data.
    Answer(Ipv4Addr),

    /// Answers both A and AAAA queries.
    DualStack(Ipv4Addr, Ipv6Addr),

    /// Answers everything with the given response code.
    Rcode(Rcode),

    /// Answers with a response cut short right after the header.
    Truncated,

    /// Doesn’t answer at all.
    Silent,
}

//------------ StubServer ----------------------------------------------------

/// A DNS server on a local UDP socket running in its own thread.
pub struct StubServer {
    addr: SocketAddr,
    queries: Arc<Mutex<Vec<Rtype>>>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl StubServer {
    pub fn start(behaviour: Behaviour) -> Self {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let addr = sock.local_addr().unwrap();
        let queries = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let join = {
            let queries = queries.clone();
            let stop = stop.clone();
            thread::spawn(move || serve(sock, behaviour, queries, stop))
        };
        StubServer {
            addr,
            queries,
            stop,
            join: Some(join),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the record types of all queries received so far.
    pub fn queries(&self) -> Vec<Rtype> {
        self.queries.lock().clone()
    }

    /// Returns a service configuration using this server.
    pub fn conf(&self) -> ServiceConf {
        ServiceConf {
            resolv_conf: "/nonexistent/resolv.conf".into(),
            default_server: Some(self.addr),
            ..Default::default()
        }
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn serve(
    sock: UdpSocket,
    behaviour: Behaviour,
    queries: Arc<Mutex<Vec<Rtype>>>,
    stop: Arc<AtomicBool>,
) {
    let mut buf = [0u8; 512];
    while !stop.load(Ordering::Relaxed) {
        let (len, from) = match sock.recv_from(&mut buf) {
            Ok(res) => res,
            Err(_) => continue,
        };
        let query = match QueryMessage::parse(&buf[..len]) {
            Ok(query) => query,
            Err(_) => continue,
        };
        let qtype = query.question().qtype();
        queries.lock().push(qtype);
        let v4_answer = |v4: Ipv4Addr| {
            response(&query, Rcode::NOERROR, &[(Rtype::A, &v4.octets()[..])])
        };
        let reply = match behaviour {
            Behaviour::Answer(v4) if qtype == Rtype::A => v4_answer(v4),
            Behaviour::Answer(_) => response(&query, Rcode::NOERROR, &[]),
            Behaviour::DualStack(v4, _) if qtype == Rtype::A => v4_answer(v4),
            Behaviour::DualStack(_, v6) => response(
                &query,
                Rcode::NOERROR,
                &[(Rtype::AAAA, &v6.octets()[..])],
            ),
            Behaviour::Rcode(rcode) => response(&query, rcode, &[]),
            Behaviour::Truncated => {
                let mut res = response(&query, Rcode::NOERROR, &[]);
                res.truncate(HeaderSection::LEN + 1);
                res
            }
            Behaviour::Silent => continue,
        };
        let _ = sock.send_to(&reply, from);
    }
}

/// Builds a response to `query`.
///
/// Answer records use a compression pointer to the question’s name. A
/// CNAME record is put in front of the answers to make sure they are
/// skipped over.
pub fn response(
    query: &QueryMessage,
    rcode: Rcode,
    answers: &[(Rtype, &[u8])],
) -> Vec<u8> {
    let mut section = HeaderSection::new();
    section.header_mut().set_id(query.id());
    section.header_mut().set_qr(true);
    section.header_mut().set_rd(true);
    section.header_mut().set_ra(true);
    section.header_mut().set_rcode(rcode);
    section.counts_mut().set_qdcount(1);
    let cname = b"\x05alias\x04test\x00";
    let ancount = if answers.is_empty() { 0 } else { answers.len() + 1 };
    section.counts_mut().set_ancount(ancount as u16);

    let mut res = Vec::new();
    section.compose(&mut res);
    query.question().compose(&mut res);
    if !answers.is_empty() {
        record(&mut res, Rtype::CNAME, cname);
    }
    for (rtype, rdata) in answers {
        record(&mut res, *rtype, rdata);
    }
    res
}

fn record(target: &mut Vec<u8>, rtype: Rtype, rdata: &[u8]) {
    target.extend_from_slice(&[0xC0, 0x0C]);
    rtype.compose(target);
    Class::IN.compose(target);
    target.extend_from_slice(&3600u32.to_be_bytes());
    target.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    target.extend_from_slice(rdata);
}

//------------ Helpers -------------------------------------------------------

/// Returns a callback sending results into a channel.
pub fn channel() -> (
    impl Fn(LookupResult) + Send + Sync + 'static,
    mpsc::Receiver<LookupResult>,
) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let callback = move |res: LookupResult| {
        let _ = tx.lock().send(res);
    };
    (callback, rx)
}

/// Enables log output controlled by `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
