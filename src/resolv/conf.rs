//! Resolver configuration
//!
//! There are two parts to this module. [`ResolvConf`] is the system’s
//! resolver configuration, normally read from `/etc/resolv.conf`. It is
//! modeled along the lines of glibc’s resolver but only keeps what an
//! address lookup needs: the name servers to query. The `timeout` and
//! `attempts` options are parsed, too, but the resolver doesn’t use them.
//!
//! [`ServiceConf`] configures a [`ResolverService`]: where to find the
//! system configuration, whether to skip it in favour of a fixed server,
//! and the tick source the worker uses to measure time.
//!
//! [`ResolverService`]: super::service::ResolverService

use super::clock::{SystemTicks, Ticks};
use std::io::{self, BufRead, Read};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::{FromStr, SplitWhitespace};
use std::sync::Arc;
use std::time::Duration;
use std::{error, fmt, fs, result};

//------------ ResolvConf ---------------------------------------------------

/// Resolver configuration.
///
/// This type collects the information from a glibc-style configuration
/// file, commonly known as `/etc/resolv.conf`, that is relevant for
/// talking to an upstream resolver.
///
/// The easiest way to get the system resolver configuration is through
/// [`ResolvConf::system`]. This will parse the configuration file or
/// return an empty configuration if that fails.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvConf {
    /// Addresses of servers to query.
    pub servers: Vec<SocketAddr>,

    /// Timeout to wait for a response.
    ///
    /// This is parsed but not used by the resolver, which takes a timeout
    /// with each lookup.
    pub timeout: Duration,

    /// Number of retries before giving up.
    ///
    /// This is parsed but not used by the resolver, which never retries.
    pub attempts: usize,
}

/// # Management
///
impl ResolvConf {
    /// The default path of the system configuration file.
    pub const SYSTEM_PATH: &'static str = "/etc/resolv.conf";

    /// The maximum number of octets read from a configuration file.
    pub const MAX_FILE_LEN: u64 = 4096;

    /// Creates a new, empty configuration.
    pub fn new() -> Self {
        ResolvConf {
            servers: Vec::new(),
            timeout: Duration::new(5, 0),
            attempts: 2,
        }
    }

    /// Creates the configuration for this system.
    ///
    /// Any error while reading or parsing the file results in a
    /// configuration with those servers that were successfully parsed
    /// before the error, possibly none at all.
    pub fn system() -> Self {
        Self::from_file_lossy(Self::SYSTEM_PATH)
    }

    /// Creates a configuration from the given file, ignoring errors.
    pub fn from_file_lossy<P: AsRef<Path>>(path: P) -> Self {
        let mut res = ResolvConf::new();
        let _ = res.parse_file(path);
        res
    }

    /// Returns the first configured server if there is one.
    pub fn first_server(&self) -> Option<SocketAddr> {
        self.servers.first().copied()
    }
}

impl Default for ResolvConf {
    fn default() -> Self {
        Self::new()
    }
}

/// # Parsing Configuration File
///
impl ResolvConf {
    /// Parses the configuration from a file.
    ///
    /// At most the first [`MAX_FILE_LEN`][Self::MAX_FILE_LEN] octets of
    /// the file are considered.
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = fs::File::open(path)?;
        self.parse(&mut file.take(Self::MAX_FILE_LEN))
    }

    /// Parses the configuration from a reader.
    ///
    /// The format is that of the /etc/resolv.conf file. Keywords that are
    /// of no concern to address lookups, such as `search` or `sortlist`,
    /// are skipped.
    pub fn parse<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        for line in io::BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim_end();

            if line.is_empty()
                || line.starts_with(';')
                || line.starts_with('#')
            {
                continue;
            }

            let mut words = line.split_whitespace();
            let keyword = words.next();
            match keyword {
                Some("nameserver") => self.parse_nameserver(words)?,
                Some("options") => self.parse_options(words)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_nameserver(&mut self, mut words: SplitWhitespace) -> Result<()> {
        let word = next_word(&mut words)?;
        // A zone index is of no use to us.
        let addr = match word.split_once('%') {
            Some((addr, _)) => addr,
            None => word,
        };
        let addr = IpAddr::from_str(addr).map_err(|_| Error::ParseError)?;
        no_more_words(words)?;
        self.servers.push(SocketAddr::new(addr, 53));
        Ok(())
    }

    fn parse_options(&mut self, words: SplitWhitespace) -> Result<()> {
        for word in words {
            match split_arg(word)? {
                ("timeout", Some(n)) => {
                    self.timeout = Duration::new(n as u64, 0)
                }
                ("attempts", Some(n)) => self.attempts = n,
                // Ignore unknown or misformated options.
                _ => {}
            }
        }
        Ok(())
    }
}

//------------ ServiceConf ---------------------------------------------------

/// Configuration of a resolver service.
#[derive(Clone, Debug)]
pub struct ServiceConf {
    /// Path of the resolver configuration file.
    ///
    /// The file is read every time a worker thread starts, so changes are
    /// picked up without restarting the service.
    pub resolv_conf: PathBuf,

    /// A fixed server to use instead of the configured one.
    pub default_server: Option<SocketAddr>,

    /// The source of time for the worker.
    pub ticks: Arc<dyn Ticks>,
}

impl ServiceConf {
    /// Returns the server to use for requests without an explicit server.
    pub fn discover_server(&self) -> Option<SocketAddr> {
        match self.default_server {
            Some(addr) => Some(addr),
            None => {
                ResolvConf::from_file_lossy(&self.resolv_conf).first_server()
            }
        }
    }
}

impl Default for ServiceConf {
    fn default() -> Self {
        ServiceConf {
            resolv_conf: ResolvConf::SYSTEM_PATH.into(),
            default_server: None,
            ticks: Arc::new(SystemTicks::new()),
        }
    }
}

//------------ Private Helpers ----------------------------------------------
//
// These are here to wrap stuff into Results.

/// Returns a reference to the next word or an error.
fn next_word<'a>(words: &mut SplitWhitespace<'a>) -> Result<&'a str> {
    match words.next() {
        Some(word) => Ok(word),
        None => Err(Error::ParseError),
    }
}

/// Returns nothing but errors out if there are words left.
fn no_more_words(mut words: SplitWhitespace) -> Result<()> {
    match words.next() {
        Some(..) => Err(Error::ParseError),
        None => Ok(()),
    }
}

/// Splits the name and argument from an option with arguments.
///
/// These options consist of a name followed by a colon followed by a
/// value, which so far is only `usize`, so we do that.
fn split_arg(s: &str) -> Result<(&str, Option<usize>)> {
    match s.find(':') {
        Some(idx) => {
            let (left, right) = s.split_at(idx);
            Ok((left, Some(usize::from_str(&right[1..])?)))
        }
        None => Ok((s, None)),
    }
}

//------------ Error and Result ---------------------------------------------

/// The error that can happen when parsing `resolv.conf`.
#[derive(Debug)]
pub enum Error {
    /// The file is not a proper file.
    ParseError,

    /// Something happend while reading.
    Io(io::Error),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::ParseError => None,
            Error::Io(ref err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::Io(error)
    }
}

impl From<::std::num::ParseIntError> for Error {
    fn from(_: ::std::num::ParseIntError) -> Error {
        Error::ParseError
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::ParseError => f.write_str("error parsing configuration"),
            Error::Io(ref err) => err.fmt(f),
        }
    }
}

/// The result from parsing `resolv.conf`.
pub type Result<T> = result::Result<T, Error>;

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::io;

    #[test]
    fn parse_resolv_conf() {
        let mut conf = ResolvConf::new();
        let data = "# generated\n\
                    search example.com\n\
                    nameserver 192.0.2.0\n\
                    nameserver 2001:db8::1\n\
                    nameserver fe80::1%eth0\n\
                    options ndots:2 timeout:3 attempts:4 rotate\n"
            .to_string();
        conf.parse(&mut io::Cursor::new(data)).unwrap();
        assert_eq!(
            conf.servers,
            [
                "192.0.2.0:53".parse::<SocketAddr>().unwrap(),
                "[2001:db8::1]:53".parse().unwrap(),
                "[fe80::1]:53".parse().unwrap(),
            ]
        );
        assert_eq!(conf.timeout, Duration::from_secs(3));
        assert_eq!(conf.attempts, 4);
        assert_eq!(
            conf.first_server(),
            Some("192.0.2.0:53".parse().unwrap())
        );
    }

    #[test]
    fn parse_errors() {
        let mut conf = ResolvConf::new();
        assert!(matches!(
            conf.parse(&mut io::Cursor::new("nameserver\n")),
            Err(Error::ParseError)
        ));
        assert!(matches!(
            conf.parse(&mut io::Cursor::new("nameserver 1.2.3.4 5\n")),
            Err(Error::ParseError)
        ));
        assert!(matches!(
            conf.parse(&mut io::Cursor::new("nameserver localhost\n")),
            Err(Error::ParseError)
        ));
        assert!(matches!(
            conf.parse(&mut io::Cursor::new("options timeout:x\n")),
            Err(Error::ParseError)
        ));
        assert!(conf.servers.is_empty());
    }

    #[test]
    fn missing_file() {
        let conf = ResolvConf::from_file_lossy("/nonexistent/resolv.conf");
        assert_eq!(conf.first_server(), None);
    }

    #[test]
    fn file_is_capped() {
        let path = std::env::temp_dir().join(format!(
            "domain-lookup-capped-{}.conf",
            std::process::id()
        ));
        let mut data = "#".repeat(ResolvConf::MAX_FILE_LEN as usize);
        data.push_str("\nnameserver 192.0.2.1\n");
        std::fs::write(&path, data).unwrap();
        let conf = ResolvConf::from_file_lossy(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(conf.first_server(), None);
    }

    #[test]
    fn service_conf_prefers_default_server() {
        let conf = ServiceConf {
            resolv_conf: "/nonexistent/resolv.conf".into(),
            default_server: Some("192.0.2.7:5353".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(
            conf.discover_server(),
            Some("192.0.2.7:5353".parse().unwrap())
        );
        let conf = ServiceConf {
            default_server: None,
            ..conf
        };
        assert_eq!(conf.discover_server(), None);
    }
}
