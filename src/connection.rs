//! Owned connection with explicit request-sent state
//!
//! A connection is created fresh for every primed request and never reused.
//! The state machine makes the "request sent except the tail" condition a
//! first-class state instead of something poked into a foreign library.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use native_tls::{HandshakeError, Identity, TlsConnector, TlsStream};
use netbuf::Buf;
use url::Url;

use errors::Error;
use parser;

/// Connect and read timeouts applied to a single request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timeout {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
}

impl Timeout {
    pub fn new(connect: Option<Duration>, read: Option<Duration>) -> Timeout {
        Timeout { connect: connect, read: read }
    }
}

impl From<Duration> for Timeout {
    /// A single value sets both the connect and the read timeout.
    fn from(value: Duration) -> Timeout {
        Timeout { connect: Some(value), read: Some(value) }
    }
}

/// A client certificate in PKCS#12 format.
#[derive(Clone)]
#[derive(Debug)]
pub struct ClientIdentity {
    der: Vec<u8>,
    password: String,
}

impl ClientIdentity {
    pub fn from_pkcs12(der: Vec<u8>, password: &str) -> ClientIdentity {
        ClientIdentity { der: der, password: password.to_string() }
    }
}

/// Transport options shared by every request of a session.
#[derive(Clone, Debug)]
pub struct Transport {
    pub verify: bool,
    pub identity: Option<ClientIdentity>,
    pub proxy: Option<Url>,
    pub timeout: Timeout,
}

impl Default for Transport {
    fn default() -> Transport {
        Transport {
            verify: true,
            identity: None,
            proxy: None,
            timeout: Timeout::default(),
        }
    }
}

#[derive(Debug)]
enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match *self {
            Stream::Plain(ref mut s) => s.read(buf),
            Stream::Tls(ref mut s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match *self {
            Stream::Plain(ref mut s) => s.write(buf),
            Stream::Tls(ref mut s) => s.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match *self {
            Stream::Plain(ref mut s) => s.flush(),
            Stream::Tls(ref mut s) => s.flush(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Primed,
    Released,
    Collected,
    Closed,
}

#[derive(Debug)]
pub struct Connection {
    stream: Stream,
    state: State,
}

fn tcp_connect(host: &str, port: u16, timeout: Option<Duration>)
    -> Result<TcpStream, Error>
{
    let addrs = (host, port).to_socket_addrs().map_err(Error::Name)?;
    let mut last_error = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(t) => TcpStream::connect_timeout(&addr, t),
            None => TcpStream::connect(&addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    match last_error {
        Some(ref e) if e.kind() == io::ErrorKind::TimedOut ||
                       e.kind() == io::ErrorKind::WouldBlock
            => Err(Error::ConnectTimeout),
        Some(e) => Err(Error::Io(e)),
        None => Err(Error::Name(io::Error::new(io::ErrorKind::Other,
            "name resolved to no addresses"))),
    }
}

/// Ask a proxy to open a raw tunnel to `host:port`.
fn tunnel(tcp: &mut TcpStream, host: &str, port: u16) -> Result<(), Error> {
    let mut out = Vec::new();
    write!(&mut out, "CONNECT {0}:{1} HTTP/1.1\r\nHost: {0}:{1}\r\n\r\n",
        host, port).unwrap();
    tcp.write_all(&out)?;
    tcp.flush()?;

    let mut input = Buf::new();
    loop {
        if input.read_from(tcp)? == 0 {
            return Err(Error::ResetOnResponseHeaders);
        }
        if let Some(head) = parser::parse_head(&input)? {
            if head.code / 100 == 2 {
                return Ok(());
            }
            return Err(Error::Proxy(head.code));
        }
    }
}

fn wrap_tls(tcp: TcpStream, domain: &str, transport: &Transport)
    -> Result<Stream, Error>
{
    let mut builder = TlsConnector::builder();
    if !transport.verify {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    if let Some(ref identity) = transport.identity {
        builder.identity(Identity::from_pkcs12(
            &identity.der, &identity.password)?);
    }
    let connector = builder.build()?;
    match connector.connect(domain, tcp) {
        Ok(stream) => Ok(Stream::Tls(Box::new(stream))),
        Err(HandshakeError::Failure(e)) => Err(e.into()),
        Err(HandshakeError::WouldBlock(_)) => {
            // can't happen on a blocking socket
            Err(Error::Io(io::Error::new(io::ErrorKind::WouldBlock,
                "TLS handshake interrupted")))
        }
    }
}

impl Connection {
    /// Open a fresh connection to the origin of `url`.
    ///
    /// Goes through the configured proxy if there is one: a plain tunnel for
    /// TLS urls, a direct connection otherwise (the request target then has
    /// to be in absolute form, which is the primer's job).
    pub fn open(url: &Url, transport: &Transport, timeout: &Timeout)
        -> Result<Connection, Error>
    {
        let secure = match url.scheme() {
            "http" => false,
            "https" => true,
            _ => return Err(Error::UnsupportedScheme),
        };
        let host = match url.host_str() {
            Some(host) => host,
            None => return Err(Error::InvalidUrl(
                ::url::ParseError::EmptyHost)),
        };
        let port = url.port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        let mut tcp = match transport.proxy {
            Some(ref proxy) => {
                let proxy_host = match proxy.host_str() {
                    Some(host) => host,
                    None => return Err(Error::InvalidUrl(
                        ::url::ParseError::EmptyHost)),
                };
                let proxy_port = proxy.port_or_known_default().unwrap_or(80);
                tcp_connect(proxy_host, proxy_port, timeout.connect)?
            }
            None => tcp_connect(host, port, timeout.connect)?,
        };
        // the release write is a few bytes and must not sit in a Nagle buffer
        tcp.set_nodelay(true)?;
        tcp.set_read_timeout(timeout.read)?;

        if secure && transport.proxy.is_some() {
            tunnel(&mut tcp, host, port)?;
        }
        let stream = if secure {
            wrap_tls(tcp, host, transport)?
        } else {
            Stream::Plain(tcp)
        };
        Ok(Connection {
            stream: stream,
            state: State::Idle,
        })
    }

    /// Flush the assembled message except its last `tail_len` bytes and
    /// return the withheld tail.
    ///
    /// After this call the connection counts as "request sent": the response
    /// may be read as soon as the tail goes out.
    ///
    /// # Panics
    ///
    /// When the connection is not `Idle`, when the tail is empty, or when the
    /// tail is longer than the message.
    pub fn write_except_tail(&mut self, message: &[u8], tail_len: usize)
        -> Result<Vec<u8>, Error>
    {
        if self.state != State::Idle {
            panic!("Called write_except_tail() on connection in state {:?}",
                self.state);
        }
        assert!(tail_len > 0 && tail_len <= message.len(),
            "withheld tail must be nonempty and no longer than the message");
        let cut = message.len() - tail_len;
        self.stream.write_all(&message[..cut])?;
        self.stream.flush()?;
        self.state = State::Primed;
        Ok(message[cut..].to_vec())
    }

    /// Write the withheld tail, completing the request framing.
    pub fn release(&mut self, tail: &[u8]) -> Result<(), Error> {
        if self.state != State::Primed {
            panic!("Called release() on connection in state {:?}", self.state);
        }
        match self.stream.write_all(tail).and_then(|_| self.stream.flush()) {
            Ok(()) => {
                self.state = State::Released;
                Ok(())
            }
            Err(e) => {
                self.close();
                Err(e.into())
            }
        }
    }

    /// Read some response bytes into `buf`. Returns 0 at end of stream.
    pub fn read_some(&mut self, buf: &mut Buf) -> io::Result<usize> {
        debug_assert!(matches!(self.state, State::Released));
        buf.read_from(&mut self.stream)
    }

    pub fn mark_collected(&mut self) {
        debug_assert!(matches!(self.state, State::Released));
        self.state = State::Collected;
    }

    pub fn close(&mut self) {
        match self.stream {
            Stream::Plain(ref mut s) => {
                let _ = s.shutdown(Shutdown::Both);
            }
            Stream::Tls(ref mut s) => {
                let _ = s.shutdown();
            }
        }
        self.state = State::Closed;
    }
}
