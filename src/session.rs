//! The synchronized session: a familiar client surface over the engine

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cookie::{Cookie, CookieJar};
use url::Url;

use connection::{ClientIdentity, Timeout, Transport};
use dispatch;
use errors::Error;
use plain::Client;
use prime;
use request::{PreparedRequest, RequestBuilder};
use response::Response;

/// A session whose requests are released simultaneously.
///
/// Every verb primes a request on a dedicated connection and returns a
/// placeholder [`Response`] with status 998. Nothing is processed by the
/// server until [`finish_all`](#method.finish_all) releases the withheld
/// tails. Cookies and default headers are carried across requests the way a
/// conventional client would.
#[derive(Debug)]
pub struct Session {
    jar: Arc<Mutex<CookieJar>>,
    headers: Vec<(String, String)>,
    transport: Transport,
    worker_cap: Option<usize>,
    warmup: Duration,
    pending: Vec<prime::PendingEntry>,
}

impl Session {
    /// Create a session with defaults: no worker cap, one second of warm-up,
    /// certificate verification on.
    pub fn new() -> Session {
        Session {
            jar: Arc::new(Mutex::new(CookieJar::new())),
            headers: Vec::new(),
            transport: Transport::default(),
            worker_cap: None,
            warmup: Duration::from_secs(1),
            pending: Vec::new(),
        }
    }

    /// Create a session that inherits cookies, default headers and transport
    /// options from a conventional [`Client`].
    ///
    /// The cookie jar is shared, not copied: cookies picked up by either
    /// side are visible to the other.
    pub fn from_client(client: &Client) -> Session {
        let other = client.session_ref();
        Session {
            jar: other.jar.clone(),
            headers: other.headers.clone(),
            transport: other.transport.clone(),
            worker_cap: None,
            warmup: Duration::from_secs(1),
            pending: Vec::new(),
        }
    }

    /// Upper bound on parallel workers during `finish_all`.
    ///
    /// The actual number is `min(pending, cap)`; by default every pending
    /// request gets its own worker, which gives the best synchrony.
    pub fn worker_cap(&mut self, value: usize) -> &mut Session {
        self.worker_cap = Some(value);
        self
    }

    /// Pause between `finish_all` being called and the tails going out.
    ///
    /// # Panics
    ///
    /// When the value is zero. Releasing through freshly spawned threads
    /// without any warm-up measurably widens the dispatch spread.
    pub fn warmup(&mut self, value: Duration) -> &mut Session {
        assert!(value > Duration::new(0, 0), "warm-up must be nonzero");
        self.warmup = value;
        self
    }

    /// Enable or disable TLS certificate verification.
    pub fn verify(&mut self, value: bool) -> &mut Session {
        self.transport.verify = value;
        self
    }

    /// Present a client certificate during TLS handshakes.
    pub fn identity(&mut self, value: ClientIdentity) -> &mut Session {
        self.transport.identity = Some(value);
        self
    }

    /// Route requests through an HTTP proxy.
    pub fn proxy(&mut self, value: Url) -> &mut Session {
        self.transport.proxy = Some(value);
        self
    }

    /// Default connect/read timeouts for every request of this session.
    pub fn timeout<T: Into<Timeout>>(&mut self, value: T) -> &mut Session {
        self.transport.timeout = value.into();
        self
    }

    /// Set a default header sent with every request. Setting a header that
    /// already exists replaces it.
    pub fn header(&mut self, name: &str, value: &str) -> &mut Session {
        self.headers.retain(|&(ref n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) -> &mut Session {
        self.jar.lock().unwrap()
            .add(Cookie::new(name.to_string(), value.to_string()));
        self
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.jar.lock().unwrap().get(name).map(|c| c.value().to_string())
    }

    pub fn get(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(self, "GET", url, false)
    }

    pub fn post(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(self, "POST", url, false)
    }

    pub fn put(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(self, "PUT", url, false)
    }

    pub fn delete(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(self, "DELETE", url, false)
    }

    pub fn head(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(self, "HEAD", url, false)
    }

    pub fn options(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(self, "OPTIONS", url, false)
    }

    /// Number of primed requests waiting for release.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn cookie_header(&self) -> Option<String> {
        let jar = self.jar.lock().unwrap();
        let pairs = jar.iter()
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect::<Vec<_>>();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    pub(crate) fn submit(&mut self, request: PreparedRequest,
        timeout: Option<Timeout>, immediate: bool)
        -> Result<Response, Error>
    {
        let timeout = timeout.unwrap_or(self.transport.timeout);
        let cookies = self.cookie_header();
        let entry = prime::prime(request, &self.transport, &self.headers,
            cookies.as_ref().map(|s| &s[..]), &timeout)?;
        if immediate {
            dispatch::finish_entry(entry, &self.jar)
        } else {
            let response = entry.response.clone();
            self.pending.push(entry);
            Ok(response)
        }
    }

    /// Release every pending request in parallel, then collect all
    /// responses into the placeholders handed out at priming time.
    ///
    /// `timeout` bounds each worker join. The pending queue is emptied no
    /// matter what; a placeholder still at status 998 afterwards means its
    /// worker missed the deadline.
    pub fn finish_all(&mut self, timeout: Option<Duration>) {
        let entries = self.pending.drain(..).collect::<Vec<_>>();
        dispatch::finish_all(entries, self.worker_cap, self.warmup,
            timeout, &self.jar);
    }
}
