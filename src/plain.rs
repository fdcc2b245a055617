//! A conventional blocking client built on the same plumbing
//!
//! Each request is primed and finished immediately: the tail is written the
//! moment the rest of the request is out, and the response is read before
//! the call returns. Useful for the setup traffic around a race (logging
//! in, collecting cookies and tokens) and as the source for
//! [`Session::from_client`](../struct.Session.html#method.from_client).

use url::Url;

use connection::{ClientIdentity, Timeout};
use request::RequestBuilder;
use session::Session;

pub struct Client {
    inner: Session,
}

impl Client {
    pub fn new() -> Client {
        Client { inner: Session::new() }
    }

    pub(crate) fn session_ref(&self) -> &Session {
        &self.inner
    }

    /// Enable or disable TLS certificate verification.
    pub fn verify(&mut self, value: bool) -> &mut Client {
        self.inner.verify(value);
        self
    }

    /// Present a client certificate during TLS handshakes.
    pub fn identity(&mut self, value: ClientIdentity) -> &mut Client {
        self.inner.identity(value);
        self
    }

    /// Route requests through an HTTP proxy.
    pub fn proxy(&mut self, value: Url) -> &mut Client {
        self.inner.proxy(value);
        self
    }

    /// Default connect/read timeouts for every request.
    pub fn timeout<T: Into<Timeout>>(&mut self, value: T) -> &mut Client {
        self.inner.timeout(value);
        self
    }

    /// Set a default header sent with every request.
    pub fn header(&mut self, name: &str, value: &str) -> &mut Client {
        self.inner.header(name, value);
        self
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) -> &mut Client {
        self.inner.set_cookie(name, value);
        self
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.inner.cookie(name)
    }

    pub fn get(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(&mut self.inner, "GET", url, true)
    }

    pub fn post(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(&mut self.inner, "POST", url, true)
    }

    pub fn put(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(&mut self.inner, "PUT", url, true)
    }

    pub fn delete(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(&mut self.inner, "DELETE", url, true)
    }

    pub fn head(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(&mut self.inner, "HEAD", url, true)
    }

    pub fn options(&mut self, url: &str) -> RequestBuilder {
        RequestBuilder::new(&mut self.inner, "OPTIONS", url, true)
    }
}
