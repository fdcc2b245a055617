//! Request preparation: everything that happens before any byte is sent

use base64;
use serde::Serialize;
use serde_json;
use url::{Url, form_urlencoded};

use connection::Timeout;
use errors::Error;
use response::Response;
use session::Session;

/// Request body, named after how it is framed on the wire.
#[derive(Debug, Clone)]
pub enum Body {
    /// No body at all: the request ends with the header terminator.
    None,
    /// A body of known size, sent with `Content-Length`.
    Fixed(Vec<u8>),
    /// A sequence of chunks, sent with `Transfer-Encoding: chunked`.
    Chunked(Vec<Vec<u8>>),
}

/// A request that is ready to be written to a connection.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl PreparedRequest {
    pub fn is_head(&self) -> bool {
        self.method.eq_ignore_ascii_case("HEAD")
    }
}

/// Builder returned by the session verbs.
///
/// `send()` primes the request (writes everything except the withheld tail)
/// and returns the placeholder response.
pub struct RequestBuilder<'a> {
    session: &'a mut Session,
    method: &'static str,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Body,
    default_content_type: Option<&'static str>,
    timeout: Option<Timeout>,
    immediate: bool,
    pending_error: Option<Error>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(session: &'a mut Session, method: &'static str,
        url: &str, immediate: bool)
        -> RequestBuilder<'a>
    {
        RequestBuilder {
            session: session,
            method: method,
            url: url.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::None,
            default_content_type: None,
            timeout: None,
            immediate: immediate,
            pending_error: None,
        }
    }

    /// Append query string parameters to the url.
    pub fn query<K, V>(mut self, pairs: &[(K, V)]) -> RequestBuilder<'a>
        where K: AsRef<str>, V: AsRef<str>
    {
        for &(ref name, ref value) in pairs {
            self.query.push((name.as_ref().to_string(),
                             value.as_ref().to_string()));
        }
        self
    }

    /// Add a request header. Later additions win over session defaults.
    pub fn header<V: AsRef<str>>(mut self, name: &str, value: V)
        -> RequestBuilder<'a>
    {
        self.headers.push((name.to_string(), value.as_ref().to_string()));
        self
    }

    /// Add an `Authorization: Basic` header.
    pub fn basic_auth(self, user: &str, password: Option<&str>)
        -> RequestBuilder<'a>
    {
        let credentials = format!("{}:{}", user, password.unwrap_or(""));
        let value = format!("Basic {}", base64::encode(&credentials));
        self.header("Authorization", value)
    }

    /// Set a raw fixed-length body.
    pub fn body<B: Into<Vec<u8>>>(mut self, body: B) -> RequestBuilder<'a> {
        self.body = Body::Fixed(body.into());
        self
    }

    /// Set a form-encoded body. Pair order is preserved.
    pub fn form<K, V>(mut self, pairs: &[(K, V)]) -> RequestBuilder<'a>
        where K: AsRef<str>, V: AsRef<str>
    {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for &(ref name, ref value) in pairs {
            serializer.append_pair(name.as_ref(), value.as_ref());
        }
        self.body = Body::Fixed(serializer.finish().into_bytes());
        self.default_content_type = Some("application/x-www-form-urlencoded");
        self
    }

    /// Set a JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> RequestBuilder<'a> {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.body = Body::Fixed(body);
                self.default_content_type = Some("application/json");
            }
            Err(e) => self.pending_error = Some(Error::Json(e)),
        }
        self
    }

    /// Set a chunked body; the chunks are framed one to one.
    pub fn chunked_body<I>(mut self, chunks: I) -> RequestBuilder<'a>
        where I: IntoIterator, I::Item: Into<Vec<u8>>
    {
        self.body = Body::Chunked(
            chunks.into_iter().map(|c| c.into()).collect());
        self
    }

    /// Override the session timeouts for this request.
    pub fn timeout<T: Into<Timeout>>(mut self, timeout: T)
        -> RequestBuilder<'a>
    {
        self.timeout = Some(timeout.into());
        self
    }

    fn into_prepared(mut self)
        -> Result<(&'a mut Session, PreparedRequest, Option<Timeout>, bool),
                  Error>
    {
        if let Some(e) = self.pending_error.take() {
            return Err(e);
        }
        let mut url = Url::parse(&self.url)?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for &(ref name, ref value) in &self.query {
                pairs.append_pair(name, value);
            }
        }
        if let Some(content_type) = self.default_content_type {
            let explicit = self.headers.iter()
                .any(|&(ref n, _)| n.eq_ignore_ascii_case("Content-Type"));
            if !explicit {
                self.headers.push(("Content-Type".to_string(),
                                   content_type.to_string()));
            }
        }
        let prepared = PreparedRequest {
            method: self.method.to_string(),
            url: url,
            headers: self.headers,
            body: self.body,
        };
        Ok((self.session, prepared, self.timeout, self.immediate))
    }

    /// Prime the request and return its placeholder response.
    ///
    /// For a synchronized session the placeholder stays at status 998 until
    /// `finish_all`; for the conventional client the request is finished
    /// right away.
    pub fn send(self) -> Result<Response, Error> {
        let (session, prepared, timeout, immediate) = self.into_prepared()?;
        session.submit(prepared, timeout, immediate)
    }
}

#[cfg(test)]
mod test {
    use session::Session;
    use super::{Body, RequestBuilder};

    #[test]
    fn builds_query_and_headers() {
        let mut session = Session::new();
        let builder = RequestBuilder::new(
                &mut session, "GET", "http://example.com/path", false)
            .query(&[("a", "1"), ("b", "two words")])
            .header("Cake", "Lemon");
        let (_, prepared, _, _) = builder.into_prepared().unwrap();
        assert_eq!(prepared.method, "GET");
        assert_eq!(prepared.url.as_str(),
            "http://example.com/path?a=1&b=two+words");
        assert_eq!(prepared.headers,
            vec![("Cake".to_string(), "Lemon".to_string())]);
        assert!(matches!(prepared.body, Body::None));
    }

    #[test]
    fn form_body_preserves_order() {
        let mut session = Session::new();
        let builder = RequestBuilder::new(
                &mut session, "POST", "http://example.com/", false)
            .form(&[("muffin", "blueberry"), ("tea", "green")]);
        let (_, prepared, _, _) = builder.into_prepared().unwrap();
        match prepared.body {
            Body::Fixed(ref body) => {
                assert_eq!(&body[..], b"muffin=blueberry&tea=green");
            }
            ref other => panic!("unexpected body: {:?}", other),
        }
        assert_eq!(prepared.headers, vec![
            ("Content-Type".to_string(),
             "application/x-www-form-urlencoded".to_string()),
        ]);
    }

    #[test]
    fn explicit_content_type_wins() {
        let mut session = Session::new();
        let builder = RequestBuilder::new(
                &mut session, "POST", "http://example.com/", false)
            .header("content-type", "text/csv")
            .form(&[("a", "1")]);
        let (_, prepared, _, _) = builder.into_prepared().unwrap();
        assert_eq!(prepared.headers, vec![
            ("content-type".to_string(), "text/csv".to_string()),
        ]);
    }

    #[test]
    fn json_body() {
        let mut session = Session::new();
        let builder = RequestBuilder::new(
                &mut session, "POST", "http://example.com/", false)
            .json(&vec![1, 2, 3]);
        let (_, prepared, _, _) = builder.into_prepared().unwrap();
        match prepared.body {
            Body::Fixed(ref body) => assert_eq!(&body[..], b"[1,2,3]"),
            ref other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn basic_auth_header() {
        let mut session = Session::new();
        let builder = RequestBuilder::new(
                &mut session, "GET", "http://example.com/", false)
            .basic_auth("user", Some("passwd"));
        let (_, prepared, _, _) = builder.into_prepared().unwrap();
        assert_eq!(prepared.headers, vec![
            ("Authorization".to_string(),
             "Basic dXNlcjpwYXNzd2Q=".to_string()),
        ]);
    }

    #[test]
    fn rejects_bad_url() {
        let mut session = Session::new();
        let builder = RequestBuilder::new(
            &mut session, "GET", "not a url", false);
        builder.into_prepared().unwrap_err();
    }
}
