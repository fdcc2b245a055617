//! The placeholder response handed out at priming time
//!
//! Priming returns a [`Response`] before the server has seen the complete
//! request. The handle is cheap to clone and every clone observes the same
//! state: when `finish_all` collects the real response it is written into
//! the shared state in place, so references stored by the caller stay valid.

use std::str::from_utf8;
use std::slice;
use std::sync::{Arc, Mutex};

use serde_json;

use errors::Error;
use headers::encoding_from_content_type;
use parser::RawResponse;
use request::PreparedRequest;

/// Status of a response whose request has been primed but not yet released.
pub const STATUS_UNFINISHED: u16 = 998;
/// Status of a response whose release or collection failed; the body holds
/// a description of the failure.
pub const STATUS_FAILED: u16 = 999;

const UNFINISHED_BODY: &'static str = "\
This is a placeholder response.
The request has been primed but not finished; call finish_all() on the
session before using responses from synchronized requests.";

/// Case-insensitive response header mapping.
///
/// Duplicate headers are kept in arrival order; `get` returns the first.
#[derive(Debug, Clone)]
pub struct Headers {
    items: Vec<(String, Vec<u8>)>,
}

impl Headers {
    pub fn new() -> Headers {
        Headers { items: Vec::new() }
    }

    fn from_raw(items: Vec<(String, Vec<u8>)>) -> Headers {
        Headers { items: items }
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.items.iter()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| &v[..])
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| from_utf8(v).ok())
    }

    pub fn iter(&self) -> slice::Iter<(String, Vec<u8>)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug)]
struct ResponseState {
    status: u16,
    reason: String,
    encoding: Option<String>,
    headers: Headers,
    url: String,
    content: Vec<u8>,
    /// The request this response answers. Stays put across `materialize`;
    /// the connection itself is owned by the pending entry, not kept here.
    request: PreparedRequest,
}

/// Shared handle to a (possibly not yet finished) response.
#[derive(Debug, Clone)]
pub struct Response {
    inner: Arc<Mutex<ResponseState>>,
}

impl Response {
    pub(crate) fn unfinished(request: &PreparedRequest) -> Response {
        Response {
            inner: Arc::new(Mutex::new(ResponseState {
                status: STATUS_UNFINISHED,
                reason: "Request Not Finished".to_string(),
                encoding: Some("UTF-8".to_string()),
                headers: Headers::new(),
                url: request.url.as_str().to_string(),
                content: UNFINISHED_BODY.as_bytes().to_vec(),
                request: request.clone(),
            })),
        }
    }

    /// Rewrite the placeholder with the real response, in place.
    pub(crate) fn materialize(&self, raw: RawResponse) {
        let headers = Headers::from_raw(raw.headers);
        let encoding = headers.get("Content-Type")
            .and_then(encoding_from_content_type);
        let mut state = self.inner.lock().unwrap();
        state.status = raw.code;
        state.reason = raw.reason;
        state.encoding = encoding;
        state.headers = headers;
        state.content = raw.body;
    }

    /// Turn the placeholder into a failure report, in place.
    pub(crate) fn fail(&self, err: &Error) {
        let mut state = self.inner.lock().unwrap();
        state.status = STATUS_FAILED;
        state.reason = "Internal Exception".to_string();
        state.encoding = Some("UTF-8".to_string());
        state.headers = Headers::new();
        state.content = format!("\
An error occurred while finishing this request. Here's what we know:\n\n{}",
            err).into_bytes();
    }

    pub fn status(&self) -> u16 {
        self.inner.lock().unwrap().status
    }

    pub fn reason(&self) -> String {
        self.inner.lock().unwrap().reason.clone()
    }

    /// Text encoding derived from the `Content-Type` header, if any.
    pub fn encoding(&self) -> Option<String> {
        self.inner.lock().unwrap().encoding.clone()
    }

    pub fn headers(&self) -> Headers {
        self.inner.lock().unwrap().headers.clone()
    }

    pub fn header(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().headers.get(name).map(|v| v.to_vec())
    }

    pub fn url(&self) -> String {
        self.inner.lock().unwrap().url.clone()
    }

    pub fn method(&self) -> String {
        self.inner.lock().unwrap().request.method.clone()
    }

    /// The request this response answers.
    pub fn request(&self) -> PreparedRequest {
        self.inner.lock().unwrap().request.clone()
    }

    pub fn content(&self) -> Vec<u8> {
        self.inner.lock().unwrap().content.clone()
    }

    /// Body decoded as text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().unwrap().content)
            .into_owned()
    }

    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.inner.lock().unwrap().content)
    }

    /// True once the response left the primed state (a real status or 999).
    pub fn is_finished(&self) -> bool {
        self.status() != STATUS_UNFINISHED
    }
}

#[cfg(test)]
mod test {
    use url::Url;

    use parser::RawResponse;
    use request::{Body, PreparedRequest};
    use super::{Response, STATUS_UNFINISHED, STATUS_FAILED};

    fn get_request(url: &str) -> PreparedRequest {
        PreparedRequest {
            method: "GET".to_string(),
            url: Url::parse(url).unwrap(),
            headers: Vec::new(),
            body: Body::None,
        }
    }

    fn raw_ok() -> RawResponse {
        RawResponse {
            code: 200,
            reason: "OK".to_string(),
            headers: vec![
                ("Content-Type".to_string(), b"text/html; charset=utf-8".to_vec()),
                ("X-Hello".to_string(), b"World".to_vec()),
            ],
            body: b"<html></html>".to_vec(),
        }
    }

    #[test]
    fn starts_unfinished() {
        let response = Response::unfinished(&get_request("http://example.com/"));
        assert_eq!(response.status(), STATUS_UNFINISHED);
        assert_eq!(response.reason(), "Request Not Finished");
        assert!(!response.is_finished());
        assert_eq!(response.url(), "http://example.com/");
        assert_eq!(response.method(), "GET");
    }

    #[test]
    fn materialize_rewrites_in_place() {
        let response = Response::unfinished(&get_request("http://example.com/"));
        // a clone taken before finishing must observe the real response
        let alias = response.clone();
        response.materialize(raw_ok());
        assert_eq!(alias.status(), 200);
        assert_eq!(alias.reason(), "OK");
        assert_eq!(alias.encoding(), Some("utf-8".to_string()));
        assert_eq!(alias.header("x-hello"), Some(b"World".to_vec()));
        assert_eq!(alias.text(), "<html></html>");
        assert!(alias.is_finished());
        // the originating request rides along
        assert_eq!(alias.request().url.as_str(), "http://example.com/");
    }

    #[test]
    fn failure_is_terminal_and_descriptive() {
        let response = Response::unfinished(&get_request("http://example.com/"));
        response.fail(&::errors::Error::ResetOnResponseHeaders);
        assert_eq!(response.status(), STATUS_FAILED);
        assert_eq!(response.reason(), "Internal Exception");
        assert!(response.text().contains("closed prematurely"));
    }

    #[test]
    fn headers_are_case_insensitive() {
        let response = Response::unfinished(&get_request("http://example.com/"));
        response.materialize(raw_ok());
        let headers = response.headers();
        assert_eq!(headers.get("X-HELLO"), Some(&b"World"[..]));
        assert_eq!(headers.get_str("x-hello"), Some("World"));
        assert_eq!(headers.get("missing"), None);
        assert_eq!(headers.len(), 2);
    }
}
