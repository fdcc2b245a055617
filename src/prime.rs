//! Priming: sending all of a request except the bytes that complete it
//!
//! The request is assembled into a buffer in full, terminator included, and
//! then written out minus a short suffix. Which suffix depends on the body:
//!
//! * no body: the `\r\n\r\n` that ends the header section (4 bytes)
//! * fixed-length body: the last 3 body bytes, clipped to the body length
//!   for bodies shorter than that; an empty body falls back to the header
//!   terminator so the tail is never empty
//! * chunked body: the `0\r\n\r\n` terminating chunk (5 bytes)
//!
//! Three bytes keep the release write as small as possible while staying
//! clear of TCP stacks that could flush a single-byte remainder early.

use std::cmp::min;

use netbuf::Buf;
use url::Url;

use connection::{Connection, Timeout, Transport};
use enums::Version;
use errors::Error;
use request::{Body, PreparedRequest};
use response::Response;
use serializer::MessageState;

/// A primed request waiting for its tail to be released.
#[derive(Debug)]
pub struct PendingEntry {
    pub request: PreparedRequest,
    pub conn: Connection,
    pub tail: Vec<u8>,
    pub response: Response,
}

fn origin_form(url: &Url) -> String {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Write the request to a fresh connection, withholding the tail.
///
/// All header and body serialization happens before the connection is
/// opened, so user errors never leave a half-written socket behind. Any
/// failure after the connect closes the connection and nothing is enqueued.
pub fn prime(request: PreparedRequest, transport: &Transport,
    default_headers: &[(String, String)], cookie_header: Option<&str>,
    timeout: &Timeout)
    -> Result<PendingEntry, Error>
{
    // absolute-form target when going through a proxy in the clear
    let target = if transport.proxy.is_some() && request.url.scheme() == "http"
    {
        request.url.as_str().to_string()
    } else {
        origin_form(&request.url)
    };

    let mut buf = Buf::new();
    let mut msg = MessageState::RequestStart;
    msg.request_line(&mut buf, &request.method, &target, Version::Http11);
    msg.add_header(&mut buf, "Host", host_header(&request.url).as_bytes())?;

    let explicit = |name: &str| {
        request.headers.iter().any(|&(ref n, _)| n.eq_ignore_ascii_case(name))
    };
    for &(ref name, ref value) in default_headers {
        if explicit(name) {
            continue;
        }
        msg.add_header(&mut buf, name, value.as_bytes())?;
    }
    for &(ref name, ref value) in &request.headers {
        msg.add_header(&mut buf, name, value.as_bytes())?;
    }
    if let Some(cookies) = cookie_header {
        // an explicit Cookie header suppresses the jar for this request
        if !explicit("Cookie")
            && !default_headers.iter()
                .any(|&(ref n, _)| n.eq_ignore_ascii_case("Cookie"))
        {
            msg.add_header(&mut buf, "Cookie", cookies.as_bytes())?;
        }
    }

    let tail_len = match request.body {
        Body::None => {
            msg.done_headers(&mut buf);
            4
        }
        Body::Fixed(ref body) => {
            msg.add_length(&mut buf, body.len() as u64)?;
            msg.done_headers(&mut buf);
            msg.write_body(&mut buf, body);
            if body.is_empty() { 4 } else { min(3, body.len()) }
        }
        Body::Chunked(ref chunks) => {
            msg.add_chunked(&mut buf)?;
            msg.done_headers(&mut buf);
            for chunk in chunks {
                msg.write_body(&mut buf, chunk);
            }
            5
        }
    };
    msg.done(&mut buf);

    let mut conn = Connection::open(&request.url, transport, timeout)?;
    let tail = match conn.write_except_tail(&buf[..], tail_len) {
        Ok(tail) => tail,
        Err(e) => {
            conn.close();
            return Err(e);
        }
    };
    debug!("primed {} {} ({} of {} bytes held back)",
        request.method, request.url, tail.len(), buf.len());

    let response = Response::unfinished(&request);
    Ok(PendingEntry {
        request: request,
        conn: conn,
        tail: tail,
        response: response,
    })
}
