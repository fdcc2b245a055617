//! Reads and parses an HTTP/1.1 response from a released connection

use std::str::from_utf8;

use httparse;
use netbuf::Buf;

use body::{BodyProgress, ChunkState};
use connection::Connection;
use enums::Version;
use errors::Error;
use headers;

/// Number of headers to allocate on a stack
const MIN_HEADERS: usize = 16;
/// A hard limit on the number of headers
const MAX_HEADERS: usize = 1024;

#[derive(Debug)]
pub struct ResponseHead {
    pub version: Version,
    pub code: u16,
    pub reason: String,
    pub headers: Vec<(String, Vec<u8>)>,
    /// Length of the head section in the buffer, terminator included.
    pub bytes: usize,
}

/// A fully buffered response as it came off the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub code: u16,
    pub reason: String,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
}

#[derive(Debug, PartialEq)]
enum BodyKind {
    Fixed(u64),
    Chunked,
    Eof,
}

/// Try to parse a complete response head out of the buffer.
///
/// Returns `None` when more bytes are needed.
pub fn parse_head(buf: &Buf) -> Result<Option<ResponseHead>, Error> {
    let mut vec;
    let mut headers = [httparse::EMPTY_HEADER; MIN_HEADERS];
    let mut raw = httparse::Response::new(&mut headers);
    let mut result = raw.parse(&buf[..]);
    if matches!(result, Err(httparse::Error::TooManyHeaders)) {
        vec = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
        raw = httparse::Response::new(&mut vec);
        result = raw.parse(&buf[..]);
    }
    match result? {
        httparse::Status::Complete(bytes) => {
            Ok(Some(ResponseHead {
                version: if raw.version.unwrap() == 1
                    { Version::Http11 } else { Version::Http10 },
                code: raw.code.unwrap(),
                reason: raw.reason.unwrap_or("").to_string(),
                headers: raw.headers.iter()
                    .map(|h| (h.name.to_string(), h.value.to_vec()))
                    .collect(),
                bytes: bytes,
            }))
        }
        httparse::Status::Partial => Ok(None),
    }
}

/// Implements the body length algorithm for responses:
/// http://httpwg.github.io/specs/rfc7230.html#message.body.length
///
/// 1. For HEAD, 1xx, 204, 304 -- no body
/// 2. If last transfer encoding is chunked -> Chunked
/// 3. If Content-Length -> Fixed
/// 4. Else read until the peer closes
fn scan_headers(is_head: bool, code: u16, headers: &[(String, Vec<u8>)])
    -> Result<BodyKind, Error>
{
    if is_head || (code > 100 && code < 200) || code == 204 || code == 304 {
        return Ok(BodyKind::Fixed(0));
    }
    let mut result = BodyKind::Eof;
    let mut has_content_length = false;
    for &(ref name, ref value) in headers {
        if name.eq_ignore_ascii_case("Transfer-Encoding") {
            if let Some(enc) = value.split(|&x| x == b',').last() {
                if headers::is_chunked(enc) {
                    result = BodyKind::Chunked;
                }
            }
        } else if name.eq_ignore_ascii_case("Content-Length") {
            if has_content_length {
                return Err(Error::DuplicateContentLength);
            }
            has_content_length = true;
            if result != BodyKind::Chunked {
                let text = from_utf8(value)
                    .map_err(|_| Error::BadContentLength)?;
                let len = text.trim().parse()
                    .map_err(|_| Error::BadContentLength)?;
                result = BodyKind::Fixed(len);
            }
        }
    }
    Ok(result)
}

/// Read one full response off the connection, blocking as needed.
pub fn read_response(conn: &mut Connection, is_head: bool)
    -> Result<RawResponse, Error>
{
    let mut buf = Buf::new();
    let head = loop {
        if let Some(head) = parse_head(&buf)? {
            break head;
        }
        if conn.read_some(&mut buf)? == 0 {
            return Err(Error::ResetOnResponseHeaders);
        }
    };
    debug!("reading {} response: {} {}",
        head.version, head.code, head.reason);
    buf.consume(head.bytes);

    let mut progress = match scan_headers(
        is_head, head.code, &head.headers)?
    {
        BodyKind::Fixed(n) => BodyProgress::Fixed(n as usize),
        BodyKind::Chunked => BodyProgress::Chunked(ChunkState::new()),
        BodyKind::Eof => BodyProgress::Eof,
    };
    let mut eof = false;
    let body = loop {
        progress.parse(&mut buf)?;
        let (bytes, done) = progress.check(&buf, eof);
        if done {
            break buf[..bytes].to_vec();
        }
        if eof {
            return Err(Error::ResetOnResponseBody);
        }
        if conn.read_some(&mut buf)? == 0 {
            eof = true;
        }
    };
    Ok(RawResponse {
        code: head.code,
        reason: head.reason,
        headers: head.headers,
        body: body,
    })
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use netbuf::Buf;

    use enums::Version;
    use super::{BodyKind, parse_head, scan_headers};

    fn buf_of(data: &[u8]) -> Buf {
        let mut buf = Buf::new();
        buf.write_all(data).unwrap();
        buf
    }

    #[test]
    fn complete_head() {
        let buf = buf_of(b"HTTP/1.1 200 OK\r\n\
            Content-Type: text/plain\r\n\
            Content-Length: 5\r\n\r\nhello");
        let head = parse_head(&buf).unwrap().unwrap();
        assert_eq!(head.version, Version::Http11);
        assert_eq!(head.code, 200);
        assert_eq!(head.reason, "OK");
        assert_eq!(head.headers.len(), 2);
        assert_eq!(&buf[head.bytes..], b"hello");
    }

    #[test]
    fn partial_head() {
        let buf = buf_of(b"HTTP/1.1 200 OK\r\nContent-");
        assert!(parse_head(&buf).unwrap().is_none());
    }

    #[test]
    fn invalid_head() {
        let buf = buf_of(b"TTMP/2.0 200 OK\r\n\r\n");
        parse_head(&buf).unwrap_err();
    }

    fn hdr(name: &str, value: &[u8]) -> (String, Vec<u8>) {
        (name.to_string(), value.to_vec())
    }

    #[test]
    fn body_kinds() {
        assert_eq!(
            scan_headers(false, 200,
                &[hdr("Content-Length", b"42")]).unwrap(),
            BodyKind::Fixed(42));
        assert_eq!(
            scan_headers(false, 200,
                &[hdr("Transfer-Encoding", b"chunked")]).unwrap(),
            BodyKind::Chunked);
        assert_eq!(scan_headers(false, 200, &[]).unwrap(), BodyKind::Eof);
        // chunked wins over an earlier content-length
        assert_eq!(
            scan_headers(false, 200, &[
                hdr("Content-Length", b"42"),
                hdr("Transfer-Encoding", b"chunked"),
            ]).unwrap(),
            BodyKind::Chunked);
    }

    #[test]
    fn bodyless_statuses() {
        assert_eq!(
            scan_headers(false, 204,
                &[hdr("Content-Length", b"42")]).unwrap(),
            BodyKind::Fixed(0));
        assert_eq!(scan_headers(false, 304, &[]).unwrap(),
            BodyKind::Fixed(0));
        assert_eq!(
            scan_headers(true, 200,
                &[hdr("Content-Length", b"42")]).unwrap(),
            BodyKind::Fixed(0));
    }

    #[test]
    fn duplicate_content_length() {
        scan_headers(false, 200, &[
            hdr("Content-Length", b"1"),
            hdr("Content-Length", b"2"),
        ]).unwrap_err();
    }

    #[test]
    fn bad_content_length() {
        scan_headers(false, 200,
            &[hdr("Content-Length", b"banana")]).unwrap_err();
    }
}
