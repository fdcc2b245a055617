//! Assembles an HTTP/1.1 request into a buffer
//!
//! Nothing here touches the network: the whole message, terminator included,
//! is built in a `netbuf::Buf` and the connection layer decides how much of
//! it to flush. That split is what lets the primer hold back the trailing
//! framing bytes.

use std::fmt::Display;
use std::io::Write;

use netbuf::Buf;

use enums::Version;

quick_error! {
    #[derive(Debug)]
    pub enum HeaderError {
        DuplicateContentLength {
            description("Content-Length is added twice")
        }
        DuplicateTransferEncoding {
            description("Transfer-Encoding is added twice")
        }
        InvalidHeaderName {
            description("Header name contains invalid characters")
        }
        InvalidHeaderValue {
            description("Header value contains invalid characters")
        }
        TransferEncodingAfterContentLength {
            description("Transfer encoding added when Content-Length is \
                already specified")
        }
        ContentLengthAfterTransferEncoding {
            description("Content-Length added after Transfer-Encoding")
        }
        BodyLengthHeader {
            description("Content-Length and Transfer-Encoding must be set \
                using the specialized methods")
        }
    }
}

/// State of the request message being assembled
///
/// Note: while we pass buffer to each method, we expect that the same buffer
/// is passed each time
#[derive(Debug)]
pub enum MessageState {
    /// Nothing has been written yet.
    RequestStart,
    /// Request line is already in the buffer.
    Headers,
    /// The message will carry a fixed size body.
    FixedHeaders { content_length: u64 },
    /// The message will carry a chunked body.
    ChunkedHeaders,
    /// Headers are closed and the message has no body.
    ///
    /// A request without a `Content-Length` or `Transfer-Encoding`
    /// header field contains no body.
    Bodyless,
    /// Headers are closed, the body has the given number of bytes left.
    FixedBody { content_length: u64 },
    /// Headers are closed, the body is chunk-encoded.
    ChunkedBody,
    /// A message in final state.
    Done,
}

fn invalid_header(value: &[u8]) -> bool {
    return value.iter().any(|&x| x == b'\r' || x == b'\n')
}

impl MessageState {
    /// Write request line.
    ///
    /// This puts request line into a buffer immediately.
    ///
    /// # Panics
    ///
    /// When request line is already written. It's expected that your request
    /// handler state machine will never call the method twice.
    pub fn request_line(&mut self, buf: &mut Buf,
        method: &str, target: &str, version: Version)
    {
        use self::MessageState::*;
        match *self {
            RequestStart => {
                write!(buf, "{} {} {}\r\n",
                    method, target, version).unwrap();
                *self = Headers;
            }
            ref state => {
                panic!("Called request_line() method on request in state {:?}",
                       state)
            }
        }
    }

    fn write_header(&mut self, buf: &mut Buf, name: &str, value: &[u8])
        -> Result<(), HeaderError>
    {
        if invalid_header(name.as_bytes()) {
            return Err(HeaderError::InvalidHeaderName);
        }
        let start = buf.len();
        buf.write_all(name.as_bytes()).unwrap();
        buf.write_all(b": ").unwrap();

        let value_start = buf.len();
        buf.write_all(value).unwrap();
        if invalid_header(&buf[value_start..]) {
            buf.remove_range(start..);
            return Err(HeaderError::InvalidHeaderValue);
        }

        buf.write_all(b"\r\n").unwrap();
        Ok(())
    }

    fn write_formatted<D: Display>(&mut self, buf: &mut Buf,
        name: &str, value: D)
        -> Result<(), HeaderError>
    {
        if invalid_header(name.as_bytes()) {
            return Err(HeaderError::InvalidHeaderName);
        }
        let start = buf.len();
        buf.write_all(name.as_bytes()).unwrap();
        buf.write_all(b": ").unwrap();

        let value_start = buf.len();
        write!(buf, "{}", value).unwrap();
        if invalid_header(&buf[value_start..]) {
            buf.remove_range(start..);
            return Err(HeaderError::InvalidHeaderValue);
        }

        buf.write_all(b"\r\n").unwrap();
        Ok(())
    }

    /// Add a header to the message.
    ///
    /// `Content-Length` must be set using the `add_length` method and
    /// `Transfer-Encoding: chunked` with the `add_chunked` method. These two
    /// headers are important for the security of HTTP.
    ///
    /// Note that there is currently no way to use a transfer encoding other
    /// than chunked.
    ///
    /// # Panics
    ///
    /// Panics when `add_header` is called in the wrong state.
    pub fn add_header(&mut self, buf: &mut Buf, name: &str, value: &[u8])
        -> Result<(), HeaderError>
    {
        use self::MessageState::*;
        use self::HeaderError::*;
        if name.eq_ignore_ascii_case("Content-Length")
            || name.eq_ignore_ascii_case("Transfer-Encoding") {
            return Err(BodyLengthHeader)
        }
        match *self {
            Headers | FixedHeaders { .. } | ChunkedHeaders => {
                self.write_header(buf, name, value)
            }
            ref state => {
                panic!("Called add_header() method on a message in state {:?}",
                       state)
            }
        }
    }

    /// Add a content length to the message.
    ///
    /// The `Content-Length` header is written to the output buffer
    /// immediately. When the body is written the length is validated.
    ///
    /// # Panics
    ///
    /// Panics when `add_length` is called in the wrong state.
    pub fn add_length(&mut self, buf: &mut Buf, n: u64)
        -> Result<(), HeaderError>
    {
        use self::MessageState::*;
        use self::HeaderError::*;
        match *self {
            FixedHeaders { .. } => Err(DuplicateContentLength),
            ChunkedHeaders => Err(ContentLengthAfterTransferEncoding),
            Headers => {
                self.write_formatted(buf, "Content-Length", n)?;
                *self = FixedHeaders { content_length: n };
                Ok(())
            }
            ref state => {
                panic!("Called add_length() method on message in state {:?}",
                       state)
            }
        }
    }

    /// Sets the transfer encoding to chunked.
    ///
    /// Writes `Transfer-Encoding: chunked` to the output buffer immediately.
    ///
    /// # Panics
    ///
    /// Panics when `add_chunked` is called in the wrong state.
    pub fn add_chunked(&mut self, buf: &mut Buf)
        -> Result<(), HeaderError>
    {
        use self::MessageState::*;
        use self::HeaderError::*;
        match *self {
            FixedHeaders { .. } => Err(TransferEncodingAfterContentLength),
            ChunkedHeaders => Err(DuplicateTransferEncoding),
            Headers => {
                self.write_header(buf, "Transfer-Encoding", b"chunked")?;
                *self = ChunkedHeaders;
                Ok(())
            }
            ref state => {
                panic!("Called add_chunked() method on message in state {:?}",
                       state)
            }
        }
    }

    /// Closes the HTTP header and returns `true` if an entity body follows.
    ///
    /// The terminating blank line goes into the buffer like everything else;
    /// whether it reaches the network right away is the connection's call.
    ///
    /// # Panics
    ///
    /// Panics when the message is in a wrong state.
    pub fn done_headers(&mut self, buf: &mut Buf) -> bool {
        use self::MessageState::*;
        let expect_body = match *self {
            Headers => {
                *self = Bodyless;
                false
            }
            FixedHeaders { content_length } => {
                *self = FixedBody { content_length: content_length };
                true
            }
            ChunkedHeaders => {
                *self = ChunkedBody;
                true
            }
            ref state => {
                panic!("Called done_headers() method on message in state {:?}",
                       state)
            }
        };
        buf.write(b"\r\n").unwrap();
        expect_body
    }

    /// Write a chunk of the message body.
    ///
    /// Works both for fixed-size body and chunked body.
    ///
    /// For the chunked body each chunk is put into the buffer immediately
    /// prefixed by chunk size. Empty chunks are ignored.
    ///
    /// # Panics
    ///
    /// When the message is in the wrong state, or when a fixed-size body gets
    /// more bytes than `Content-Length` promised.
    pub fn write_body(&mut self, buf: &mut Buf, data: &[u8]) {
        use self::MessageState::*;
        match *self {
            Bodyless => panic!("Message must not contain body."),
            FixedBody { ref mut content_length } => {
                if data.len() as u64 > *content_length {
                    panic!("Fixed size request error. \
                        Bytes left {} but got additional {}",
                        content_length, data.len());
                }
                buf.write(data).unwrap();
                *content_length -= data.len() as u64;
            }
            ChunkedBody => if data.len() > 0 {
                write!(buf, "{:x}\r\n", data.len()).unwrap();
                buf.write(data).unwrap();
                buf.write(b"\r\n").unwrap();
            },
            ref state => {
                panic!("Called write_body() method on message \
                    in state {:?}", state)
            }
        }
    }

    /// Writes needed finalization data into the buffer and asserts
    /// that the message is in the appropriate state for that.
    ///
    /// The method may be called multiple times.
    ///
    /// # Panics
    ///
    /// When the message is in the wrong state or the body is not finished.
    pub fn done(&mut self, buf: &mut Buf) {
        use self::MessageState::*;
        match *self {
            Bodyless => *self = Done,
            FixedBody { content_length: 0 } => *self = Done,
            FixedBody { content_length } =>
                panic!("Tried to close message with {} bytes remaining.",
                       content_length),
            ChunkedBody => {
                buf.write(b"0\r\n\r\n").unwrap();
                *self = Done;
            }
            Done => {}  // multiple invocations are okay.
            ref state => {
                panic!("Called done() method on message in state {:?}",
                       state);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use netbuf::Buf;

    use super::MessageState;
    use enums::Version;

    fn do_request<F>(fun: F) -> Buf
        where F: FnOnce(MessageState, &mut Buf)
    {
        let mut buf = Buf::new();
        fun(MessageState::RequestStart, &mut buf);
        buf
    }

    #[test]
    fn minimal_request() {
        assert_eq!(&do_request(|mut msg, buf| {
            msg.request_line(buf, "GET", "/", Version::Http11);
            msg.done_headers(buf);
            msg.done(buf);
        })[..], "GET / HTTP/1.1\r\n\r\n".as_bytes());
    }

    #[test]
    fn request_with_host() {
        assert_eq!(&do_request(|mut msg, buf| {
            msg.request_line(buf, "GET", "/path", Version::Http11);
            msg.add_header(buf, "Host", b"example.com").unwrap();
            msg.done_headers(buf);
            msg.done(buf);
        })[..], concat!("GET /path HTTP/1.1\r\n",
                        "Host: example.com\r\n\r\n").as_bytes());
    }

    #[test]
    fn fixed_body_request() {
        assert_eq!(&do_request(|mut msg, buf| {
            msg.request_line(buf, "POST", "/submit", Version::Http11);
            msg.add_length(buf, 5).unwrap();
            assert!(msg.done_headers(buf));
            msg.write_body(buf, b"Hello");
            msg.done(buf);
        })[..], concat!("POST /submit HTTP/1.1\r\n",
                        "Content-Length: 5\r\n\r\nHello").as_bytes());
    }

    #[test]
    fn chunked_request() {
        assert_eq!(&do_request(|mut msg, buf| {
            msg.request_line(buf, "POST", "/stream", Version::Http11);
            msg.add_chunked(buf).unwrap();
            assert!(msg.done_headers(buf));
            msg.write_body(buf, b"Hello");
            msg.write_body(buf, b"");
            msg.done(buf);
        })[..], concat!("POST /stream HTTP/1.1\r\n",
                        "Transfer-Encoding: chunked\r\n\r\n",
                        "5\r\nHello\r\n0\r\n\r\n").as_bytes());
    }

    #[test]
    fn zero_chunk_request() {
        assert_eq!(&do_request(|mut msg, buf| {
            msg.request_line(buf, "POST", "/stream", Version::Http11);
            msg.add_chunked(buf).unwrap();
            msg.done_headers(buf);
            msg.done(buf);
        })[..], concat!("POST /stream HTTP/1.1\r\n",
                        "Transfer-Encoding: chunked\r\n\r\n",
                        "0\r\n\r\n").as_bytes());
    }

    #[test]
    fn rejects_length_via_add_header() {
        do_request(|mut msg, buf| {
            msg.request_line(buf, "POST", "/", Version::Http11);
            msg.add_header(buf, "Content-Length", b"10").unwrap_err();
            msg.add_header(buf, "transfer-encoding", b"chunked").unwrap_err();
        });
    }

    #[test]
    fn rejects_invalid_header_value() {
        do_request(|mut msg, buf| {
            msg.request_line(buf, "GET", "/", Version::Http11);
            let before = buf.len();
            msg.add_header(buf, "X-Bad", b"a\r\nInjected: yes").unwrap_err();
            // a rejected header leaves no trace in the buffer
            assert_eq!(buf.len(), before);
        });
    }

    #[test]
    fn rejects_duplicate_length() {
        do_request(|mut msg, buf| {
            msg.request_line(buf, "POST", "/", Version::Http11);
            msg.add_length(buf, 4).unwrap();
            msg.add_length(buf, 4).unwrap_err();
            msg.add_chunked(buf).unwrap_err();
        });
    }
}
