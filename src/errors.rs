use std::io;

use httparse::Error as HttpError;
use httparse::InvalidChunkSize;
use native_tls;
use serde_json;
use url::ParseError as UrlError;

use serializer::HeaderError;

quick_error! {
    #[derive(Debug)]
    /// Client request error
    pub enum Error {
        /// Scheme of the url is not supported
        UnsupportedScheme {
            description("scheme of this url is not supported")
        }
        /// Url failed to parse as an absolute HTTP(S) url
        InvalidUrl(err: UrlError) {
            description("invalid url")
            display("invalid url: {}", err)
            from()
        }
        /// Name resolution error
        Name(err: io::Error) {
            description("name resolution error")
            display("name resolution error: {}", err)
        }
        /// Connect attempt did not finish within the configured timeout
        ConnectTimeout {
            description("connection attempt timed out")
        }
        /// TLS handshake or certificate error
        Tls(err: native_tls::Error) {
            description("TLS error")
            display("TLS error: {}", err)
            from()
        }
        /// Proxy refused the tunnel request
        Proxy(status: u16) {
            description("proxy refused the CONNECT request")
            display("proxy refused the CONNECT request with status {}",
                status)
        }
        /// I/O (basically networking) error occured during request
        Io(err: io::Error) {
            description("IO error")
            display("IO error: {}", err)
            from()
        }
        /// A JSON body could not be serialized
        Json(err: serde_json::Error) {
            description("JSON body serialization failed")
            display("JSON body serialization failed: {}", err)
        }
        /// A header passed to the request could not be serialized
        Serialize(err: HeaderError) {
            description("invalid outgoing header")
            display("invalid outgoing header: {}", err)
            from()
        }
        /// Bad response headers received
        Header(err: HttpError) {
            description("bad headers")
            display("bad headers: {}", err)
            from()
        }
        /// Bad chunk size received
        ChunkSize(err: InvalidChunkSize) {
            description("invalid chunk size")
            display("invalid chunk size: {}", err)
            from()
        }
        /// Bad `Content-Length` header
        BadContentLength {
            description("bad content length")
        }
        /// Duplicate `Content-Length` header
        DuplicateContentLength {
            description("duplicate content length")
        }
        /// Connection reset by peer when reading response headers
        ResetOnResponseHeaders {
            description("connection closed prematurely while reading headers")
        }
        /// Connection reset by peer when reading response body
        ResetOnResponseBody {
            description("connection closed prematurely while reading body")
        }
    }
}
