//! HTTP/1.1 client that synchronizes requests down to the last byte
//!
//! Most web servers only start processing a request once its framing is
//! complete. This crate exploits that: every request is *primed* on its own
//! connection, written out except for the few trailing bytes that complete
//! the framing, and a later [`Session::finish_all`] releases the withheld
//! tails across parallel OS threads, so the server begins processing all of
//! them at nearly the same instant. Useful for exercising race conditions in
//! server-side logic such as single-use tokens and inventory decrements.
//!
//! ```no_run
//! use race_http::Session;
//!
//! let mut session = Session::new();
//! let first = session.get("http://shop.example/buy?item=1").send().unwrap();
//! let second = session.get("http://shop.example/buy?item=1").send().unwrap();
//! assert_eq!(first.status(), race_http::STATUS_UNFINISHED);
//!
//! session.finish_all(None);
//! assert_eq!(first.status(), 200);
//! # drop(second);
//! ```
extern crate base64;
extern crate cookie;
extern crate httparse;
extern crate native_tls;
extern crate netbuf;
extern crate serde;
extern crate serde_json;
extern crate url;
#[macro_use(quick_error)] extern crate quick_error;
#[macro_use] extern crate matches;
#[macro_use] extern crate log;

mod body;
mod chunk;
mod connection;
mod dispatch;
mod enums;
mod errors;
mod headers;
mod parser;
mod plain;
mod prime;
mod request;
mod response;
mod serializer;
mod session;

pub use connection::{ClientIdentity, Timeout};
pub use enums::Version;
pub use errors::Error;
pub use plain::Client;
pub use request::{Body, PreparedRequest, RequestBuilder};
pub use response::{Headers, Response, STATUS_FAILED, STATUS_UNFINISHED};
pub use session::Session;
