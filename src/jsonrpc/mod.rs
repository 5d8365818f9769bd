//! JSON-RPC 2.0 over a `Content-Length`-delimited byte stream: the wire
//! format used to talk to a spawned language server.

pub mod framing;
pub mod message;

pub use framing::{read_message, write_message};
pub use message::{Message, Notification, Request, RequestId, Response, ResponseError};
