//! zmq4 - A pure-Rust asynchronous ZeroMQ (ZMTP 3.x) implementation using Tokio.
//!
//! Sockets are created from a [`Context`] and talk to libzmq-compatible peers
//! over `tcp://`, `ipc://` and `inproc://` endpoints with the NULL, PLAIN or
//! CURVE security mechanisms.
//!
//! ```no_run
//! # async fn demo() -> zmq4::ZmqResult<()> {
//! let ctx = zmq4::Context::new()?;
//! let rep = ctx.socket(zmq4::SocketType::Rep)?;
//! let endpoint = rep.listen("tcp://127.0.0.1:0").await?;
//!
//! let req = ctx.socket(zmq4::SocketType::Req)?;
//! req.dial(&endpoint).await?;
//! req.send("NAME").await?;
//! let request = rep.recv().await?;
//! rep.send("zmq4").await?;
//! let reply = req.recv().await?;
//! # let _ = (request, reply);
//! ctx.term().await
//! # }
//! ```

pub mod context;
pub(crate) mod engine;
pub mod error;
pub mod message;
pub mod protocol;
pub(crate) mod runtime;
pub mod security;
pub mod socket;
pub(crate) mod transport;

// Re-export core types for user convenience
pub use context::{context, Context};
pub use error::{ZmqError, ZmqResult};
pub use message::{Blob, Metadata, Msg};
pub use security::{CurveKey, CurveKeys, CurveOracle, CurveSession};
pub use socket::events::{MonitorReceiver, SocketEvent};
pub use socket::options::*;
pub use socket::types::{Socket, SocketType};

// --- Top-Level Functions ---

const VERSION_MAJOR: i32 = 0;
const VERSION_MINOR: i32 = 1;
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}

/// Returns the major version number of the library.
pub fn version_major() -> i32 {
  VERSION_MAJOR
}

/// Returns the minor version number of the library.
pub fn version_minor() -> i32 {
  VERSION_MINOR
}

/// Returns the patch version number of the library.
pub fn version_patch() -> i32 {
  VERSION_PATCH
}
