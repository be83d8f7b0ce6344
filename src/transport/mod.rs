// src/transport/mod.rs

//! Stream transports. Each yields boxed bidirectional byte streams that the
//! connection engine runs ZMTP over.

pub(crate) mod dialer;
pub(crate) mod endpoint;
#[cfg(feature = "inproc")]
pub(crate) mod inproc;
#[cfg(all(unix, feature = "ipc"))]
pub(crate) mod ipc;
pub(crate) mod listener;
pub(crate) mod reconnect;
pub(crate) mod tcp;

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::context::Context;
use crate::error::ZmqError;
pub(crate) use endpoint::{parse_endpoint, Endpoint};

/// Anything the engine can speak ZMTP over.
pub(crate) trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

pub(crate) type BoxedStream = Box<dyn ByteStream>;

/// A bound listener producing incoming streams.
#[async_trait]
pub(crate) trait Acceptor: Send + 'static {
  /// Waits for the next stream; returns it with the peer's address.
  async fn accept(&mut self) -> io::Result<(BoxedStream, String)>;

  /// The resolved endpoint, e.g. with the ephemeral TCP port filled in.
  fn local_endpoint(&self) -> &str;
}

/// Binds a listener for `endpoint`.
#[cfg_attr(not(feature = "inproc"), allow(unused_variables))]
pub(crate) async fn bind(endpoint: &Endpoint, context: &Context) -> Result<Box<dyn Acceptor>, ZmqError> {
  let acceptor: Box<dyn Acceptor> = match endpoint {
    Endpoint::Tcp { host, port } => Box::new(tcp::TcpAcceptor::bind(host, *port).await?),
    #[cfg(all(unix, feature = "ipc"))]
    Endpoint::Ipc(path) => Box::new(ipc::IpcAcceptor::bind(path)?),
    #[cfg(feature = "inproc")]
    Endpoint::Inproc(name) => Box::new(context.inproc().bind(name)?),
  };
  Ok(acceptor)
}

/// Opens one stream to `endpoint`. Inproc waits for a listener to appear
/// unless `immediate` is set.
#[cfg_attr(not(feature = "inproc"), allow(unused_variables))]
pub(crate) async fn connect(
  endpoint: &Endpoint,
  context: &Context,
  immediate: bool,
) -> Result<(BoxedStream, String), ZmqError> {
  match endpoint {
    Endpoint::Tcp { host, port } => tcp::connect(host, *port).await,
    #[cfg(all(unix, feature = "ipc"))]
    Endpoint::Ipc(path) => ipc::connect(path).await,
    #[cfg(feature = "inproc")]
    Endpoint::Inproc(name) => context.inproc().connect(name, !immediate).await,
  }
}
