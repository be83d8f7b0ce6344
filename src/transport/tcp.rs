// src/transport/tcp.rs

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};

use super::{Acceptor, BoxedStream};
use crate::error::ZmqError;

const LISTEN_BACKLOG: i32 = 128;

/// A bound TCP listener.
#[derive(Debug)]
pub(crate) struct TcpAcceptor {
  listener: TokioTcpListener,
  endpoint: String,
}

impl TcpAcceptor {
  pub async fn bind(host: &str, port: u16) -> Result<Self, ZmqError> {
    let endpoint = format_endpoint(host, port);
    let addr = resolve(host, port)
      .await
      .map_err(|e| ZmqError::BindFailed {
        endpoint: endpoint.clone(),
        reason: e.to_string(),
      })?;

    let std_listener = bind_std(addr).map_err(|e| ZmqError::BindFailed {
      endpoint: endpoint.clone(),
      reason: e.to_string(),
    })?;
    let listener = TokioTcpListener::from_std(std_listener)?;
    let local_addr = listener.local_addr()?;
    let endpoint = format!("tcp://{}", local_addr);
    tracing::info!(?local_addr, uri = %endpoint, "TCP Listener bound successfully");
    Ok(Self { listener, endpoint })
  }
}

fn bind_std(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
  let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
  socket.set_reuse_address(true)?;
  socket.bind(&addr.into())?;
  socket.listen(LISTEN_BACKLOG)?;
  socket.set_nonblocking(true)?;
  Ok(socket.into())
}

#[async_trait]
impl Acceptor for TcpAcceptor {
  async fn accept(&mut self) -> io::Result<(BoxedStream, String)> {
    let (stream, peer_addr) = self.listener.accept().await?;
    apply_tcp_socket_options(&stream)?;
    tracing::debug!(peer = %peer_addr, uri = %self.endpoint, "Accepted new TCP connection");
    let stream: BoxedStream = Box::new(stream);
    Ok((stream, peer_addr.to_string()))
  }

  fn local_endpoint(&self) -> &str {
    &self.endpoint
  }
}

/// Opens a TCP stream to `host:port`.
pub(crate) async fn connect(host: &str, port: u16) -> Result<(BoxedStream, String), ZmqError> {
  let endpoint = format_endpoint(host, port);
  let stream = TcpStream::connect((host, port))
    .await
    .map_err(|e| ZmqError::from_io_endpoint(e, &endpoint))?;
  apply_tcp_socket_options(&stream)?;
  let peer_addr = stream.peer_addr().map(|a| a.to_string()).unwrap_or(endpoint);
  let stream: BoxedStream = Box::new(stream);
  Ok((stream, peer_addr))
}

async fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
  tokio::net::lookup_host((host, port))
    .await?
    .next()
    .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, format!("{} did not resolve", host)))
}

fn apply_tcp_socket_options(stream: &TcpStream) -> io::Result<()> {
  SockRef::from(stream).set_nodelay(true)?;
  tracing::trace!("Applied TCP_NODELAY");
  Ok(())
}

fn format_endpoint(host: &str, port: u16) -> String {
  if host.contains(':') {
    format!("tcp://[{}]:{}", host, port)
  } else {
    format!("tcp://{}:{}", host, port)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};

  #[tokio::test]
  async fn ephemeral_port_is_reported() {
    let acceptor = TcpAcceptor::bind("127.0.0.1", 0).await.unwrap();
    let endpoint = acceptor.local_endpoint().to_string();
    assert!(endpoint.starts_with("tcp://127.0.0.1:"));
    assert!(!endpoint.ends_with(":0"));
  }

  #[tokio::test]
  async fn accept_and_connect_exchange_bytes() {
    let mut acceptor = TcpAcceptor::bind("127.0.0.1", 0).await.unwrap();
    let port: u16 = acceptor.local_endpoint().rsplit(':').next().unwrap().parse().unwrap();

    let client = tokio::spawn(async move {
      let (mut stream, _) = connect("127.0.0.1", port).await.unwrap();
      stream.write_all(b"ping").await.unwrap();
    });
    let (mut server, _) = acceptor.accept().await.unwrap();
    let mut buf = [0u8; 4];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
    client.await.unwrap();
  }

  #[tokio::test]
  async fn second_bind_on_same_port_fails() {
    let acceptor = TcpAcceptor::bind("127.0.0.1", 0).await.unwrap();
    let port: u16 = acceptor.local_endpoint().rsplit(':').next().unwrap().parse().unwrap();
    assert!(matches!(
      TcpAcceptor::bind("127.0.0.1", port).await,
      Err(ZmqError::BindFailed { .. })
    ));
  }
}
