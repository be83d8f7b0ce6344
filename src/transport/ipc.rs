// src/transport/ipc.rs

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::net::{UnixListener, UnixStream};

use super::{Acceptor, BoxedStream};
use crate::error::ZmqError;

/// A bound Unix domain socket listener.
///
/// The socket file stays on disk after the listener is dropped; removing it
/// is left to the owner of the path.
#[derive(Debug)]
pub(crate) struct IpcAcceptor {
  listener: UnixListener,
  path: PathBuf,
  endpoint: String,
}

impl IpcAcceptor {
  pub fn bind(path: &Path) -> Result<Self, ZmqError> {
    let endpoint = format!("ipc://{}", path.display());
    let listener = UnixListener::bind(path).map_err(|e| ZmqError::BindFailed {
      endpoint: endpoint.clone(),
      reason: e.to_string(),
    })?;
    tracing::info!(path = ?path, uri = %endpoint, "IPC Listener bound successfully");
    Ok(Self {
      listener,
      path: path.to_path_buf(),
      endpoint,
    })
  }
}

#[async_trait]
impl Acceptor for IpcAcceptor {
  async fn accept(&mut self) -> io::Result<(BoxedStream, String)> {
    let (stream, _addr) = self.listener.accept().await?;
    // Peers on an unnamed socket have no address of their own.
    tracing::debug!(path = ?self.path, "Accepted new IPC connection");
    let stream: BoxedStream = Box::new(stream);
    Ok((stream, self.endpoint.clone()))
  }

  fn local_endpoint(&self) -> &str {
    &self.endpoint
  }
}

pub(crate) async fn connect(path: &Path) -> Result<(BoxedStream, String), ZmqError> {
  let endpoint = format!("ipc://{}", path.display());
  let stream = UnixStream::connect(path)
    .await
    .map_err(|e| ZmqError::from_io_endpoint(e, &endpoint))?;
  let stream: BoxedStream = Box::new(stream);
  Ok((stream, endpoint))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};

  fn temp_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("zmq4-ipc-unit-{}-{}.sock", tag, std::process::id()))
  }

  #[tokio::test]
  async fn accept_and_connect_exchange_bytes() {
    let path = temp_path("exchange");
    let _ = std::fs::remove_file(&path);
    let mut acceptor = IpcAcceptor::bind(&path).unwrap();

    let client_path = path.clone();
    let client = tokio::spawn(async move {
      let (mut stream, _) = connect(&client_path).await.unwrap();
      stream.write_all(b"pong").await.unwrap();
    });
    let (mut server, peer) = acceptor.accept().await.unwrap();
    assert!(peer.starts_with("ipc://"));
    let mut buf = [0u8; 4];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"pong");
    client.await.unwrap();

    drop(acceptor);
    assert!(path.exists(), "socket file is not removed on drop");
    std::fs::remove_file(&path).unwrap();
  }

  #[tokio::test]
  async fn connect_without_listener_is_refused() {
    let path = temp_path("missing");
    let _ = std::fs::remove_file(&path);
    assert!(matches!(connect(&path).await, Err(ZmqError::ConnectionRefused(_))));
  }
}
