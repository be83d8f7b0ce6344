// src/transport/inproc.rs

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{Acceptor, BoxedStream};
use crate::error::ZmqError;

/// Buffer size of each direction of an in-process stream pair.
const INPROC_PIPE_CAPACITY: usize = 64 * 1024;
const INPROC_ACCEPT_BACKLOG: usize = 128;

struct InprocBinding {
  id: u64,
  connector: Sender<BoxedStream>,
}

/// Name registry for `inproc://` endpoints, shared by every socket of a context.
///
/// A dial creates an in-memory duplex stream and hands one end to the bound
/// listener, so inproc peers run the same ZMTP handshake as network ones.
#[derive(Default)]
pub(crate) struct InprocRegistry {
  bindings: Mutex<HashMap<String, InprocBinding>>,
  changed: Notify,
  next_id: AtomicU64,
}

impl std::fmt::Debug for InprocRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("InprocRegistry")
      .field("names", &self.bindings.lock().keys().cloned().collect::<Vec<_>>())
      .finish()
  }
}

impl InprocRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn bind(self: &Arc<Self>, name: &str) -> Result<InprocAcceptor, ZmqError> {
    let endpoint = format!("inproc://{}", name);
    let mut bindings = self.bindings.lock();
    if bindings.contains_key(name) {
      return Err(ZmqError::BindFailed {
        endpoint,
        reason: "address already in use".into(),
      });
    }
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = async_channel::bounded(INPROC_ACCEPT_BACKLOG);
    bindings.insert(name.to_string(), InprocBinding { id, connector: tx });
    drop(bindings);
    self.changed.notify_waiters();
    tracing::info!(uri = %endpoint, "Inproc endpoint bound");
    Ok(InprocAcceptor {
      registry: self.clone(),
      name: name.to_string(),
      id,
      incoming: rx,
      endpoint,
    })
  }

  /// Connects to `name`. With `wait` the call parks until the name is bound.
  pub async fn connect(&self, name: &str, wait: bool) -> Result<(BoxedStream, String), ZmqError> {
    let endpoint = format!("inproc://{}", name);
    loop {
      let notified = self.changed.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      let connector = self.bindings.lock().get(name).map(|b| b.connector.clone());
      if let Some(connector) = connector {
        let (local, remote) = tokio::io::duplex(INPROC_PIPE_CAPACITY);
        let remote: BoxedStream = Box::new(remote);
        if connector.send(remote).await.is_ok() {
          tracing::debug!(uri = %endpoint, "Inproc stream handed to listener");
          let local: BoxedStream = Box::new(local);
          return Ok((local, endpoint));
        }
        // The listener went away between lookup and send.
      } else if !wait {
        return Err(ZmqError::ConnectionRefused(endpoint));
      } else {
        tracing::trace!(uri = %endpoint, "Waiting for inproc endpoint to be bound");
      }

      if wait {
        notified.await;
      } else {
        return Err(ZmqError::ConnectionRefused(endpoint));
      }
    }
  }

  fn unbind(&self, name: &str, id: u64) {
    let mut bindings = self.bindings.lock();
    if bindings.get(name).map(|b| b.id) == Some(id) {
      bindings.remove(name);
      tracing::debug!(name, "Inproc endpoint unbound");
    }
  }
}

/// Listener side of an inproc name. Dropping it frees the name.
pub(crate) struct InprocAcceptor {
  registry: Arc<InprocRegistry>,
  name: String,
  id: u64,
  incoming: Receiver<BoxedStream>,
  endpoint: String,
}

impl Drop for InprocAcceptor {
  fn drop(&mut self) {
    self.registry.unbind(&self.name, self.id);
  }
}

#[async_trait]
impl Acceptor for InprocAcceptor {
  async fn accept(&mut self) -> io::Result<(BoxedStream, String)> {
    let stream = self
      .incoming
      .recv()
      .await
      .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "inproc registry closed"))?;
    Ok((stream, self.endpoint.clone()))
  }

  fn local_endpoint(&self) -> &str {
    &self.endpoint
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};

  #[tokio::test]
  async fn duplicate_bind_fails() {
    let registry = Arc::new(InprocRegistry::new());
    let _first = registry.bind("svc").unwrap();
    assert!(matches!(registry.bind("svc"), Err(ZmqError::BindFailed { .. })));
  }

  #[tokio::test]
  async fn drop_releases_name() {
    let registry = Arc::new(InprocRegistry::new());
    drop(registry.bind("svc").unwrap());
    assert!(registry.bind("svc").is_ok());
  }

  #[tokio::test]
  async fn immediate_connect_without_listener_is_refused() {
    let registry = Arc::new(InprocRegistry::new());
    assert!(matches!(
      registry.connect("nobody", false).await,
      Err(ZmqError::ConnectionRefused(_))
    ));
  }

  #[tokio::test]
  async fn waiting_connect_completes_after_bind() {
    let registry = Arc::new(InprocRegistry::new());
    let dialer = {
      let registry = registry.clone();
      tokio::spawn(async move { registry.connect("late", true).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!dialer.is_finished());

    let mut acceptor = registry.bind("late").unwrap();
    let (mut client, _) = tokio::time::timeout(Duration::from_secs(1), dialer)
      .await
      .unwrap()
      .unwrap()
      .unwrap();
    let (mut server, endpoint) = acceptor.accept().await.unwrap();
    assert_eq!(endpoint, "inproc://late");

    client.write_all(b"hi").await.unwrap();
    let mut buf = [0u8; 2];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hi");
  }
}
