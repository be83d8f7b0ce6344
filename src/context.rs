// src/context.rs

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::ZmqError;
use crate::runtime::TaskGroup;
use crate::socket::core::{SocketCore, CLOSE_GRACE};
use crate::socket::{Socket, SocketType};
#[cfg(feature = "inproc")]
use crate::transport::inproc::InprocRegistry;

/// Holds the internal state shared by multiple Context handles.
#[derive(Debug)]
pub(crate) struct ContextInner {
  /// Next available unique handle ID for sockets and connections.
  next_handle: AtomicUsize,
  /// Parent of every socket's token.
  token: CancellationToken,
  /// Control tasks of the sockets created here.
  sockets: TaskGroup,
  /// Registry for in-process bindings. Key is the inproc address name.
  #[cfg(feature = "inproc")]
  inproc: Arc<InprocRegistry>,
}

/// Owns the shared state sockets are created from: the inproc namespace,
/// handle ids and the lifetime every socket inherits.
/// Contexts are cloneable and thread-safe.
#[derive(Clone)]
pub struct Context {
  inner: Arc<ContextInner>,
}

impl Context {
  /// Creates a new, independent context.
  pub fn new() -> Result<Self, ZmqError> {
    Ok(Self::with_cancellation(CancellationToken::new()))
  }

  /// Creates a context whose sockets all end when `parent` is cancelled.
  /// Operations on them then fail with `Canceled`.
  pub fn with_cancellation(parent: CancellationToken) -> Self {
    tracing::debug!("Creating new zmq4 Context");
    Self {
      inner: Arc::new(ContextInner {
        next_handle: AtomicUsize::new(1),
        token: parent.child_token(),
        sockets: TaskGroup::new(),
        #[cfg(feature = "inproc")]
        inproc: Arc::new(InprocRegistry::new()),
      }),
    }
  }

  /// Creates a socket of the specified type associated with this context.
  /// Must be called from within a Tokio runtime.
  pub fn socket(&self, socket_type: SocketType) -> Result<Socket, ZmqError> {
    if self.inner.token.is_cancelled() {
      return Err(ZmqError::Canceled);
    }
    if tokio::runtime::Handle::try_current().is_err() {
      return Err(ZmqError::Internal("sockets must be created inside a Tokio runtime".into()));
    }
    Ok(SocketCore::spawn(self, socket_type))
  }

  /// Cancels every socket created from this context without waiting.
  pub fn shutdown(&self) {
    tracing::debug!("Context shutdown requested");
    self.inner.token.cancel();
  }

  /// Cancels every socket and waits for them to finish closing.
  pub async fn term(&self) -> Result<(), ZmqError> {
    self.shutdown();
    // Each socket gets its own close grace period; allow for that plus slack.
    let limit = CLOSE_GRACE * 2;
    match tokio::time::timeout(limit, self.inner.sockets.wait()).await {
      Ok(()) => {
        tracing::debug!("Context terminated");
        Ok(())
      }
      Err(_) => {
        self.inner.sockets.abort_all();
        Err(ZmqError::CloseTimeout(limit))
      }
    }
  }

  /// True once `shutdown`/`term` ran or the parent token was cancelled.
  pub fn is_terminated(&self) -> bool {
    self.inner.token.is_cancelled()
  }

  // --- Internal Methods ---

  pub(crate) fn next_handle(&self) -> usize {
    self.inner.next_handle.fetch_add(1, Ordering::Relaxed)
  }

  pub(crate) fn token(&self) -> &CancellationToken {
    &self.inner.token
  }

  pub(crate) fn sockets(&self) -> &TaskGroup {
    &self.inner.sockets
  }

  #[cfg(feature = "inproc")]
  pub(crate) fn inproc(&self) -> &Arc<InprocRegistry> {
    &self.inner.inproc
  }
}

impl fmt::Debug for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context")
      .field("terminated", &self.is_terminated())
      .finish_non_exhaustive()
  }
}

/// Creates a new library context.
pub fn context() -> Result<Context, ZmqError> {
  Context::new()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn handles_are_unique() {
    let ctx = Context::new().unwrap();
    let a = ctx.next_handle();
    let b = ctx.next_handle();
    assert_ne!(a, b);
    assert!(a > 0);
  }

  #[tokio::test]
  async fn terminated_context_refuses_sockets() {
    let ctx = Context::new().unwrap();
    let socket = ctx.socket(SocketType::Pair).unwrap();
    ctx.term().await.unwrap();
    assert!(ctx.is_terminated());
    assert!(matches!(ctx.socket(SocketType::Pair), Err(ZmqError::Canceled)));
    assert!(matches!(socket.recv().await, Err(ZmqError::Canceled)));
  }

  #[tokio::test]
  async fn parent_token_cancels_context() {
    let parent = CancellationToken::new();
    let ctx = Context::with_cancellation(parent.clone());
    parent.cancel();
    assert!(ctx.is_terminated());
  }
}
