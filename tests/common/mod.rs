// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

use zmq4::{Context, CurveKeys, CurveOracle, CurveSession, MonitorReceiver, Msg, Socket, SocketEvent, ZmqError};

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(200);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(5);

static ENDPOINT_COUNTER: AtomicUsize = AtomicUsize::new(0);
static TRACING_INIT: Once = Once::new();

fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zmq4=debug,warn"));
    let _ = tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_line_number(true)
      .with_test_writer()
      .try_init();
  });
}

pub fn test_context() -> Context {
  setup_tracing();
  Context::new().expect("Failed to create test context")
}

pub fn unique_ipc_endpoint() -> String {
  let count = ENDPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
  format!("ipc:///tmp/zmq4_test_{}_{}.sock", std::process::id(), count)
}

pub fn unique_inproc_endpoint() -> String {
  let count = ENDPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
  format!("inproc://zmq4_test_{}_{}", std::process::id(), count)
}

pub async fn recv_timeout(socket: &Socket, duration: Duration) -> Result<Msg, ZmqError> {
  match timeout(duration, socket.recv()).await {
    Ok(result) => result,
    Err(_) => Err(ZmqError::Timeout),
  }
}

pub async fn send_timeout(socket: &Socket, msg: impl Into<Msg>, duration: Duration) -> Result<(), ZmqError> {
  match timeout(duration, socket.send(msg)).await {
    Ok(result) => result,
    Err(_) => Err(ZmqError::Timeout),
  }
}

/// Frames of a message as UTF-8 strings.
pub fn texts(msg: &Msg) -> Vec<String> {
  msg
    .frames()
    .iter()
    .map(|f| String::from_utf8_lossy(f).into_owned())
    .collect()
}

/// The single frame of a message as a string.
pub fn text(msg: &Msg) -> String {
  assert_eq!(msg.len(), 1, "expected a single-frame message, got {:?}", texts(msg));
  texts(msg).remove(0)
}

/// Waits for the first event accepted by `check`, discarding others.
pub async fn wait_for_event(
  monitor: &MonitorReceiver,
  within: Duration,
  check: impl Fn(&SocketEvent) -> bool,
) -> Result<SocketEvent, String> {
  let deadline = tokio::time::Instant::now() + within;
  loop {
    match tokio::time::timeout_at(deadline, monitor.recv()).await {
      Ok(Ok(event)) => {
        tracing::debug!(?event, "Monitor event");
        if check(&event) {
          return Ok(event);
        }
      }
      Ok(Err(_)) => return Err("monitor channel closed".to_string()),
      Err(_) => return Err(format!("no matching monitor event within {:?}", within)),
    }
  }
}

pub async fn wait_for_handshake(monitor: &MonitorReceiver) -> Result<SocketEvent, String> {
  wait_for_event(monitor, LONG_TIMEOUT, |e| matches!(e, SocketEvent::HandshakeSucceeded { .. })).await
}

/// Test oracle whose "encryption" is a tag prefix and whose server
/// authentication is key equality.
#[derive(Debug, Default)]
pub struct TagCurveOracle;

struct TagCurveSession {
  keys: CurveKeys,
}

impl CurveOracle for TagCurveOracle {
  fn client_session(&self, keys: &CurveKeys) -> Result<Box<dyn CurveSession>, ZmqError> {
    Ok(Box::new(TagCurveSession { keys: keys.clone() }))
  }

  fn server_session(&self, keys: &CurveKeys) -> Result<Box<dyn CurveSession>, ZmqError> {
    Ok(Box::new(TagCurveSession { keys: keys.clone() }))
  }
}

impl CurveSession for TagCurveSession {
  fn hello(&mut self) -> Result<Bytes, ZmqError> {
    let mut hello = self.keys.public_key.to_vec();
    hello.extend_from_slice(&self.keys.server_key.unwrap_or_default());
    Ok(Bytes::from(hello))
  }

  fn welcome(&mut self, hello: &[u8]) -> Result<Bytes, ZmqError> {
    if hello.len() != 64 || hello[32..] != self.keys.public_key {
      return Err(ZmqError::AuthenticationFailure("client expects another server key".into()));
    }
    Ok(Bytes::from_static(b"welcome"))
  }

  fn initiate(&mut self, _welcome: &[u8], metadata: &[u8]) -> Result<Bytes, ZmqError> {
    Ok(Bytes::copy_from_slice(metadata))
  }

  fn accept_initiate(&mut self, initiate: &[u8]) -> Result<Bytes, ZmqError> {
    Ok(Bytes::copy_from_slice(initiate))
  }

  fn ready(&mut self, metadata: &[u8]) -> Result<Bytes, ZmqError> {
    Ok(Bytes::copy_from_slice(metadata))
  }

  fn accept_ready(&mut self, ready: &[u8]) -> Result<Bytes, ZmqError> {
    Ok(Bytes::copy_from_slice(ready))
  }

  fn seal(&mut self, plaintext: &[u8]) -> Result<Bytes, ZmqError> {
    Ok(Bytes::from([b"T:".as_slice(), plaintext].concat()))
  }

  fn open(&mut self, sealed: &[u8]) -> Result<Bytes, ZmqError> {
    sealed
      .strip_prefix(b"T:")
      .map(Bytes::copy_from_slice)
      .ok_or_else(|| ZmqError::SecurityError("missing tag".into()))
  }
}
