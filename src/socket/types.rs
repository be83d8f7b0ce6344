// src/socket/types.rs

use crate::error::{ZmqError, ZmqResult};
use crate::message::Msg;
use crate::runtime::{Command, MailboxSender, Reply};
use crate::security::CurveOracle;
use crate::socket::core::state::{terminal_error, TerminalState};
use crate::socket::events::{MonitorReceiver, DEFAULT_MONITOR_CAPACITY};
use crate::socket::options::OptionValue;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::oneshot;

/// The type of a ZeroMQ socket, defining its messaging pattern and behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
  /// **REQ (Request):** Sends requests and receives replies in strict alternation.
  /// Each request goes to one peer, chosen round-robin.
  Req,
  /// **REP (Reply):** Receives requests and sends replies in strict alternation.
  /// The reply is routed back through the envelope of the request.
  Rep,
  /// **DEALER:** Asynchronous request-reply. Load-balances outgoing messages and
  /// fair-queues incoming ones without touching envelopes.
  Dealer,
  /// **ROUTER:** Asynchronous request-reply. Incoming messages are prefixed with
  /// the sender's identity; outgoing messages are routed by their first frame.
  Router,
  /// **PUB (Publish):** Distributes messages to every subscriber whose
  /// subscriptions match the first frame. Never receives.
  Pub,
  /// **XPUB:** Like PUB, but subscription changes are readable as messages.
  XPub,
  /// **SUB (Subscribe):** Receives messages from publishers matching its
  /// subscriptions. Never sends.
  Sub,
  /// **XSUB:** Like SUB, but subscriptions are sent as messages.
  XSub,
  /// **PUSH:** Distributes messages round-robin to PULL peers. Never receives.
  Push,
  /// **PULL:** Fair-queues messages from PUSH peers. Never sends.
  Pull,
  /// **PAIR:** Exclusive bidirectional link with exactly one PAIR peer.
  Pair,
}

impl SocketType {
  pub const ALL: [SocketType; 11] = [
    SocketType::Req,
    SocketType::Rep,
    SocketType::Dealer,
    SocketType::Router,
    SocketType::Pub,
    SocketType::XPub,
    SocketType::Sub,
    SocketType::XSub,
    SocketType::Push,
    SocketType::Pull,
    SocketType::Pair,
  ];

  /// The name used in the `Socket-Type` metadata property.
  pub fn as_str(&self) -> &'static str {
    match self {
      SocketType::Req => "REQ",
      SocketType::Rep => "REP",
      SocketType::Dealer => "DEALER",
      SocketType::Router => "ROUTER",
      SocketType::Pub => "PUB",
      SocketType::XPub => "XPUB",
      SocketType::Sub => "SUB",
      SocketType::XSub => "XSUB",
      SocketType::Push => "PUSH",
      SocketType::Pull => "PULL",
      SocketType::Pair => "PAIR",
    }
  }

  pub fn can_send(&self) -> bool {
    !matches!(self, SocketType::Sub | SocketType::Pull)
  }

  pub fn can_recv(&self) -> bool {
    !matches!(self, SocketType::Pub | SocketType::Push)
  }

  /// Types whose application messages carry routing envelopes.
  pub fn uses_envelopes(&self) -> bool {
    matches!(self, SocketType::Req | SocketType::Rep | SocketType::Router)
  }

  /// Types that filter outgoing messages by peer subscriptions.
  pub fn filters_subscriptions(&self) -> bool {
    matches!(self, SocketType::Pub | SocketType::XPub)
  }

  /// Peer types this type may complete a handshake with.
  pub fn compatible_peers(&self) -> &'static [SocketType] {
    use SocketType::*;
    match self {
      Req => &[Rep, Router],
      Rep => &[Req, Dealer],
      Dealer => &[Rep, Dealer, Router],
      Router => &[Req, Dealer, Router],
      Pub | XPub => &[Sub, XSub],
      Sub | XSub => &[Pub, XPub],
      Push => &[Pull],
      Pull => &[Push],
      Pair => &[Pair],
    }
  }

  pub fn is_compatible(&self, peer: SocketType) -> bool {
    self.compatible_peers().contains(&peer)
  }
}

impl fmt::Display for SocketType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SocketType {
  type Err = ZmqError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    SocketType::ALL
      .iter()
      .copied()
      .find(|t| t.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| ZmqError::ProtocolViolation(format!("Unknown socket type {:?}", s)))
  }
}

/// The public handle for interacting with a zmq4 socket.
/// Handles are cloneable and delegate operations to the socket's control task.
/// The socket closes when `close` is called or the last handle is dropped.
#[derive(Clone)]
pub struct Socket {
  handle: usize,
  socket_type: SocketType,
  mailbox: MailboxSender,
  terminal: TerminalState,
}

impl Socket {
  pub(crate) fn new(handle: usize, socket_type: SocketType, mailbox: MailboxSender, terminal: TerminalState) -> Self {
    Self {
      handle,
      socket_type,
      mailbox,
      terminal,
    }
  }

  /// Sends a command and waits for its reply. A socket that already ended
  /// answers with `Closed` or `Canceled`.
  async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> ZmqResult<T> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .mailbox
      .send(build(reply_tx))
      .await
      .map_err(|_| terminal_error(&self.terminal))?;
    reply_rx.await.map_err(|_| terminal_error(&self.terminal))?
  }

  // --- Public API Methods (Async) ---

  /// Starts accepting connections on `endpoint` and returns the resolved
  /// endpoint (e.g. with the ephemeral TCP port filled in).
  pub async fn listen(&self, endpoint: &str) -> ZmqResult<String> {
    self
      .request(|reply| Command::Listen {
        endpoint: endpoint.to_string(),
        reply,
      })
      .await
  }

  /// Connects to `endpoint`, reconnecting with backoff whenever the
  /// connection is lost. TCP and IPC return immediately unless IMMEDIATE is
  /// set; inproc waits until the endpoint is bound.
  pub async fn dial(&self, endpoint: &str) -> ZmqResult<()> {
    self
      .request(|reply| Command::Dial {
        endpoint: endpoint.to_string(),
        reply,
      })
      .await
  }

  /// Sends a message, waiting (up to SNDTIMEO) while the type's rules
  /// cannot place it.
  pub async fn send(&self, msg: impl Into<Msg>) -> ZmqResult<()> {
    let msg = msg.into();
    self
      .request(|reply| Command::Send {
        msg,
        nonblocking: false,
        reply,
      })
      .await
  }

  /// Like `send`, but fails with `WouldBlock` instead of waiting.
  pub async fn try_send(&self, msg: impl Into<Msg>) -> ZmqResult<()> {
    let msg = msg.into();
    self
      .request(|reply| Command::Send {
        msg,
        nonblocking: true,
        reply,
      })
      .await
  }

  /// Receives the next message, waiting up to RCVTIMEO.
  pub async fn recv(&self) -> ZmqResult<Msg> {
    self
      .request(|reply| Command::Recv {
        nonblocking: false,
        reply,
      })
      .await
  }

  /// Like `recv`, but fails with `WouldBlock` when nothing is ready.
  pub async fn try_recv(&self) -> ZmqResult<Msg> {
    self
      .request(|reply| Command::Recv {
        nonblocking: true,
        reply,
      })
      .await
  }

  /// Sets a socket option by name, e.g. `socket.set_option(SNDHWM, 10)`.
  pub async fn set_option(&self, name: &str, value: impl Into<OptionValue>) -> ZmqResult<()> {
    let value = value.into();
    self
      .request(|reply| Command::SetOption {
        name: name.to_string(),
        value,
        reply,
      })
      .await
  }

  pub async fn get_option(&self, name: &str) -> ZmqResult<OptionValue> {
    self
      .request(|reply| Command::GetOption {
        name: name.to_string(),
        reply,
      })
      .await
  }

  /// Installs the CURVE cryptography provider used by later handshakes.
  pub async fn set_curve_oracle(&self, oracle: Arc<dyn CurveOracle>) -> ZmqResult<()> {
    self.request(|reply| Command::SetCurveOracle { oracle, reply }).await
  }

  /// Subscribes to lifecycle events. Events are dropped while the
  /// receiver is full.
  pub async fn monitor(&self) -> ZmqResult<MonitorReceiver> {
    self.monitor_with_capacity(DEFAULT_MONITOR_CAPACITY).await
  }

  pub async fn monitor_with_capacity(&self, capacity: usize) -> ZmqResult<MonitorReceiver> {
    self.request(|reply| Command::Monitor { capacity, reply }).await
  }

  /// Closes the socket: pending operations fail with `Closed`, connections
  /// and listeners stop. Closing again is a no-op.
  pub async fn close(&self) -> ZmqResult<()> {
    let (reply_tx, reply_rx) = oneshot::channel();
    if self.mailbox.send(Command::Close { reply: reply_tx }).await.is_err() {
      return Ok(());
    }
    reply_rx.await.unwrap_or(Ok(()))
  }

  pub fn socket_type(&self) -> SocketType {
    self.socket_type
  }
}

impl fmt::Debug for Socket {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Socket")
      .field("handle", &self.handle)
      .field("socket_type", &self.socket_type)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compatibility_is_symmetric() {
    for a in SocketType::ALL {
      for b in SocketType::ALL {
        assert_eq!(a.is_compatible(b), b.is_compatible(a), "{} vs {}", a, b);
      }
    }
  }

  #[test]
  fn req_accepts_only_rep_and_router() {
    let accepted: Vec<_> = SocketType::ALL
      .into_iter()
      .filter(|t| SocketType::Req.is_compatible(*t))
      .collect();
    assert_eq!(accepted, vec![SocketType::Rep, SocketType::Router]);
  }

  #[test]
  fn names_parse_back() {
    for t in SocketType::ALL {
      assert_eq!(t.as_str().parse::<SocketType>().unwrap(), t);
    }
    assert!("BOGUS".parse::<SocketType>().is_err());
  }
}
