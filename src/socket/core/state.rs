// src/socket/core/state.rs

use std::collections::HashMap;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use once_cell::sync::OnceCell;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::PeerHandle;
use crate::error::ZmqError;
use crate::message::{Blob, Msg};
use crate::protocol::zmtp::ZmtpCommand;
use crate::runtime::{PeerId, Reply};
use crate::socket::types::SocketType;

/// The control task's record of one connection.
#[derive(Debug)]
pub(crate) struct PeerEntry {
  pub id: PeerId,
  pub endpoint: String,
  pub peer_type: SocketType,
  /// Routing identity; ROUTER replaces it when it has to generate one.
  pub identity: Blob,
  pub outbound: Sender<Msg>,
  pub outbound_queue: Receiver<Msg>,
  pub control: Sender<ZmtpCommand>,
  pub inbound: Receiver<Msg>,
  pub token: CancellationToken,
  /// False once the connection ended. The entry stays until its inbound
  /// queue is drained so nothing already received gets lost.
  pub connected: bool,
}

impl PeerEntry {
  /// Connected and below its send high-water mark.
  pub fn writable(&self) -> bool {
    self.connected && !self.outbound.is_full()
  }
}

impl From<PeerHandle> for PeerEntry {
  fn from(handle: PeerHandle) -> Self {
    Self {
      id: handle.id,
      endpoint: handle.endpoint,
      peer_type: handle.peer_type,
      identity: handle.identity,
      outbound: handle.outbound,
      outbound_queue: handle.outbound_queue,
      control: handle.control,
      inbound: handle.inbound,
      token: handle.token,
      connected: true,
    }
  }
}

pub(crate) type PeerMap = HashMap<PeerId, PeerEntry>;

/// A send waiting for a peer or for queue space.
#[derive(Debug)]
pub(crate) struct PendingSend {
  pub msg: Msg,
  /// `None` for messages the socket re-queued itself.
  pub reply: Option<Reply<()>>,
  pub deadline: Option<Instant>,
  /// A REQ request being repeated after its peer went away.
  pub resend: bool,
}

impl PendingSend {
  pub fn abandoned(&self) -> bool {
    self.reply.as_ref().is_some_and(|reply| reply.is_closed())
  }
}

/// A receive waiting for a message.
#[derive(Debug)]
pub(crate) struct PendingRecv {
  pub reply: Reply<Msg>,
  pub deadline: Option<Instant>,
}

/// How a socket ended, shared with its handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminal {
  Closed,
  Canceled,
}

impl Terminal {
  pub fn error(self) -> ZmqError {
    match self {
      Terminal::Closed => ZmqError::Closed,
      Terminal::Canceled => ZmqError::Canceled,
    }
  }
}

pub(crate) type TerminalState = Arc<OnceCell<Terminal>>;

/// The error for an operation on a socket that has already ended.
pub(crate) fn terminal_error(state: &TerminalState) -> ZmqError {
  state.get().copied().unwrap_or(Terminal::Closed).error()
}
