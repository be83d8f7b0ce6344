// src/socket/pull_socket.rs

use crate::error::{ZmqError, ZmqResult};
use crate::message::Msg;
use crate::socket::core::state::{PeerEntry, PeerMap};
use crate::socket::options::SocketOptions;
use crate::socket::policy::{SendPlan, SocketPolicy};
use crate::socket::types::SocketType;

/// PULL: receive-only, fair-queued across pushers.
#[derive(Debug, Default)]
pub(crate) struct PullPolicy;

impl PullPolicy {
  pub fn new() -> Self {
    Self
  }
}

impl SocketPolicy for PullPolicy {
  fn socket_type(&self) -> SocketType {
    SocketType::Pull
  }

  fn attach(&mut self, _peer: &mut PeerEntry) -> bool {
    true
  }

  fn plan_send(&mut self, _msg: &Msg, _peers: &PeerMap, _options: &SocketOptions) -> ZmqResult<SendPlan> {
    Err(ZmqError::NotSendable(SocketType::Pull))
  }
}
