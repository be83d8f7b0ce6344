// src/socket/pair_socket.rs

use crate::error::ZmqResult;
use crate::message::Msg;
use crate::runtime::PeerId;
use crate::socket::core::state::{PeerEntry, PeerMap};
use crate::socket::options::SocketOptions;
use crate::socket::policy::{SendPlan, SocketPolicy};
use crate::socket::types::SocketType;

/// PAIR: exactly one peer at a time; further connections are refused.
#[derive(Debug, Default)]
pub(crate) struct PairPolicy {
  peer: Option<PeerId>,
}

impl PairPolicy {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SocketPolicy for PairPolicy {
  fn socket_type(&self) -> SocketType {
    SocketType::Pair
  }

  fn attach(&mut self, peer: &mut PeerEntry) -> bool {
    if let Some(current) = self.peer {
      tracing::debug!(current, refused = peer.id, "PAIR already has a peer; refusing connection");
      return false;
    }
    self.peer = Some(peer.id);
    true
  }

  fn detach(&mut self, peer: PeerId) -> Option<Msg> {
    if self.peer == Some(peer) {
      self.peer = None;
    }
    None
  }

  fn plan_send(&mut self, msg: &Msg, _peers: &PeerMap, _options: &SocketOptions) -> ZmqResult<SendPlan> {
    Ok(SendPlan::AnyPeer(msg.clone()))
  }

  fn pick_send_peer(&self, peers: &PeerMap) -> Option<PeerId> {
    self.peer.filter(|id| peers.get(id).is_some_and(PeerEntry::writable))
  }

  fn requeues_on_loss(&self) -> bool {
    true
  }
}
