// src/socket/dealer_socket.rs

use crate::error::ZmqResult;
use crate::message::Msg;
use crate::runtime::PeerId;
use crate::socket::core::state::{PeerEntry, PeerMap};
use crate::socket::options::SocketOptions;
use crate::socket::patterns::LoadBalancer;
use crate::socket::policy::{writable_in, SendPlan, SocketPolicy};
use crate::socket::types::SocketType;

/// DEALER: asynchronous; load-balances sends, fair-queues receives, and
/// passes messages through unchanged.
#[derive(Debug, Default)]
pub(crate) struct DealerPolicy {
  load_balancer: LoadBalancer,
}

impl DealerPolicy {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SocketPolicy for DealerPolicy {
  fn socket_type(&self) -> SocketType {
    SocketType::Dealer
  }

  fn attach(&mut self, peer: &mut PeerEntry) -> bool {
    self.load_balancer.add_peer(peer.id);
    true
  }

  fn detach(&mut self, peer: PeerId) -> Option<Msg> {
    self.load_balancer.remove_peer(peer);
    None
  }

  fn plan_send(&mut self, msg: &Msg, _peers: &PeerMap, _options: &SocketOptions) -> ZmqResult<SendPlan> {
    Ok(SendPlan::AnyPeer(msg.clone()))
  }

  fn pick_send_peer(&self, peers: &PeerMap) -> Option<PeerId> {
    self.load_balancer.pick(writable_in(peers))
  }

  fn on_dispatched(&mut self, peer: Option<PeerId>, _original: &Msg) {
    if let Some(peer) = peer {
      self.load_balancer.commit(peer);
    }
  }

  fn requeues_on_loss(&self) -> bool {
    true
  }
}
