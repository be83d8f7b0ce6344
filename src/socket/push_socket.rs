// src/socket/push_socket.rs

use crate::error::ZmqResult;
use crate::message::Msg;
use crate::runtime::PeerId;
use crate::socket::core::state::{PeerEntry, PeerMap};
use crate::socket::options::SocketOptions;
use crate::socket::patterns::LoadBalancer;
use crate::socket::policy::{writable_in, SendPlan, SocketPolicy};
use crate::socket::types::SocketType;

/// PUSH: send-only, round-robin across pullers.
#[derive(Debug, Default)]
pub(crate) struct PushPolicy {
  load_balancer: LoadBalancer,
}

impl PushPolicy {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SocketPolicy for PushPolicy {
  fn socket_type(&self) -> SocketType {
    SocketType::Push
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

#[cfg(test)]
mod tests {
  use super::*;
  use crate::socket::core::state::testing::fake_peer;

  #[test]
  fn distributes_evenly() {
    let mut policy = PushPolicy::new();
    let mut peers = PeerMap::new();
    for id in [1, 2, 3] {
      let mut fake = fake_peer(id, SocketType::Pull, b"", 100);
      policy.attach(&mut fake.entry);
      peers.insert(id, fake.entry);
    }
    let mut counts = [0usize; 4];
    for _ in 0..30 {
      let msg = Msg::from("task");
      let peer = policy.pick_send_peer(&peers).unwrap();
      policy.on_dispatched(Some(peer), &msg);
      counts[peer] += 1;
    }
    assert_eq!(&counts[1..], &[10, 10, 10]);
  }

  #[test]
  fn queues_while_no_puller_is_connected() {
    let mut policy = PushPolicy::new();
    assert!(policy.pick_send_peer(&PeerMap::new()).is_none());
    assert_eq!(policy.queue_without_peers(&Msg::from("task")), Some(false));
  }
}
