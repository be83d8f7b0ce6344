// src/socket/patterns/load_balancer.rs

use crate::runtime::PeerId;

/// Round-robin over peers for outgoing messages.
///
/// `pick` only looks; the cursor moves in `commit`, once the message was
/// actually queued to the chosen peer.
#[derive(Debug, Default)]
pub(crate) struct LoadBalancer {
  peers: Vec<PeerId>,
  cursor: usize,
}

impl LoadBalancer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_peer(&mut self, peer: PeerId) {
    if !self.peers.contains(&peer) {
      self.peers.push(peer);
      tracing::trace!(peer, "LoadBalancer added peer");
    }
  }

  pub fn remove_peer(&mut self, peer: PeerId) {
    if let Some(pos) = self.peers.iter().position(|&p| p == peer) {
      self.peers.remove(pos);
      if pos < self.cursor {
        self.cursor -= 1;
      }
      tracing::trace!(peer, "LoadBalancer removed peer");
    }
  }

  /// The next peer, starting at the cursor, for which `ready` holds.
  pub fn pick(&self, ready: impl Fn(PeerId) -> bool) -> Option<PeerId> {
    let len = self.peers.len();
    (0..len)
      .map(|offset| self.peers[(self.cursor + offset) % len])
      .find(|&peer| ready(peer))
  }

  /// Moves the cursor past `peer`.
  pub fn commit(&mut self, peer: PeerId) {
    if let Some(pos) = self.peers.iter().position(|&p| p == peer) {
      self.cursor = (pos + 1) % self.peers.len();
    }
  }

  pub fn is_empty(&self) -> bool {
    self.peers.is_empty()
  }

  pub fn len(&self) -> usize {
    self.peers.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rotates_through_ready_peers() {
    let mut lb = LoadBalancer::new();
    for peer in [1, 2, 3] {
      lb.add_peer(peer);
    }
    let mut picked = Vec::new();
    for _ in 0..6 {
      let peer = lb.pick(|_| true).unwrap();
      lb.commit(peer);
      picked.push(peer);
    }
    assert_eq!(picked, vec![1, 2, 3, 1, 2, 3]);
  }

  #[test]
  fn skips_busy_peers_without_losing_position() {
    let mut lb = LoadBalancer::new();
    for peer in [1, 2, 3] {
      lb.add_peer(peer);
    }
    let peer = lb.pick(|p| p != 1).unwrap();
    assert_eq!(peer, 2);
    lb.commit(peer);
    assert_eq!(lb.pick(|_| true), Some(3));
    assert_eq!(lb.pick(|_| false), None);
  }

  #[test]
  fn removal_keeps_cursor_on_next_peer() {
    let mut lb = LoadBalancer::new();
    for peer in [1, 2, 3, 4] {
      lb.add_peer(peer);
    }
    lb.commit(2);
    lb.remove_peer(1);
    assert_eq!(lb.pick(|_| true), Some(3));
    lb.remove_peer(3);
    assert_eq!(lb.pick(|_| true), Some(4));
    lb.remove_peer(4);
    lb.remove_peer(2);
    assert!(lb.is_empty());
    assert_eq!(lb.pick(|_| true), None);
  }
}
