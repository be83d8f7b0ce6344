// src/socket/patterns/fair_queue.rs

use crate::runtime::PeerId;

/// Round-robin order for reading from peers.
///
/// A peer with nothing queued is skipped without moving the cursor; after a
/// delivery the cursor moves to the peer after the one that delivered.
#[derive(Debug, Default)]
pub(crate) struct FairQueue {
  peers: Vec<PeerId>,
  cursor: usize,
}

impl FairQueue {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_peer(&mut self, peer: PeerId) {
    if !self.peers.contains(&peer) {
      self.peers.push(peer);
    }
  }

  pub fn remove_peer(&mut self, peer: PeerId) {
    if let Some(pos) = self.peers.iter().position(|&p| p == peer) {
      self.peers.remove(pos);
      if pos < self.cursor {
        self.cursor -= 1;
      }
      if self.cursor >= self.peers.len() {
        self.cursor = 0;
      }
    }
  }

  /// Peers in the order they should be polled.
  pub fn scan_order(&self) -> Vec<PeerId> {
    let len = self.peers.len();
    (0..len).map(|offset| self.peers[(self.cursor + offset) % len]).collect()
  }

  /// Records that `peer` just delivered a message.
  pub fn delivered(&mut self, peer: PeerId) {
    if let Some(pos) = self.peers.iter().position(|&p| p == peer) {
      self.cursor = (pos + 1) % self.peers.len();
    }
  }

  pub fn is_empty(&self) -> bool {
    self.peers.is_empty()
  }
}
