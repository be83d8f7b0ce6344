// src/socket/patterns/router.rs

use std::collections::HashMap;

use crate::message::Blob;
use crate::runtime::PeerId;

/// Maps routing identities to peers for ROUTER sockets.
#[derive(Debug, Default)]
pub(crate) struct RouterMap {
  identity_to_peer: HashMap<Blob, PeerId>,
  peer_to_identity: HashMap<PeerId, Blob>,
  /// Source of generated identities.
  next_generated: u32,
}

impl RouterMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `peer` under its announced identity, or under a generated
  /// one when it announced none or the identity is already taken.
  /// Returns the identity actually used.
  pub fn add_peer(&mut self, peer: PeerId, announced: &Blob) -> Blob {
    let identity = if announced.is_empty() {
      self.generate()
    } else if self.identity_to_peer.contains_key(announced) {
      tracing::warn!(peer, identity = ?announced, "Duplicate routing identity, assigning a generated one");
      self.generate()
    } else {
      announced.clone()
    };
    self.identity_to_peer.insert(identity.clone(), peer);
    self.peer_to_identity.insert(peer, identity.clone());
    tracing::trace!(peer, ?identity, "RouterMap added peer");
    identity
  }

  pub fn remove_peer(&mut self, peer: PeerId) -> Option<Blob> {
    let identity = self.peer_to_identity.remove(&peer)?;
    self.identity_to_peer.remove(&identity);
    tracing::trace!(peer, ?identity, "RouterMap removed peer");
    Some(identity)
  }

  pub fn peer_for(&self, identity: &[u8]) -> Option<PeerId> {
    self.identity_to_peer.get(identity).copied()
  }

  pub fn identity_of(&self, peer: PeerId) -> Option<&Blob> {
    self.peer_to_identity.get(&peer)
  }

  /// Five bytes: a zero byte, then a big-endian counter. The zero prefix
  /// keeps them apart from announced identities, which may not start with 0.
  fn generate(&mut self) -> Blob {
    loop {
      self.next_generated = self.next_generated.wrapping_add(1);
      let mut raw = Vec::with_capacity(5);
      raw.push(0u8);
      raw.extend_from_slice(&self.next_generated.to_be_bytes());
      let identity = Blob::from(raw);
      if !self.identity_to_peer.contains_key(&identity) {
        return identity;
      }
    }
  }
}
