// src/socket/core/event_processor.rs

use super::state::{PeerEntry, PendingSend};
use super::SocketCore;
use crate::engine::PeerHandle;
use crate::message::Msg;
use crate::runtime::{PeerEvent, PeerId};
use crate::socket::events::SocketEvent;

impl SocketCore {
  pub(super) fn handle_event(&mut self, event: PeerEvent) {
    match event {
      PeerEvent::Attached(handle) => self.attach_peer(handle),
      PeerEvent::Detached { peer, reason } => self.detach_peer(peer, reason),
      PeerEvent::Subscription { peer, subscribe, topic } => {
        if self.peers.get(&peer).is_some_and(|entry| entry.connected) {
          self.policy.on_subscription(peer, subscribe, topic);
        }
      }
      PeerEvent::Monitor(event) => self.emit(event),
    }
    self.pump();
  }

  fn attach_peer(&mut self, handle: PeerHandle) {
    let mut entry = PeerEntry::from(handle);
    if !self.policy.attach(&mut entry) {
      entry.token.cancel();
      return;
    }
    tracing::debug!(
      handle = self.handle,
      peer = entry.id,
      endpoint = %entry.endpoint,
      peer_type = %entry.peer_type,
      "Peer attached"
    );
    self.emit(SocketEvent::HandshakeSucceeded {
      endpoint: entry.endpoint.clone(),
      peer_type: entry.peer_type,
    });
    self.fair_queue.add_peer(entry.id);
    self.peers.insert(entry.id, entry);
  }

  fn detach_peer(&mut self, peer: PeerId, reason: Option<String>) {
    // Refused connections were never registered.
    let Some(entry) = self.peers.get_mut(&peer) else {
      return;
    };
    entry.connected = false;
    let endpoint = entry.endpoint.clone();

    let mut stranded: Vec<Msg> = Vec::new();
    if self.policy.requeues_on_loss() && !self.options.immediate {
      while let Ok(msg) = entry.outbound_queue.try_recv() {
        stranded.push(msg);
      }
    }
    let drained = entry.inbound.is_empty();

    for msg in stranded.into_iter().rev() {
      self.pending_sends.push_front(PendingSend {
        msg,
        reply: None,
        deadline: None,
        resend: false,
      });
    }
    if let Some(request) = self.policy.detach(peer) {
      self.pending_sends.push_front(PendingSend {
        msg: request,
        reply: None,
        deadline: None,
        resend: true,
      });
    }
    if drained {
      self.remove_peer(peer);
    }

    tracing::debug!(handle = self.handle, peer, endpoint = %endpoint, reason = ?reason, "Peer detached");
    self.emit(SocketEvent::Disconnected { endpoint, reason });
  }

  /// Forgets a peer whose connection ended and whose inbound queue is empty.
  pub(super) fn remove_peer(&mut self, peer: PeerId) {
    self.fair_queue.remove_peer(peer);
    self.peers.remove(&peer);
  }
}
