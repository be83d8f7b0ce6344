// src/socket/router_socket.rs

use crate::error::{ZmqError, ZmqResult};
use crate::message::{Blob, Msg};
use crate::runtime::PeerId;
use crate::socket::core::state::{PeerEntry, PeerMap};
use crate::socket::options::SocketOptions;
use crate::socket::patterns::RouterMap;
use crate::socket::policy::{SendPlan, SocketPolicy};
use crate::socket::types::SocketType;

/// ROUTER: every inbound message is prefixed with the sender's identity;
/// every outbound message names its destination in the first frame.
#[derive(Debug, Default)]
pub(crate) struct RouterPolicy {
  router_map: RouterMap,
}

impl RouterPolicy {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SocketPolicy for RouterPolicy {
  fn socket_type(&self) -> SocketType {
    SocketType::Router
  }

  fn attach(&mut self, peer: &mut PeerEntry) -> bool {
    peer.identity = self.router_map.add_peer(peer.id, &peer.identity);
    true
  }

  fn detach(&mut self, peer: PeerId) -> Option<Msg> {
    self.router_map.remove_peer(peer);
    None
  }

  fn plan_send(&mut self, msg: &Msg, peers: &PeerMap, options: &SocketOptions) -> ZmqResult<SendPlan> {
    if msg.len() < 2 {
      return Err(ZmqError::InvalidMessage(
        "ROUTER messages need an identity frame followed by a body".into(),
      ));
    }
    let mut wire = msg.clone();
    let identity = wire.pop_front().unwrap_or_default();
    let target = self
      .router_map
      .peer_for(&identity)
      .filter(|peer| peers.get(peer).is_some_and(|entry| entry.connected));

    match target {
      Some(peer) => Ok(SendPlan::To {
        peer,
        msg: wire,
        block_when_full: options.router_mandatory,
      }),
      None if options.router_mandatory => Err(ZmqError::HostUnreachable(format!(
        "no peer with identity {:?}",
        Blob::from_bytes(identity)
      ))),
      None => {
        tracing::trace!(identity = ?identity, "ROUTER dropping message for unknown identity");
        Ok(SendPlan::Drop)
      }
    }
  }

  fn on_inbound(&mut self, peer: &PeerEntry, mut msg: Msg) -> Option<Msg> {
    msg.push_front(peer.identity.to_bytes());
    Some(msg)
  }
}
