// src/socket/rep_socket.rs

use bytes::Bytes;

use crate::error::{ZmqError, ZmqResult};
use crate::message::Msg;
use crate::runtime::PeerId;
use crate::socket::core::state::{PeerEntry, PeerMap};
use crate::socket::options::SocketOptions;
use crate::socket::policy::{SendPlan, SocketPolicy};
use crate::socket::types::SocketType;

#[derive(Debug)]
enum RepState {
  Idle,
  /// A request was handed out; its routing envelope waits for the reply.
  Replying { peer: PeerId, envelope: Vec<Bytes> },
}

/// REP: fair-queued requests, each reply routed back along the envelope of
/// the request it answers.
#[derive(Debug)]
pub(crate) struct RepPolicy {
  state: RepState,
}

impl RepPolicy {
  pub fn new() -> Self {
    Self { state: RepState::Idle }
  }
}

impl SocketPolicy for RepPolicy {
  fn socket_type(&self) -> SocketType {
    SocketType::Rep
  }

  fn attach(&mut self, _peer: &mut PeerEntry) -> bool {
    true
  }

  fn plan_send(&mut self, msg: &Msg, peers: &PeerMap, _options: &SocketOptions) -> ZmqResult<SendPlan> {
    let RepState::Replying { peer, envelope } = &self.state else {
      return Err(ZmqError::InvalidState("REP socket must receive a request before replying"));
    };
    if !peers.get(peer).is_some_and(|entry| entry.connected) {
      tracing::debug!(peer, "Requester went away; discarding reply");
      return Ok(SendPlan::Drop);
    }
    let mut wire = msg.clone();
    wire.prepend(envelope);
    Ok(SendPlan::To {
      peer: *peer,
      msg: wire,
      block_when_full: true,
    })
  }

  fn on_dispatched(&mut self, _peer: Option<PeerId>, _original: &Msg) {
    self.state = RepState::Idle;
  }

  fn check_recv(&self) -> ZmqResult<()> {
    match self.state {
      RepState::Idle => Ok(()),
      RepState::Replying { .. } => Err(ZmqError::InvalidState(
        "REP socket must reply before receiving the next request",
      )),
    }
  }

  fn on_inbound(&mut self, peer: &PeerEntry, mut msg: Msg) -> Option<Msg> {
    let Some(delimiter) = msg.frames().iter().position(|frame| frame.is_empty()) else {
      tracing::debug!(peer = peer.id, "REP dropping request without envelope delimiter");
      return None;
    };
    let envelope = msg.split_head(delimiter + 1);
    if msg.is_empty() {
      return None;
    }
    self.state = RepState::Replying {
      peer: peer.id,
      envelope,
    };
    Some(msg)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::socket::core::state::testing::fake_peer;

  #[test]
  fn reply_carries_request_envelope() {
    let mut policy = RepPolicy::new();
    let mut fake = fake_peer(1, SocketType::Router, b"", 4);
    policy.attach(&mut fake.entry);
    let mut peers = PeerMap::new();
    peers.insert(1, fake.entry);
    let options = SocketOptions::new(SocketType::Rep);

    assert!(matches!(
      policy.plan_send(&Msg::from("early"), &peers, &options),
      Err(ZmqError::InvalidState(_))
    ));

    let request = Msg::from_frames([
      Bytes::from_static(b"hop"),
      Bytes::new(),
      Bytes::from_static(b"LANG"),
    ]);
    let body = policy.on_inbound(&peers[&1], request).unwrap();
    assert_eq!(body.frames(), &[Bytes::from_static(b"LANG")]);
    assert!(policy.check_recv().is_err());

    let reply = Msg::from("Go");
    let SendPlan::To { peer, msg, block_when_full } = policy.plan_send(&reply, &peers, &options).unwrap() else {
      panic!("expected a routed reply");
    };
    assert_eq!(peer, 1);
    assert!(block_when_full);
    assert_eq!(
      msg.frames(),
      &[Bytes::from_static(b"hop"), Bytes::new(), Bytes::from_static(b"Go")]
    );
    policy.on_dispatched(Some(1), &reply);
    assert!(policy.check_recv().is_ok());
  }

  #[test]
  fn request_without_delimiter_is_dropped() {
    let mut policy = RepPolicy::new();
    let fake = fake_peer(1, SocketType::Req, b"", 4);
    assert!(policy.on_inbound(&fake.entry, Msg::from("bare")).is_none());
    assert!(policy.check_recv().is_ok());
  }

  #[test]
  fn reply_to_departed_peer_is_discarded() {
    let mut policy = RepPolicy::new();
    let mut fake = fake_peer(1, SocketType::Req, b"", 4);
    let request = Msg::from_frames([Bytes::new(), Bytes::from_static(b"q")]);
    policy.on_inbound(&fake.entry, request).unwrap();

    fake.entry.connected = false;
    let mut peers = PeerMap::new();
    peers.insert(1, fake.entry);
    let plan = policy
      .plan_send(&Msg::from("late"), &peers, &SocketOptions::new(SocketType::Rep))
      .unwrap();
    assert!(matches!(plan, SendPlan::Drop));
  }
}
