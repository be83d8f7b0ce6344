// src/socket/req_socket.rs

use bytes::Bytes;

use crate::error::{ZmqError, ZmqResult};
use crate::message::Msg;
use crate::runtime::PeerId;
use crate::socket::core::state::{PeerEntry, PeerMap};
use crate::socket::options::SocketOptions;
use crate::socket::patterns::LoadBalancer;
use crate::socket::policy::{writable_in, SendPlan, SocketPolicy};
use crate::socket::types::SocketType;

#[derive(Debug)]
enum ReqState {
  /// Ready to send a request.
  Idle,
  /// A request is out. `peer` is `None` while it waits to be sent again.
  Awaiting { peer: Option<PeerId>, request: Msg },
}

/// REQ: strict send/receive alternation, requests load-balanced, each
/// reply accepted only from the peer that got the request.
#[derive(Debug)]
pub(crate) struct ReqPolicy {
  load_balancer: LoadBalancer,
  state: ReqState,
}

impl ReqPolicy {
  pub fn new() -> Self {
    Self {
      load_balancer: LoadBalancer::new(),
      state: ReqState::Idle,
    }
  }

  fn wire_request(msg: &Msg) -> Msg {
    let mut wire = msg.clone();
    wire.push_front(Bytes::new());
    wire
  }
}

impl SocketPolicy for ReqPolicy {
  fn socket_type(&self) -> SocketType {
    SocketType::Req
  }

  fn attach(&mut self, peer: &mut PeerEntry) -> bool {
    self.load_balancer.add_peer(peer.id);
    true
  }

  fn detach(&mut self, peer: PeerId) -> Option<Msg> {
    self.load_balancer.remove_peer(peer);
    match &mut self.state {
      ReqState::Awaiting { peer: awaited, request } if *awaited == Some(peer) => {
        tracing::debug!(peer, "Peer holding the outstanding request went away; resending");
        *awaited = None;
        Some(request.clone())
      }
      _ => None,
    }
  }

  fn plan_send(&mut self, msg: &Msg, _peers: &PeerMap, _options: &SocketOptions) -> ZmqResult<SendPlan> {
    if let ReqState::Awaiting { .. } = self.state {
      return Err(ZmqError::InvalidState("REQ socket must receive a reply before sending again"));
    }
    Ok(SendPlan::AnyPeer(Self::wire_request(msg)))
  }

  fn plan_resend(&mut self, msg: &Msg, _peers: &PeerMap, _options: &SocketOptions) -> ZmqResult<SendPlan> {
    Ok(SendPlan::AnyPeer(Self::wire_request(msg)))
  }

  fn pick_send_peer(&self, peers: &PeerMap) -> Option<PeerId> {
    self.load_balancer.pick(writable_in(peers))
  }

  fn on_dispatched(&mut self, peer: Option<PeerId>, original: &Msg) {
    if let Some(peer) = peer {
      self.load_balancer.commit(peer);
      self.state = ReqState::Awaiting {
        peer: Some(peer),
        request: original.clone(),
      };
    }
  }

  fn queue_without_peers(&mut self, original: &Msg) -> Option<bool> {
    self.state = ReqState::Awaiting {
      peer: None,
      request: original.clone(),
    };
    Some(true)
  }

  fn check_recv(&self) -> ZmqResult<()> {
    match self.state {
      ReqState::Idle => Err(ZmqError::InvalidState("REQ socket must send a request before receiving")),
      ReqState::Awaiting { .. } => Ok(()),
    }
  }

  fn on_inbound(&mut self, peer: &PeerEntry, mut msg: Msg) -> Option<Msg> {
    let expected = matches!(self.state, ReqState::Awaiting { peer: Some(awaited), .. } if awaited == peer.id);
    if !expected {
      tracing::trace!(peer = peer.id, "REQ dropping message from a peer it is not waiting on");
      return None;
    }
    if !msg.first().is_some_and(|frame| frame.is_empty()) {
      tracing::debug!(peer = peer.id, "REQ dropping reply without empty delimiter");
      return None;
    }
    msg.pop_front();
    if msg.is_empty() {
      return None;
    }
    self.state = ReqState::Idle;
    Some(msg)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::socket::core::state::testing::fake_peer;

  fn registry(ids: &[PeerId]) -> (PeerMap, ReqPolicy) {
    let mut policy = ReqPolicy::new();
    let mut peers = PeerMap::new();
    for &id in ids {
      let mut fake = fake_peer(id, SocketType::Rep, b"", 4);
      assert!(policy.attach(&mut fake.entry));
      peers.insert(id, fake.entry);
    }
    (peers, policy)
  }

  #[test]
  fn request_gets_delimiter_and_state_alternates() {
    let (peers, mut policy) = registry(&[1]);
    let options = SocketOptions::new(SocketType::Req);
    assert!(matches!(policy.check_recv(), Err(ZmqError::InvalidState(_))));

    let request = Msg::from("NAME");
    let SendPlan::AnyPeer(wire) = policy.plan_send(&request, &peers, &options).unwrap() else {
      panic!("expected AnyPeer");
    };
    assert_eq!(wire.frames(), &[Bytes::new(), Bytes::from_static(b"NAME")]);
    let peer = policy.pick_send_peer(&peers).unwrap();
    policy.on_dispatched(Some(peer), &request);

    assert!(policy.check_recv().is_ok());
    assert!(matches!(
      policy.plan_send(&request, &peers, &options),
      Err(ZmqError::InvalidState(_))
    ));

    let reply = Msg::from_frames([Bytes::new(), Bytes::from_static(b"zmq4")]);
    let got = policy.on_inbound(&peers[&1], reply).unwrap();
    assert_eq!(got.frames(), &[Bytes::from_static(b"zmq4")]);
    assert!(policy.check_recv().is_err());
  }

  #[test]
  fn replies_from_other_peers_or_without_delimiter_are_dropped() {
    let (peers, mut policy) = registry(&[1, 2]);
    let request = Msg::from("q");
    policy.on_dispatched(Some(1), &request);

    let stray = Msg::from_frames([Bytes::new(), Bytes::from_static(b"x")]);
    assert!(policy.on_inbound(&peers[&2], stray).is_none());
    assert!(policy.on_inbound(&peers[&1], Msg::from("no-delimiter")).is_none());
    assert!(policy.check_recv().is_ok());
  }

  #[test]
  fn losing_the_awaited_peer_hands_back_the_request() {
    let (peers, mut policy) = registry(&[1, 2]);
    let request = Msg::from("again");
    policy.on_dispatched(Some(1), &request);

    assert!(policy.detach(2).is_none());
    let resend = policy.detach(1).unwrap();
    assert_eq!(resend.frames(), request.frames());
    assert!(policy.check_recv().is_ok());

    let options = SocketOptions::new(SocketType::Req);
    assert!(matches!(
      policy.plan_resend(&resend, &peers, &options),
      Ok(SendPlan::AnyPeer(_))
    ));
    policy.on_dispatched(Some(2), &resend);
    let reply = Msg::from_frames([Bytes::new(), Bytes::from_static(b"ok")]);
    assert!(policy.on_inbound(&peers[&2], reply).is_some());
  }

  #[test]
  fn request_queued_without_peers_blocks_the_next_one() {
    let (peers, mut policy) = registry(&[]);
    let options = SocketOptions::new(SocketType::Req);
    let request = Msg::from("early");
    assert!(policy.pick_send_peer(&peers).is_none());
    assert_eq!(policy.queue_without_peers(&request), Some(true));

    assert!(policy.check_recv().is_ok());
    assert!(matches!(
      policy.plan_send(&request, &peers, &options),
      Err(ZmqError::InvalidState(_))
    ));
    assert!(matches!(
      policy.plan_resend(&request, &peers, &options),
      Ok(SendPlan::AnyPeer(_))
    ));
  }
}
