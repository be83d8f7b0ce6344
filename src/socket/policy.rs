// src/socket/policy.rs

//! Per-type messaging rules. The control task asks the policy where a
//! message goes and what an inbound message means; the policy never touches
//! channels itself.

use std::fmt;
use std::ops::{Deref, DerefMut};

use bytes::Bytes;

use crate::error::ZmqResult;
use crate::message::Msg;
use crate::protocol::zmtp::ZmtpCommand;
use crate::runtime::PeerId;
use crate::socket::core::state::{PeerEntry, PeerMap};
use crate::socket::dealer_socket::DealerPolicy;
use crate::socket::options::SocketOptions;
use crate::socket::pair_socket::PairPolicy;
use crate::socket::pub_socket::PubPolicy;
use crate::socket::pull_socket::PullPolicy;
use crate::socket::push_socket::PushPolicy;
use crate::socket::rep_socket::RepPolicy;
use crate::socket::req_socket::ReqPolicy;
use crate::socket::router_socket::RouterPolicy;
use crate::socket::sub_socket::SubPolicy;
use crate::socket::types::SocketType;

/// Where an outgoing message should go.
#[derive(Debug)]
pub(crate) enum SendPlan {
  /// One specific peer. When it is full the send either waits or the
  /// message is dropped.
  To {
    peer: PeerId,
    msg: Msg,
    block_when_full: bool,
  },
  /// The next writable peer in round-robin order; waits when there is none.
  AnyPeer(Msg),
  /// Each listed peer with room. Full peers miss the message.
  Broadcast { peers: Vec<PeerId>, msg: Msg },
  /// A command for every connected peer.
  Command(ZmtpCommand),
  /// Nothing to send; the operation still succeeds.
  Drop,
}

pub(crate) trait SocketPolicy: fmt::Debug + Send {
  fn socket_type(&self) -> SocketType;

  /// A connection became ready. Returning false refuses it.
  fn attach(&mut self, peer: &mut PeerEntry) -> bool;

  /// A connection ended. May hand back a message that must be sent again.
  fn detach(&mut self, _peer: PeerId) -> Option<Msg> {
    None
  }

  /// Decides where `msg` goes. Must not change state the send depends on;
  /// that happens in `on_dispatched` once the message actually left.
  fn plan_send(&mut self, msg: &Msg, peers: &PeerMap, options: &SocketOptions) -> ZmqResult<SendPlan>;

  /// Like `plan_send`, for a message returned by `detach`.
  fn plan_resend(&mut self, msg: &Msg, peers: &PeerMap, options: &SocketOptions) -> ZmqResult<SendPlan> {
    self.plan_send(msg, peers, options)
  }

  /// Chooses the peer for `SendPlan::AnyPeer`.
  fn pick_send_peer(&self, _peers: &PeerMap) -> Option<PeerId> {
    None
  }

  /// The planned send completed; `peer` is where it went, if anywhere.
  fn on_dispatched(&mut self, _peer: Option<PeerId>, _original: &Msg) {}

  /// Rejects receives the socket's state machine forbids.
  fn check_recv(&self) -> ZmqResult<()> {
    Ok(())
  }

  /// Turns a message read from `peer` into what the user receives, or
  /// `None` to drop it.
  fn on_inbound(&mut self, _peer: &PeerEntry, msg: Msg) -> Option<Msg> {
    Some(msg)
  }

  /// A subscriber (un)subscribed.
  fn on_subscription(&mut self, _peer: PeerId, _subscribe: bool, _topic: Bytes) {}

  /// The user (un)subscribed through an option. Returns the command to
  /// send upstream, if the subscription set actually changed.
  fn local_subscription(&mut self, _subscribe: bool, _topic: Bytes) -> Option<ZmtpCommand> {
    None
  }

  /// Messages generated by the socket itself, delivered before peer traffic.
  fn take_local(&mut self) -> Option<Msg> {
    None
  }

  /// Whether messages stuck in a lost peer's queue go to another peer.
  fn requeues_on_loss(&self) -> bool {
    false
  }

  /// Called when a valid send finds no connected peer and IMMEDIATE is off.
  /// `Some(resend)` keeps the message in the socket queue, to go out through
  /// `plan_resend` when `resend` is set; `None` makes the send wait instead.
  fn queue_without_peers(&mut self, _original: &Msg) -> Option<bool> {
    self.requeues_on_loss().then_some(false)
  }
}

/// The policy of one socket, fixed at creation.
#[derive(Debug)]
pub(crate) enum Policy {
  Req(ReqPolicy),
  Rep(RepPolicy),
  Dealer(DealerPolicy),
  Router(RouterPolicy),
  Pub(PubPolicy),
  Sub(SubPolicy),
  Push(PushPolicy),
  Pull(PullPolicy),
  Pair(PairPolicy),
}

impl Policy {
  pub fn new(socket_type: SocketType) -> Self {
    match socket_type {
      SocketType::Req => Policy::Req(ReqPolicy::new()),
      SocketType::Rep => Policy::Rep(RepPolicy::new()),
      SocketType::Dealer => Policy::Dealer(DealerPolicy::new()),
      SocketType::Router => Policy::Router(RouterPolicy::new()),
      SocketType::Pub | SocketType::XPub => Policy::Pub(PubPolicy::new(socket_type)),
      SocketType::Sub | SocketType::XSub => Policy::Sub(SubPolicy::new(socket_type)),
      SocketType::Push => Policy::Push(PushPolicy::new()),
      SocketType::Pull => Policy::Pull(PullPolicy::new()),
      SocketType::Pair => Policy::Pair(PairPolicy::new()),
    }
  }
}

impl Deref for Policy {
  type Target = dyn SocketPolicy;

  fn deref(&self) -> &Self::Target {
    match self {
      Policy::Req(p) => p,
      Policy::Rep(p) => p,
      Policy::Dealer(p) => p,
      Policy::Router(p) => p,
      Policy::Pub(p) => p,
      Policy::Sub(p) => p,
      Policy::Push(p) => p,
      Policy::Pull(p) => p,
      Policy::Pair(p) => p,
    }
  }
}

impl DerefMut for Policy {
  fn deref_mut(&mut self) -> &mut Self::Target {
    match self {
      Policy::Req(p) => p,
      Policy::Rep(p) => p,
      Policy::Dealer(p) => p,
      Policy::Router(p) => p,
      Policy::Pub(p) => p,
      Policy::Sub(p) => p,
      Policy::Push(p) => p,
      Policy::Pull(p) => p,
      Policy::Pair(p) => p,
    }
  }
}

/// `LoadBalancer::pick` predicate over the registry.
pub(crate) fn writable_in(peers: &PeerMap) -> impl Fn(PeerId) -> bool + '_ {
  move |id| peers.get(&id).is_some_and(PeerEntry::writable)
}

/// Ids of all connected peers.
pub(crate) fn connected_peers(peers: &PeerMap) -> Vec<PeerId> {
  peers.values().filter(|p| p.connected).map(|p| p.id).collect()
}
