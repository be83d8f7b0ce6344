// src/socket/sub_socket.rs

use bytes::Bytes;

use crate::error::{ZmqError, ZmqResult};
use crate::message::Msg;
use crate::protocol::zmtp::ZmtpCommand;
use crate::runtime::PeerId;
use crate::socket::core::state::{PeerEntry, PeerMap};
use crate::socket::options::SocketOptions;
use crate::socket::patterns::SubscriptionTrie;
use crate::socket::policy::{connected_peers, SendPlan, SocketPolicy};
use crate::socket::types::SocketType;

/// The trie is shared with PUB, which keys it by peer; here there is only us.
const LOCAL: PeerId = 0;

/// SUB and XSUB: inbound messages pass only when a local subscription
/// prefixes them. Subscriptions travel upstream as SUBSCRIBE/CANCEL and are
/// replayed to every new publisher. XSUB sets them by sending `\x01topic` /
/// `\x00topic` and forwards any other message to all publishers.
#[derive(Debug)]
pub(crate) struct SubPolicy {
  socket_type: SocketType,
  subscriptions: SubscriptionTrie,
}

impl SubPolicy {
  pub fn new(socket_type: SocketType) -> Self {
    Self {
      socket_type,
      subscriptions: SubscriptionTrie::new(),
    }
  }
}

impl SocketPolicy for SubPolicy {
  fn socket_type(&self) -> SocketType {
    self.socket_type
  }

  fn attach(&mut self, peer: &mut PeerEntry) -> bool {
    for topic in self.subscriptions.topics_of(LOCAL) {
      // Unbounded; fails only when the connection is already gone.
      let _ = peer.control.try_send(ZmtpCommand::Subscribe(topic));
    }
    true
  }

  fn plan_send(&mut self, msg: &Msg, peers: &PeerMap, _options: &SocketOptions) -> ZmqResult<SendPlan> {
    if self.socket_type == SocketType::Sub {
      return Err(ZmqError::NotSendable(SocketType::Sub));
    }
    if msg.len() == 1 {
      if let Some(&flag @ (0 | 1)) = msg.first().and_then(|body| body.first()) {
        let topic = msg.first().map(|body| body.slice(1..)).unwrap_or_default();
        return Ok(match self.local_subscription(flag == 1, topic) {
          Some(command) => SendPlan::Command(command),
          None => SendPlan::Drop,
        });
      }
    }
    Ok(SendPlan::Broadcast {
      peers: connected_peers(peers),
      msg: msg.clone(),
    })
  }

  fn on_inbound(&mut self, peer: &PeerEntry, msg: Msg) -> Option<Msg> {
    let topic = msg.first().map(|frame| &frame[..]).unwrap_or_default();
    if self.subscriptions.matches(topic) {
      Some(msg)
    } else {
      tracing::trace!(peer = peer.id, "Dropping message with no matching subscription");
      None
    }
  }

  fn local_subscription(&mut self, subscribe: bool, topic: Bytes) -> Option<ZmtpCommand> {
    if subscribe {
      self
        .subscriptions
        .subscribe(LOCAL, &topic)
        .then_some(ZmtpCommand::Subscribe(topic))
    } else {
      self
        .subscriptions
        .unsubscribe(LOCAL, &topic)
        .then_some(ZmtpCommand::Cancel(topic))
    }
  }
}
