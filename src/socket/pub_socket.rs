// src/socket/pub_socket.rs

use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ZmqError, ZmqResult};
use crate::message::Msg;
use crate::runtime::PeerId;
use crate::socket::core::state::{PeerEntry, PeerMap};
use crate::socket::options::SocketOptions;
use crate::socket::patterns::SubscriptionTrie;
use crate::socket::policy::{SendPlan, SocketPolicy};
use crate::socket::types::SocketType;

/// PUB and XPUB: messages fan out to every subscriber with a matching
/// prefix. XPUB additionally hands subscription changes to the user as
/// `\x01topic` / `\x00topic` messages.
#[derive(Debug)]
pub(crate) struct PubPolicy {
  socket_type: SocketType,
  subscriptions: SubscriptionTrie,
  /// XPUB only: subscription notices not yet received by the user.
  notices: VecDeque<Msg>,
}

impl PubPolicy {
  pub fn new(socket_type: SocketType) -> Self {
    Self {
      socket_type,
      subscriptions: SubscriptionTrie::new(),
      notices: VecDeque::new(),
    }
  }

  fn is_xpub(&self) -> bool {
    self.socket_type == SocketType::XPub
  }

  fn notify(&mut self, subscribe: bool, topic: &[u8]) {
    if self.is_xpub() {
      let mut body = BytesMut::with_capacity(topic.len() + 1);
      body.put_u8(u8::from(subscribe));
      body.put_slice(topic);
      self.notices.push_back(Msg::from(body.freeze()));
    }
  }
}

impl SocketPolicy for PubPolicy {
  fn socket_type(&self) -> SocketType {
    self.socket_type
  }

  fn attach(&mut self, _peer: &mut PeerEntry) -> bool {
    true
  }

  fn detach(&mut self, peer: PeerId) -> Option<Msg> {
    for topic in self.subscriptions.remove_subscriber(peer) {
      self.notify(false, &topic);
    }
    None
  }

  fn plan_send(&mut self, msg: &Msg, peers: &PeerMap, _options: &SocketOptions) -> ZmqResult<SendPlan> {
    let topic = msg.first().map(|frame| &frame[..]).unwrap_or_default();
    let targets: Vec<PeerId> = self
      .subscriptions
      .matching_subscribers(topic)
      .into_iter()
      .filter(|peer| peers.get(peer).is_some_and(|entry| entry.connected))
      .collect();
    if targets.is_empty() {
      return Ok(SendPlan::Drop);
    }
    Ok(SendPlan::Broadcast {
      peers: targets,
      msg: msg.clone(),
    })
  }

  fn check_recv(&self) -> ZmqResult<()> {
    if self.is_xpub() {
      Ok(())
    } else {
      Err(ZmqError::NotReceivable(self.socket_type))
    }
  }

  fn on_subscription(&mut self, peer: PeerId, subscribe: bool, topic: Bytes) {
    if subscribe {
      if self.subscriptions.subscribe(peer, &topic) {
        self.notify(true, &topic);
      }
    } else if self.subscriptions.unsubscribe(peer, &topic) {
      self.notify(false, &topic);
    }
  }

  fn take_local(&mut self) -> Option<Msg> {
    self.notices.pop_front()
  }
}
