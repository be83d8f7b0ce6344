// src/runtime/peer_event.rs

use bytes::Bytes;

use crate::engine::connection::PeerHandle;
use crate::socket::events::SocketEvent;

/// Socket-unique id of one ready connection.
pub(crate) type PeerId = usize;

/// Reports from listener, dialer and connection tasks to the control task,
/// which is the only place the peer registry changes.
pub(crate) enum PeerEvent {
  /// Handshake completed; the connection is ready for traffic.
  Attached(PeerHandle),
  /// The connection's reader and writer have both stopped.
  Detached { peer: PeerId, reason: Option<String> },
  /// A SUBSCRIBE/CANCEL arrived from a subscriber.
  Subscription { peer: PeerId, subscribe: bool, topic: Bytes },
  /// Lifecycle notice forwarded to monitors.
  Monitor(SocketEvent),
}
