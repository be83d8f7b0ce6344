// src/socket/events.rs

use std::time::Duration;

use crate::socket::types::SocketType;

/// Significant events occurring within a socket or its connections,
/// in the spirit of libzmq's socket monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SocketEvent {
  // --- Listener Events ---
  /// Socket has started listening. `endpoint` is the resolved address.
  Listening { endpoint: String },
  /// Socket failed to bind to the endpoint.
  BindFailed { endpoint: String, error_msg: String },
  /// Accepted a new stream. `peer_addr` is the address of the remote peer.
  Accepted { endpoint: String, peer_addr: String },

  // --- Dialer Events ---
  /// Stream established (transport layer). Handshake follows.
  Connected { endpoint: String, peer_addr: String },
  /// A dial attempt failed; the next one starts after `interval`.
  ConnectRetried { endpoint: String, interval: Duration },

  // --- Handshake Events ---
  /// ZMTP handshake (including security mechanism) succeeded.
  HandshakeSucceeded { endpoint: String, peer_type: SocketType },
  /// ZMTP handshake (including security mechanism) failed.
  HandshakeFailed { endpoint: String, error_msg: String },

  // --- Teardown ---
  /// A ready connection ended. `reason` is `None` for a local close.
  Disconnected { endpoint: String, reason: Option<String> },
  /// The socket finished closing. Always the last event.
  Closed,
}

pub type MonitorSender = async_channel::Sender<SocketEvent>;
pub type MonitorReceiver = async_channel::Receiver<SocketEvent>;

pub const DEFAULT_MONITOR_CAPACITY: usize = 100;
