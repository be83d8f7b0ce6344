// src/error.rs

use std::io;
use thiserror::Error;

use crate::socket::types::SocketType;

/// Result alias used throughout the crate.
pub type ZmqResult<T, E = ZmqError> = Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ZmqError {
  // --- I/O Errors ---
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  // --- Socket-Type Errors ---
  #[error("{0} sockets can't send messages")]
  NotSendable(SocketType),
  #[error("{0} sockets can't receive messages")]
  NotReceivable(SocketType),
  #[error("Operation is invalid for the current socket state: {0}")]
  InvalidState(&'static str), // EFSM

  // --- Option Errors ---
  #[error("Unknown socket option: {0}")]
  UnknownOption(String),
  #[error("Invalid value for socket option {name}: {reason}")]
  InvalidOption { name: String, reason: String },

  // --- Endpoint / Transport Setup ---
  #[error("Invalid endpoint format: {0}")]
  InvalidEndpoint(String),
  #[error("Transport scheme not supported or enabled: {0}")]
  UnsupportedTransport(String),
  #[error("Could not bind endpoint {endpoint}: {reason}")]
  BindFailed { endpoint: String, reason: String },
  #[error("Connection refused: {0}")]
  ConnectionRefused(String), // ECONNREFUSED

  // --- Framing / Protocol Errors ---
  #[error("ZMTP protocol violation: {0}")]
  ProtocolViolation(String), // EPROTO
  #[error("Malformed frame: reserved flag bits set ({0:#04x})")]
  MalformedFrame(u8),
  #[error("Frame of {size} bytes exceeds the {limit} byte limit")]
  FrameTooLarge { size: u64, limit: u64 },
  #[error("Unexpected end of stream inside a frame")]
  UnexpectedEof,
  #[error("Unsupported ZMTP version {major}.{minor}")]
  UnsupportedProtocol { major: u8, minor: u8 },
  #[error("Security mechanism mismatch: local {local}, peer {peer}")]
  MechanismMismatch { local: String, peer: String },
  #[error("Invalid message for operation: {0}")]
  InvalidMessage(String),

  // --- Security Errors ---
  #[error("Authentication failed: {0}")]
  AuthenticationFailure(String),
  #[error("Security error: {0}")]
  SecurityError(String),

  // --- Routing / Flow ---
  #[error("Host is unreachable: {0}")]
  HostUnreachable(String), // EHOSTUNREACH
  #[error("Operation would block")]
  WouldBlock, // EAGAIN
  #[error("Operation timed out")]
  Timeout,

  // --- Lifecycle ---
  #[error("Socket is closed")]
  Closed,
  #[error("Operation canceled")]
  Canceled,
  #[error("Socket close did not complete within {0:?}")]
  CloseTimeout(std::time::Duration),

  // --- Internal Errors ---
  #[error("Internal library error: {0}")]
  Internal(String),
}

impl ZmqError {
  /// Maps transport-level I/O failures onto the socket error kinds.
  pub fn from_io_endpoint(e: io::Error, endpoint: &str) -> Self {
    match e.kind() {
      io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => ZmqError::ConnectionRefused(endpoint.to_string()),
      io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable | io::ErrorKind::PermissionDenied => {
        ZmqError::BindFailed {
          endpoint: endpoint.to_string(),
          reason: e.to_string(),
        }
      }
      io::ErrorKind::TimedOut => ZmqError::Timeout,
      io::ErrorKind::UnexpectedEof => ZmqError::UnexpectedEof,
      _ => ZmqError::Io(e),
    }
  }

  pub(crate) fn invalid_option(name: &str, reason: impl Into<String>) -> Self {
    ZmqError::InvalidOption {
      name: name.to_string(),
      reason: reason.into(),
    }
  }

  /// True for errors that end the socket rather than a single operation.
  pub fn is_terminal(&self) -> bool {
    matches!(self, ZmqError::Closed | ZmqError::Canceled)
  }
}
