use super::DataCipher;
use crate::error::ZmqError;
use crate::message::Metadata;
use crate::protocol::zmtp::command::{split_command, CMD_ERROR};
use crate::protocol::zmtp::ZmtpCommand;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismStatus {
  Handshaking,
  Ready,
  Error,
}

/// A security mechanism drives the command exchange that follows the greeting.
///
/// The connection engine alternates `produce_token` (send whatever is ready)
/// and `process_token` (feed the next peer command) until the status leaves
/// `Handshaking`. Tokens are complete command bodies: name length, name, data.
pub trait Mechanism: Send + fmt::Debug {
  /// ASCII name announced in the greeting.
  fn name(&self) -> &'static str;

  /// Next command body to send, or `None` when waiting for the peer.
  /// In the `Error` state this yields the ERROR command once, if the
  /// mechanism owes the peer one.
  fn produce_token(&mut self) -> Result<Option<Bytes>, ZmqError>;

  /// Consumes one command body received from the peer.
  fn process_token(&mut self, token: &[u8]) -> Result<(), ZmqError>;

  fn status(&self) -> MechanismStatus;

  fn is_complete(&self) -> bool {
    self.status() == MechanismStatus::Ready
  }

  fn is_error(&self) -> bool {
    self.status() == MechanismStatus::Error
  }

  /// Properties the peer announced (READY or INITIATE). Available once complete.
  fn peer_metadata(&self) -> Option<&Metadata>;

  fn error_reason(&self) -> Option<&str>;

  /// Consumes the finished mechanism, returning the cipher for the data phase.
  fn into_data_cipher(self: Box<Self>) -> Result<Arc<dyn DataCipher>, ZmqError>;
}

/// Turns a peer ERROR command into an authentication failure, or reports an
/// unexpected command name.
pub(crate) fn unexpected_command(mechanism: &str, expected: &str, token: &[u8]) -> ZmqError {
  match split_command(token) {
    Ok((CMD_ERROR, _)) => {
      let reason = match ZmtpCommand::parse(&Bytes::copy_from_slice(token)) {
        Ok(ZmtpCommand::Error(reason)) => reason,
        _ => String::new(),
      };
      ZmqError::AuthenticationFailure(format!("{} peer sent ERROR: {}", mechanism, reason))
    }
    Ok((name, _)) => ZmqError::ProtocolViolation(format!(
      "{} handshake expected {}, got {}",
      mechanism,
      expected,
      String::from_utf8_lossy(name)
    )),
    Err(e) => e,
  }
}
