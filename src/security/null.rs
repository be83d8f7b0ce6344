use super::cipher::PassThroughDataCipher;
use super::mechanism::unexpected_command;
use super::{DataCipher, Mechanism, MechanismStatus};
use crate::error::ZmqError;
use crate::message::Metadata;
use crate::protocol::zmtp::command::{split_command, CMD_READY};
use crate::protocol::zmtp::ZmtpCommand;
use bytes::Bytes;
use std::sync::Arc;

/// The NULL mechanism: one READY command in each direction.
#[derive(Debug)]
pub struct NullMechanism {
  local: Metadata,
  ready_sent: bool,
  peer: Option<Metadata>,
  error_reason: Option<String>,
}

impl NullMechanism {
  pub const NAME: &'static str = "NULL";

  pub fn new(local: Metadata) -> Self {
    Self {
      local,
      ready_sent: false,
      peer: None,
      error_reason: None,
    }
  }
}

impl Mechanism for NullMechanism {
  fn name(&self) -> &'static str {
    Self::NAME
  }

  fn produce_token(&mut self) -> Result<Option<Bytes>, ZmqError> {
    if self.ready_sent || self.error_reason.is_some() {
      return Ok(None);
    }
    self.ready_sent = true;
    Ok(Some(ZmtpCommand::Ready(self.local.clone()).to_body()))
  }

  fn process_token(&mut self, token: &[u8]) -> Result<(), ZmqError> {
    let result = match split_command(token) {
      Ok((CMD_READY, data)) if self.peer.is_none() => Metadata::decode(data),
      _ => Err(unexpected_command(Self::NAME, "READY", token)),
    };
    match result {
      Ok(metadata) => {
        self.peer = Some(metadata);
        Ok(())
      }
      Err(e) => {
        self.error_reason = Some(e.to_string());
        Err(e)
      }
    }
  }

  fn status(&self) -> MechanismStatus {
    if self.error_reason.is_some() {
      MechanismStatus::Error
    } else if self.ready_sent && self.peer.is_some() {
      MechanismStatus::Ready
    } else {
      MechanismStatus::Handshaking
    }
  }

  fn peer_metadata(&self) -> Option<&Metadata> {
    self.peer.as_ref()
  }

  fn error_reason(&self) -> Option<&str> {
    self.error_reason.as_deref()
  }

  fn into_data_cipher(self: Box<Self>) -> Result<Arc<dyn DataCipher>, ZmqError> {
    Ok(Arc::new(PassThroughDataCipher))
  }
}
