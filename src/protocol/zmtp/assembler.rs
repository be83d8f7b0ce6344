// src/protocol/zmtp/assembler.rs

use crate::error::ZmqError;
use crate::message::{Frame, Msg};
use bytes::Bytes;

/// Collates data frames into messages using the MORE bit.
#[derive(Debug, Default)]
pub struct MessageAssembler {
  parts: Vec<Bytes>,
}

impl MessageAssembler {
  pub fn new() -> Self {
    Self::default()
  }

  /// True while a message is partially collected.
  pub fn in_progress(&self) -> bool {
    !self.parts.is_empty()
  }

  /// Feeds one frame. Returns the finished message when the last frame arrives.
  ///
  /// A command frame is only legal between messages.
  pub fn push(&mut self, frame: Frame) -> Result<Option<Msg>, ZmqError> {
    if frame.is_command() {
      return Err(ZmqError::ProtocolViolation(
        "Command frame inside a multi-part message".into(),
      ));
    }
    let more = frame.is_more();
    self.parts.push(frame.body);
    if more {
      Ok(None)
    } else {
      Ok(Some(Msg::new(std::mem::take(&mut self.parts))))
    }
  }

  /// Drops a partially collected message.
  pub fn reset(&mut self) {
    self.parts.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collects_until_last_frame() {
    let mut asm = MessageAssembler::new();
    assert!(asm.push(Frame::data(Bytes::from_static(b"a"), true)).unwrap().is_none());
    assert!(asm.in_progress());
    let msg = asm.push(Frame::data(Bytes::from_static(b"b"), false)).unwrap().unwrap();
    assert_eq!(msg.frames(), &[Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
    assert!(!asm.in_progress());
  }

  #[test]
  fn command_mid_message_is_violation() {
    let mut asm = MessageAssembler::new();
    asm.push(Frame::data(Bytes::from_static(b"a"), true)).unwrap();
    let err = asm.push(Frame::command(Bytes::from_static(b"\x04PING\x00\x00"))).unwrap_err();
    assert!(matches!(err, ZmqError::ProtocolViolation(_)));
  }
}
