use super::FrameFlags;
use bytes::Bytes;
use std::fmt;

/// One ZMTP frame: a body plus its header flags.
///
/// `LONG` is a wire-level detail chosen by the encoder; frames built in memory
/// never need to set it.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Frame {
  pub flags: FrameFlags,
  pub body: Bytes,
}

impl Frame {
  pub fn new(flags: FrameFlags, body: Bytes) -> Self {
    Self { flags, body }
  }

  /// A data frame.
  pub fn data(body: Bytes, more: bool) -> Self {
    let flags = if more { FrameFlags::MORE } else { FrameFlags::empty() };
    Self { flags, body }
  }

  /// A command frame. Commands are always single-frame.
  pub fn command(body: Bytes) -> Self {
    Self {
      flags: FrameFlags::COMMAND,
      body,
    }
  }

  pub fn is_more(&self) -> bool {
    self.flags.contains(FrameFlags::MORE)
  }

  pub fn is_command(&self) -> bool {
    self.flags.contains(FrameFlags::COMMAND)
  }

  pub fn len(&self) -> usize {
    self.body.len()
  }

  pub fn is_empty(&self) -> bool {
    self.body.is_empty()
  }
}

impl fmt::Debug for Frame {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Frame")
      .field("flags", &self.flags)
      .field("len", &self.body.len())
      .finish()
  }
}
