use super::{Frame, FrameFlags};
use bytes::Bytes;
use std::fmt;

/// One logical application message: an ordered sequence of frame bodies.
///
/// A message handed to a socket must have at least one frame; sockets never
/// hand out an empty one.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Msg {
  frames: Vec<Bytes>,
}

impl Msg {
  /// Creates a message from its frames.
  pub fn new(frames: Vec<Bytes>) -> Self {
    Self { frames }
  }

  /// Builds a message from anything convertible into frame bodies.
  pub fn from_frames<I, B>(frames: I) -> Self
  where
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
  {
    Self {
      frames: frames.into_iter().map(Into::into).collect(),
    }
  }

  /// A single-frame message from a static byte slice (zero-copy).
  pub fn from_static(data: &'static [u8]) -> Self {
    Self {
      frames: vec![Bytes::from_static(data)],
    }
  }

  /// A single-frame message from an owned buffer.
  pub fn from_vec(data: Vec<u8>) -> Self {
    Self {
      frames: vec![Bytes::from(data)],
    }
  }

  /// A single-frame message holding a UTF-8 string.
  pub fn from_string(s: impl Into<String>) -> Self {
    Self {
      frames: vec![Bytes::from(s.into())],
    }
  }

  pub fn frames(&self) -> &[Bytes] {
    &self.frames
  }

  pub fn into_frames(self) -> Vec<Bytes> {
    self.frames
  }

  pub fn frame(&self, index: usize) -> Option<&Bytes> {
    self.frames.get(index)
  }

  /// The first frame. For pub/sub this is the topic frame.
  pub fn first(&self) -> Option<&Bytes> {
    self.frames.first()
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  /// Total payload size across all frames.
  pub fn size(&self) -> usize {
    self.frames.iter().map(Bytes::len).sum()
  }

  pub fn push(&mut self, frame: impl Into<Bytes>) {
    self.frames.push(frame.into());
  }

  pub fn push_front(&mut self, frame: impl Into<Bytes>) {
    self.frames.insert(0, frame.into());
  }

  /// Removes and returns the first frame.
  pub fn pop_front(&mut self) -> Option<Bytes> {
    if self.frames.is_empty() {
      None
    } else {
      Some(self.frames.remove(0))
    }
  }

  /// Splits the message after `at` frames, returning the head.
  pub(crate) fn split_head(&mut self, at: usize) -> Vec<Bytes> {
    let tail = self.frames.split_off(at.min(self.frames.len()));
    std::mem::replace(&mut self.frames, tail)
  }

  /// Prepends an envelope (identity and delimiter frames) in order.
  pub(crate) fn prepend(&mut self, head: &[Bytes]) {
    let mut frames = Vec::with_capacity(head.len() + self.frames.len());
    frames.extend_from_slice(head);
    frames.append(&mut self.frames);
    self.frames = frames;
  }

  /// Expands the message into wire frames, setting MORE on all but the last.
  pub fn to_wire_frames(&self) -> impl Iterator<Item = Frame> + '_ {
    let last = self.frames.len().saturating_sub(1);
    self
      .frames
      .iter()
      .enumerate()
      .map(move |(i, body)| Frame::new(if i < last { FrameFlags::MORE } else { FrameFlags::empty() }, body.clone()))
  }
}

impl From<&'static str> for Msg {
  fn from(s: &'static str) -> Self {
    Self::from_static(s.as_bytes())
  }
}

impl From<String> for Msg {
  fn from(s: String) -> Self {
    Self::from_string(s)
  }
}

impl From<Vec<u8>> for Msg {
  fn from(data: Vec<u8>) -> Self {
    Self::from_vec(data)
  }
}

impl From<Bytes> for Msg {
  fn from(data: Bytes) -> Self {
    Self { frames: vec![data] }
  }
}

impl fmt::Debug for Msg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut list = f.debug_list();
    for frame in &self.frames {
      match std::str::from_utf8(frame) {
        Ok(s) if frame.len() <= 64 => list.entry(&s),
        _ => list.entry(&format_args!("<{} bytes>", frame.len())),
      };
    }
    list.finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_frames_set_more_on_all_but_last() {
    let msg = Msg::from_frames(["a", "b", "c"].map(str::as_bytes).map(Bytes::from_static));
    let flags: Vec<bool> = msg.to_wire_frames().map(|f| f.is_more()).collect();
    assert_eq!(flags, vec![true, true, false]);
  }

  #[test]
  fn split_head_keeps_tail() {
    let mut msg = Msg::from_frames(vec![
      Bytes::from_static(b"id"),
      Bytes::new(),
      Bytes::from_static(b"body"),
    ]);
    let head = msg.split_head(2);
    assert_eq!(head.len(), 2);
    assert_eq!(msg.frames(), &[Bytes::from_static(b"body")]);
    msg.prepend(&head);
    assert_eq!(msg.len(), 3);
    assert_eq!(msg.frame(0).unwrap().as_ref(), b"id");
  }
}
