// src/protocol/zmtp/codec.rs

use crate::error::ZmqError;
use crate::message::{Frame, FrameFlags};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Largest body that still fits a short (1-octet length) frame.
pub const MAX_SHORT_FRAME: usize = 255;

/// Upper bound for command frames whatever the configured limit.
pub const MAX_COMMAND_SIZE: u64 = 64 * 1024;

/// Most the decoder grows its buffer by ahead of arriving bytes.
const MAX_RESERVE: usize = 64 * 1024;

/// Codec for ZMTP/3.1 frames.
///
/// Decoding enforces the reserved-bit rule and the size limits before any
/// body bytes are buffered. The optional limit covers every frame; commands
/// are also held to [`MAX_COMMAND_SIZE`].
#[derive(Debug, Default)]
pub struct ZmtpCodec {
  decoding_state: DecodingState,
  max_frame_size: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy)]
enum DecodingState {
  #[default]
  ReadHeader,
  ReadBody(FrameHeader),
}

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
  flags: FrameFlags,
  size: usize,
}

impl ZmtpCodec {
  pub fn new() -> Self {
    Self::default()
  }

  /// Codec that refuses frames whose body exceeds `limit` bytes.
  pub fn with_max_frame_size(limit: Option<u64>) -> Self {
    Self {
      decoding_state: DecodingState::ReadHeader,
      max_frame_size: limit,
    }
  }

  pub fn set_max_frame_size(&mut self, limit: Option<u64>) {
    self.max_frame_size = limit;
  }

  fn limit_for(&self, flags: FrameFlags) -> Option<u64> {
    if flags.contains(FrameFlags::COMMAND) {
      Some(self.max_frame_size.map_or(MAX_COMMAND_SIZE, |limit| limit.min(MAX_COMMAND_SIZE)))
    } else {
      self.max_frame_size
    }
  }

  /// Encoded size of a frame header for a body of `size` bytes.
  pub fn header_len(size: usize) -> usize {
    if size <= MAX_SHORT_FRAME {
      2
    } else {
      9
    }
  }
}

impl Encoder<Frame> for ZmtpCodec {
  type Error = ZmqError;

  fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
    let size = item.body.len();
    // LONG is derived from the size, never taken from the caller.
    let mut flags = item.flags & (FrameFlags::MORE | FrameFlags::COMMAND);

    if size <= MAX_SHORT_FRAME {
      dst.reserve(2 + size);
      dst.put_u8(flags.bits());
      dst.put_u8(size as u8);
    } else {
      flags |= FrameFlags::LONG;
      dst.reserve(9 + size);
      dst.put_u8(flags.bits());
      dst.put_u64(size as u64);
    }
    dst.put_slice(&item.body);
    Ok(())
  }
}

impl Decoder for ZmtpCodec {
  type Item = Frame;
  type Error = ZmqError;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    loop {
      match self.decoding_state {
        DecodingState::ReadHeader => {
          if src.is_empty() {
            return Ok(None);
          }

          let raw_flags = src[0];
          if raw_flags & FrameFlags::RESERVED_MASK != 0 {
            return Err(ZmqError::MalformedFrame(raw_flags));
          }
          let flags = FrameFlags::from_bits_truncate(raw_flags);
          let header_len = if flags.contains(FrameFlags::LONG) { 9 } else { 2 };
          if src.len() < header_len {
            src.reserve(header_len - src.len());
            return Ok(None);
          }

          let mut header = src.split_to(header_len);
          header.advance(1);
          let size = if flags.contains(FrameFlags::LONG) {
            header.get_u64()
          } else {
            header.get_u8() as u64
          };

          if let Some(limit) = self.limit_for(flags) {
            if size > limit {
              return Err(ZmqError::FrameTooLarge { size, limit });
            }
          }
          let size = usize::try_from(size).map_err(|_| ZmqError::FrameTooLarge {
            size,
            limit: usize::MAX as u64,
          })?;

          self.decoding_state = DecodingState::ReadBody(FrameHeader {
            flags: flags - FrameFlags::LONG,
            size,
          });
        }

        DecodingState::ReadBody(header) => {
          if src.len() < header.size {
            // Grow with the data, not with what the header claims.
            src.reserve((header.size - src.len()).min(MAX_RESERVE));
            return Ok(None);
          }
          let body = src.split_to(header.size).freeze();
          self.decoding_state = DecodingState::ReadHeader;
          return Ok(Some(Frame::new(header.flags, body)));
        }
      }
    }
  }

  fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    match self.decode(buf)? {
      Some(frame) => Ok(Some(frame)),
      None => {
        let mid_frame = matches!(self.decoding_state, DecodingState::ReadBody(_));
        if buf.is_empty() && !mid_frame {
          Ok(None)
        } else {
          Err(ZmqError::UnexpectedEof)
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use bytes::Bytes;

  fn encode_all(frames: &[Frame]) -> BytesMut {
    let mut codec = ZmtpCodec::new();
    let mut buf = BytesMut::new();
    for f in frames {
      codec.encode(f.clone(), &mut buf).unwrap();
    }
    buf
  }

  #[test]
  fn short_frame_layout() {
    let buf = encode_all(&[Frame::data(Bytes::from_static(b"NAME"), true)]);
    assert_eq!(&buf[..], b"\x01\x04NAME");
  }

  #[test]
  fn long_flag_chosen_by_size() {
    let at_limit = encode_all(&[Frame::data(Bytes::from(vec![7u8; 255]), false)]);
    assert_eq!(at_limit[0], 0x00);
    assert_eq!(at_limit.len(), 2 + 255);

    let over = encode_all(&[Frame::data(Bytes::from(vec![7u8; 256]), false)]);
    assert_eq!(over[0], FrameFlags::LONG.bits());
    assert_eq!(&over[1..9], &256u64.to_be_bytes());
    assert_eq!(over.len(), 9 + 256);
  }

  #[test]
  fn caller_supplied_long_flag_is_ignored() {
    let frame = Frame::new(FrameFlags::LONG | FrameFlags::COMMAND, Bytes::from_static(b"\x04PING\x00\x00"));
    let buf = encode_all(&[frame]);
    assert_eq!(buf[0], FrameFlags::COMMAND.bits());
  }

  #[test]
  fn decode_reproduces_encoded_frames() {
    let frames = vec![
      Frame::data(Bytes::from_static(b"topicA"), true),
      Frame::data(Bytes::from(vec![1u8; 1000]), true),
      Frame::data(Bytes::new(), false),
      Frame::command(Bytes::from_static(b"\x04PONG")),
    ];
    let mut buf = encode_all(&frames);
    let mut codec = ZmtpCodec::new();
    let mut decoded = Vec::new();
    while let Some(f) = codec.decode(&mut buf).unwrap() {
      decoded.push(f);
    }
    assert_eq!(decoded, frames);
    assert!(buf.is_empty());
  }

  #[test]
  fn decodes_byte_by_byte() {
    let wire = encode_all(&[Frame::data(Bytes::from(vec![9u8; 300]), false)]);
    let mut codec = ZmtpCodec::new();
    let mut buf = BytesMut::new();
    let mut out = None;
    for b in wire.iter() {
      buf.put_u8(*b);
      if let Some(f) = codec.decode(&mut buf).unwrap() {
        out = Some(f);
      }
    }
    assert_eq!(out.unwrap().body.len(), 300);
  }

  #[test]
  fn reserved_bits_are_malformed() {
    let mut buf = BytesMut::from(&b"\x08\x01x"[..]);
    let err = ZmtpCodec::new().decode(&mut buf).unwrap_err();
    assert!(matches!(err, ZmqError::MalformedFrame(0x08)));
  }

  #[test]
  fn frame_over_limit_is_rejected_from_header() {
    let mut codec = ZmtpCodec::with_max_frame_size(Some(16));
    let mut ok = encode_all(&[Frame::data(Bytes::from(vec![0u8; 16]), false)]);
    assert!(codec.decode(&mut ok).unwrap().is_some());

    // Only the header has arrived; the limit is checked before the body.
    let mut too_big = BytesMut::from(&b"\x00\x11"[..]);
    let err = codec.decode(&mut too_big).unwrap_err();
    assert!(matches!(err, ZmqError::FrameTooLarge { size: 17, limit: 16 }));
  }

  #[test]
  fn command_frames_obey_limit() {
    let mut codec = ZmtpCodec::with_max_frame_size(Some(16));
    let mut buf = encode_all(&[Frame::command(Bytes::from_static(b"\x05READY"))]);
    assert!(codec.decode(&mut buf).unwrap().unwrap().is_command());

    let mut too_big = BytesMut::from(&b"\x04\x11"[..]);
    let err = codec.decode(&mut too_big).unwrap_err();
    assert!(matches!(err, ZmqError::FrameTooLarge { size: 17, limit: 16 }));
  }

  #[test]
  fn commands_are_capped_without_a_limit() {
    let mut codec = ZmtpCodec::new();
    let mut header = BytesMut::new();
    header.put_u8((FrameFlags::COMMAND | FrameFlags::LONG).bits());
    header.put_u64(MAX_COMMAND_SIZE + 1);
    let err = codec.decode(&mut header).unwrap_err();
    assert!(matches!(err, ZmqError::FrameTooLarge { limit: MAX_COMMAND_SIZE, .. }));
  }

  #[test]
  fn huge_declared_length_does_not_preallocate() {
    let mut codec = ZmtpCodec::new();
    let mut buf = BytesMut::new();
    buf.put_u8(FrameFlags::LONG.bits());
    buf.put_u64(1u64 << 40);
    buf.put_slice(b"first bytes");
    assert!(codec.decode(&mut buf).unwrap().is_none());
    assert!(buf.capacity() < 1 << 20);

    let mut limited = ZmtpCodec::with_max_frame_size(Some(1024));
    let mut header = BytesMut::new();
    header.put_u8((FrameFlags::COMMAND | FrameFlags::LONG).bits());
    header.put_u64(1u64 << 62);
    assert!(matches!(limited.decode(&mut header), Err(ZmqError::FrameTooLarge { .. })));
  }

  #[test]
  fn truncated_stream_is_unexpected_eof() {
    let mut codec = ZmtpCodec::new();
    let mut buf = BytesMut::from(&b"\x00\x05abc"[..]);
    assert!(codec.decode(&mut buf).unwrap().is_none());
    assert!(matches!(codec.decode_eof(&mut buf), Err(ZmqError::UnexpectedEof)));

    let mut clean = ZmtpCodec::new();
    assert!(clean.decode_eof(&mut BytesMut::new()).unwrap().is_none());
  }
}
