// src/protocol/zmtp/command.rs

use crate::error::ZmqError;
use crate::message::{Frame, Metadata};
use bytes::{Buf, BufMut, Bytes, BytesMut};

// --- ZMTP Command Names ---
// Used as the first part of a COMMAND frame's body.
pub const CMD_READY: &[u8] = b"READY";
pub const CMD_ERROR: &[u8] = b"ERROR";
pub const CMD_SUBSCRIBE: &[u8] = b"SUBSCRIBE";
pub const CMD_CANCEL: &[u8] = b"CANCEL";
pub const CMD_PING: &[u8] = b"PING";
pub const CMD_PONG: &[u8] = b"PONG";
// Mechanism handshakes add HELLO, WELCOME, INITIATE and MESSAGE.
pub const CMD_HELLO: &[u8] = b"HELLO";
pub const CMD_WELCOME: &[u8] = b"WELCOME";
pub const CMD_INITIATE: &[u8] = b"INITIATE";
pub const CMD_MESSAGE: &[u8] = b"MESSAGE";

/// PING contexts longer than this are protocol errors.
pub const MAX_PING_CONTEXT: usize = 16;

/// A decoded ZMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZmtpCommand {
  Ready(Metadata),
  Error(String),
  Subscribe(Bytes),
  Cancel(Bytes),
  /// TTL in deciseconds plus an opaque context echoed by PONG.
  Ping { ttl: u16, context: Bytes },
  Pong { context: Bytes },
  /// Anything else, e.g. mechanism handshake commands.
  Other { name: Bytes, data: Bytes },
}

/// Splits a command body into its name and data.
pub fn split_command(body: &[u8]) -> Result<(&[u8], &[u8]), ZmqError> {
  let name_len = *body
    .first()
    .ok_or_else(|| ZmqError::ProtocolViolation("Empty command frame".into()))? as usize;
  if name_len == 0 || body.len() < 1 + name_len {
    return Err(ZmqError::ProtocolViolation("Truncated command name".into()));
  }
  Ok((&body[1..1 + name_len], &body[1 + name_len..]))
}

/// Builds the body of a command frame: name length, name, data.
pub fn command_body(name: &[u8], data: &[u8]) -> Bytes {
  let mut buf = BytesMut::with_capacity(1 + name.len() + data.len());
  buf.put_u8(name.len() as u8);
  buf.put_slice(name);
  buf.put_slice(data);
  buf.freeze()
}

impl ZmtpCommand {
  /// Parses a command frame body.
  pub fn parse(body: &Bytes) -> Result<Self, ZmqError> {
    let (name, data) = split_command(body)?;
    let data_offset = 1 + name.len();
    let cmd = match name {
      CMD_READY => ZmtpCommand::Ready(Metadata::decode(data)?),
      CMD_ERROR => {
        // Reason is a short string; tolerate peers that omit the length octet.
        let reason = match data.split_first() {
          Some((&len, rest)) if rest.len() >= len as usize => &rest[..len as usize],
          _ => data,
        };
        ZmtpCommand::Error(String::from_utf8_lossy(reason).into_owned())
      }
      CMD_SUBSCRIBE => ZmtpCommand::Subscribe(body.slice(data_offset..)),
      CMD_CANCEL => ZmtpCommand::Cancel(body.slice(data_offset..)),
      CMD_PING => {
        if data.len() < 2 {
          return Err(ZmqError::ProtocolViolation("PING without TTL".into()));
        }
        let mut ttl_bytes = &data[..2];
        let ttl = ttl_bytes.get_u16();
        if data.len() - 2 > MAX_PING_CONTEXT {
          return Err(ZmqError::ProtocolViolation("PING context too long".into()));
        }
        ZmtpCommand::Ping {
          ttl,
          context: body.slice(data_offset + 2..),
        }
      }
      CMD_PONG => ZmtpCommand::Pong {
        context: body.slice(data_offset..),
      },
      _ => ZmtpCommand::Other {
        name: Bytes::copy_from_slice(name),
        data: body.slice(data_offset..),
      },
    };
    Ok(cmd)
  }

  pub fn name(&self) -> &[u8] {
    match self {
      ZmtpCommand::Ready(_) => CMD_READY,
      ZmtpCommand::Error(_) => CMD_ERROR,
      ZmtpCommand::Subscribe(_) => CMD_SUBSCRIBE,
      ZmtpCommand::Cancel(_) => CMD_CANCEL,
      ZmtpCommand::Ping { .. } => CMD_PING,
      ZmtpCommand::Pong { .. } => CMD_PONG,
      ZmtpCommand::Other { name, .. } => name,
    }
  }

  /// Encodes the command body (without frame header).
  pub fn to_body(&self) -> Bytes {
    match self {
      ZmtpCommand::Ready(metadata) => command_body(CMD_READY, &metadata.to_bytes()),
      ZmtpCommand::Error(reason) => {
        let reason = &reason.as_bytes()[..reason.len().min(255)];
        let mut data = Vec::with_capacity(1 + reason.len());
        data.push(reason.len() as u8);
        data.extend_from_slice(reason);
        command_body(CMD_ERROR, &data)
      }
      ZmtpCommand::Subscribe(topic) => command_body(CMD_SUBSCRIBE, topic),
      ZmtpCommand::Cancel(topic) => command_body(CMD_CANCEL, topic),
      ZmtpCommand::Ping { ttl, context } => {
        let context = &context[..context.len().min(MAX_PING_CONTEXT)];
        let mut data = Vec::with_capacity(2 + context.len());
        data.extend_from_slice(&ttl.to_be_bytes());
        data.extend_from_slice(context);
        command_body(CMD_PING, &data)
      }
      ZmtpCommand::Pong { context } => command_body(CMD_PONG, context),
      ZmtpCommand::Other { name, data } => command_body(name, data),
    }
  }

  pub fn to_frame(&self) -> Frame {
    Frame::command(self.to_body())
  }
}
