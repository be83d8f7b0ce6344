// src/protocol/zmtp/greeting.rs

use crate::error::ZmqError;
use bytes::{BufMut, BytesMut};

// --- Constants ---
pub const GREETING_LENGTH: usize = 64;
pub const MECHANISM_LENGTH: usize = 20;

// ZMTP version this implementation announces.
pub const GREETING_VERSION_MAJOR: u8 = 0x03;
pub const GREETING_VERSION_MINOR: u8 = 0x01;

// Byte offsets within the 64-byte greeting.
const SIGNATURE_END_OFFSET: usize = 9;
const VERSION_MAJOR_OFFSET: usize = 10;
const VERSION_MINOR_OFFSET: usize = 11;
pub const MECHANISM_OFFSET: usize = 12;
pub const AS_SERVER_OFFSET: usize = MECHANISM_OFFSET + MECHANISM_LENGTH; // 32

/// The parsed content of a ZMTP 3.x greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZmtpGreeting {
  pub version: (u8, u8),
  pub mechanism: [u8; MECHANISM_LENGTH],
  pub as_server: bool,
}

/// Pads a mechanism name ("NULL", "PLAIN", "CURVE") to the 20-octet field.
pub fn mechanism_field(name: &str) -> [u8; MECHANISM_LENGTH] {
  let mut field = [0u8; MECHANISM_LENGTH];
  let len = name.len().min(MECHANISM_LENGTH);
  field[..len].copy_from_slice(&name.as_bytes()[..len]);
  field
}

impl ZmtpGreeting {
  pub fn new(mechanism: &str, as_server: bool) -> Self {
    Self {
      version: (GREETING_VERSION_MAJOR, GREETING_VERSION_MINOR),
      mechanism: mechanism_field(mechanism),
      as_server,
    }
  }

  /// Writes the 64-byte greeting.
  pub fn encode(&self, buffer: &mut BytesMut) {
    buffer.reserve(GREETING_LENGTH);

    // Signature: 0xFF, 8 reserved octets, 0x7F.
    buffer.put_u8(0xFF);
    buffer.put_bytes(0, 8);
    buffer.put_u8(0x7F);

    buffer.put_u8(self.version.0);
    buffer.put_u8(self.version.1);
    buffer.put_slice(&self.mechanism);
    buffer.put_u8(self.as_server as u8);

    // Filler.
    buffer.put_bytes(0, GREETING_LENGTH - (AS_SERVER_OFFSET + 1));
    debug_assert_eq!(buffer.len() % GREETING_LENGTH, 0);
  }

  pub fn to_bytes(&self) -> BytesMut {
    let mut buf = BytesMut::with_capacity(GREETING_LENGTH);
    self.encode(&mut buf);
    buf
  }

  /// Parses a peer greeting. Returns `Ok(None)` until 64 bytes are available.
  pub fn decode(buffer: &mut BytesMut) -> Result<Option<Self>, ZmqError> {
    if buffer.len() < GREETING_LENGTH {
      return Ok(None);
    }
    let data = buffer.split_to(GREETING_LENGTH);

    if data[0] != 0xFF || data[SIGNATURE_END_OFFSET] != 0x7F {
      return Err(ZmqError::ProtocolViolation(format!(
        "Invalid greeting signature ({:#04x}..{:#04x})",
        data[0], data[SIGNATURE_END_OFFSET]
      )));
    }

    let major = data[VERSION_MAJOR_OFFSET];
    let minor = data[VERSION_MINOR_OFFSET];
    if major < GREETING_VERSION_MAJOR {
      return Err(ZmqError::UnsupportedProtocol { major, minor });
    }

    let mut mechanism = [0u8; MECHANISM_LENGTH];
    mechanism.copy_from_slice(&data[MECHANISM_OFFSET..MECHANISM_OFFSET + MECHANISM_LENGTH]);

    // Any non-zero octet counts as set; stricter peers only send 0 or 1.
    let as_server = data[AS_SERVER_OFFSET] != 0;

    tracing::trace!(version = ?(major, minor), mechanism = %String::from_utf8_lossy(&mechanism).trim_end_matches('\0'), as_server, "Parsed ZMTP greeting");
    Ok(Some(Self {
      version: (major, minor),
      mechanism,
      as_server,
    }))
  }

  /// Mechanism name without the zero padding.
  pub fn mechanism_name(&self) -> &str {
    let end = self
      .mechanism
      .iter()
      .position(|&b| b == 0)
      .unwrap_or(MECHANISM_LENGTH);
    std::str::from_utf8(&self.mechanism[..end]).unwrap_or("<invalid>")
  }
}
