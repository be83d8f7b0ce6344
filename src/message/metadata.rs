use crate::error::ZmqError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Property names defined by ZMTP 3.x.
pub const PROPERTY_SOCKET_TYPE: &str = "Socket-Type";
pub const PROPERTY_IDENTITY: &str = "Identity";
pub const PROPERTY_RESOURCE: &str = "Resource";

/// The name/value dictionary exchanged in READY and INITIATE commands.
///
/// Wire form of each property: name length (1 octet), name, value length
/// (4 octets, network order), value. Names compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
  properties: Vec<(String, Bytes)>,
}

impl Metadata {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets a property, replacing any existing value with the same name.
  pub fn insert(&mut self, name: &str, value: impl Into<Bytes>) {
    let value = value.into();
    match self.properties.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
      Some(slot) => slot.1 = value,
      None => self.properties.push((name.to_string(), value)),
    }
  }

  pub fn get(&self, name: &str) -> Option<&Bytes> {
    self
      .properties
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v)
  }

  /// Returns a property as UTF-8 text.
  pub fn get_str(&self, name: &str) -> Option<&str> {
    self.get(name).and_then(|v| std::str::from_utf8(v).ok())
  }

  pub fn len(&self) -> usize {
    self.properties.len()
  }

  pub fn is_empty(&self) -> bool {
    self.properties.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Bytes)> {
    self.properties.iter().map(|(n, v)| (n.as_str(), v))
  }

  pub fn encode(&self, dst: &mut BytesMut) {
    for (name, value) in &self.properties {
      let name = &name.as_bytes()[..name.len().min(255)];
      dst.reserve(1 + name.len() + 4 + value.len());
      dst.put_u8(name.len() as u8);
      dst.put_slice(name);
      dst.put_u32(value.len() as u32);
      dst.put_slice(value);
    }
  }

  pub fn to_bytes(&self) -> Bytes {
    let mut buf = BytesMut::new();
    self.encode(&mut buf);
    buf.freeze()
  }

  /// Parses a property list. Every property is kept; callers look up the
  /// names they understand and ignore the rest.
  pub fn decode(mut src: &[u8]) -> Result<Self, ZmqError> {
    let mut metadata = Metadata::new();
    while src.has_remaining() {
      let name_len = src.get_u8() as usize;
      if name_len == 0 || src.remaining() < name_len + 4 {
        return Err(ZmqError::ProtocolViolation("Truncated metadata property name".into()));
      }
      let name = std::str::from_utf8(&src[..name_len])
        .map_err(|_| ZmqError::ProtocolViolation("Metadata property name is not ASCII".into()))?
        .to_string();
      src.advance(name_len);
      let value_len = src.get_u32() as usize;
      if src.remaining() < value_len {
        return Err(ZmqError::ProtocolViolation(format!(
          "Truncated value for metadata property {}",
          name
        )));
      }
      let value = Bytes::copy_from_slice(&src[..value_len]);
      src.advance(value_len);
      metadata.properties.push((name, value));
    }
    Ok(metadata)
  }
}
