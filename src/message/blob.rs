use bytes::Bytes;
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// An immutable, cheaply cloneable byte sequence (routing identities, option values).
#[derive(Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Blob {
  inner: Bytes,
}

impl Blob {
  /// Creates an empty blob.
  pub fn new() -> Self {
    Self { inner: Bytes::new() }
  }

  pub fn from_bytes(bytes: Bytes) -> Self {
    Self { inner: bytes }
  }

  pub fn from_static(data: &'static [u8]) -> Self {
    Self {
      inner: Bytes::from_static(data),
    }
  }

  pub fn size(&self) -> usize {
    self.inner.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.is_empty()
  }

  /// Returns the underlying `Bytes` handle.
  pub fn to_bytes(&self) -> Bytes {
    self.inner.clone()
  }
}

impl Deref for Blob {
  type Target = [u8];
  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

impl AsRef<[u8]> for Blob {
  fn as_ref(&self) -> &[u8] {
    &self.inner
  }
}

// Lets maps keyed by `Blob` be queried with plain slices.
impl Borrow<[u8]> for Blob {
  fn borrow(&self) -> &[u8] {
    &self.inner
  }
}

impl From<Vec<u8>> for Blob {
  fn from(vec: Vec<u8>) -> Self {
    Self {
      inner: Bytes::from(vec),
    }
  }
}

impl From<Bytes> for Blob {
  fn from(bytes: Bytes) -> Self {
    Self { inner: bytes }
  }
}

impl From<&[u8]> for Blob {
  fn from(data: &[u8]) -> Self {
    Self {
      inner: Bytes::copy_from_slice(data),
    }
  }
}

impl fmt::Debug for Blob {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Identities are usually short; print them as hex.
    write!(f, "Blob(")?;
    for b in self.inner.iter().take(16) {
      write!(f, "{:02x}", b)?;
    }
    if self.inner.len() > 16 {
      write!(f, "..+{}", self.inner.len() - 16)?;
    }
    write!(f, ")")
  }
}
