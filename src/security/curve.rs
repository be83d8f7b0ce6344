//! CURVE mechanism (RFC 26) over an injected key-agreement oracle.
//!
//! The crate does not implement the cryptography. A [`CurveOracle`] supplied
//! by the application opens one [`CurveSession`] per connection; the session
//! builds and verifies the HELLO/WELCOME/INITIATE/READY payloads and seals or
//! opens data-phase MESSAGE payloads.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

use super::cipher::CurveDataCipher;
use super::mechanism::unexpected_command;
use super::{DataCipher, Mechanism, MechanismStatus};
use crate::error::ZmqError;
use crate::message::Metadata;
use crate::protocol::zmtp::command::{command_body, split_command, CMD_HELLO, CMD_INITIATE, CMD_READY, CMD_WELCOME};

pub const CURVE_KEY_LENGTH: usize = 32;

pub type CurveKey = [u8; CURVE_KEY_LENGTH];

/// Long-term key material for one side of a CURVE connection.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CurveKeys {
  pub public_key: CurveKey,
  pub secret_key: CurveKey,
  /// The server's long-term public key. Required on clients.
  pub server_key: Option<CurveKey>,
}

impl fmt::Debug for CurveKeys {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CurveKeys")
      .field("public_key", &format_args!("{:02x?}", &self.public_key[..4]))
      .field("secret_key", &"<redacted>")
      .field("server_key", &self.server_key.map(|k| format!("{:02x?}", &k[..4])))
      .finish()
  }
}

/// Factory for per-connection CURVE sessions.
pub trait CurveOracle: Send + Sync + fmt::Debug + 'static {
  fn client_session(&self, keys: &CurveKeys) -> Result<Box<dyn CurveSession>, ZmqError>;
  fn server_session(&self, keys: &CurveKeys) -> Result<Box<dyn CurveSession>, ZmqError>;
}

/// One side of a CURVE exchange. All byte arguments and results are command
/// data, i.e. the body after the command name. Failures should be reported
/// as `AuthenticationFailure` (peer rejected) or `SecurityError`.
pub trait CurveSession: Send + 'static {
  /// Client: data of the HELLO command.
  fn hello(&mut self) -> Result<Bytes, ZmqError>;
  /// Server: verifies HELLO and returns the WELCOME data.
  fn welcome(&mut self, hello: &[u8]) -> Result<Bytes, ZmqError>;
  /// Client: verifies WELCOME and returns the INITIATE data vouching for
  /// `metadata` (encoded properties).
  fn initiate(&mut self, welcome: &[u8], metadata: &[u8]) -> Result<Bytes, ZmqError>;
  /// Server: verifies INITIATE and returns the client's encoded properties.
  fn accept_initiate(&mut self, initiate: &[u8]) -> Result<Bytes, ZmqError>;
  /// Server: READY data carrying the server's encoded properties.
  fn ready(&mut self, metadata: &[u8]) -> Result<Bytes, ZmqError>;
  /// Client: verifies READY and returns the server's encoded properties.
  fn accept_ready(&mut self, ready: &[u8]) -> Result<Bytes, ZmqError>;
  /// Seals a data-phase plaintext (flags octet plus frame body).
  fn seal(&mut self, plaintext: &[u8]) -> Result<Bytes, ZmqError>;
  /// Opens a data-phase payload sealed by the peer.
  fn open(&mut self, sealed: &[u8]) -> Result<Bytes, ZmqError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurvePhase {
  ClientStart,
  ClientExpectWelcome,
  ClientSendInitiate,
  ClientExpectReady,
  ServerExpectHello,
  ServerSendWelcome,
  ServerExpectInitiate,
  ServerSendReady,
  Complete,
  Error,
}

pub struct CurveMechanism {
  phase: CurvePhase,
  session: Option<Box<dyn CurveSession>>,
  local: Metadata,
  peer: Option<Metadata>,
  // Payload produced while processing, sent by the next produce_token.
  outgoing: Option<Bytes>,
  pending_error: Option<String>,
  error_reason: Option<String>,
}

impl fmt::Debug for CurveMechanism {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CurveMechanism")
      .field("phase", &self.phase)
      .field("error_reason", &self.error_reason)
      .finish()
  }
}

impl CurveMechanism {
  pub const NAME: &'static str = "CURVE";

  pub fn new(
    oracle: &Arc<dyn CurveOracle>,
    keys: &CurveKeys,
    as_server: bool,
    local: Metadata,
  ) -> Result<Self, ZmqError> {
    let (phase, session) = if as_server {
      (CurvePhase::ServerExpectHello, oracle.server_session(keys)?)
    } else {
      if keys.server_key.is_none() {
        return Err(ZmqError::SecurityError("CURVE client requires CURVE_SERVERKEY".into()));
      }
      (CurvePhase::ClientStart, oracle.client_session(keys)?)
    };
    Ok(Self {
      phase,
      session: Some(session),
      local,
      peer: None,
      outgoing: None,
      pending_error: None,
      error_reason: None,
    })
  }

  fn session(&mut self) -> Result<&mut Box<dyn CurveSession>, ZmqError> {
    self
      .session
      .as_mut()
      .ok_or(ZmqError::InvalidState("CURVE session already consumed"))
  }

  fn fail(&mut self, error: ZmqError) -> ZmqError {
    tracing::debug!(mechanism = Self::NAME, phase = ?self.phase, %error, "Handshake error");
    if matches!(self.phase, CurvePhase::ServerExpectHello | CurvePhase::ServerExpectInitiate) {
      self.pending_error = Some(error.to_string());
    }
    self.error_reason = Some(error.to_string());
    self.phase = CurvePhase::Error;
    error
  }

  fn step(&mut self, name: &[u8], data: &[u8], token: &[u8]) -> Result<(), ZmqError> {
    match (self.phase, name) {
      (CurvePhase::ServerExpectHello, CMD_HELLO) => {
        let welcome = self.session()?.welcome(data)?;
        self.outgoing = Some(command_body(CMD_WELCOME, &welcome));
        self.phase = CurvePhase::ServerSendWelcome;
      }
      (CurvePhase::ClientExpectWelcome, CMD_WELCOME) => {
        let metadata = self.local.to_bytes();
        let initiate = self.session()?.initiate(data, &metadata)?;
        self.outgoing = Some(command_body(CMD_INITIATE, &initiate));
        self.phase = CurvePhase::ClientSendInitiate;
      }
      (CurvePhase::ServerExpectInitiate, CMD_INITIATE) => {
        let client_metadata = self.session()?.accept_initiate(data)?;
        self.peer = Some(Metadata::decode(&client_metadata)?);
        let metadata = self.local.to_bytes();
        let ready = self.session()?.ready(&metadata)?;
        self.outgoing = Some(command_body(CMD_READY, &ready));
        self.phase = CurvePhase::ServerSendReady;
      }
      (CurvePhase::ClientExpectReady, CMD_READY) => {
        let server_metadata = self.session()?.accept_ready(data)?;
        self.peer = Some(Metadata::decode(&server_metadata)?);
        self.phase = CurvePhase::Complete;
      }
      (phase, _) => {
        let expected = match phase {
          CurvePhase::ServerExpectHello => "HELLO",
          CurvePhase::ClientExpectWelcome => "WELCOME",
          CurvePhase::ServerExpectInitiate => "INITIATE",
          CurvePhase::ClientExpectReady => "READY",
          _ => "nothing",
        };
        return Err(unexpected_command(Self::NAME, expected, token));
      }
    }
    Ok(())
  }
}

impl Mechanism for CurveMechanism {
  fn name(&self) -> &'static str {
    Self::NAME
  }

  fn produce_token(&mut self) -> Result<Option<Bytes>, ZmqError> {
    match self.phase {
      CurvePhase::ClientStart => {
        let hello = match self.session()?.hello() {
          Ok(hello) => hello,
          Err(e) => return Err(self.fail(e)),
        };
        self.phase = CurvePhase::ClientExpectWelcome;
        Ok(Some(command_body(CMD_HELLO, &hello)))
      }
      CurvePhase::ServerSendWelcome => {
        self.phase = CurvePhase::ServerExpectInitiate;
        Ok(self.outgoing.take())
      }
      CurvePhase::ClientSendInitiate => {
        self.phase = CurvePhase::ClientExpectReady;
        Ok(self.outgoing.take())
      }
      CurvePhase::ServerSendReady => {
        self.phase = CurvePhase::Complete;
        Ok(self.outgoing.take())
      }
      CurvePhase::Error => Ok(
        self
          .pending_error
          .take()
          .map(|reason| crate::protocol::zmtp::ZmtpCommand::Error(reason).to_body()),
      ),
      _ => Ok(None),
    }
  }

  fn process_token(&mut self, token: &[u8]) -> Result<(), ZmqError> {
    let result = split_command(token).and_then(|(name, data)| self.step(name, data, token));
    result.map_err(|e| self.fail(e))
  }

  fn status(&self) -> MechanismStatus {
    match self.phase {
      CurvePhase::Complete => MechanismStatus::Ready,
      CurvePhase::Error => MechanismStatus::Error,
      _ => MechanismStatus::Handshaking,
    }
  }

  fn peer_metadata(&self) -> Option<&Metadata> {
    self.peer.as_ref()
  }

  fn error_reason(&self) -> Option<&str> {
    self.error_reason.as_deref()
  }

  fn into_data_cipher(mut self: Box<Self>) -> Result<Arc<dyn DataCipher>, ZmqError> {
    if self.phase != CurvePhase::Complete {
      return Err(ZmqError::InvalidState("CURVE handshake not complete"));
    }
    let session = self
      .session
      .take()
      .ok_or(ZmqError::InvalidState("CURVE session already consumed"))?;
    Ok(Arc::new(CurveDataCipher::new(session)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::message::{Frame, FrameFlags};

  /// Sessions that "seal" by prefixing a tag and check keys by equality.
  #[derive(Debug)]
  struct TagOracle;

  struct TagSession {
    keys: CurveKeys,
  }

  impl CurveOracle for TagOracle {
    fn client_session(&self, keys: &CurveKeys) -> Result<Box<dyn CurveSession>, ZmqError> {
      Ok(Box::new(TagSession { keys: keys.clone() }))
    }
    fn server_session(&self, keys: &CurveKeys) -> Result<Box<dyn CurveSession>, ZmqError> {
      Ok(Box::new(TagSession { keys: keys.clone() }))
    }
  }

  impl CurveSession for TagSession {
    fn hello(&mut self) -> Result<Bytes, ZmqError> {
      let mut hello = self.keys.public_key.to_vec();
      hello.extend_from_slice(&self.keys.server_key.unwrap_or_default());
      Ok(Bytes::from(hello))
    }
    fn welcome(&mut self, hello: &[u8]) -> Result<Bytes, ZmqError> {
      if hello.len() != 64 || hello[32..] != self.keys.public_key {
        return Err(ZmqError::AuthenticationFailure("wrong server key".into()));
      }
      Ok(Bytes::from_static(b"welcome"))
    }
    fn initiate(&mut self, _welcome: &[u8], metadata: &[u8]) -> Result<Bytes, ZmqError> {
      Ok(Bytes::copy_from_slice(metadata))
    }
    fn accept_initiate(&mut self, initiate: &[u8]) -> Result<Bytes, ZmqError> {
      Ok(Bytes::copy_from_slice(initiate))
    }
    fn ready(&mut self, metadata: &[u8]) -> Result<Bytes, ZmqError> {
      Ok(Bytes::copy_from_slice(metadata))
    }
    fn accept_ready(&mut self, ready: &[u8]) -> Result<Bytes, ZmqError> {
      Ok(Bytes::copy_from_slice(ready))
    }
    fn seal(&mut self, plaintext: &[u8]) -> Result<Bytes, ZmqError> {
      Ok(Bytes::from([b"T:".as_slice(), plaintext].concat()))
    }
    fn open(&mut self, sealed: &[u8]) -> Result<Bytes, ZmqError> {
      sealed
        .strip_prefix(b"T:")
        .map(Bytes::copy_from_slice)
        .ok_or_else(|| ZmqError::SecurityError("bad tag".into()))
    }
  }

  fn pair(server_key_seen_by_client: CurveKey) -> (CurveMechanism, CurveMechanism) {
    let oracle: Arc<dyn CurveOracle> = Arc::new(TagOracle);
    let server_keys = CurveKeys {
      public_key: [1; 32],
      secret_key: [2; 32],
      server_key: None,
    };
    let client_keys = CurveKeys {
      public_key: [3; 32],
      secret_key: [4; 32],
      server_key: Some(server_key_seen_by_client),
    };
    let mut server_md = Metadata::new();
    server_md.insert("Socket-Type", Bytes::from_static(b"PULL"));
    let mut client_md = Metadata::new();
    client_md.insert("Socket-Type", Bytes::from_static(b"PUSH"));
    (
      CurveMechanism::new(&oracle, &client_keys, false, client_md).unwrap(),
      CurveMechanism::new(&oracle, &server_keys, true, server_md).unwrap(),
    )
  }

  #[test]
  fn four_step_handshake_then_sealed_frames() {
    let (mut client, mut server) = pair([1; 32]);

    let hello = client.produce_token().unwrap().unwrap();
    server.process_token(&hello).unwrap();
    let welcome = server.produce_token().unwrap().unwrap();
    client.process_token(&welcome).unwrap();
    let initiate = client.produce_token().unwrap().unwrap();
    server.process_token(&initiate).unwrap();
    let ready = server.produce_token().unwrap().unwrap();
    client.process_token(&ready).unwrap();

    assert!(client.is_complete() && server.is_complete());
    assert_eq!(server.peer_metadata().unwrap().get_str("Socket-Type"), Some("PUSH"));
    assert_eq!(client.peer_metadata().unwrap().get_str("Socket-Type"), Some("PULL"));

    let client_cipher = Box::new(client).into_data_cipher().unwrap();
    let server_cipher = Box::new(server).into_data_cipher().unwrap();
    let frame = Frame::data(Bytes::from_static(b"secret"), true);
    let wire = client_cipher.seal_frame(frame.clone()).unwrap();
    assert!(wire.is_command());
    assert!(wire.body.starts_with(b"\x07MESSAGE"));
    let opened = server_cipher.open_frame(wire).unwrap();
    assert_eq!(opened, frame);
    assert!(opened.flags.contains(FrameFlags::MORE));
  }

  #[test]
  fn wrong_server_key_is_rejected_with_error_command() {
    let (mut client, mut server) = pair([9; 32]);
    let hello = client.produce_token().unwrap().unwrap();
    let err = server.process_token(&hello).unwrap_err();
    assert!(matches!(err, ZmqError::AuthenticationFailure(_)));
    let error_cmd = server.produce_token().unwrap().unwrap();
    assert!(matches!(
      client.process_token(&error_cmd),
      Err(ZmqError::AuthenticationFailure(_))
    ));
  }

  #[test]
  fn client_without_server_key_is_refused() {
    let oracle: Arc<dyn CurveOracle> = Arc::new(TagOracle);
    let keys = CurveKeys::default();
    assert!(matches!(
      CurveMechanism::new(&oracle, &keys, false, Metadata::new()),
      Err(ZmqError::SecurityError(_))
    ));
  }
}
