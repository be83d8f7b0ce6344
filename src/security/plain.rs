use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::sync::Arc;

use super::cipher::PassThroughDataCipher;
use super::mechanism::unexpected_command;
use super::{DataCipher, Mechanism, MechanismStatus};
use crate::error::ZmqError;
use crate::message::Metadata;
use crate::protocol::zmtp::command::{command_body, split_command, CMD_HELLO, CMD_INITIATE, CMD_READY, CMD_WELCOME};
use crate::protocol::zmtp::ZmtpCommand;

/// State of the PLAIN handshake (RFC 24).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlainState {
  // Client states
  SendHello,
  ExpectWelcome,
  SendInitiate,
  ExpectReady,
  // Server states
  ExpectHello,
  SendWelcome,
  ExpectInitiate,
  SendReady,
  // End states
  Ready,
  Error,
}

/// Username and password pair carried by HELLO.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PlainCredentials {
  pub username: Bytes,
  pub password: Bytes,
}

impl std::fmt::Debug for PlainCredentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PlainCredentials")
      .field("username", &String::from_utf8_lossy(&self.username))
      .field("password", &"<redacted>")
      .finish()
  }
}

/// The ZMTP PLAIN mechanism: clear-text username/password.
///
/// A server built with credentials only admits clients presenting the same
/// pair; a server built without admits any HELLO.
#[derive(Debug)]
pub struct PlainMechanism {
  is_server: bool,
  state: PlainState,
  credentials: Option<PlainCredentials>,
  local: Metadata,
  peer: Option<Metadata>,
  pending_error: Option<String>,
  error_reason: Option<String>,
}

impl PlainMechanism {
  pub const NAME: &'static str = "PLAIN";

  pub fn client(credentials: PlainCredentials, local: Metadata) -> Self {
    Self {
      is_server: false,
      state: PlainState::SendHello,
      credentials: Some(credentials),
      local,
      peer: None,
      pending_error: None,
      error_reason: None,
    }
  }

  pub fn server(credentials: Option<PlainCredentials>, local: Metadata) -> Self {
    Self {
      is_server: true,
      state: PlainState::ExpectHello,
      credentials,
      local,
      peer: None,
      pending_error: None,
      error_reason: None,
    }
  }

  /// HELLO data: username length (1), username, password length (1), password.
  fn parse_hello_body(mut body: &[u8]) -> Result<PlainCredentials, ZmqError> {
    if !body.has_remaining() {
      return Err(ZmqError::ProtocolViolation("PLAIN HELLO body too short".into()));
    }
    let user_len = body.get_u8() as usize;
    if body.remaining() < user_len + 1 {
      return Err(ZmqError::ProtocolViolation("Invalid PLAIN HELLO username length".into()));
    }
    let username = Bytes::copy_from_slice(&body[..user_len]);
    body.advance(user_len);

    let pass_len = body.get_u8() as usize;
    if body.remaining() != pass_len {
      return Err(ZmqError::ProtocolViolation("Invalid PLAIN HELLO password length".into()));
    }
    let password = Bytes::copy_from_slice(body);
    Ok(PlainCredentials { username, password })
  }

  fn create_hello_body(credentials: &PlainCredentials) -> Bytes {
    let user = &credentials.username[..credentials.username.len().min(255)];
    let pass = &credentials.password[..credentials.password.len().min(255)];
    let mut data = BytesMut::with_capacity(2 + user.len() + pass.len());
    data.put_u8(user.len() as u8);
    data.put_slice(user);
    data.put_u8(pass.len() as u8);
    data.put_slice(pass);
    command_body(CMD_HELLO, &data)
  }

  fn fail(&mut self, error: ZmqError) -> ZmqError {
    tracing::debug!(mechanism = Self::NAME, server = self.is_server, %error, "Handshake error");
    self.error_reason = Some(error.to_string());
    self.state = PlainState::Error;
    error
  }

  fn authenticate(&self, presented: &PlainCredentials) -> bool {
    match &self.credentials {
      Some(expected) => expected == presented,
      None => true,
    }
  }
}

impl Mechanism for PlainMechanism {
  fn name(&self) -> &'static str {
    Self::NAME
  }

  fn produce_token(&mut self) -> Result<Option<Bytes>, ZmqError> {
    let token = match self.state {
      PlainState::SendHello => {
        let credentials = self.credentials.clone().unwrap_or_default();
        self.state = PlainState::ExpectWelcome;
        Self::create_hello_body(&credentials)
      }
      PlainState::SendWelcome => {
        self.state = PlainState::ExpectInitiate;
        command_body(CMD_WELCOME, &[])
      }
      PlainState::SendInitiate => {
        self.state = PlainState::ExpectReady;
        command_body(CMD_INITIATE, &self.local.to_bytes())
      }
      PlainState::SendReady => {
        self.state = PlainState::Ready;
        ZmtpCommand::Ready(self.local.clone()).to_body()
      }
      PlainState::Error => match self.pending_error.take() {
        Some(reason) => ZmtpCommand::Error(reason).to_body(),
        None => return Ok(None),
      },
      _ => return Ok(None),
    };
    Ok(Some(token))
  }

  fn process_token(&mut self, token: &[u8]) -> Result<(), ZmqError> {
    let (name, data) = match split_command(token) {
      Ok(parts) => parts,
      Err(e) => return Err(self.fail(e)),
    };

    match (self.state, name) {
      (PlainState::ExpectHello, CMD_HELLO) => {
        let presented = Self::parse_hello_body(data).map_err(|e| self.fail(e))?;
        if self.authenticate(&presented) {
          tracing::debug!(mechanism = Self::NAME, user = %String::from_utf8_lossy(&presented.username), "Client authenticated");
          self.state = PlainState::SendWelcome;
          Ok(())
        } else {
          self.pending_error = Some("Invalid username or password".into());
          Err(self.fail(ZmqError::AuthenticationFailure(format!(
            "PLAIN credentials rejected for user {}",
            String::from_utf8_lossy(&presented.username)
          ))))
        }
      }
      (PlainState::ExpectWelcome, CMD_WELCOME) => {
        self.state = PlainState::SendInitiate;
        Ok(())
      }
      (PlainState::ExpectInitiate, CMD_INITIATE) => {
        let metadata = Metadata::decode(data).map_err(|e| self.fail(e))?;
        self.peer = Some(metadata);
        self.state = PlainState::SendReady;
        Ok(())
      }
      (PlainState::ExpectReady, CMD_READY) => {
        let metadata = Metadata::decode(data).map_err(|e| self.fail(e))?;
        self.peer = Some(metadata);
        self.state = PlainState::Ready;
        Ok(())
      }
      (state, _) => {
        let expected = match state {
          PlainState::ExpectHello => "HELLO",
          PlainState::ExpectWelcome => "WELCOME",
          PlainState::ExpectInitiate => "INITIATE",
          PlainState::ExpectReady => "READY",
          _ => "nothing",
        };
        Err(self.fail(unexpected_command(Self::NAME, expected, token)))
      }
    }
  }

  fn status(&self) -> MechanismStatus {
    match self.state {
      PlainState::Ready => MechanismStatus::Ready,
      PlainState::Error => MechanismStatus::Error,
      _ => MechanismStatus::Handshaking,
    }
  }

  fn peer_metadata(&self) -> Option<&Metadata> {
    self.peer.as_ref()
  }

  fn error_reason(&self) -> Option<&str> {
    self.error_reason.as_deref()
  }

  fn into_data_cipher(self: Box<Self>) -> Result<Arc<dyn DataCipher>, ZmqError> {
    if self.state != PlainState::Ready {
      return Err(ZmqError::InvalidState("PLAIN handshake not complete"));
    }
    Ok(Arc::new(PassThroughDataCipher))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn creds(user: &'static str, pass: &'static str) -> PlainCredentials {
    PlainCredentials {
      username: Bytes::from_static(user.as_bytes()),
      password: Bytes::from_static(pass.as_bytes()),
    }
  }

  /// Runs both mechanisms against each other until neither has output.
  fn drive(client: &mut PlainMechanism, server: &mut PlainMechanism) -> Result<(), ZmqError> {
    loop {
      let mut progressed = false;
      if let Some(t) = client.produce_token()? {
        server.process_token(&t)?;
        progressed = true;
      }
      if let Some(t) = server.produce_token()? {
        client.process_token(&t)?;
        progressed = true;
      }
      if !progressed {
        return Ok(());
      }
    }
  }

  #[test]
  fn hello_body_layout() {
    let body = PlainMechanism::create_hello_body(&creds("admin", "secret"));
    assert_eq!(&body[..], b"\x05HELLO\x05admin\x06secret");
    let (_, data) = split_command(&body).unwrap();
    assert_eq!(PlainMechanism::parse_hello_body(data).unwrap(), creds("admin", "secret"));
  }

  #[test]
  fn full_exchange_carries_metadata() {
    let mut client_md = Metadata::new();
    client_md.insert("Socket-Type", Bytes::from_static(b"DEALER"));
    let mut server_md = Metadata::new();
    server_md.insert("Socket-Type", Bytes::from_static(b"ROUTER"));

    let mut client = PlainMechanism::client(creds("admin", "secret"), client_md);
    let mut server = PlainMechanism::server(Some(creds("admin", "secret")), server_md);
    drive(&mut client, &mut server).unwrap();

    assert!(client.is_complete());
    assert!(server.is_complete());
    assert_eq!(client.peer_metadata().unwrap().get_str("Socket-Type"), Some("ROUTER"));
    assert_eq!(server.peer_metadata().unwrap().get_str("Socket-Type"), Some("DEALER"));
  }

  #[test]
  fn wrong_password_yields_error_command() {
    let mut client = PlainMechanism::client(creds("admin", "nope"), Metadata::new());
    let mut server = PlainMechanism::server(Some(creds("admin", "secret")), Metadata::new());

    let hello = client.produce_token().unwrap().unwrap();
    let err = server.process_token(&hello).unwrap_err();
    assert!(matches!(err, ZmqError::AuthenticationFailure(_)));
    assert!(server.is_error());

    let error_cmd = server.produce_token().unwrap().unwrap();
    assert!(server.produce_token().unwrap().is_none());
    let client_err = client.process_token(&error_cmd).unwrap_err();
    assert!(matches!(client_err, ZmqError::AuthenticationFailure(_)));
  }

  #[test]
  fn server_without_credentials_admits_anyone() {
    let mut client = PlainMechanism::client(creds("guest", ""), Metadata::new());
    let mut server = PlainMechanism::server(None, Metadata::new());
    drive(&mut client, &mut server).unwrap();
    assert!(client.is_complete() && server.is_complete());
  }
}
