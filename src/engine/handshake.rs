// src/engine/handshake.rs

use std::sync::Arc;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::codec::Framed;

use crate::error::ZmqError;
use crate::message::{Blob, Frame, Metadata, PROPERTY_IDENTITY, PROPERTY_SOCKET_TYPE};
use crate::protocol::zmtp::{ZmtpCodec, ZmtpCommand, ZmtpGreeting, GREETING_LENGTH};
use crate::security::{DataCipher, Mechanism};
use crate::socket::options::EngineConfig;
use crate::socket::types::SocketType;
use crate::transport::BoxedStream;

pub(crate) type ZmtpFramed = Framed<BoxedStream, ZmtpCodec>;

/// What a successful handshake learned about the peer.
pub(crate) struct HandshakeOutcome {
  pub peer_type: SocketType,
  /// Announced routing identity; empty when the peer sent none.
  pub identity: Blob,
  pub metadata: Metadata,
  pub cipher: Arc<dyn DataCipher>,
}

impl std::fmt::Debug for HandshakeOutcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HandshakeOutcome")
      .field("peer_type", &self.peer_type)
      .field("identity", &self.identity)
      .field("metadata", &self.metadata)
      .finish_non_exhaustive()
  }
}

/// Runs greeting and mechanism exchange on a fresh stream, bounded by
/// the configured handshake interval.
pub(crate) async fn perform_handshake(
  stream: BoxedStream,
  config: &EngineConfig,
) -> Result<(ZmtpFramed, HandshakeOutcome), ZmqError> {
  let handshake = run_handshake(stream, config);
  match config.handshake_ivl {
    Some(limit) => tokio::time::timeout(limit, handshake)
      .await
      .map_err(|_| ZmqError::Timeout)?,
    None => handshake.await,
  }
}

async fn run_handshake(mut stream: BoxedStream, config: &EngineConfig) -> Result<(ZmtpFramed, HandshakeOutcome), ZmqError> {
  let local_mechanism = config.security.mechanism_name();
  let peer_greeting = exchange_greetings(&mut stream, config).await?;
  if peer_greeting.mechanism_name() != local_mechanism {
    return Err(ZmqError::MechanismMismatch {
      local: local_mechanism.to_string(),
      peer: peer_greeting.mechanism_name().to_string(),
    });
  }
  tracing::trace!(
    mechanism = local_mechanism,
    peer_version = ?peer_greeting.version,
    peer_as_server = peer_greeting.as_server,
    "Greeting exchanged"
  );

  // The data limit starts once the handshake is over; commands stay capped.
  let mut framed = Framed::new(stream, ZmtpCodec::new());
  let mut mechanism = config.security.build(local_metadata(config))?;

  if let Err(e) = run_mechanism(&mut framed, mechanism.as_mut()).await {
    // Best effort: tell the peer why, if the mechanism owes it an ERROR.
    if let Ok(Some(token)) = mechanism.produce_token() {
      let _ = framed.send(Frame::command(token)).await;
    }
    return Err(e);
  }

  let metadata = mechanism
    .peer_metadata()
    .cloned()
    .ok_or_else(|| ZmqError::ProtocolViolation("Handshake completed without peer metadata".into()))?;
  let peer_type: SocketType = metadata
    .get_str(PROPERTY_SOCKET_TYPE)
    .ok_or_else(|| ZmqError::ProtocolViolation("Peer metadata lacks Socket-Type".into()))?
    .parse()?;

  if !config.socket_type.is_compatible(peer_type) {
    let reason = format!("{} socket cannot talk to {} peer", config.socket_type, peer_type);
    let _ = framed.send(ZmtpCommand::Error(reason.clone()).to_frame()).await;
    return Err(ZmqError::ProtocolViolation(reason));
  }

  let identity = metadata
    .get(PROPERTY_IDENTITY)
    .cloned()
    .map(Blob::from_bytes)
    .unwrap_or_default();
  let cipher = mechanism.into_data_cipher()?;
  framed.codec_mut().set_max_frame_size(config.max_msg_size);

  Ok((
    framed,
    HandshakeOutcome {
      peer_type,
      identity,
      metadata,
      cipher,
    },
  ))
}

/// Both sides send their full greeting without waiting, then read the peer's.
async fn exchange_greetings(stream: &mut BoxedStream, config: &EngineConfig) -> Result<ZmtpGreeting, ZmqError> {
  let local = ZmtpGreeting::new(config.security.mechanism_name(), config.security.as_server());
  stream.write_all(&local.to_bytes()).await?;
  stream.flush().await?;

  let mut buffer = BytesMut::zeroed(GREETING_LENGTH);
  stream.read_exact(&mut buffer).await.map_err(|e| match e.kind() {
    std::io::ErrorKind::UnexpectedEof => ZmqError::UnexpectedEof,
    _ => ZmqError::Io(e),
  })?;
  ZmtpGreeting::decode(&mut buffer)?.ok_or_else(|| ZmqError::Internal("Short greeting buffer".into()))
}

/// Alternates sending what the mechanism produces and feeding it peer commands.
async fn run_mechanism(framed: &mut ZmtpFramed, mechanism: &mut dyn Mechanism) -> Result<(), ZmqError> {
  loop {
    while let Some(token) = mechanism.produce_token()? {
      framed.send(Frame::command(token)).await?;
    }
    if mechanism.is_complete() {
      return Ok(());
    }
    if mechanism.is_error() {
      let reason = mechanism.error_reason().unwrap_or("handshake failed").to_string();
      return Err(ZmqError::AuthenticationFailure(reason));
    }

    let frame = framed.next().await.ok_or(ZmqError::UnexpectedEof)??;
    if !frame.is_command() {
      return Err(ZmqError::ProtocolViolation("Data frame received during handshake".into()));
    }
    mechanism.process_token(&frame.body)?;
  }
}

fn local_metadata(config: &EngineConfig) -> Metadata {
  let mut metadata = Metadata::new();
  metadata.insert(PROPERTY_SOCKET_TYPE, config.socket_type.as_str());
  if !config.identity.is_empty() {
    metadata.insert(PROPERTY_IDENTITY, config.identity.to_bytes());
  }
  metadata
}
