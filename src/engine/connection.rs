// src/engine/connection.rs

use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::handshake::{perform_handshake, HandshakeOutcome, ZmtpFramed};
use crate::context::Context;
use crate::error::ZmqError;
use crate::message::{Blob, Frame, Msg};
use crate::protocol::zmtp::{MessageAssembler, ZmtpCommand};
use crate::runtime::{EventSender, PeerEvent, PeerId, TaskGroup};
use crate::security::DataCipher;
use crate::socket::events::SocketEvent;
use crate::socket::options::EngineConfig;
use crate::socket::types::SocketType;
use crate::transport::BoxedStream;

/// Wake-ups from connection tasks to the control task.
#[derive(Debug, Default)]
pub(crate) struct CoreSignals {
  /// A reader queued an inbound message.
  pub inbound_ready: Notify,
  /// A writer took a message off an outbound queue.
  pub outbound_space: Notify,
}

/// Everything a listener, dialer or connection task needs from its socket.
#[derive(Debug, Clone)]
pub(crate) struct SocketLink {
  pub handle: usize,
  pub context: Context,
  pub events: EventSender,
  pub signals: Arc<CoreSignals>,
  pub tasks: TaskGroup,
  pub token: CancellationToken,
  /// Settings for connections started from now on.
  pub config: Arc<RwLock<Arc<EngineConfig>>>,
}

impl SocketLink {
  pub fn current_config(&self) -> Arc<EngineConfig> {
    self.config.read().clone()
  }

  /// Forwards a lifecycle event to the socket's monitors.
  pub async fn report(&self, event: SocketEvent) {
    let _ = self.events.send(PeerEvent::Monitor(event)).await;
  }
}

/// The control task's view of one ready connection.
#[derive(Debug)]
pub(crate) struct PeerHandle {
  pub id: PeerId,
  pub endpoint: String,
  pub peer_type: SocketType,
  pub identity: Blob,
  pub outbound: Sender<Msg>,
  /// Second receiver on the outbound queue, for draining it after the writer stopped.
  pub outbound_queue: Receiver<Msg>,
  pub control: Sender<ZmtpCommand>,
  pub inbound: Receiver<Msg>,
  /// Cancelling it tears the connection down.
  pub token: CancellationToken,
}

/// How a reader treats application messages, by local socket type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InboundRoute {
  Deliver,
  /// PUB/XPUB: only (un)subscription messages matter.
  Subscriptions,
  Discard,
}

impl InboundRoute {
  fn for_type(socket_type: SocketType) -> Self {
    match socket_type {
      SocketType::Pub | SocketType::XPub => InboundRoute::Subscriptions,
      SocketType::Push => InboundRoute::Discard,
      _ => InboundRoute::Deliver,
    }
  }
}

/// A queue bounded by `hwm`, or unbounded when `hwm` is zero.
fn hwm_channel<T>(hwm: usize) -> (Sender<T>, Receiver<T>) {
  if hwm == 0 {
    async_channel::unbounded()
  } else {
    async_channel::bounded(hwm)
  }
}

/// Runs the handshake on a fresh stream and, on success, registers the
/// connection with the control task and starts its reader and writer.
///
/// Returns the connection's token, which is cancelled when it ends.
pub(crate) async fn establish(
  stream: BoxedStream,
  endpoint: String,
  config: Arc<EngineConfig>,
  link: &SocketLink,
) -> Result<CancellationToken, ZmqError> {
  let handshake = tokio::select! {
    _ = link.token.cancelled() => Err(ZmqError::Canceled),
    result = perform_handshake(stream, &config) => result,
  };
  let (framed, outcome) = match handshake {
    Ok(done) => done,
    Err(ZmqError::Canceled) => return Err(ZmqError::Canceled),
    Err(e) => {
      tracing::warn!(handle = link.handle, endpoint = %endpoint, mechanism = config.security.mechanism_name(), error = %e, "ZMTP handshake failed");
      link
        .report(SocketEvent::HandshakeFailed {
          endpoint: endpoint.clone(),
          error_msg: e.to_string(),
        })
        .await;
      return Err(e);
    }
  };

  start(framed, outcome, endpoint, config, link).await
}

async fn start(
  framed: ZmtpFramed,
  outcome: HandshakeOutcome,
  endpoint: String,
  config: Arc<EngineConfig>,
  link: &SocketLink,
) -> Result<CancellationToken, ZmqError> {
  let id = link.context.next_handle();
  let token = link.token.child_token();
  let (outbound_tx, outbound_rx) = hwm_channel::<Msg>(config.sndhwm);
  let (inbound_tx, inbound_rx) = hwm_channel::<Msg>(config.rcvhwm);
  let (control_tx, control_rx) = async_channel::unbounded::<ZmtpCommand>();
  // One PONG in flight at a time; further PINGs meanwhile are answered by it.
  let (pong_tx, pong_rx) = async_channel::bounded::<Bytes>(1);

  tracing::debug!(
    handle = link.handle,
    peer = id,
    endpoint = %endpoint,
    peer_type = %outcome.peer_type,
    identity = ?outcome.identity,
    "Connection ready"
  );

  let peer = PeerHandle {
    id,
    endpoint: endpoint.clone(),
    peer_type: outcome.peer_type,
    identity: outcome.identity,
    outbound: outbound_tx,
    outbound_queue: outbound_rx.clone(),
    control: control_tx,
    inbound: inbound_rx,
    token: token.clone(),
  };
  // Attached must precede anything the reader reports about this peer.
  link
    .events
    .send(PeerEvent::Attached(peer))
    .await
    .map_err(|_| ZmqError::Closed)?;

  let (sink, stream) = framed.split();
  let writer = Writer {
    peer: id,
    sink,
    outbound: outbound_rx,
    control: control_rx,
    pongs: pong_rx,
    cipher: outcome.cipher.clone(),
    signals: link.signals.clone(),
    token: token.clone(),
    heartbeat_ivl: config.heartbeat_ivl,
    ping_ttl: config.ping_ttl_deciseconds(),
  };
  let reader = Reader {
    peer: id,
    stream,
    route: InboundRoute::for_type(config.socket_type),
    inbound: inbound_tx,
    pongs: pong_tx,
    cipher: outcome.cipher,
    assembler: MessageAssembler::new(),
    events: link.events.clone(),
    signals: link.signals.clone(),
    token: token.clone(),
    // A PING goes out at most one interval after the last traffic.
    silence_window: config.heartbeat_ivl.zip(config.heartbeat_timeout).map(|(ivl, timeout)| ivl + timeout),
    max_msg_size: config.max_msg_size,
    peer_ttl: None,
  };

  let tasks = link.tasks.clone();
  let events = link.events.clone();
  let connection_token = token.clone();
  let handle = link.handle;
  link.tasks.spawn(async move {
    let writer_task = tasks.spawn(writer.run());
    let reader_reason = reader.run().await;
    connection_token.cancel();
    let writer_reason = writer_task.await.ok().flatten();
    let reason = reader_reason.or(writer_reason);
    tracing::debug!(handle, peer = id, reason = ?reason, "Connection closed");
    let _ = events.send(PeerEvent::Detached { peer: id, reason }).await;
  });

  Ok(token)
}

struct Writer {
  peer: PeerId,
  sink: SplitSink<ZmtpFramed, Frame>,
  outbound: Receiver<Msg>,
  control: Receiver<ZmtpCommand>,
  pongs: Receiver<Bytes>,
  cipher: Arc<dyn DataCipher>,
  signals: Arc<CoreSignals>,
  token: CancellationToken,
  heartbeat_ivl: Option<Duration>,
  ping_ttl: u16,
}

impl Writer {
  /// Returns the reason the connection must close, or `None` on local close.
  async fn run(mut self) -> Option<String> {
    let mut ping_timer: Option<Interval> = self.heartbeat_ivl.map(|ivl| {
      let mut timer = tokio::time::interval_at(Instant::now() + ivl, ivl);
      timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
      timer
    });

    loop {
      let ping_tick = async {
        match ping_timer.as_mut() {
          Some(timer) => {
            timer.tick().await;
          }
          None => std::future::pending::<()>().await,
        }
      };

      let result = tokio::select! {
        biased;
        _ = self.token.cancelled() => return None,
        command = self.control.recv() => match command {
          Ok(command) => self.write_command(command).await,
          Err(_) => return None,
        },
        context = self.pongs.recv() => match context {
          Ok(context) => self.write_command(ZmtpCommand::Pong { context }).await,
          Err(_) => return None,
        },
        msg = self.outbound.recv() => match msg {
          Ok(msg) => {
            self.signals.outbound_space.notify_one();
            self.write_message(msg).await
          }
          Err(_) => return None,
        },
        _ = ping_tick => {
          tracing::trace!(peer = self.peer, "Sending heartbeat PING");
          self.write_command(ZmtpCommand::Ping { ttl: self.ping_ttl, context: Bytes::new() }).await
        }
      };

      if let Err(e) = result {
        if self.token.is_cancelled() {
          return None;
        }
        tracing::debug!(peer = self.peer, error = %e, "Connection write failed");
        return Some(e.to_string());
      }
    }
  }

  async fn write_command(&mut self, command: ZmtpCommand) -> Result<(), ZmqError> {
    let frame = self.cipher.seal_frame(command.to_frame())?;
    self.sink.send(frame).await
  }

  /// Frames of one message go out back to back, then one flush.
  async fn write_message(&mut self, msg: Msg) -> Result<(), ZmqError> {
    for frame in msg.to_wire_frames() {
      let frame = self.cipher.seal_frame(frame)?;
      self.sink.feed(frame).await?;
    }
    self.sink.flush().await
  }
}

struct Reader {
  peer: PeerId,
  stream: SplitStream<ZmtpFramed>,
  route: InboundRoute,
  inbound: Sender<Msg>,
  pongs: Sender<Bytes>,
  cipher: Arc<dyn DataCipher>,
  assembler: MessageAssembler,
  events: EventSender,
  signals: Arc<CoreSignals>,
  token: CancellationToken,
  silence_window: Option<Duration>,
  max_msg_size: Option<u64>,
  /// TTL the peer announced in its last PING.
  peer_ttl: Option<Duration>,
}

impl Reader {
  /// How long the peer may stay silent before the connection is dropped.
  fn silence_limit(&self) -> Option<Duration> {
    match (self.silence_window, self.peer_ttl) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    }
  }

  /// Returns the reason the connection must close, or `None` on local close.
  async fn run(mut self) -> Option<String> {
    let mut deadline = self.silence_limit().map(|limit| Instant::now() + limit);
    loop {
      let expiry = async {
        match deadline {
          Some(at) => tokio::time::sleep_until(at).await,
          None => std::future::pending::<()>().await,
        }
      };

      let next = tokio::select! {
        _ = self.token.cancelled() => return None,
        _ = expiry => {
          tracing::debug!(peer = self.peer, "Heartbeat timeout");
          return Some("heartbeat timeout".into());
        }
        next = self.stream.next() => next,
      };

      let frame = match next {
        Some(Ok(frame)) => frame,
        Some(Err(e)) => {
          tracing::warn!(peer = self.peer, error = %e, "Dropping connection on read error");
          return Some(e.to_string());
        }
        None if self.assembler.in_progress() => return Some(ZmqError::UnexpectedEof.to_string()),
        None => return Some("peer closed the connection".into()),
      };

      let outcome = match self.cipher.open_frame(frame) {
        Ok(frame) => self.handle_frame(frame).await,
        Err(e) => Err(e),
      };
      match outcome {
        Ok(true) => {}
        Ok(false) => return None,
        Err(e) => {
          tracing::warn!(peer = self.peer, error = %e, "Dropping connection on protocol error");
          return Some(e.to_string());
        }
      }
      deadline = self.silence_limit().map(|limit| Instant::now() + limit);
    }
  }

  /// Returns `Ok(false)` when the connection was closed locally meanwhile.
  async fn handle_frame(&mut self, frame: Frame) -> Result<bool, ZmqError> {
    if frame.is_command() {
      if self.assembler.in_progress() {
        return Err(ZmqError::ProtocolViolation("Command frame inside a multi-part message".into()));
      }
      return self.handle_command(ZmtpCommand::parse(&frame.body)?).await;
    }

    if let Some(limit) = self.max_msg_size {
      if frame.len() as u64 > limit {
        return Err(ZmqError::FrameTooLarge {
          size: frame.len() as u64,
          limit,
        });
      }
    }

    let msg = match self.assembler.push(frame)? {
      Some(msg) => msg,
      None => return Ok(true),
    };

    match self.route {
      InboundRoute::Deliver => {
        tracing::trace!(peer = self.peer, frames = msg.len(), "Message received");
        tokio::select! {
          _ = self.token.cancelled() => return Ok(false),
          sent = self.inbound.send(msg) => if sent.is_err() { return Ok(false) },
        }
        self.signals.inbound_ready.notify_one();
        Ok(true)
      }
      InboundRoute::Subscriptions => {
        // ZMTP 3.0 style: a one-frame message starting with 1 or 0.
        let body = msg.first().cloned().unwrap_or_default();
        match body.first() {
          Some(&flag @ (0 | 1)) if msg.len() == 1 => self.report_subscription(flag == 1, body.slice(1..)).await,
          _ => Ok(true),
        }
      }
      InboundRoute::Discard => Ok(true),
    }
  }

  async fn handle_command(&mut self, command: ZmtpCommand) -> Result<bool, ZmqError> {
    match command {
      ZmtpCommand::Ping { ttl, context } => {
        if ttl > 0 {
          self.peer_ttl = Some(Duration::from_millis(ttl as u64 * 100));
        }
        let _ = self.pongs.try_send(context);
        Ok(true)
      }
      ZmtpCommand::Pong { .. } => Ok(true),
      ZmtpCommand::Error(reason) => Err(ZmqError::ProtocolViolation(format!("Peer sent ERROR: {}", reason))),
      ZmtpCommand::Subscribe(topic) if self.route == InboundRoute::Subscriptions => {
        self.report_subscription(true, topic).await
      }
      ZmtpCommand::Cancel(topic) if self.route == InboundRoute::Subscriptions => {
        self.report_subscription(false, topic).await
      }
      other => {
        tracing::debug!(peer = self.peer, command = %String::from_utf8_lossy(other.name()), "Ignoring command");
        Ok(true)
      }
    }
  }

  async fn report_subscription(&mut self, subscribe: bool, topic: Bytes) -> Result<bool, ZmqError> {
    let event = PeerEvent::Subscription {
      peer: self.peer,
      subscribe,
      topic,
    };
    tokio::select! {
      _ = self.token.cancelled() => Ok(false),
      sent = self.events.send(event) => Ok(sent.is_ok()),
    }
  }
}
