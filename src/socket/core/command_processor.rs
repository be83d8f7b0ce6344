// src/socket/core/command_processor.rs

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use super::state::{PendingRecv, PendingSend, Terminal};
use super::SocketCore;
use crate::error::{ZmqError, ZmqResult};
use crate::message::Msg;
use crate::runtime::{Command, Reply};
use crate::socket::events::SocketEvent;
use crate::socket::options::{OptionAction, OptionValue};
use crate::transport::dialer::run_dialer;
use crate::transport::listener::run_accept_loop;
use crate::transport::{self, parse_endpoint};

impl SocketCore {
  /// Returns false once the socket has closed.
  pub(super) async fn handle_command(&mut self, command: Command) -> bool {
    tracing::trace!(handle = self.handle, command = command.variant_name(), "Processing command");
    match command {
      Command::Listen { endpoint, reply } => {
        let result = self.listen(&endpoint).await;
        let _ = reply.send(result);
      }
      Command::Dial { endpoint, reply } => self.dial(&endpoint, reply),
      Command::Send { msg, nonblocking, reply } => self.send(msg, nonblocking, reply),
      Command::Recv { nonblocking, reply } => self.recv(nonblocking, reply),
      Command::SetOption { name, value, reply } => {
        let result = self.set_option(&name, value);
        let _ = reply.send(result);
      }
      Command::GetOption { name, reply } => {
        let _ = reply.send(self.options.get(&name));
      }
      Command::SetCurveOracle { oracle, reply } => {
        self.curve_oracle = Some(oracle);
        self.refresh_engine_config();
        let _ = reply.send(Ok(()));
      }
      Command::Monitor { capacity, reply } => {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        self.monitors.push(tx);
        let _ = reply.send(Ok(rx));
      }
      Command::Close { reply } => {
        let result = self.shutdown(Terminal::Closed).await;
        let _ = reply.send(result);
        return false;
      }
    }
    true
  }

  async fn listen(&mut self, endpoint: &str) -> ZmqResult<String> {
    let parsed = parse_endpoint(endpoint)?;
    match transport::bind(&parsed, &self.link.context).await {
      Ok(acceptor) => {
        let resolved = acceptor.local_endpoint().to_string();
        tracing::info!(handle = self.handle, uri = %resolved, "Listening");
        self.options.last_endpoint = resolved.clone();
        self.link.tasks.spawn(run_accept_loop(acceptor, self.link.clone()));
        self.emit(SocketEvent::Listening {
          endpoint: resolved.clone(),
        });
        Ok(resolved)
      }
      Err(e) => {
        tracing::warn!(handle = self.handle, uri = %endpoint, error = %e, "Listen failed");
        self.emit(SocketEvent::BindFailed {
          endpoint: endpoint.to_string(),
          error_msg: e.to_string(),
        });
        Err(e)
      }
    }
  }

  /// TCP and IPC dials return at once and connect in the background.
  /// Inproc waits for a listener; with IMMEDIATE every transport reports
  /// the first attempt.
  fn dial(&mut self, endpoint: &str, reply: Reply<()>) {
    let parsed = match parse_endpoint(endpoint) {
      Ok(parsed) => parsed,
      Err(e) => {
        let _ = reply.send(Err(e));
        return;
      }
    };
    tracing::debug!(handle = self.handle, uri = %parsed, "Dialing");
    self.options.last_endpoint = parsed.to_string();

    let waits_for_first = self.options.immediate || parsed.scheme() == "inproc";
    let ready = if waits_for_first {
      Some(reply)
    } else {
      let _ = reply.send(Ok(()));
      None
    };
    self.link.tasks.spawn(run_dialer(parsed, self.link.clone(), ready));
  }

  fn send(&mut self, msg: Msg, nonblocking: bool, reply: Reply<()>) {
    if !self.socket_type.can_send() {
      let _ = reply.send(Err(ZmqError::NotSendable(self.socket_type)));
      return;
    }
    if msg.is_empty() {
      let _ = reply.send(Err(ZmqError::InvalidMessage("message has no frames".into())));
      return;
    }

    // Later sends queue behind parked ones to keep order.
    if self.pending_sends.is_empty() {
      match self.try_dispatch(&msg, false) {
        Ok(true) => {
          let _ = reply.send(Ok(()));
          return;
        }
        Err(e) => {
          let _ = reply.send(Err(e));
          return;
        }
        Ok(false) => {}
      }
    }

    match self.queue_without_peers(&msg) {
      Ok(Some(resend)) => {
        tracing::trace!(handle = self.handle, "No peer connected, message queued");
        self.pending_sends.push_back(PendingSend {
          msg,
          reply: None,
          deadline: None,
          resend,
        });
        let _ = reply.send(Ok(()));
        return;
      }
      Err(e) => {
        let _ = reply.send(Err(e));
        return;
      }
      Ok(None) => {}
    }

    let Some(deadline) = self.park_deadline(nonblocking, self.options.sndtimeo) else {
      let _ = reply.send(Err(ZmqError::WouldBlock));
      return;
    };
    tracing::trace!(handle = self.handle, "Send parked");
    self.pending_sends.push_back(PendingSend {
      msg,
      reply: Some(reply),
      deadline,
      resend: false,
    });
  }

  fn recv(&mut self, nonblocking: bool, reply: Reply<Msg>) {
    if !self.socket_type.can_recv() {
      let _ = reply.send(Err(ZmqError::NotReceivable(self.socket_type)));
      return;
    }

    if self.pending_recvs.is_empty() {
      match self.try_receive() {
        Ok(Some(msg)) => {
          self.deliver(reply, msg);
          return;
        }
        Err(e) => {
          let _ = reply.send(Err(e));
          return;
        }
        Ok(None) => {}
      }
    }

    let Some(deadline) = self.park_deadline(nonblocking, self.options.rcvtimeo) else {
      let _ = reply.send(Err(ZmqError::WouldBlock));
      return;
    };
    self.pending_recvs.push_back(PendingRecv { reply, deadline });
  }

  /// Without IMMEDIATE, a socket with no connected peer holds up to SNDHWM
  /// messages itself until one attaches.
  fn queue_without_peers(&mut self, msg: &Msg) -> ZmqResult<Option<bool>> {
    if self.options.immediate || self.peers.values().any(|entry| entry.connected) {
      return Ok(None);
    }
    let queued = self.pending_sends.iter().filter(|pending| pending.reply.is_none()).count();
    if self.options.sndhwm != 0 && queued >= self.options.sndhwm {
      return Ok(None);
    }
    // Rejects sends the socket's state forbids, e.g. a second REQ request.
    self.policy.plan_send(msg, &self.peers, &self.options)?;
    Ok(self.policy.queue_without_peers(msg))
  }

  /// `None` when the operation must not wait at all; otherwise the
  /// deadline, if any.
  fn park_deadline(&self, nonblocking: bool, timeout: Option<Duration>) -> Option<Option<Instant>> {
    match (nonblocking, timeout) {
      (true, _) => None,
      (false, Some(limit)) if limit.is_zero() => None,
      (false, limit) => Some(limit.map(|limit| Instant::now() + limit)),
    }
  }

  fn set_option(&mut self, name: &str, value: OptionValue) -> ZmqResult<()> {
    match self.options.set(name, value)? {
      OptionAction::Stored => {}
      OptionAction::Subscribe(topic) => self.local_subscription(true, topic),
      OptionAction::Unsubscribe(topic) => self.local_subscription(false, topic),
    }
    self.refresh_engine_config();
    Ok(())
  }

  fn local_subscription(&mut self, subscribe: bool, topic: Bytes) {
    if let Some(command) = self.policy.local_subscription(subscribe, topic) {
      for entry in self.peers.values().filter(|entry| entry.connected) {
        let _ = entry.control.try_send(command.clone());
      }
    }
  }

  /// New connections pick up the current options.
  fn refresh_engine_config(&mut self) {
    *self.link.config.write() = Arc::new(self.options.engine_config(self.curve_oracle.clone()));
  }

  /// Sends `event` to every live monitor, dropping it for full ones.
  pub(super) fn emit(&mut self, event: SocketEvent) {
    self.monitors.retain(|monitor| !monitor.is_closed());
    for monitor in &self.monitors {
      if monitor.try_send(event.clone()).is_err() {
        tracing::trace!(handle = self.handle, ?event, "Monitor queue full, event dropped");
      }
    }
  }
}
