// src/socket/core/shutdown.rs

use std::time::Duration;

use super::state::Terminal;
use super::SocketCore;
use crate::error::{ZmqError, ZmqResult};
use crate::runtime::{Command, PeerEvent};
use crate::socket::events::SocketEvent;

/// How long close waits for connection tasks before aborting them.
pub(crate) const CLOSE_GRACE: Duration = Duration::from_secs(1);

impl SocketCore {
  /// Stops everything the socket started. Parked and queued operations fail
  /// with the terminal error; `Closed` is the last monitor event.
  pub(super) async fn shutdown(&mut self, terminal: Terminal) -> ZmqResult<()> {
    let terminal = *self.terminal.get_or_init(|| terminal);
    tracing::debug!(handle = self.handle, ?terminal, "Socket shutting down");

    self.mailbox.close();
    self.link.token.cancel();

    for pending in self.pending_sends.drain(..) {
      if let Some(reply) = pending.reply {
        let _ = reply.send(Err(terminal.error()));
      }
    }
    for pending in self.pending_recvs.drain(..) {
      let _ = pending.reply.send(Err(terminal.error()));
    }
    while let Ok(command) = self.mailbox.try_recv() {
      reject(command, terminal);
    }
    self.peers.clear();
    self.unclaimed.clear();

    let result = self.await_tasks().await;
    self.emit(SocketEvent::Closed);
    self.monitors.clear();
    tracing::debug!(handle = self.handle, "Socket closed");
    result
  }

  /// Waits for listener, dialer and connection tasks, still forwarding
  /// their monitor events, then aborts whatever is left.
  async fn await_tasks(&mut self) -> ZmqResult<()> {
    let tasks = self.link.tasks.clone();
    let all_done = tasks.wait();
    tokio::pin!(all_done);
    let grace = tokio::time::sleep(CLOSE_GRACE);
    tokio::pin!(grace);

    loop {
      tokio::select! {
        _ = &mut all_done => return Ok(()),
        _ = &mut grace => {
          tracing::warn!(handle = self.handle, remaining = tasks.len(), "Tasks still running after close grace period; aborting");
          tasks.abort_all();
          return Err(ZmqError::CloseTimeout(CLOSE_GRACE));
        }
        event = self.events.recv() => match event {
          Ok(PeerEvent::Monitor(event)) => self.emit(event),
          Ok(PeerEvent::Attached(handle)) => handle.token.cancel(),
          Ok(_) => {}
          Err(_) => {}
        },
      }
    }
  }
}

/// Answers a command that arrived too late.
fn reject(command: Command, terminal: Terminal) {
  match command {
    Command::Listen { reply, .. } => {
      let _ = reply.send(Err(terminal.error()));
    }
    Command::Dial { reply, .. } | Command::SetOption { reply, .. } | Command::SetCurveOracle { reply, .. } => {
      let _ = reply.send(Err(terminal.error()));
    }
    Command::Send { reply, .. } => {
      let _ = reply.send(Err(terminal.error()));
    }
    Command::Recv { reply, .. } => {
      let _ = reply.send(Err(terminal.error()));
    }
    Command::GetOption { reply, .. } => {
      let _ = reply.send(Err(terminal.error()));
    }
    Command::Monitor { reply, .. } => {
      let _ = reply.send(Err(terminal.error()));
    }
    Command::Close { reply } => {
      let _ = reply.send(Ok(()));
    }
  }
}
