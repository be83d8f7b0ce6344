// src/socket/core/dispatch.rs

use async_channel::TrySendError;
use tokio::time::Instant;

use super::SocketCore;
use crate::error::{ZmqError, ZmqResult};
use crate::message::Msg;
use crate::socket::policy::SendPlan;

impl SocketCore {
  /// Runs one send through the policy. `Ok(false)` means it has to wait
  /// for a peer or for queue space.
  pub(super) fn try_dispatch(&mut self, msg: &Msg, resend: bool) -> ZmqResult<bool> {
    let plan = if resend {
      self.policy.plan_resend(msg, &self.peers, &self.options)?
    } else {
      self.policy.plan_send(msg, &self.peers, &self.options)?
    };

    match plan {
      SendPlan::To {
        peer,
        msg: wire,
        block_when_full,
      } => {
        let Some(entry) = self.peers.get(&peer).filter(|entry| entry.connected) else {
          self.policy.on_dispatched(None, msg);
          return Ok(true);
        };
        match entry.outbound.try_send(wire) {
          Ok(()) => {
            self.policy.on_dispatched(Some(peer), msg);
            Ok(true)
          }
          Err(TrySendError::Full(_)) if block_when_full => Ok(false),
          Err(_) => {
            tracing::trace!(handle = self.handle, peer, "Peer queue full, dropping message");
            self.policy.on_dispatched(None, msg);
            Ok(true)
          }
        }
      }
      SendPlan::AnyPeer(wire) => {
        let Some(peer) = self.policy.pick_send_peer(&self.peers) else {
          return Ok(false);
        };
        match self.peers.get(&peer).map(|entry| entry.outbound.try_send(wire)) {
          Some(Ok(())) => {
            self.policy.on_dispatched(Some(peer), msg);
            Ok(true)
          }
          _ => Ok(false),
        }
      }
      SendPlan::Broadcast { peers, msg: wire } => {
        for peer in peers {
          let Some(entry) = self.peers.get(&peer).filter(|entry| entry.connected) else {
            continue;
          };
          if entry.outbound.try_send(wire.clone()).is_err() {
            tracing::trace!(handle = self.handle, peer, "Subscriber queue full, message skipped");
          }
        }
        self.policy.on_dispatched(None, msg);
        Ok(true)
      }
      SendPlan::Command(command) => {
        for entry in self.peers.values().filter(|entry| entry.connected) {
          let _ = entry.control.try_send(command.clone());
        }
        self.policy.on_dispatched(None, msg);
        Ok(true)
      }
      SendPlan::Drop => {
        self.policy.on_dispatched(None, msg);
        Ok(true)
      }
    }
  }

  /// The next message for the user, if one is ready.
  pub(super) fn try_receive(&mut self) -> ZmqResult<Option<Msg>> {
    if let Some(msg) = self.unclaimed.pop_front() {
      return Ok(Some(msg));
    }
    if let Some(msg) = self.policy.take_local() {
      return Ok(Some(msg));
    }
    self.policy.check_recv()?;

    let mut drained = Vec::new();
    let mut found = None;
    'scan: for peer in self.fair_queue.scan_order() {
      let Some(entry) = self.peers.get(&peer) else {
        continue;
      };
      while let Ok(msg) = entry.inbound.try_recv() {
        if let Some(msg) = self.policy.on_inbound(entry, msg) {
          self.fair_queue.delivered(peer);
          found = Some(msg);
          break 'scan;
        }
      }
      if !entry.connected {
        drained.push(peer);
      }
    }

    for peer in drained {
      self.remove_peer(peer);
    }
    Ok(found)
  }

  /// Retries parked sends in order until one has to keep waiting.
  pub(super) fn pump_sends(&mut self) {
    while let Some(pending) = self.pending_sends.pop_front() {
      if pending.abandoned() {
        continue;
      }
      match self.try_dispatch(&pending.msg, pending.resend) {
        Ok(false) => {
          self.pending_sends.push_front(pending);
          break;
        }
        outcome => {
          if let Some(reply) = pending.reply {
            let _ = reply.send(outcome.map(|_| ()));
          }
        }
      }
    }
  }

  /// Hands ready messages to parked receivers, oldest first.
  pub(super) fn pump_recvs(&mut self) {
    while let Some(pending) = self.pending_recvs.pop_front() {
      if pending.reply.is_closed() {
        continue;
      }
      match self.try_receive() {
        Ok(Some(msg)) => self.deliver(pending.reply, msg),
        Ok(None) => {
          self.pending_recvs.push_front(pending);
          break;
        }
        Err(e) => {
          let _ = pending.reply.send(Err(e));
        }
      }
    }
  }

  /// Everything that may unblock a parked operation ends here.
  pub(super) fn pump(&mut self) {
    if !self.pending_sends.is_empty() {
      self.pump_sends();
    }
    if !self.pending_recvs.is_empty() {
      self.pump_recvs();
    }
  }

  pub(super) fn deliver(&mut self, reply: crate::runtime::Reply<Msg>, msg: Msg) {
    // The receiver gave up after the policy accepted the message; keep it.
    if let Err(Ok(msg)) = reply.send(Ok(msg)) {
      self.unclaimed.push_front(msg);
    }
  }

  /// Fails parked operations whose SNDTIMEO/RCVTIMEO ran out.
  pub(super) fn expire_pending(&mut self) {
    let now = Instant::now();
    let expired = |deadline: Option<Instant>| deadline.is_some_and(|at| at <= now);

    let mut kept = std::collections::VecDeque::with_capacity(self.pending_sends.len());
    for pending in self.pending_sends.drain(..) {
      if expired(pending.deadline) {
        if let Some(reply) = pending.reply {
          let _ = reply.send(Err(ZmqError::Timeout));
        }
      } else {
        kept.push_back(pending);
      }
    }
    self.pending_sends = kept;

    let mut kept = std::collections::VecDeque::with_capacity(self.pending_recvs.len());
    for pending in self.pending_recvs.drain(..) {
      if expired(pending.deadline) {
        let _ = pending.reply.send(Err(ZmqError::Timeout));
      } else {
        kept.push_back(pending);
      }
    }
    self.pending_recvs = kept;
  }
}
