// src/socket/core/mod.rs

//! The per-socket control task. It alone owns the peer registry, the
//! options and the type policy; handles reach it through the mailbox and
//! connection tasks through the event channel, so none of that state needs
//! a lock.

mod command_processor;
mod dispatch;
mod event_processor;
mod shutdown;
pub(crate) mod state;

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::context::Context;
use crate::engine::{CoreSignals, SocketLink};
use crate::message::Msg;
use crate::runtime::{event_channel, mailbox, EventReceiver, MailboxReceiver, TaskGroup};
use crate::security::CurveOracle;
use crate::socket::events::MonitorSender;
use crate::socket::options::SocketOptions;
use crate::socket::patterns::FairQueue;
use crate::socket::policy::Policy;
use crate::socket::types::{Socket, SocketType};
use state::{PeerMap, PendingRecv, PendingSend, Terminal, TerminalState};

pub(crate) use shutdown::CLOSE_GRACE;

pub(crate) struct SocketCore {
  handle: usize,
  socket_type: SocketType,
  options: SocketOptions,
  policy: Policy,
  peers: PeerMap,
  fair_queue: FairQueue,
  link: SocketLink,
  mailbox: MailboxReceiver,
  events: EventReceiver,
  pending_sends: VecDeque<PendingSend>,
  pending_recvs: VecDeque<PendingRecv>,
  /// Messages the policy already accepted whose receiver went away.
  unclaimed: VecDeque<Msg>,
  monitors: Vec<MonitorSender>,
  curve_oracle: Option<Arc<dyn CurveOracle>>,
  terminal: TerminalState,
}

impl SocketCore {
  /// Starts the control task for a new socket and returns its first handle.
  pub(crate) fn spawn(context: &Context, socket_type: SocketType) -> Socket {
    let handle = context.next_handle();
    let (mailbox_tx, mailbox_rx) = mailbox();
    let (events_tx, events_rx) = event_channel();
    let options = SocketOptions::new(socket_type);
    let link = SocketLink {
      handle,
      context: context.clone(),
      events: events_tx,
      signals: Arc::new(CoreSignals::default()),
      tasks: TaskGroup::new(),
      token: context.token().child_token(),
      config: Arc::new(RwLock::new(Arc::new(options.engine_config(None)))),
    };
    let terminal = TerminalState::default();

    let core = SocketCore {
      handle,
      socket_type,
      options,
      policy: Policy::new(socket_type),
      peers: PeerMap::new(),
      fair_queue: FairQueue::new(),
      link,
      mailbox: mailbox_rx,
      events: events_rx,
      pending_sends: VecDeque::new(),
      pending_recvs: VecDeque::new(),
      unclaimed: VecDeque::new(),
      monitors: Vec::new(),
      curve_oracle: None,
      terminal: terminal.clone(),
    };
    context.sockets().spawn(core.run());
    tracing::debug!(handle, socket_type = %socket_type, "Socket created");
    Socket::new(handle, socket_type, mailbox_tx, terminal)
  }

  async fn run(mut self) {
    let signals = self.link.signals.clone();
    let token = self.link.token.clone();
    tracing::debug!(handle = self.handle, "Socket control task started");

    loop {
      let deadline = self.next_deadline();
      let expiry = async move {
        match deadline {
          Some(at) => tokio::time::sleep_until(at).await,
          None => std::future::pending::<()>().await,
        }
      };

      tokio::select! {
        biased;
        _ = token.cancelled() => {
          let _ = self.shutdown(Terminal::Canceled).await;
          break;
        }
        command = self.mailbox.recv() => match command {
          Ok(command) => {
            if !self.handle_command(command).await {
              break;
            }
          }
          Err(_) => {
            tracing::debug!(handle = self.handle, "All handles dropped, closing socket");
            let _ = self.shutdown(Terminal::Closed).await;
            break;
          }
        },
        event = self.events.recv() => {
          // The link keeps a sender alive, so this never reports closed.
          if let Ok(event) = event {
            self.handle_event(event);
          }
        }
        _ = signals.inbound_ready.notified(), if !self.pending_recvs.is_empty() => self.pump_recvs(),
        _ = signals.outbound_space.notified(), if !self.pending_sends.is_empty() => self.pump_sends(),
        _ = expiry => self.expire_pending(),
      }
    }

    tracing::debug!(handle = self.handle, "Socket control task finished");
  }

  /// Earliest timeout among parked sends and receives.
  fn next_deadline(&self) -> Option<Instant> {
    let sends = self.pending_sends.iter().filter_map(|p| p.deadline);
    let recvs = self.pending_recvs.iter().filter_map(|p| p.deadline);
    sends.chain(recvs).min()
  }
}
