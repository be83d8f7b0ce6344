// src/runtime/mailbox.rs

//! Type aliases for actor communication channels based on `async-channel`.

use crate::runtime::command::Command;
use crate::runtime::peer_event::PeerEvent;

/// The sending end of a socket's mailbox. Cloneable.
pub(crate) type MailboxSender = async_channel::Sender<Command>;

/// The receiving end of a socket's mailbox.
pub(crate) type MailboxReceiver = async_channel::Receiver<Command>;

pub(crate) type EventSender = async_channel::Sender<PeerEvent>;
pub(crate) type EventReceiver = async_channel::Receiver<PeerEvent>;

/// Default capacity for bounded mailboxes.
pub(crate) const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Creates a new bounded mailbox channel pair.
pub(crate) fn mailbox() -> (MailboxSender, MailboxReceiver) {
  async_channel::bounded(DEFAULT_MAILBOX_CAPACITY)
}

/// Channel carrying connection lifecycle events into the control task.
pub(crate) fn event_channel() -> (EventSender, EventReceiver) {
  async_channel::bounded(DEFAULT_MAILBOX_CAPACITY)
}
