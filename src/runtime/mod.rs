// src/runtime/mod.rs

//! Core asynchronous primitives: commands, mailboxes, peer events and task tracking.

pub(crate) mod command;
pub(crate) mod mailbox;
pub(crate) mod peer_event;
pub(crate) mod task_group;

pub(crate) use command::{Command, Reply};
pub(crate) use mailbox::{event_channel, mailbox, EventReceiver, EventSender, MailboxReceiver, MailboxSender};
pub(crate) use peer_event::{PeerEvent, PeerId};
pub(crate) use task_group::TaskGroup;
