// src/socket/mod.rs

//! Sockets: the public handle, options, monitor events and the per-type
//! messaging rules run by each socket's control task.

pub(crate) mod core;
pub mod events;
pub mod options;
pub(crate) mod patterns;
pub(crate) mod policy;
pub mod types;

pub(crate) mod dealer_socket;
pub(crate) mod pair_socket;
pub(crate) mod pub_socket;
pub(crate) mod pull_socket;
pub(crate) mod push_socket;
pub(crate) mod rep_socket;
pub(crate) mod req_socket;
pub(crate) mod router_socket;
pub(crate) mod sub_socket;

pub use events::{MonitorReceiver, SocketEvent};
pub use options::OptionValue;
pub use types::{Socket, SocketType};
