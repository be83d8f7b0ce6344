// src/engine/mod.rs

//! The per-connection ZMTP engine: greeting and security handshake, then a
//! reader and a writer task exchanging frames with the socket's control task.

pub(crate) mod connection;
pub(crate) mod handshake;

pub(crate) use connection::{establish, CoreSignals, PeerHandle, SocketLink};
