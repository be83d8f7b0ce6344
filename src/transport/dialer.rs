// src/transport/dialer.rs

use super::reconnect::Backoff;
use super::Endpoint;
use crate::engine::{establish, SocketLink};
use crate::error::ZmqError;
use crate::runtime::Reply;
use crate::socket::events::SocketEvent;

/// Keeps one outgoing connection alive: dial, handshake, wait for the
/// connection to end, back off, dial again. Stops when the socket closes.
///
/// `ready`, when given, is answered after the first stream opens, or with
/// the first failure when IMMEDIATE is set (which also ends the dialer).
pub(crate) async fn run_dialer(endpoint: Endpoint, link: SocketLink, mut ready: Option<Reply<()>>) {
  let uri = endpoint.to_string();
  let initial = link.current_config();
  let mut backoff = Backoff::new(initial.reconnect_ivl, initial.reconnect_ivl_max);
  tracing::debug!(handle = link.handle, uri = %uri, "Dialer started");

  loop {
    let config = link.current_config();
    let attempt = tokio::select! {
      _ = link.token.cancelled() => break,
      attempt = super::connect(&endpoint, &link.context, config.immediate) => attempt,
    };

    match attempt {
      Ok((stream, peer_addr)) => {
        link
          .report(SocketEvent::Connected {
            endpoint: uri.clone(),
            peer_addr,
          })
          .await;
        if let Some(reply) = ready.take() {
          let _ = reply.send(Ok(()));
        }
        match establish(stream, uri.clone(), config, &link).await {
          Ok(connection) => {
            backoff.reset();
            tokio::select! {
              _ = link.token.cancelled() => break,
              _ = connection.cancelled() => {}
            }
            tracing::debug!(handle = link.handle, uri = %uri, "Connection lost, will redial");
          }
          Err(ZmqError::Canceled) => break,
          Err(_) => {}
        }
      }
      Err(e) => {
        tracing::debug!(handle = link.handle, uri = %uri, error = %e, "Dial attempt failed");
        if config.immediate {
          if let Some(reply) = ready.take() {
            let _ = reply.send(Err(e));
            return;
          }
        }
      }
    }

    let delay = backoff.next_delay();
    link
      .report(SocketEvent::ConnectRetried {
        endpoint: uri.clone(),
        interval: delay,
      })
      .await;
    tokio::select! {
      _ = link.token.cancelled() => break,
      _ = tokio::time::sleep(delay) => {}
    }
  }

  if let Some(reply) = ready.take() {
    let _ = reply.send(Err(ZmqError::Canceled));
  }
  tracing::debug!(handle = link.handle, uri = %uri, "Dialer stopped");
}
