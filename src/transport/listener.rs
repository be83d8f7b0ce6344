// src/transport/listener.rs

use std::time::Duration;

use super::Acceptor;
use crate::engine::{establish, SocketLink};
use crate::socket::events::SocketEvent;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Accepts streams until the socket closes, running the handshake for each
/// on its own task. Dropping the acceptor at the end releases the endpoint.
pub(crate) async fn run_accept_loop(mut acceptor: Box<dyn Acceptor>, link: SocketLink) {
  let endpoint = acceptor.local_endpoint().to_string();
  tracing::debug!(handle = link.handle, uri = %endpoint, "Listener started");

  loop {
    let accepted = tokio::select! {
      _ = link.token.cancelled() => break,
      accepted = acceptor.accept() => accepted,
    };

    match accepted {
      Ok((stream, peer_addr)) => {
        link
          .report(SocketEvent::Accepted {
            endpoint: endpoint.clone(),
            peer_addr,
          })
          .await;
        let config = link.current_config();
        let connection_link = link.clone();
        let connection_endpoint = endpoint.clone();
        link.tasks.spawn(async move {
          // Failures were already logged and reported.
          let _ = establish(stream, connection_endpoint, config, &connection_link).await;
        });
      }
      Err(e) => {
        tracing::warn!(handle = link.handle, uri = %endpoint, error = %e, "Accept failed");
        tokio::select! {
          _ = link.token.cancelled() => break,
          _ = tokio::time::sleep(ACCEPT_ERROR_PAUSE) => {}
        }
      }
    }
  }

  tracing::debug!(handle = link.handle, uri = %endpoint, "Listener stopped");
}
