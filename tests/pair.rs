// tests/pair.rs

use zmq4::{Msg, SocketType, ZmqError};
mod common;

use common::{recv_timeout, text, texts, LONG_TIMEOUT, SHORT_TIMEOUT};

#[tokio::test]
async fn test_pair_exchanges_both_ways() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let left = ctx.socket(SocketType::Pair)?;
  let right = ctx.socket(SocketType::Pair)?;

  let endpoint = left.listen("tcp://127.0.0.1:0").await?;
  right.dial(&endpoint).await?;

  right.send("ping").await?;
  assert_eq!(text(&recv_timeout(&left, LONG_TIMEOUT).await?), "ping");
  left.send(Msg::from_frames(["pong", "with", "parts"])).await?;
  assert_eq!(texts(&recv_timeout(&right, LONG_TIMEOUT).await?), vec!["pong", "with", "parts"]);

  ctx.term().await
}

#[tokio::test]
async fn test_pair_refuses_second_peer() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let server = ctx.socket(SocketType::Pair)?;
  let monitor = server.monitor().await?;
  let endpoint = server.listen("tcp://127.0.0.1:0").await?;

  let first = ctx.socket(SocketType::Pair)?;
  first.dial(&endpoint).await?;
  common::wait_for_handshake(&monitor).await.map_err(ZmqError::Internal)?;

  let intruder = ctx.socket(SocketType::Pair)?;
  intruder.dial(&endpoint).await?;
  // The intruder may connect at the transport level but never gets traffic.
  for i in 0..5 {
    server.send(format!("to-first-{}", i)).await?;
  }
  for i in 0..5 {
    assert_eq!(text(&recv_timeout(&first, LONG_TIMEOUT).await?), format!("to-first-{}", i));
  }
  assert!(matches!(recv_timeout(&intruder, SHORT_TIMEOUT).await, Err(ZmqError::Timeout)));

  ctx.term().await
}

#[tokio::test]
async fn test_pair_rejects_incompatible_peer() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let pair = ctx.socket(SocketType::Pair)?;
  let monitor = pair.monitor().await?;
  let endpoint = pair.listen("tcp://127.0.0.1:0").await?;

  let push = ctx.socket(SocketType::Push)?;
  push.dial(&endpoint).await?;

  common::wait_for_event(&monitor, LONG_TIMEOUT, |e| {
    matches!(e, zmq4::SocketEvent::HandshakeFailed { .. })
  })
  .await
  .map_err(ZmqError::Internal)?;
  push.try_send("nope").await?;
  assert!(matches!(recv_timeout(&pair, SHORT_TIMEOUT).await, Err(ZmqError::Timeout)));

  ctx.term().await
}
