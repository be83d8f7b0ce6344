// tests/inproc.rs

use std::collections::HashSet;

use zmq4::{Msg, SocketEvent, SocketType, ZmqError, SUBSCRIBE};
mod common;

use common::{recv_timeout, text, texts, unique_inproc_endpoint, LONG_TIMEOUT};

#[tokio::test]
async fn test_inproc_req_rep() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let rep = ctx.socket(SocketType::Rep)?;
  let req = ctx.socket(SocketType::Req)?;
  let endpoint = unique_inproc_endpoint();

  assert_eq!(rep.listen(&endpoint).await?, endpoint);
  req.dial(&endpoint).await?;

  for (question, answer) in [("NAME", "zmq4"), ("LANG", "Go"), ("QUIT", "bye")] {
    req.send(question).await?;
    assert_eq!(text(&recv_timeout(&rep, LONG_TIMEOUT).await?), question);
    rep.send(answer).await?;
    assert_eq!(text(&recv_timeout(&req, LONG_TIMEOUT).await?), answer);
  }

  ctx.term().await
}

#[tokio::test]
async fn test_inproc_dial_waits_for_listener() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let pull = ctx.socket(SocketType::Pull)?;
  let push = ctx.socket(SocketType::Push)?;
  let endpoint = unique_inproc_endpoint();

  let dialing = {
    let push = push.clone();
    let endpoint = endpoint.clone();
    tokio::spawn(async move { push.dial(&endpoint).await })
  };
  tokio::time::sleep(common::SHORT_TIMEOUT).await;
  assert!(!dialing.is_finished());

  pull.listen(&endpoint).await?;
  tokio::time::timeout(LONG_TIMEOUT, dialing)
    .await
    .map_err(|_| ZmqError::Timeout)?
    .map_err(|e| ZmqError::Internal(e.to_string()))??;

  push.send(Msg::from_frames(["a", "b"])).await?;
  assert_eq!(texts(&recv_timeout(&pull, LONG_TIMEOUT).await?), vec!["a", "b"]);

  ctx.term().await
}

#[tokio::test]
async fn test_inproc_name_is_exclusive_until_close() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let endpoint = unique_inproc_endpoint();
  let first = ctx.socket(SocketType::Pair)?;
  first.listen(&endpoint).await?;

  let second = ctx.socket(SocketType::Pair)?;
  assert!(matches!(second.listen(&endpoint).await, Err(ZmqError::BindFailed { .. })));

  first.close().await?;
  second.listen(&endpoint).await?;

  ctx.term().await
}

#[tokio::test]
async fn test_inproc_names_are_per_context() -> Result<(), ZmqError> {
  let ctx_a = common::test_context();
  let ctx_b = common::test_context();
  let endpoint = unique_inproc_endpoint();

  let a = ctx_a.socket(SocketType::Pull)?;
  let b = ctx_b.socket(SocketType::Pull)?;
  a.listen(&endpoint).await?;
  b.listen(&endpoint).await?;

  ctx_a.term().await?;
  ctx_b.term().await
}

#[tokio::test]
async fn test_inproc_pub_sub_fan_out() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let monitor = publisher.monitor().await?;
  let endpoint = unique_inproc_endpoint();
  publisher.listen(&endpoint).await?;

  let mut subscribers = Vec::new();
  for _ in 0..3 {
    let sub = ctx.socket(SocketType::Sub)?;
    sub.set_option(SUBSCRIBE, "").await?;
    sub.dial(&endpoint).await?;
    subscribers.push(sub);
  }
  for _ in 0..3 {
    common::wait_for_handshake(&monitor).await.map_err(ZmqError::Internal)?;
  }
  // Subscriptions are replayed right after the handshake; give them a moment.
  tokio::time::sleep(common::SHORT_TIMEOUT).await;

  publisher.send("broadcast").await?;
  for sub in &subscribers {
    assert_eq!(text(&recv_timeout(sub, LONG_TIMEOUT).await?), "broadcast");
  }

  ctx.term().await
}

#[tokio::test]
async fn test_inproc_router_dealer_many_workers() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let router = ctx.socket(SocketType::Router)?;
  let endpoint = unique_inproc_endpoint();
  router.listen(&endpoint).await?;

  let mut workers = Vec::new();
  for i in 0..4 {
    let dealer = ctx.socket(SocketType::Dealer)?;
    dealer.set_option(zmq4::IDENTITY, format!("w{}", i)).await?;
    dealer.dial(&endpoint).await?;
    dealer.send("ready").await?;
    workers.push(dealer);
  }

  let mut seen = HashSet::new();
  for _ in 0..4 {
    let msg = recv_timeout(&router, LONG_TIMEOUT).await?;
    let frames = texts(&msg);
    assert_eq!(frames[1], "ready");
    seen.insert(frames[0].clone());
  }
  assert_eq!(seen.len(), 4);

  for identity in &seen {
    router.send(Msg::from_frames([identity.clone(), format!("job for {}", identity)])).await?;
  }
  for (i, worker) in workers.iter().enumerate() {
    assert_eq!(text(&recv_timeout(worker, LONG_TIMEOUT).await?), format!("job for w{}", i));
  }

  ctx.term().await
}

#[tokio::test]
async fn test_inproc_peer_close_is_observed() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let server = ctx.socket(SocketType::Pair)?;
  let monitor = server.monitor().await?;
  let endpoint = unique_inproc_endpoint();
  server.listen(&endpoint).await?;

  let client = ctx.socket(SocketType::Pair)?;
  client.dial(&endpoint).await?;
  common::wait_for_handshake(&monitor).await.map_err(ZmqError::Internal)?;
  client.close().await?;

  common::wait_for_event(&monitor, LONG_TIMEOUT, |e| matches!(e, SocketEvent::Disconnected { .. }))
    .await
    .map_err(ZmqError::Internal)?;

  ctx.term().await
}
