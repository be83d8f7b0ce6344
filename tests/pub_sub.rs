// tests/pub_sub.rs

use bytes::Bytes;
use zmq4::{Msg, SocketType, ZmqError, SUBSCRIBE, UNSUBSCRIBE};
mod common;

use common::{recv_timeout, texts, LONG_TIMEOUT, SHORT_TIMEOUT};

/// Publishes `marker` until the subscriber sees it, so the subscription
/// has reached the publisher before the real traffic starts.
async fn await_subscription(publisher: &zmq4::Socket, subscriber: &zmq4::Socket, marker: &'static str) -> Result<(), ZmqError> {
  for _ in 0..50 {
    publisher.send(marker).await?;
    if let Ok(msg) = recv_timeout(subscriber, std::time::Duration::from_millis(50)).await {
      if msg.first().is_some_and(|f| f.as_ref() == marker.as_bytes()) {
        // Late copies of earlier markers may still be in flight.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        while subscriber.try_recv().await.is_ok() {}
        return Ok(());
      }
    }
  }
  Err(ZmqError::Internal("subscription never propagated".into()))
}

#[tokio::test]
async fn test_pub_sub_topic_filtering() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let subscriber = ctx.socket(SocketType::Sub)?;

  let endpoint = publisher.listen("tcp://127.0.0.1:0").await?;
  subscriber.set_option(SUBSCRIBE, "topicA").await?;
  subscriber.dial(&endpoint).await?;
  await_subscription(&publisher, &subscriber, "topicA-marker").await?;

  publisher.send(Msg::from_frames(["topicA", "payload"])).await?;
  publisher.send(Msg::from_frames(["topicB", "payload"])).await?;

  let received = recv_timeout(&subscriber, LONG_TIMEOUT).await?;
  assert_eq!(texts(&received), vec!["topicA", "payload"]);
  assert!(matches!(recv_timeout(&subscriber, SHORT_TIMEOUT).await, Err(ZmqError::Timeout)));

  ctx.term().await
}

#[tokio::test]
async fn test_sub_prefix_set() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let subscriber = ctx.socket(SocketType::Sub)?;

  let endpoint = publisher.listen("tcp://127.0.0.1:0").await?;
  subscriber.dial(&endpoint).await?;
  subscriber.set_option(SUBSCRIBE, "a").await?;
  subscriber.set_option(SUBSCRIBE, "bc").await?;
  await_subscription(&publisher, &subscriber, "bc-marker").await?;

  for topic in ["apple", "b", "bcd", "cab", "a", "bc", "xbc"] {
    publisher.send(topic).await?;
  }

  let mut received = Vec::new();
  while let Ok(msg) = recv_timeout(&subscriber, SHORT_TIMEOUT).await {
    received.extend(texts(&msg));
  }
  assert_eq!(received, vec!["apple", "bcd", "a", "bc"]);

  ctx.term().await
}

#[tokio::test]
async fn test_sub_unsubscribe_stops_delivery() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let subscriber = ctx.socket(SocketType::Sub)?;

  let endpoint = publisher.listen("tcp://127.0.0.1:0").await?;
  subscriber.set_option(SUBSCRIBE, "news").await?;
  subscriber.set_option(SUBSCRIBE, "sport").await?;
  subscriber.dial(&endpoint).await?;
  await_subscription(&publisher, &subscriber, "sport-marker").await?;

  // Filtering also happens locally, so the cancel takes effect at once.
  subscriber.set_option(UNSUBSCRIBE, "news").await?;

  publisher.send("news: dropped").await?;
  publisher.send("sport: kept").await?;
  let received = recv_timeout(&subscriber, LONG_TIMEOUT).await?;
  assert_eq!(texts(&received), vec!["sport: kept"]);

  ctx.term().await
}

#[tokio::test]
async fn test_empty_subscription_matches_everything() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let subscriber = ctx.socket(SocketType::Sub)?;

  let endpoint = publisher.listen("tcp://127.0.0.1:0").await?;
  subscriber.set_option(SUBSCRIBE, "").await?;
  subscriber.dial(&endpoint).await?;
  await_subscription(&publisher, &subscriber, "marker").await?;

  publisher.send(Msg::new(vec![Bytes::new()])).await?;
  publisher.send("anything").await?;
  assert_eq!(texts(&recv_timeout(&subscriber, LONG_TIMEOUT).await?), vec![""]);
  assert_eq!(texts(&recv_timeout(&subscriber, LONG_TIMEOUT).await?), vec!["anything"]);

  ctx.term().await
}

#[tokio::test]
async fn test_pub_without_subscribers_drops_silently() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  publisher.listen("tcp://127.0.0.1:0").await?;

  for _ in 0..10 {
    publisher.try_send("into the void").await?;
  }
  assert!(matches!(publisher.recv().await, Err(ZmqError::NotReceivable(SocketType::Pub))));
  assert!(matches!(
    publisher.set_option(SUBSCRIBE, "x").await,
    Err(ZmqError::InvalidOption { .. })
  ));

  ctx.term().await
}

#[tokio::test]
async fn test_xpub_reports_subscriptions() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let xpub = ctx.socket(SocketType::XPub)?;
  let monitor = xpub.monitor().await?;
  let endpoint = xpub.listen("tcp://127.0.0.1:0").await?;

  let first = ctx.socket(SocketType::Sub)?;
  let second = ctx.socket(SocketType::Sub)?;
  first.dial(&endpoint).await?;
  second.dial(&endpoint).await?;
  for _ in 0..2 {
    common::wait_for_handshake(&monitor).await.map_err(ZmqError::Internal)?;
  }
  first.set_option(SUBSCRIBE, "weather").await?;

  let notice = recv_timeout(&xpub, LONG_TIMEOUT).await?;
  assert_eq!(notice.frames(), &[Bytes::from_static(b"\x01weather")]);

  // A second subscriber to a known topic produces no notice.
  second.set_option(SUBSCRIBE, "weather").await?;
  assert!(matches!(recv_timeout(&xpub, SHORT_TIMEOUT).await, Err(ZmqError::Timeout)));

  first.set_option(UNSUBSCRIBE, "weather").await?;
  assert!(matches!(recv_timeout(&xpub, SHORT_TIMEOUT).await, Err(ZmqError::Timeout)));

  // The last subscriber leaving cancels the topic.
  second.close().await?;
  let notice = recv_timeout(&xpub, LONG_TIMEOUT).await?;
  assert_eq!(notice.frames(), &[Bytes::from_static(b"\x00weather")]);

  ctx.term().await
}

#[tokio::test]
async fn test_xsub_subscribes_by_message() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let xsub = ctx.socket(SocketType::XSub)?;

  let endpoint = publisher.listen("tcp://127.0.0.1:0").await?;
  xsub.dial(&endpoint).await?;
  xsub.send(Msg::from_static(b"\x01alerts")).await?;
  await_subscription(&publisher, &xsub, "alerts-marker").await?;

  publisher.send("alerts: disk full").await?;
  publisher.send("debug: noise").await?;
  assert_eq!(texts(&recv_timeout(&xsub, LONG_TIMEOUT).await?), vec!["alerts: disk full"]);
  assert!(matches!(recv_timeout(&xsub, SHORT_TIMEOUT).await, Err(ZmqError::Timeout)));

  ctx.term().await
}

#[tokio::test]
async fn test_xpub_xsub_proxy_chain() -> Result<(), ZmqError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let upstream = publisher.listen("tcp://127.0.0.1:0").await?;

  let xsub = ctx.socket(SocketType::XSub)?;
  let xpub = ctx.socket(SocketType::XPub)?;
  xsub.dial(&upstream).await?;
  let downstream = xpub.listen("tcp://127.0.0.1:0").await?;

  let subscriber = ctx.socket(SocketType::Sub)?;
  subscriber.dial(&downstream).await?;
  subscriber.set_option(SUBSCRIBE, "q").await?;

  // Forward the subscription upstream, as a proxy would.
  let notice = recv_timeout(&xpub, LONG_TIMEOUT).await?;
  xsub.send(notice).await?;

  for _ in 0..50 {
    publisher.send("q-marker").await?;
    if let Ok(msg) = recv_timeout(&xsub, std::time::Duration::from_millis(50)).await {
      xpub.send(msg).await?;
      break;
    }
  }
  let received = recv_timeout(&subscriber, LONG_TIMEOUT).await?;
  assert_eq!(texts(&received), vec!["q-marker"]);

  ctx.term().await
}
