// src/socket/patterns/trie.rs

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;

use crate::runtime::PeerId;

/// Longest topic a subscription may carry; longer ones are ignored.
pub(crate) const MAX_TOPIC_LENGTH: usize = 8192;

/// Topic prefixes per subscriber. A message matches a subscriber when one
/// of its prefixes is a prefix of the message's first frame; the empty
/// prefix matches everything.
///
/// Counts are kept per subscriber, so the same prefix subscribed twice by one
/// peer needs two cancels.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionTrie {
  topics: BTreeMap<Bytes, HashMap<PeerId, usize>>,
  /// How many stored topics have each length; matching checks only these.
  lengths: BTreeMap<usize, usize>,
}

impl SubscriptionTrie {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns true when `topic` had no subscribers before.
  pub fn subscribe(&mut self, subscriber: PeerId, topic: &[u8]) -> bool {
    if topic.len() > MAX_TOPIC_LENGTH {
      tracing::warn!(subscriber, len = topic.len(), "Ignoring oversized subscription");
      return false;
    }
    let was_new = !self.topics.contains_key(topic);
    if was_new {
      *self.lengths.entry(topic.len()).or_insert(0) += 1;
    }
    let counts = self.topics.entry(Bytes::copy_from_slice(topic)).or_default();
    *counts.entry(subscriber).or_insert(0) += 1;
    tracing::trace!(subscriber, topic = ?String::from_utf8_lossy(topic), "Subscribed");
    was_new
  }

  /// Returns true when the last subscription to `topic` went away.
  /// Cancelling something never subscribed is a no-op.
  pub fn unsubscribe(&mut self, subscriber: PeerId, topic: &[u8]) -> bool {
    let Some(counts) = self.topics.get_mut(topic) else {
      return false;
    };
    let removed = match counts.get_mut(&subscriber) {
      Some(count) if *count > 1 => {
        *count -= 1;
        false
      }
      Some(_) => {
        counts.remove(&subscriber);
        counts.is_empty()
      }
      None => false,
    };
    if removed {
      self.topics.remove(topic);
      self.forget_length(topic.len());
    }
    tracing::trace!(subscriber, topic = ?String::from_utf8_lossy(topic), removed, "Unsubscribed");
    removed
  }

  fn forget_length(&mut self, len: usize) {
    if let Some(count) = self.lengths.get_mut(&len) {
      *count -= 1;
      if *count == 0 {
        self.lengths.remove(&len);
      }
    }
  }

  /// Drops everything `subscriber` subscribed to. Returns the topics left
  /// with no subscribers at all.
  pub fn remove_subscriber(&mut self, subscriber: PeerId) -> Vec<Bytes> {
    let mut vanished = Vec::new();
    self.topics.retain(|topic, counts| {
      if counts.remove(&subscriber).is_some() && counts.is_empty() {
        vanished.push(topic.clone());
        return false;
      }
      true
    });
    for topic in &vanished {
      self.forget_length(topic.len());
    }
    vanished
  }

  /// Stored topics that are prefixes of `data`, shortest first.
  fn prefixes_of<'a>(&'a self, data: &'a [u8]) -> impl Iterator<Item = &'a HashMap<PeerId, usize>> + 'a {
    self
      .lengths
      .range(..=data.len())
      .filter_map(move |(&len, _)| self.topics.get(&data[..len]))
  }

  /// Subscribers with at least one prefix matching `data`, each once.
  pub fn matching_subscribers(&self, data: &[u8]) -> Vec<PeerId> {
    let mut matched: Vec<PeerId> = Vec::new();
    for counts in self.prefixes_of(data) {
      for &subscriber in counts.keys() {
        if !matched.contains(&subscriber) {
          matched.push(subscriber);
        }
      }
    }
    matched
  }

  /// True when any subscription matches `data`.
  pub fn matches(&self, data: &[u8]) -> bool {
    self.prefixes_of(data).next().is_some()
  }

  /// Every topic `subscriber` holds, once per topic.
  pub fn topics_of(&self, subscriber: PeerId) -> Vec<Bytes> {
    self
      .topics
      .iter()
      .filter(|(_, counts)| counts.contains_key(&subscriber))
      .map(|(topic, _)| topic.clone())
      .collect()
  }

  pub fn is_empty(&self) -> bool {
    self.topics.is_empty()
  }
}
