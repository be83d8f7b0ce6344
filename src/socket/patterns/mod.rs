// src/socket/patterns/mod.rs

pub(crate) mod fair_queue;
pub(crate) mod load_balancer;
pub(crate) mod router;
pub(crate) mod trie;

pub(crate) use fair_queue::FairQueue;
pub(crate) use load_balancer::LoadBalancer;
pub(crate) use router::RouterMap;
pub(crate) use trie::{SubscriptionTrie, MAX_TOPIC_LENGTH};
