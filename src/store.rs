use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A stored short link.
///
/// `token` is the owner credential captured at creation time; management
/// requests must present a matching value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub hash: String,
    pub url: String,
    pub token: String,
}

/// One redirection through a short link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkAccessEvent {
    pub hash: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub client_ip: String,
    pub user_agent: String,
}

impl LinkAccessEvent {
    pub fn now(hash: &str, client_ip: &str, user_agent: &str) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            hash: hash.to_string(),
            timestamp,
            client_ip: client_ip.to_string(),
            user_agent: user_agent.to_string(),
        }
    }
}

/// Read/write access to link records keyed by hash.
///
/// The production backend is a document store; handlers only depend on
/// this seam so tests run against the in-memory implementation.
pub trait LinkStore: Send + Sync {
    fn find(&self, hash: &str) -> Option<Link>;
    fn insert(&self, link: Link);
    /// Returns whether a record was removed.
    fn delete(&self, hash: &str) -> bool;
}

/// Append/query access to per-hash redirection events.
///
/// `find_page` must return records in a stable, store-defined order
/// (insertion order here) so repeated queries against an unmodified log
/// paginate identically.
pub trait AccessLogStore: Send + Sync {
    fn append(&self, event: LinkAccessEvent);
    fn count(&self, hash: &str) -> u64;
    fn find_page(&self, hash: &str, skip: u64, limit: u64) -> Vec<LinkAccessEvent>;
    /// Removes every event for `hash`, returning how many were dropped.
    fn delete_all(&self, hash: &str) -> u64;
}

#[derive(Default)]
pub struct MemoryLinkStore {
    links: DashMap<String, Link>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkStore for MemoryLinkStore {
    fn find(&self, hash: &str) -> Option<Link> {
        self.links.get(hash).map(|entry| entry.value().clone())
    }

    fn insert(&self, link: Link) {
        self.links.insert(link.hash.clone(), link);
    }

    fn delete(&self, hash: &str) -> bool {
        self.links.remove(hash).is_some()
    }
}

/// Append-only in-memory access log, one insertion-ordered vector per hash.
#[derive(Default)]
pub struct MemoryAccessLogStore {
    events: DashMap<String, Vec<LinkAccessEvent>>,
}

impl MemoryAccessLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccessLogStore for MemoryAccessLogStore {
    fn append(&self, event: LinkAccessEvent) {
        self.events
            .entry(event.hash.clone())
            .or_default()
            .push(event);
    }

    fn count(&self, hash: &str) -> u64 {
        self.events
            .get(hash)
            .map(|entry| entry.value().len() as u64)
            .unwrap_or(0)
    }

    fn find_page(&self, hash: &str, skip: u64, limit: u64) -> Vec<LinkAccessEvent> {
        match self.events.get(hash) {
            Some(entry) => entry
                .value()
                .iter()
                .skip(skip as usize)
                .take(limit as usize)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    fn delete_all(&self, hash: &str) -> u64 {
        self.events
            .remove(hash)
            .map(|(_, events)| events.len() as u64)
            .unwrap_or(0)
    }
}
