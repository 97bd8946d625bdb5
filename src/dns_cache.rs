use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::trace;

use crate::dns_msg::{Query, Record};

#[derive(Debug)]
struct CacheEntry {
    record: Record,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.record.lifetime()
    }
}

/// Answers keyed by the question that produced them, one record per question.
///
/// Expired entries are only dropped when a lookup runs into them.
#[derive(Debug, Default)]
pub struct DNSCache {
    entries: Mutex<HashMap<Query, CacheEntry>>,
}

impl DNSCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, question: &Query) -> Option<Record> {
        self.lookup_at(question, Instant::now())
    }

    pub fn lookup_at(&self, question: &Query, now: Instant) -> Option<Record> {
        let mut entries = self.entries();

        let entry = entries.get(question)?;
        if !entry.is_expired(now) {
            return Some(entry.record.clone());
        }

        trace!(question = %question, "evicting expired entry");
        entries.remove(question);
        None
    }

    pub fn insert(&self, question: Query, record: Record) {
        self.insert_at(question, record, Instant::now());
    }

    pub fn insert_at(&self, question: Query, record: Record, now: Instant) {
        self.entries().insert(
            question,
            CacheEntry {
                record,
                created_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Query, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
