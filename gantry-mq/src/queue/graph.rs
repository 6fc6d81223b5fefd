//! Per-queue dependency graph: resolution counters and waiter lists.

// Layer 1: Standard library imports
use std::collections::BTreeMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none for this module)

// Layer 3: Internal module imports
use super::record::MessageRecord;
use crate::message::Dependency;

/// State of one dependency key.
#[derive(Debug, Default)]
pub(crate) struct DependencyEntry {
    /// How many times this key has been resolved so far.
    pub(crate) n_resolved: u64,
    /// Messages whose remaining need against this key is still positive,
    /// in registration order.
    pub(crate) waiters: Vec<Arc<MessageRecord>>,
}

/// Mapping from dependency key to its resolution counter and waiters.
///
/// Every operation runs under the owning engine's exclusive lock on the
/// graph. Registration and resolution both mutate waiter `n_deps` counters
/// under that lock, which is what guarantees that exactly one code path
/// observes a message's count dropping to zero and frees it.
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    entries: BTreeMap<String, DependencyEntry>,
}

impl DependencyGraph {
    /// Register `record` against `deps`.
    ///
    /// For each `(key, n)` the record's remaining count grows by
    /// `max(0, n - n_resolved)`; keys whose resolution count already covers
    /// the requirement contribute nothing. Absent keys are created with a
    /// zero counter.
    pub(crate) fn register(&mut self, record: &Arc<MessageRecord>, deps: &[Dependency]) {
        for dep in deps {
            let entry = self.entries.entry(dep.key.clone()).or_default();
            let needed = u64::from(dep.n).saturating_sub(entry.n_resolved);
            if needed > 0 {
                record.add_deps(needed as u32);
                entry.waiters.push(Arc::clone(record));
            }
        }
    }

    /// Resolve `key` once and return the waiters that became ready.
    ///
    /// The key is created with a counter of one when absent, so an ack that
    /// arrives before any dependent registered is still counted. Every waiter
    /// consumes one contribution; those that drop to zero are removed and
    /// returned in registration order. Entries already at zero were freed
    /// through another key and are swept out without another decrement.
    pub(crate) fn resolve(&mut self, key: &str) -> Vec<Arc<MessageRecord>> {
        let entry = self.entries.entry(key.to_string()).or_default();
        entry.n_resolved += 1;

        let mut ready = Vec::new();
        entry.waiters.retain(|waiter| {
            if waiter.n_deps() == 0 {
                return false; // stale: freed through another key
            }
            if waiter.consume_dep() == 0 {
                ready.push(Arc::clone(waiter));
                return false;
            }
            true
        });
        ready
    }

    /// Current resolution count for `key` (zero when absent).
    #[cfg(test)]
    pub(crate) fn n_resolved(&self, key: &str) -> u64 {
        self.entries.get(key).map_or(0, |e| e.n_resolved)
    }

    /// Iterate over all entries (snapshot export).
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&String, &DependencyEntry)> {
        self.entries.iter()
    }

    /// Install an entry rebuilt from a snapshot.
    pub(crate) fn restore_entry(
        &mut self,
        key: String,
        n_resolved: u64,
        waiters: Vec<Arc<MessageRecord>>,
    ) {
        self.entries.insert(
            key,
            DependencyEntry {
                n_resolved,
                waiters,
            },
        );
    }
}
