//! Per-address visit state and the visited-set
//!
//! An address is claimed (`InProgress`) the moment a worker decides to fetch
//! it, before the fetch starts, so two workers can never fetch the same
//! address concurrently. A successful fetch promotes the claim to `Visited`;
//! a failed fetch releases it so the address can be retried later.

use std::collections::HashMap;
use std::sync::RwLock;

/// State of a single address in the visited-set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitState {
    /// A worker has claimed the address and is fetching it
    InProgress,

    /// The address was fetched successfully and its result emitted
    Visited,
}

/// Concurrent visited-set keyed by exact address
#[derive(Debug, Default)]
pub struct VisitedSet {
    entries: RwLock<HashMap<String, VisitState>>,
}

impl VisitedSet {
    /// Creates an empty visited-set
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state of `address`, if it has been claimed or visited
    ///
    /// Takes the read lock only.
    pub fn state(&self, address: &str) -> Option<VisitState> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(address)
            .copied()
    }

    /// Returns true if `address` is claimed or visited
    pub fn contains(&self, address: &str) -> bool {
        self.state(address).is_some()
    }

    /// Claims `address` for fetching
    ///
    /// Returns false if the address is already claimed or visited. The check
    /// and the insert happen under one write lock.
    pub fn try_claim(&self, address: &str) -> bool {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if entries.contains_key(address) {
            return false;
        }
        entries.insert(address.to_string(), VisitState::InProgress);
        true
    }

    /// Promotes a claim to `Visited`
    pub fn mark_visited(&self, address: &str) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(address.to_string(), VisitState::Visited);
    }

    /// Drops an in-progress claim after a failed fetch
    ///
    /// A `Visited` entry is never removed.
    pub fn release(&self, address: &str) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if entries.get(address) == Some(&VisitState::InProgress) {
            entries.remove(address);
        }
    }

    /// Number of addresses successfully visited
    pub fn visited_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|state| **state == VisitState::Visited)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_claim_then_visit() {
        let set = VisitedSet::new();
        assert!(!set.contains("https://example.com/"));

        assert!(set.try_claim("https://example.com/"));
        assert_eq!(
            set.state("https://example.com/"),
            Some(VisitState::InProgress)
        );
        assert_eq!(set.visited_count(), 0);

        set.mark_visited("https://example.com/");
        assert_eq!(set.state("https://example.com/"), Some(VisitState::Visited));
        assert_eq!(set.visited_count(), 1);
    }

    #[test]
    fn test_second_claim_rejected() {
        let set = VisitedSet::new();
        assert!(set.try_claim("https://example.com/a"));
        assert!(!set.try_claim("https://example.com/a"));

        set.mark_visited("https://example.com/a");
        assert!(!set.try_claim("https://example.com/a"));
    }

    #[test]
    fn test_release_allows_retry() {
        let set = VisitedSet::new();
        assert!(set.try_claim("https://example.com/broken"));
        set.release("https://example.com/broken");

        assert!(!set.contains("https://example.com/broken"));
        assert!(set.try_claim("https://example.com/broken"));
    }

    #[test]
    fn test_release_keeps_visited() {
        let set = VisitedSet::new();
        assert!(set.try_claim("https://example.com/"));
        set.mark_visited("https://example.com/");
        set.release("https://example.com/");

        assert_eq!(set.state("https://example.com/"), Some(VisitState::Visited));
    }

    #[test]
    fn test_exact_match_only() {
        let set = VisitedSet::new();
        assert!(set.try_claim("https://example.com/page"));
        assert!(set.try_claim("https://example.com/page/"));
        assert!(set.try_claim("https://EXAMPLE.com/page"));
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let set = Arc::new(VisitedSet::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let set = set.clone();
                std::thread::spawn(move || set.try_claim("https://example.com/contended"))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
