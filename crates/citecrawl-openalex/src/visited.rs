//! Visited identifier registry
//!
//! The sole deduplication authority for the crawl: an identifier enters a
//! frontier only through [`VisitedRegistry::admit`]. Grows monotonically
//! for the duration of a run.

use std::sync::Mutex;

use rustc_hash::FxHashSet;

use crate::record::WorkId;

/// Set of every identifier that has ever entered a frontier.
#[derive(Debug, Default)]
pub struct VisitedRegistry {
    set: Mutex<FxHashSet<WorkId>>,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an identifier, returning true only for the first caller.
    /// Atomic with respect to concurrent admits of the same identifier.
    pub fn admit(&self, id: &str) -> bool {
        self.set
            .lock()
            .expect("visited registry poisoned")
            .insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.set
            .lock()
            .expect("visited registry poisoned")
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.set.lock().expect("visited registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_admit_wins() {
        let registry = VisitedRegistry::new();
        assert!(registry.admit("W1"));
        assert!(!registry.admit("W1"));
        assert!(registry.contains("W1"));
        assert!(!registry.contains("W2"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_admits_admit_exactly_once() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let registry = Arc::new(VisitedRegistry::new());
        let admitted = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let admitted = admitted.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..200 {
                    if registry.admit(&format!("W{i}")) {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(admitted.load(Ordering::Relaxed), 200);
        assert_eq!(registry.len(), 200);
    }
}
