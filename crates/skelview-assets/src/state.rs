//! Load progress bookkeeping.

use std::sync::Arc;

use indexmap::IndexMap;
use skelview_core::alloc::HashMap;

use crate::error::AssetError;
use crate::locator::Locator;

/// Where a locator is in the loading pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Never requested, or removed.
    NotLoaded,

    /// At least one request for the locator is still pending.
    Loading,

    /// Stored in the cache.
    Loaded,

    /// The latest load failed and nothing is stored.
    Failed,
}

impl LoadState {
    /// Returns true if loading has completed (successfully or not).
    pub fn is_done(&self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Failed)
    }
}

/// Counters and error map shared by every load a cache issues.
///
/// `outstanding` counts issued loads that have not completed yet, and
/// `completed` counts every completion, successful or not. Each issued load
/// completes exactly once, so `outstanding` returns to zero once the last
/// pending load resolves.
#[derive(Debug, Default)]
pub struct Ledger {
    outstanding: usize,
    completed: usize,
    errors: IndexMap<Locator, Arc<AssetError>>,
    in_flight: HashMap<Locator, u32>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly issued load.
    pub fn issue(&mut self, locator: &Locator) {
        self.outstanding += 1;
        *self.in_flight.entry(locator.clone()).or_insert(0) += 1;
    }

    /// Record a completion, success or failure.
    pub fn finish(&mut self, locator: &Locator) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.completed += 1;
        if let Some(count) = self.in_flight.get_mut(locator) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(locator);
            }
        }
    }

    /// Record an error, replacing any earlier one for the locator.
    pub fn record_error(&mut self, locator: &Locator, error: Arc<AssetError>) {
        self.errors.insert(locator.clone(), error);
    }

    pub fn clear_error(&mut self, locator: &Locator) {
        self.errors.shift_remove(locator);
    }

    pub fn error(&self, locator: &str) -> Option<&Arc<AssetError>> {
        self.errors.get(locator)
    }

    /// Errors in the order they were first recorded.
    pub fn errors(&self) -> impl Iterator<Item = (&Locator, &Arc<AssetError>)> {
        self.errors.iter()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding == 0
    }

    pub fn is_loading(&self, locator: &str) -> bool {
        self.in_flight.contains_key(locator)
    }

    /// Forget all progress and errors.
    pub fn reset(&mut self) {
        self.outstanding = 0;
        self.completed = 0;
        self.errors.clear();
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_finish() {
        let mut ledger = Ledger::new();
        let a = Locator::new("a.png");
        let b = Locator::new("b.png");
        ledger.issue(&a);
        ledger.issue(&b);
        ledger.issue(&a);
        assert_eq!(ledger.outstanding(), 3);
        assert!(ledger.is_loading("a.png"));

        ledger.finish(&a);
        assert!(ledger.is_loading("a.png"));
        ledger.finish(&b);
        ledger.finish(&a);
        assert!(!ledger.is_loading("a.png"));
        assert!(ledger.is_complete());
        assert_eq!(ledger.completed(), 3);
    }

    #[test]
    fn test_errors_keep_first_insertion_order() {
        let mut ledger = Ledger::new();
        let first = Locator::new("first");
        let second = Locator::new("second");
        ledger.record_error(&first, Arc::new(AssetError::loader("first", "bad")));
        ledger.record_error(&second, Arc::new(AssetError::loader("second", "bad")));
        ledger.record_error(&first, Arc::new(AssetError::loader("first", "worse")));

        let order: Vec<_> = ledger.errors().map(|(l, _)| l.as_str()).collect();
        assert_eq!(order, ["first", "second"]);
        assert!(ledger.error("first").unwrap().to_string().contains("worse"));

        ledger.clear_error(&first);
        assert!(ledger.error("first").is_none());
        assert!(ledger.has_errors());
    }

    #[test]
    fn test_reset() {
        let mut ledger = Ledger::new();
        let a = Locator::new("a");
        ledger.issue(&a);
        ledger.record_error(&a, Arc::new(AssetError::loader("a", "x")));
        ledger.reset();
        assert!(ledger.is_complete());
        assert!(!ledger.has_errors());
        assert_eq!(ledger.completed(), 0);
    }
}
