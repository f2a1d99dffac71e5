//! Caps on the number of records a scan may emit.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Deserialize;

/// Optional record caps. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecordLimit {
    /// Maximum records taken from a single repository.
    pub per_repository: Option<usize>,
    /// Maximum records across the whole scan.
    pub total: Option<usize>,
}

impl RecordLimit {
    /// No caps at all.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            per_repository: None,
            total: None,
        }
    }

    /// Whether a repository that already produced `emitted` records may add another.
    #[must_use]
    pub const fn repository_allows(&self, emitted: usize) -> bool {
        match self.per_repository {
            Some(cap) => emitted < cap,
            None => true,
        }
    }
}

/// Scan-wide record counter shared by every worker.
#[derive(Debug, Default)]
pub struct RecordBudget {
    cap: Option<usize>,
    used: AtomicUsize,
}

impl RecordBudget {
    /// Budget allowing at most `cap` records.
    #[must_use]
    pub const fn new(cap: Option<usize>) -> Self {
        Self {
            cap,
            used: AtomicUsize::new(0),
        }
    }

    /// Claim one record slot. Returns `false` once the cap is reached.
    pub fn try_claim(&self) -> bool {
        let Some(cap) = self.cap else {
            self.used.fetch_add(1, Ordering::Relaxed);
            return true;
        };
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < cap).then_some(used + 1)
            })
            .is_ok()
    }

    /// Whether no further slot can be claimed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cap
            .is_some_and(|cap| self.used.load(Ordering::Acquire) >= cap)
    }

    /// Slots claimed so far.
    #[must_use]
    pub fn claimed(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn repository_cap_is_exclusive() {
        let limit = RecordLimit {
            per_repository: Some(2),
            total: None,
        };
        assert!(limit.repository_allows(1));
        assert!(!limit.repository_allows(2));
        assert!(RecordLimit::unlimited().repository_allows(usize::MAX - 1));
    }

    #[test]
    fn budget_stops_at_cap() {
        let budget = RecordBudget::new(Some(2));
        assert!(budget.try_claim());
        assert!(budget.try_claim());
        assert!(!budget.try_claim());
        assert!(budget.is_exhausted());
        assert_eq!(budget.claimed(), 2);
    }

    #[test]
    fn concurrent_claims_never_exceed_cap() {
        let budget = Arc::new(RecordBudget::new(Some(25)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = Arc::clone(&budget);
                thread::spawn(move || (0..10).filter(|_| budget.try_claim()).count())
            })
            .collect();
        let granted: usize = handles
            .into_iter()
            .map(|handle| handle.join().expect("worker"))
            .sum();
        assert_eq!(granted, 25);
        assert_eq!(budget.claimed(), 25);
    }
}
