use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Monotonic tag attached to every fetch or probe at initiation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "g{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Stale,
}

/// Issues generations and decides which responses are still authoritative.
///
/// Only the most recently issued generation may mutate state. The check and
/// the mutation run under the same lock, so a newer `issue` can never slip in
/// between them.
#[derive(Debug, Default)]
pub struct GenerationClock {
    latest: Mutex<u64>,
}

impl GenerationClock {
    pub fn new() -> Self { Self::default() }

    pub fn issue(&self) -> Generation {
        let mut g = self.latest.lock();
        *g += 1;
        Generation(*g)
    }

    /// Issue a generation and run `f` with it while still holding the lock.
    pub fn issue_with<R>(&self, f: impl FnOnce(Generation) -> R) -> R {
        let mut g = self.latest.lock();
        *g += 1;
        f(Generation(*g))
    }

    pub fn latest(&self) -> Generation { Generation(*self.latest.lock()) }

    pub fn is_current(&self, gen: Generation) -> bool { *self.latest.lock() == gen.0 }

    /// Invalidate every outstanding generation without starting anything new.
    pub fn supersede(&self) -> Generation { self.issue() }

    /// Run `f` only if `gen` is still the latest issued generation.
    pub fn apply_if_current(&self, gen: Generation, f: impl FnOnce()) -> ApplyOutcome {
        let g = self.latest.lock();
        if *g != gen.0 {
            return ApplyOutcome::Stale;
        }
        f();
        ApplyOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_applies() {
        let clock = GenerationClock::new();
        let a = clock.issue();
        let b = clock.issue();
        assert!(a < b);
        let mut hits = Vec::new();
        assert_eq!(clock.apply_if_current(a, || hits.push("a")), ApplyOutcome::Stale);
        assert_eq!(clock.apply_if_current(b, || hits.push("b")), ApplyOutcome::Applied);
        assert_eq!(hits, vec!["b"]);
    }

    #[test]
    fn supersede_invalidates_outstanding() {
        let clock = GenerationClock::new();
        let a = clock.issue();
        clock.supersede();
        assert!(!clock.is_current(a));
        assert_eq!(clock.latest(), Generation(2));
    }

    #[test]
    fn issue_with_sees_its_own_generation() {
        let clock = GenerationClock::new();
        let seen = clock.issue_with(|g| g);
        assert_eq!(seen, Generation(1));
        assert!(clock.is_current(seen));
    }
}
