//! Monotonic, time-stamped identifiers (spec §3, §4.1).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A process-wide unique identifier: `(counter, date)`.
///
/// Ordering is lexicographic on `(date, counter)`; an `Id` is valid iff
/// `counter != 0`. `Id::INVALID` is the zero value used as a sentinel in
/// fields that may not yet refer to anything (e.g. `Order::orig_order_id`
/// before a replace is requested).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Id {
    date: u32,
    counter: u64,
}

impl Id {
    pub const INVALID: Id = Id { date: 0, counter: 0 };

    pub fn new(counter: u64, date: u32) -> Self {
        Id { date, counter }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn date(&self) -> u32 {
        self.date
    }

    pub fn is_valid(&self) -> bool {
        self.counter != 0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.date, self.counter)
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::INVALID
    }
}

/// Mints monotonically increasing [`Id`]s. One instance is shared
/// process-wide; the counter never resets and is never reused (spec §4.1,
/// invariant 5 in spec §8).
pub struct IdentifierGenerator {
    counter: AtomicU64,
}

impl IdentifierGenerator {
    pub fn new() -> Self {
        IdentifierGenerator {
            counter: AtomicU64::new(1),
        }
    }

    /// Atomically mints the next `Id`, paired with the current wall-clock
    /// second. Dates may repeat across mints within the same second; the
    /// counter alone is what guarantees uniqueness.
    pub fn next(&self) -> Id {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        Id::new(counter, current_epoch_secs())
    }

    /// Advances the counter so the next mint is guaranteed greater than
    /// every id replayed from the durable log (spec §4.13: recovery must
    /// not hand out a counter value already seen on disk).
    pub fn fast_forward_past(&self, highest_seen: Id) {
        if !highest_seen.is_valid() {
            return;
        }
        let floor = highest_seen.counter() + 1;
        self.counter.fetch_max(floor, Ordering::Relaxed);
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn current_epoch_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn invalid_sentinel_has_zero_counter() {
        assert!(!Id::INVALID.is_valid());
        assert!(!Id::default().is_valid());
    }

    #[test]
    fn generator_never_repeats_a_counter() {
        let gen = IdentifierGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let id = gen.next();
            assert!(id.is_valid());
            assert!(seen.insert(id.counter()), "counter reused: {id}");
        }
    }

    #[test]
    fn ordering_is_lexicographic_on_date_then_counter() {
        let a = Id::new(5, 100);
        let b = Id::new(1, 200);
        assert!(a < b, "earlier date must sort first regardless of counter");
    }

    #[test]
    fn generator_is_safe_across_threads() {
        let gen = std::sync::Arc::new(IdentifierGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gen = gen.clone();
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| gen.next()).collect::<Vec<_>>()
            }));
        }
        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id.counter()));
            }
        }
        assert_eq!(all.len(), 8000);
    }
}
