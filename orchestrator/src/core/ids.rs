//! Time-derived identifiers that never repeat within a process.

/// Hands out ids based on a millisecond clock reading, bumping past the last
/// issued value so two ids taken in the same millisecond still differ.
#[derive(Debug, Clone, Default)]
pub struct IdSource {
    last: u64,
}

impl IdSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after an id that is already in use (e.g. from a loaded queue).
    pub fn resume_after(last: u64) -> Self {
        Self { last }
    }

    /// Next id for a clock reading of `now_ms`.
    pub fn next_at(&mut self, now_ms: u64) -> u64 {
        self.last = now_ms.max(self.last.saturating_add(1));
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_millisecond_still_increases() {
        let mut ids = IdSource::new();
        let a = ids.next_at(1_000);
        let b = ids.next_at(1_000);
        let c = ids.next_at(1_000);
        assert_eq!((a, b, c), (1_000, 1_001, 1_002));
    }

    #[test]
    fn clock_going_backwards_does_not_reuse_ids() {
        let mut ids = IdSource::resume_after(5_000);
        assert_eq!(ids.next_at(10), 5_001);
        assert_eq!(ids.next_at(9_000), 9_000);
    }
}
