//! Arena statistics tracking

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time view of an arena
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Total arena size in bytes
    pub capacity: usize,
    /// Bytes handed out in the current epoch, padding included
    pub used: usize,
    /// Bytes still available
    pub available: usize,
    /// High-water mark of `used` since construction
    pub peak_used: usize,
    /// Successful allocations (counted only with `track_stats`)
    pub allocations: usize,
    /// Failed allocations (counted only with `track_stats`)
    pub failed_allocations: usize,
    /// Completed resets (counted only with `track_stats`)
    pub resets: usize,
    /// Constructed values still waiting for their destructor
    pub pending_drops: usize,
    /// Current epoch number
    pub generation: u32,
}

impl ArenaStats {
    /// Fraction of the arena in use (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.used as f64 / self.capacity as f64
        }
    }
}

impl fmt::Display for ArenaStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Arena Statistics:")?;
        writeln!(
            f,
            "  Used: {} / {} bytes ({:.1}%)",
            self.used,
            self.capacity,
            self.utilization() * 100.0
        )?;
        writeln!(f, "  Peak used: {} bytes", self.peak_used)?;
        writeln!(f, "  Allocations: {}", self.allocations)?;
        writeln!(f, "  Failed allocations: {}", self.failed_allocations)?;
        writeln!(f, "  Resets: {}", self.resets)?;
        writeln!(f, "  Pending drops: {}", self.pending_drops)?;
        write!(f, "  Generation: {}", self.generation)
    }
}

#[derive(Default)]
struct Counters {
    allocations: AtomicUsize,
    failed_allocations: AtomicUsize,
    resets: AtomicUsize,
}

/// Counters that cost nothing when disabled
pub(crate) struct OptionalStats {
    counters: Option<Counters>,
}

impl OptionalStats {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            counters: enabled.then(Counters::default),
        }
    }

    #[inline]
    pub(crate) fn record_allocation(&self) {
        if let Some(ref counters) = self.counters {
            counters.allocations.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_failure(&self) {
        if let Some(ref counters) = self.counters {
            counters.failed_allocations.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn record_reset(&self) {
        if let Some(ref counters) = self.counters {
            counters.resets.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Copies the counters into `stats`
    pub(crate) fn fill(&self, stats: &mut ArenaStats) {
        if let Some(ref counters) = self.counters {
            stats.allocations = counters.allocations.load(Ordering::Relaxed);
            stats.failed_allocations = counters.failed_allocations.load(Ordering::Relaxed);
            stats.resets = counters.resets.load(Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_stats() {
        let enabled = OptionalStats::new(true);
        let disabled = OptionalStats::new(false);

        for stats in [&enabled, &disabled] {
            stats.record_allocation();
            stats.record_allocation();
            stats.record_failure();
            stats.record_reset();
        }

        let mut snapshot = ArenaStats::default();
        enabled.fill(&mut snapshot);
        assert_eq!(snapshot.allocations, 2);
        assert_eq!(snapshot.failed_allocations, 1);
        assert_eq!(snapshot.resets, 1);

        let mut snapshot = ArenaStats::default();
        disabled.fill(&mut snapshot);
        assert_eq!(snapshot, ArenaStats::default());
    }

    #[test]
    fn test_display_format() {
        let stats = ArenaStats {
            capacity: 1024,
            used: 256,
            available: 768,
            allocations: 10,
            ..ArenaStats::default()
        };

        let display = stats.to_string();
        assert!(display.contains("256 / 1024 bytes"));
        assert!(display.contains("25.0%"));
        assert!(display.contains("Allocations: 10"));
    }
}
