//! Simulation metrics.

/// Counters collected while driving a calculator session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationMetrics {
    /// Steps executed, assertions included.
    pub steps_executed: u64,
    /// Keystrokes dropped at the amount cap.
    pub ignored_keystrokes: u64,
    /// History entries recorded (commits and background snapshots).
    pub entries_recorded: u64,
    pub assertions_passed: u64,
    pub assertions_failed: u64,
    pub failed_refreshes: u64,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&mut self) {
        self.steps_executed += 1;
    }

    pub fn record_entry(&mut self, recorded: bool) {
        if recorded {
            self.entries_recorded += 1;
        }
    }

    pub fn record_assertion(&mut self, passed: bool) {
        if passed {
            self.assertions_passed += 1;
        } else {
            self.assertions_failed += 1;
        }
    }

    /// Whether every assertion so far held.
    pub fn all_passed(&self) -> bool {
        self.assertions_failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_step();
        metrics.record_entry(true);
        metrics.record_entry(false);
        metrics.record_assertion(true);
        assert!(metrics.all_passed());

        metrics.record_assertion(false);
        assert_eq!(metrics.steps_executed, 1);
        assert_eq!(metrics.entries_recorded, 1);
        assert!(!metrics.all_passed());
    }
}
