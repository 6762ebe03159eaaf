use crate::schedule::ElapsedRule;
use log::LevelFilter;

/// Settings for a [`crate::tracker::LoanTracker`].
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TrackerConfig {
    /// How date-driven loans count elapsed installments.
    pub elapsed_rule: ElapsedRule,
    /// Write recomputed statuses back to the store when they drift.
    pub reconcile_status: bool,
    pub log_level: LevelFilter,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            elapsed_rule: ElapsedRule::default(),
            reconcile_status: true,
            log_level: LevelFilter::Info,
        }
    }
}

impl TrackerConfig {
    pub fn with_elapsed_rule(mut self, elapsed_rule: ElapsedRule) -> Self {
        self.elapsed_rule = elapsed_rule;
        self
    }

    pub fn with_reconcile_status(mut self, reconcile_status: bool) -> Self {
        self.reconcile_status = reconcile_status;
        self
    }

    pub fn with_log_level(mut self, log_level: LevelFilter) -> Self {
        self.log_level = log_level;
        self
    }
}
