use crate::dispatch::Propagation;
use serde::{Deserialize, Serialize};

/// Running counters kept by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Statistics {
    pub total_scans: u64,
    pub successful_scans: u64,
    pub failed_scans: u64,
    pub nodes_discovered: u64,
    pub modules_executed: u64,
    pub vulnerabilities_found: u64,
    pub exploit_attempts: u64,
    pub exploit_successes: u64,
    pub lateral_movements: u64,
}

impl Statistics {
    pub fn record_success(&mut self) {
        self.total_scans += 1;
        self.successful_scans += 1;
    }

    pub fn record_failure(&mut self) {
        self.total_scans += 1;
        self.failed_scans += 1;
    }

    pub fn absorb(&mut self, propagation: &Propagation) {
        self.vulnerabilities_found += propagation.vulnerabilities_found;
        self.exploit_attempts += propagation.exploit_attempts;
        self.exploit_successes += propagation.exploit_successes;
        self.lateral_movements += propagation.lateral_movements;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_scans == 0 {
            0.0
        } else {
            self.successful_scans as f64 / self.total_scans as f64
        }
    }
}

/// Point-in-time view of the engine: counters plus live graph and queue sizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub statistics: Statistics,
    pub pending: usize,
    pub total_nodes: usize,
    pub completed: usize,
    pub pruned: usize,
    pub active_profile: String,
}
