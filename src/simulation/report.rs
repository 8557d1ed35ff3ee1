//! Run reporting.
//!
//! Tracks total assignment cost round by round and packages a finished run
//! for serialization.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AlgorithmKind;
use crate::error::Result;
use crate::protocol::MailerStats;
use crate::Value;

/// Total cost after every round; entry 0 is the initial assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostTrace {
    costs: Vec<f64>,
}

impl CostTrace {
    /// Start a trace at the initial cost
    pub fn new(initial: f64) -> Self {
        Self { costs: vec![initial] }
    }

    /// Record the cost after a round
    pub fn record(&mut self, cost: f64) {
        self.costs.push(cost);
    }

    /// Every recorded cost, initial first
    pub fn per_round(&self) -> &[f64] {
        &self.costs
    }

    /// Cost at each cycle boundary, initial first.
    pub fn per_cycle(&self, cycle_len: usize) -> Vec<f64> {
        self.costs.iter().step_by(cycle_len.max(1)).copied().collect()
    }

    /// Most recent cost
    pub fn last(&self) -> f64 {
        self.costs.last().copied().unwrap_or_default()
    }

    /// Lowest cost seen
    pub fn best(&self) -> f64 {
        self.costs.iter().copied().reduce(f64::min).unwrap_or_default()
    }

    /// Initial minus final cost
    pub fn improvement(&self) -> f64 {
        self.costs.first().copied().unwrap_or_default() - self.last()
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier
    pub id: Uuid,
    /// When the report was produced
    pub finished_at: DateTime<Utc>,
    /// Algorithm, when built from config
    pub algorithm: Option<AlgorithmKind>,
    /// Number of agents
    pub agents: usize,
    /// Rounds per cycle
    pub cycle_len: usize,
    /// Rounds run
    pub rounds: usize,
    /// Cost trace
    pub trace: CostTrace,
    /// Cost after the last round
    pub final_cost: f64,
    /// Lowest cost seen
    pub best_cost: f64,
    /// Value of every agent at the end, by id
    pub final_assignment: Vec<Value>,
    /// Message counters
    pub messages: MailerStats,
    /// Wall time in milliseconds
    pub elapsed_ms: f64,
}

impl RunReport {
    pub(crate) fn new(
        algorithm: Option<AlgorithmKind>,
        agents: usize,
        cycle_len: usize,
        trace: CostTrace,
        final_assignment: Vec<Value>,
        messages: MailerStats,
        elapsed: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            finished_at: Utc::now(),
            algorithm,
            agents,
            cycle_len,
            rounds: trace.per_round().len().saturating_sub(1),
            final_cost: trace.last(),
            best_cost: trace.best(),
            trace,
            final_assignment,
            messages,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }

    /// Cost at each cycle boundary.
    pub fn cycle_costs(&self) -> Vec<f64> {
        self.trace.per_cycle(self.cycle_len)
    }

    /// Completed cycles.
    pub fn cycles(&self) -> usize {
        self.rounds / self.cycle_len.max(1)
    }

    /// Write the report as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let algorithm = self.algorithm.map_or("custom", |a| a.name());
        format!(
            "{algorithm}: {} agents, {} cycles ({} rounds), cost {} -> {} (best {}), {} messages",
            self.agents,
            self.cycles(),
            self.rounds,
            self.trace.per_round().first().copied().unwrap_or_default(),
            self.final_cost,
            self.best_cost,
            self.messages.total(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace() -> CostTrace {
        let mut trace = CostTrace::new(20.0);
        for cost in [18.0, 15.0, 16.0, 12.0, 12.0, 13.0] {
            trace.record(cost);
        }
        trace
    }

    #[test]
    fn test_trace_stats() {
        let trace = trace();
        assert_eq!(trace.last(), 13.0);
        assert_eq!(trace.best(), 12.0);
        assert_eq!(trace.improvement(), 7.0);
    }

    #[test]
    fn test_per_cycle() {
        let trace = trace();
        assert_eq!(trace.per_cycle(1).len(), 7);
        assert_eq!(trace.per_cycle(3), vec![20.0, 16.0, 13.0]);
    }

    #[test]
    fn test_empty_trace() {
        let trace = CostTrace::default();
        assert_eq!(trace.last(), 0.0);
        assert_eq!(trace.best(), 0.0);
    }

    #[test]
    fn test_report_fields() {
        let report = RunReport::new(
            Some(AlgorithmKind::Mgm2),
            4,
            3,
            trace(),
            vec![0, 1, 1, 0],
            MailerStats::default(),
            Duration::from_millis(2),
        );
        assert_eq!(report.rounds, 6);
        assert_eq!(report.cycles(), 2);
        assert_eq!(report.final_cost, 13.0);
        assert_eq!(report.best_cost, 12.0);
        assert_eq!(report.cycle_costs(), vec![20.0, 16.0, 13.0]);
        assert!(report.summary().starts_with("MGM-2: 4 agents, 2 cycles"));
    }

    #[test]
    fn test_report_save() {
        let report = RunReport::new(
            None,
            1,
            1,
            CostTrace::new(0.0),
            vec![0],
            MailerStats::default(),
            Duration::ZERO,
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.save(&path).unwrap();

        let loaded: RunReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.final_assignment, vec![0]);
    }
}
