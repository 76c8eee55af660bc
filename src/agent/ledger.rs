use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

use crate::domain::{Action, ActionResult, ActionStatus, Decision};

const DEFAULT_CAPACITY: usize = 256;

/// Recorded outcome of one completed, non-stale cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRecord {
    pub id: Uuid,
    pub epoch: u64,
    pub symbol: String,
    /// `None` when the cycle never got a snapshot
    pub decision: Option<Decision>,
    pub result: ActionResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleRecord {
    pub fn action(&self) -> Option<Action> {
        self.decision.as_ref().map(|d| d.action)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    pub recorded: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub trades: u64,
    pub posts: u64,
}

/// Bounded in-memory history of cycle results
#[derive(Debug)]
pub struct CycleLedger {
    capacity: usize,
    records: VecDeque<CycleRecord>,
    stats: CycleStats,
}

impl CycleLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
            stats: CycleStats::default(),
        }
    }

    pub fn push(&mut self, record: CycleRecord) {
        self.stats.recorded += 1;
        match record.result.status {
            ActionStatus::Success => {
                self.stats.succeeded += 1;
                match record.action() {
                    Some(action) if action.is_trade() => self.stats.trades += 1,
                    Some(Action::Post) => self.stats.posts += 1,
                    _ => {}
                }
            }
            ActionStatus::Failed => self.stats.failed += 1,
            ActionStatus::Skipped => self.stats.skipped += 1,
        }

        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent first
    pub fn recent(&self, n: usize) -> Vec<CycleRecord> {
        self.records.iter().rev().take(n).cloned().collect()
    }
}

impl Default for CycleLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;
    use crate::error::ErrorKind;

    fn record(epoch: u64, action: Action, result: ActionResult) -> CycleRecord {
        let now = Utc::now();
        CycleRecord {
            id: Uuid::new_v4(),
            epoch,
            symbol: "BONK".into(),
            decision: Some(Decision {
                symbol: "BONK".into(),
                action,
                confidence: 0.9,
                risk_level: RiskLevel::Low,
                reasons: vec![],
                content: None,
            }),
            result,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn stats_track_every_push() {
        let mut ledger = CycleLedger::default();
        ledger.push(record(1, Action::Buy, ActionResult::success(1, "tx")));
        ledger.push(record(1, Action::Post, ActionResult::success(2, "post")));
        ledger.push(record(1, Action::Sell, ActionResult::failed(3, ErrorKind::Execution)));
        ledger.push(record(1, Action::Hold, ActionResult::skipped()));

        let stats = ledger.stats();
        assert_eq!(stats.recorded, 4);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.trades, 1);
        assert_eq!(stats.posts, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn history_is_bounded_but_stats_are_not() {
        let mut ledger = CycleLedger::new(2);
        for epoch in 1..=5 {
            ledger.push(record(epoch, Action::Hold, ActionResult::skipped()));
        }
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.stats().recorded, 5);

        let recent = ledger.recent(10);
        assert_eq!(recent[0].epoch, 5);
        assert_eq!(recent[1].epoch, 4);
    }
}
