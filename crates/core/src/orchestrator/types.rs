//! Types for the conversion orchestrator.

use serde::{Deserialize, Serialize};

use crate::conversion::ConversionStatus;

/// Records per status, published after each scheduler pass.
///
/// Promoted records count as `converting` in the pass that promoted them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub pending: usize,
    pub queued: usize,
    pub converting: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusSnapshot {
    pub fn add(&mut self, status: ConversionStatus) {
        *self.bucket_mut(status) += 1;
    }

    pub fn get(&self, status: ConversionStatus) -> usize {
        match status {
            ConversionStatus::Pending => self.pending,
            ConversionStatus::Queued => self.queued,
            ConversionStatus::Converting => self.converting,
            ConversionStatus::Completed => self.completed,
            ConversionStatus::Failed => self.failed,
        }
    }

    fn bucket_mut(&mut self, status: ConversionStatus) -> &mut usize {
        match status {
            ConversionStatus::Pending => &mut self.pending,
            ConversionStatus::Queued => &mut self.queued,
            ConversionStatus::Converting => &mut self.converting,
            ConversionStatus::Completed => &mut self.completed,
            ConversionStatus::Failed => &mut self.failed,
        }
    }

    pub fn total(&self) -> usize {
        ConversionStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Ids promoted from queued to converting, in promotion order.
    pub promoted: Vec<String>,
    /// Ids handed to deletion because they expired.
    pub evicted: Vec<String>,
    pub snapshot: StatusSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_buckets() {
        let mut snapshot = StatusSnapshot::default();
        snapshot.add(ConversionStatus::Queued);
        snapshot.add(ConversionStatus::Queued);
        snapshot.add(ConversionStatus::Failed);

        assert_eq!(snapshot.queued, 2);
        assert_eq!(snapshot.get(ConversionStatus::Failed), 1);
        assert_eq!(snapshot.total(), 3);
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = StatusSnapshot {
            pending: 1,
            converting: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["pending"], 1);
        assert_eq!(json["converting"], 2);
        assert_eq!(json["completed"], 0);
    }
}
