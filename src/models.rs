use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label as known to the mail provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// The parts of a message the labeling run reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub id: String,
    pub snippet: String,
    pub label_ids: Vec<String>,
}

/// Phase a labeling run is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Authorizing,
    DirectoryLoaded,
    ListingMessages,
    PerMessage,
    Done,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Authorizing => "authorizing",
            RunPhase::DirectoryLoaded => "directory-loaded",
            RunPhase::ListingMessages => "listing-messages",
            RunPhase::PerMessage => "per-message",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of one labeling run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub phase: RunPhase,
    pub messages_listed: usize,
    pub messages_labeled: usize,
    pub messages_skipped: usize,
    pub messages_failed: usize,
    pub labels_created: usize,
}

impl RunSummary {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            phase: RunPhase::Authorizing,
            messages_listed: 0,
            messages_labeled: 0,
            messages_skipped: 0,
            messages_failed: 0,
            labels_created: 0,
        }
    }

    pub fn finish(mut self) -> Self {
        self.phase = RunPhase::Done;
        self.finished_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary_lifecycle() {
        let summary = RunSummary::start();
        assert_eq!(summary.phase, RunPhase::Authorizing);
        assert!(summary.finished_at.is_none());
        assert_ne!(summary.phase, RunPhase::Done);

        let summary = summary.finish();
        assert_eq!(summary.phase, RunPhase::Done);
        assert!(summary.finished_at.unwrap() >= summary.started_at);
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunSummary::start().run_id, RunSummary::start().run_id);
    }

    #[test]
    fn test_run_phase_display() {
        assert_eq!(RunPhase::ListingMessages.to_string(), "listing-messages");
        assert_eq!(RunPhase::Done.to_string(), "done");
    }
}
