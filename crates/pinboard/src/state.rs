//! Jobs state: one item per tested revision, with its pinpoint jobs.
//!
//! Field order follows key order so the serialized state has sorted keys.

use serde::{Deserialize, Serialize};

pub const COMPLETED: &str = "completed";
pub const FAILED: &str = "failed";
pub const QUEUED: &str = "queued";

/// A pinpoint job started for a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    pub status: String,
}

impl Job {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Job {
            bot: None,
            id: id.into(),
            patch: None,
            status: status.into(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == COMPLETED || self.status == FAILED
    }
}

/// The jobs started for one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateItem {
    pub jobs: Vec<Job>,
    pub revision: String,
    /// Commit time, ISO 8601 in Pacific time.
    pub timestamp: String,
}

impl StateItem {
    pub fn new(revision: impl Into<String>, timestamp: impl Into<String>) -> Self {
        StateItem {
            jobs: Vec::new(),
            revision: revision.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Ids of jobs still waiting or running.
    pub fn active_job_ids(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|job| !job.is_finished())
            .map(|job| job.id.clone())
            .collect()
    }

    pub fn completed_job_ids(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|job| job.status == COMPLETED)
            .map(|job| job.id.clone())
            .collect()
    }

    /// True while some job is unfinished, or when every job failed.
    pub fn skip_processing(&self) -> bool {
        !self.jobs.iter().all(Job::is_finished)
            || self.jobs.iter().all(|job| job.status == FAILED)
    }
}

/// Every tracked revision, oldest first.
pub type JobsState = Vec<StateItem>;

/// Add `item`, keeping the state ordered by timestamp.
pub fn insert_item(state: &mut JobsState, item: StateItem) {
    state.push(item);
    state.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

/// Serialized form of the state: sorted keys, two-space indent.
pub fn to_json(state: &JobsState) -> serde_json::Result<String> {
    serde_json::to_string_pretty(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(revision: &str, statuses: &[&str]) -> StateItem {
        let mut item = StateItem::new(revision, "2019-03-15");
        for (i, status) in statuses.iter().enumerate() {
            item.jobs.push(Job::new(format!("job{}", i), *status));
        }
        item
    }

    #[test]
    fn test_skip_processing() {
        assert!(!item("a1", &["completed", "failed"]).skip_processing());
        assert!(!item("a1", &["completed"]).skip_processing());
        assert!(item("a1", &["completed", "running"]).skip_processing());
        assert!(item("a1", &["failed", "failed"]).skip_processing());
        assert!(item("a1", &["queued"]).skip_processing());
    }

    #[test]
    fn test_active_and_completed_ids() {
        let item = item("a1", &["completed", "running", "queued", "failed"]);
        assert_eq!(item.active_job_ids(), vec!["job1", "job2"]);
        assert_eq!(item.completed_job_ids(), vec!["job0"]);
    }

    #[test]
    fn test_insert_keeps_timestamp_order() {
        let mut state = vec![StateItem::new("b", "2019-03-16T10:00:00-07:00")];
        insert_item(&mut state, StateItem::new("a", "2019-03-15T10:00:00-07:00"));
        insert_item(&mut state, StateItem::new("c", "2019-03-17T10:00:00-07:00"));
        let revisions: Vec<_> = state.iter().map(|i| i.revision.as_str()).collect();
        assert_eq!(revisions, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_json_has_sorted_keys() {
        let mut job = Job::new("14b4c451f40000", QUEUED);
        job.bot = Some("Pixel2".to_string());
        job.patch = Some("5678".to_string());
        let mut item = StateItem::new("2a66bac4", "2019-03-17T23:50:16-07:00");
        item.jobs.push(job);
        let json = to_json(&vec![item]).unwrap();
        let expected = r#"[
  {
    "jobs": [
      {
        "bot": "Pixel2",
        "id": "14b4c451f40000",
        "patch": "5678",
        "status": "queued"
      }
    ],
    "revision": "2a66bac4",
    "timestamp": "2019-03-17T23:50:16-07:00"
  }
]"#;
        assert_eq!(json, expected);
    }
}
