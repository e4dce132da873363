use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl BatchJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchJobStatus::Pending => "pending",
            BatchJobStatus::Running => "running",
            BatchJobStatus::Completed => "completed",
            BatchJobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BatchJobStatus::Pending),
            "running" => Some(BatchJobStatus::Running),
            "completed" => Some(BatchJobStatus::Completed),
            "failed" => Some(BatchJobStatus::Failed),
            _ => None,
        }
    }
}

/// Only `status`, `results`, `error_message` and the timestamps change
/// after insert.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BatchJob {
    pub id: i64,
    pub job_id: Uuid,
    pub job_type: String,
    pub status: String,
    pub input_data: serde_json::Value,
    pub results: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    pub fn status(&self) -> Option<BatchJobStatus> {
        BatchJobStatus::parse(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip() {
        for status in [
            BatchJobStatus::Pending,
            BatchJobStatus::Running,
            BatchJobStatus::Completed,
            BatchJobStatus::Failed,
        ] {
            assert_eq!(BatchJobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BatchJobStatus::parse("cancelled"), None);
    }
}
