//! Usage logging
//!
//! Logs product usage events in JSONL format for offline analytics: logins,
//! voice sessions, enrichment runs, and milestone unlocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Usage event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Google OAuth login completed
    LoginCompleted,
    /// Voice session opened
    VoiceSessionOpened,
    /// Voice session closed
    VoiceSessionClosed,
    /// Enrichment task finished (birth chart, horoscope)
    EnrichmentCompleted,
    /// Gamification milestone unlocked
    MilestoneUnlocked,
}

/// Usage event for analytics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Event type
    pub event_type: EventType,
    /// Node that handled the request
    pub node_id: String,
    /// User identifier (if known)
    pub user_id: Option<String>,
    /// Operation detail (task name, milestone id)
    pub detail: Option<String>,
    /// Duration in milliseconds (for session close events)
    pub duration_ms: Option<u64>,
    /// Additional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl UsageEvent {
    /// Create a new usage event
    pub fn new(event_type: EventType, node_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            node_id,
            user_id: None,
            detail: None,
            duration_ms: None,
            metadata: None,
        }
    }

    /// Set the user ID
    pub fn with_user(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set the operation detail
    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Set the duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Usage logger that writes events to a JSONL file
#[derive(Clone)]
pub struct UsageLogger {
    inner: Arc<Mutex<UsageLoggerInner>>,
    node_id: String,
}

struct UsageLoggerInner {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl UsageLogger {
    /// Create a new usage logger
    pub fn new(node_id: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(UsageLoggerInner {
                writer: None,
                path: None,
            })),
            node_id,
        }
    }

    /// Initialize file logging to the specified path
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let writer = BufWriter::new(file);

        let mut inner = self.inner.lock().await;
        inner.writer = Some(writer);
        inner.path = Some(path.clone());

        info!("Usage logging initialized to {}", path.display());
        Ok(())
    }

    /// Log a usage event
    pub async fn log(&self, event: UsageEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize usage event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;

        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write usage event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush usage log: {}", e);
            }
        }
    }

    /// Log a completed login
    pub async fn log_login(&self, user_id: &str) {
        let event = UsageEvent::new(EventType::LoginCompleted, self.node_id.clone())
            .with_user(user_id.to_string());
        self.log(event).await;
    }

    /// Log a milestone unlock
    pub async fn log_milestone(&self, user_id: &str, milestone_id: &str) {
        let event = UsageEvent::new(EventType::MilestoneUnlocked, self.node_id.clone())
            .with_user(user_id.to_string())
            .with_detail(milestone_id.to_string());
        self.log(event).await;
    }

    /// Log a finished enrichment task
    pub async fn log_enrichment(&self, user_id: &str, task: &str) {
        let event = UsageEvent::new(EventType::EnrichmentCompleted, self.node_id.clone())
            .with_user(user_id.to_string())
            .with_detail(task.to_string());
        self.log(event).await;
    }

    /// Log a voice session open
    pub async fn log_voice_opened(&self, user_id: &str) {
        let event = UsageEvent::new(EventType::VoiceSessionOpened, self.node_id.clone())
            .with_user(user_id.to_string());
        self.log(event).await;
    }

    /// Log a voice session close with its duration
    pub async fn log_voice_closed(&self, user_id: &str, duration_ms: u64) {
        let event = UsageEvent::new(EventType::VoiceSessionClosed, self.node_id.clone())
            .with_user(user_id.to_string())
            .with_duration(duration_ms);
        self.log(event).await;
    }

    /// Get the node ID
    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = UsageEvent::new(EventType::LoginCompleted, "node-1".to_string())
            .with_user("user-123".to_string());

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("login_completed"));
        assert!(jsonl.contains("user-123"));
    }

    #[test]
    fn test_milestone_event() {
        let event = UsageEvent::new(EventType::MilestoneUnlocked, "node-1".to_string())
            .with_user("user-123".to_string())
            .with_detail("streak_7".to_string());

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("milestone_unlocked"));
        assert!(jsonl.contains("streak_7"));
    }

    #[test]
    fn test_voice_close_event_has_duration() {
        let event = UsageEvent::new(EventType::VoiceSessionClosed, "node-1".to_string())
            .with_duration(1234);

        let jsonl = event.to_jsonl().unwrap();
        assert!(jsonl.contains("voice_session_closed"));
        assert!(jsonl.contains("1234"));
    }

    #[test]
    fn test_file_logging_appends_jsonl_lines() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("usage.jsonl");

            let logger = UsageLogger::new("node-1".to_string());
            logger.init_file(path.clone()).await.unwrap();
            logger.log_login("user-1").await;
            logger.log_milestone("user-1", "first_conversation").await;

            let content = std::fs::read_to_string(&path).unwrap();
            let lines: Vec<&str> = content.lines().collect();
            assert_eq!(lines.len(), 2);
            assert!(lines[0].contains("login_completed"));
            assert!(lines[1].contains("first_conversation"));
        });
    }
}
