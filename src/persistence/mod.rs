//! Persistence services for domain records

use crate::core::{
    error::PipelineError,
    record::{ObjectKind, Record},
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// What happened to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Saved,
    Deleted,
}

/// One journaled write with its note
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub record_id: String,
    pub change: ChangeKind,
    pub note: String,
    pub at: DateTime<Utc>,
}

/// Persistence service for one object kind
#[async_trait]
pub trait ModelService: Send + Sync {
    fn kind(&self) -> ObjectKind;

    /// A fresh, unsaved record with a generated id
    fn new_object(&self) -> Record {
        Record::new(self.kind(), Uuid::new_v4().to_string())
    }

    async fn load(&self, id: &str) -> Result<Option<Record>, PipelineError>;

    async fn save(&self, record: &mut Record, note: &str) -> Result<(), PipelineError>;

    async fn delete(&self, record: &Record, note: &str) -> Result<(), PipelineError>;

    async fn query_children(&self, parent_id: &str) -> Result<Vec<Record>, PipelineError>;
}

/// In-memory service (for testing or ephemeral use)
pub struct InMemoryService {
    kind: ObjectKind,
    records: RwLock<HashMap<String, Record>>,
    journal: RwLock<Vec<JournalEntry>>,
}

impl InMemoryService {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            records: RwLock::new(HashMap::new()),
            journal: RwLock::new(Vec::new()),
        }
    }

    /// Insert existing records without journaling them
    pub async fn seed(&self, records: impl IntoIterator<Item = Record>) {
        let mut store = self.records.write().await;
        for mut record in records {
            record.is_new = false;
            store.insert(record.id.clone(), record);
        }
    }

    pub async fn journal(&self) -> Vec<JournalEntry> {
        self.journal.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    async fn record_change(&self, record_id: &str, change: ChangeKind, note: &str) {
        self.journal.write().await.push(JournalEntry {
            record_id: record_id.to_string(),
            change,
            note: note.to_string(),
            at: Utc::now(),
        });
    }
}

#[async_trait]
impl ModelService for InMemoryService {
    fn kind(&self) -> ObjectKind {
        self.kind
    }

    async fn load(&self, id: &str) -> Result<Option<Record>, PipelineError> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn save(&self, record: &mut Record, note: &str) -> Result<(), PipelineError> {
        if record.kind != self.kind {
            return Err(PipelineError::Persistence(format!(
                "cannot save {} '{}' in the {} service",
                record.kind, record.id, self.kind
            )));
        }

        record.updated_at = Utc::now();
        record.is_new = false;
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        self.record_change(&record.id, ChangeKind::Saved, note).await;

        debug!(kind = %self.kind, id = %record.id, note, "Saved record");
        Ok(())
    }

    async fn delete(&self, record: &Record, note: &str) -> Result<(), PipelineError> {
        let removed = self.records.write().await.remove(&record.id);
        if removed.is_none() {
            return Err(PipelineError::not_found(format!("{} '{}'", self.kind, record.id)));
        }
        self.record_change(&record.id, ChangeKind::Deleted, note).await;

        debug!(kind = %self.kind, id = %record.id, note, "Deleted record");
        Ok(())
    }

    async fn query_children(&self, parent_id: &str) -> Result<Vec<Record>, PipelineError> {
        let records = self.records.read().await;
        let mut children: Vec<Record> = records
            .values()
            .filter(|r| r.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(children)
    }
}

/// Load a YAML list of records
pub fn load_records<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Record>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Invalid records in {}", path.display()))
}
