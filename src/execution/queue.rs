//! Fire-and-forget task queue

use crate::core::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Background work handed off by a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub arguments: Map<String, Value>,
    pub enqueued_at: DateTime<Utc>,
}

impl Task {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            arguments,
            enqueued_at: Utc::now(),
        }
    }
}

/// External queue; publishing never waits for the task to run
pub trait TaskQueue: Send + Sync {
    fn publish(&self, task: Task) -> Result<(), PipelineError>;
}

/// Queue backed by an unbounded channel; the receiver is the worker side
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: mpsc::UnboundedSender<Task>,
}

impl ChannelQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Task>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl TaskQueue for ChannelQueue {
    fn publish(&self, task: Task) -> Result<(), PipelineError> {
        info!(task = %task.name, id = %task.id, "Publishing task");
        self.sender
            .send(task)
            .map_err(|e| PipelineError::Queue(format!("task '{}' was not accepted", e.0.name)))
    }
}
