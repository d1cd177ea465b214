//! Domain records acted upon by builders

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Query-string token meaning "create a new record"
pub const NEW_TOKEN: &str = "new";

/// Family of domain object a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    User,
    Stream,
    Folder,
    Message,
    Follower,
    Rule,
    Circle,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::User,
        ObjectKind::Stream,
        ObjectKind::Folder,
        ObjectKind::Message,
        ObjectKind::Follower,
        ObjectKind::Rule,
        ObjectKind::Circle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::User => "user",
            ObjectKind::Stream => "stream",
            ObjectKind::Folder => "folder",
            ObjectKind::Message => "message",
            ObjectKind::Follower => "follower",
            ObjectKind::Rule => "rule",
            ObjectKind::Circle => "circle",
        }
    }

    /// Query-string parameter that selects a record of this kind
    pub fn token_param(&self) -> &'static str {
        match self {
            ObjectKind::User => "userId",
            ObjectKind::Stream => "streamId",
            ObjectKind::Folder => "folderId",
            ObjectKind::Message => "messageId",
            ObjectKind::Follower => "followerId",
            ObjectKind::Rule => "ruleId",
            ObjectKind::Circle => "circleId",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown object kind: {}", s))
    }
}

/// A persisted domain object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,

    pub kind: ObjectKind,

    /// Containing record (profile for folders, folder for messages, ...)
    #[serde(default)]
    pub parent_id: Option<String>,

    /// User who owns the record
    #[serde(default)]
    pub owner_id: Option<String>,

    /// Stream template (streams only)
    #[serde(default)]
    pub template_id: Option<String>,

    /// Lifecycle state
    #[serde(default)]
    pub state: String,

    #[serde(default)]
    pub fields: Map<String, Value>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    /// Not yet saved (not serialized)
    #[serde(skip)]
    pub is_new: bool,
}

impl Record {
    /// Create a fresh, unsaved record
    pub fn new(kind: ObjectKind, id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            parent_id: None,
            owner_id: None,
            template_id: None,
            state: String::new(),
            fields: Map::new(),
            created_at: now,
            updated_at: now,
            is_new: true,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Field value rendered as a string, empty when absent
    pub fn field_str(&self, name: &str) -> String {
        match self.fields.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    /// JSON view handed to markup templates
    pub fn to_template_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("kind".to_string(), Value::String(self.kind.to_string()));
        map.insert("state".to_string(), Value::String(self.state.clone()));
        map.insert("isNew".to_string(), Value::Bool(self.is_new));
        if let Some(parent_id) = &self.parent_id {
            map.insert("parentId".to_string(), Value::String(parent_id.clone()));
        }
        if let Some(owner_id) = &self.owner_id {
            map.insert("ownerId".to_string(), Value::String(owner_id.clone()));
        }
        if let Some(template_id) = &self.template_id {
            map.insert("templateId".to_string(), Value::String(template_id.clone()));
        }
        Value::Object(map)
    }
}
