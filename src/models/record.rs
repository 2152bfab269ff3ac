// src/models/record.rs

//! Nodes of the remote content graph.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// Numeric identifier of an item (story, comment, job, poll, ...).
pub type ItemId = u64;

/// Identifier of any node in the content graph.
///
/// Items and users live in separate id spaces, so `Item(1)` and `User("1")`
/// are different nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Item(ItemId),
    User(String),
}

impl NodeId {
    /// The raw id as it appears in the remote API.
    pub fn raw(&self) -> String {
        match self {
            NodeId::Item(id) => id.to_string(),
            NodeId::User(name) => name.clone(),
        }
    }
}

/// User ids are ASCII letters, digits, `_` and `-`. Anything else could
/// escape a URL path segment or a storage directory.
pub fn is_valid_user_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Item(id) => write!(f, "item {}", id),
            NodeId::User(name) => write!(f, "user {}", name),
        }
    }
}

impl From<ItemId> for NodeId {
    fn from(id: ItemId) -> Self {
        NodeId::Item(id)
    }
}

impl From<&str> for NodeId {
    fn from(name: &str) -> Self {
        NodeId::User(name.to_string())
    }
}

/// Kind of a fetched node, as reported by the `type` field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Story,
    Comment,
    Job,
    Poll,
    #[serde(rename = "pollopt")]
    PollOpt,
    User,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Story => "story",
            RecordKind::Comment => "comment",
            RecordKind::Job => "job",
            RecordKind::Poll => "poll",
            RecordKind::PollOpt => "pollopt",
            RecordKind::User => "user",
            RecordKind::Unknown => "unknown",
        }
    }

    /// All kinds, in storage listing order.
    pub fn all() -> [RecordKind; 7] {
        [
            RecordKind::Story,
            RecordKind::Comment,
            RecordKind::Job,
            RecordKind::Poll,
            RecordKind::PollOpt,
            RecordKind::User,
            RecordKind::Unknown,
        ]
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized result of a fetch.
///
/// Only the fields that drive the traversal are typed; everything else the
/// API returned (title, text, time, score, ...) is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub id: NodeId,

    #[serde(rename = "type", default)]
    pub kind: RecordKind,

    /// Author of an item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,

    /// Parent item of a comment or poll option
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ItemId>,

    /// Direct children of an item
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kids: Vec<ItemId>,

    /// Items submitted by a user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub submitted: Vec<ItemId>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CrawlRecord {
    /// Build a bare item record.
    pub fn item(id: ItemId, kind: RecordKind) -> Self {
        Self {
            id: NodeId::Item(id),
            kind,
            by: None,
            parent: None,
            kids: Vec::new(),
            submitted: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Build a bare user record.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::User(name.into()),
            kind: RecordKind::User,
            by: None,
            parent: None,
            kids: Vec::new(),
            submitted: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_by(mut self, by: impl Into<String>) -> Self {
        self.by = Some(by.into());
        self
    }

    pub fn with_parent(mut self, parent: ItemId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_kids(mut self, kids: impl Into<Vec<ItemId>>) -> Self {
        self.kids = kids.into();
        self
    }

    pub fn with_submitted(mut self, submitted: impl Into<Vec<ItemId>>) -> Self {
        self.submitted = submitted.into();
        self
    }

    /// Parse an `item/{id}.json` payload.
    ///
    /// The API answers `null` for ids that do not exist.
    pub fn from_item_json(expected: ItemId, value: Value) -> Result<Self> {
        if value.is_null() {
            return Err(AppError::remote_fetch(NodeId::Item(expected), "no such item"));
        }

        let record: CrawlRecord = serde_json::from_value(value)
            .map_err(|e| AppError::remote_fetch(NodeId::Item(expected), e))?;

        if record.id != NodeId::Item(expected) {
            return Err(AppError::remote_fetch(
                NodeId::Item(expected),
                format!("response carries {}", record.id),
            ));
        }

        Ok(record)
    }

    /// Parse a `user/{id}.json` payload.
    pub fn from_user_json(expected: &str, value: Value) -> Result<Self> {
        let node = NodeId::User(expected.to_string());
        if !is_valid_user_id(expected) {
            return Err(AppError::remote_fetch(node, "malformed user id"));
        }
        if value.is_null() {
            return Err(AppError::remote_fetch(node, "no such user"));
        }

        let mut record: CrawlRecord =
            serde_json::from_value(value).map_err(|e| AppError::remote_fetch(&node, e))?;

        if record.id != node {
            return Err(AppError::remote_fetch(
                node,
                format!("response carries {}", record.id),
            ));
        }

        record.kind = RecordKind::User;
        Ok(record)
    }

    /// Storage key: `(kind, raw id)`.
    pub fn key(&self) -> (RecordKind, String) {
        (self.kind, self.id.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_story() {
        let value = json!({
            "by": "dhouston",
            "descendants": 71,
            "id": 8863,
            "kids": [8952, 9224],
            "score": 111,
            "time": 1175714200,
            "title": "My YC app: Dropbox - Throw away your USB drive",
            "type": "story",
            "url": "http://www.getdropbox.com/u/2/screencast.html"
        });

        let record = CrawlRecord::from_item_json(8863, value).unwrap();
        assert_eq!(record.id, NodeId::Item(8863));
        assert_eq!(record.kind, RecordKind::Story);
        assert_eq!(record.by.as_deref(), Some("dhouston"));
        assert_eq!(record.kids, vec![8952, 9224]);
        assert_eq!(record.parent, None);
        assert_eq!(record.extra["score"], 111);
        assert_eq!(record.key(), (RecordKind::Story, "8863".to_string()));
    }

    #[test]
    fn test_parse_comment_with_parent() {
        let value = json!({
            "by": "norvig",
            "id": 2921983,
            "parent": 2921506,
            "text": "Aw shucks",
            "time": 1314211127,
            "type": "comment"
        });

        let record = CrawlRecord::from_item_json(2921983, value).unwrap();
        assert_eq!(record.kind, RecordKind::Comment);
        assert_eq!(record.parent, Some(2921506));
        assert!(record.kids.is_empty());
    }

    #[test]
    fn test_parse_user() {
        let value = json!({
            "about": "This is a test",
            "created": 1173923446,
            "id": "jl",
            "karma": 2937,
            "submitted": [8265435, 8168423]
        });

        let record = CrawlRecord::from_user_json("jl", value).unwrap();
        assert_eq!(record.id, NodeId::User("jl".to_string()));
        assert_eq!(record.kind, RecordKind::User);
        assert_eq!(record.submitted, vec![8265435, 8168423]);
    }

    #[test]
    fn test_null_payload_is_fetch_error() {
        let err = CrawlRecord::from_item_json(42, Value::Null).unwrap_err();
        assert!(matches!(err, AppError::RemoteFetch { .. }));

        let err = CrawlRecord::from_user_json("ghost", Value::Null).unwrap_err();
        assert!(matches!(err, AppError::RemoteFetch { .. }));
    }

    #[test]
    fn test_mismatched_id_is_rejected() {
        let err = CrawlRecord::from_item_json(1, json!({"id": 2, "type": "story"})).unwrap_err();
        assert!(err.to_string().contains("item 2"));
    }

    #[test]
    fn test_user_id_with_path_characters_is_rejected() {
        for id in ["../../escaped", "a/b", "", "dot.name", "x\\y"] {
            let err = CrawlRecord::from_user_json(id, json!({"id": id})).unwrap_err();
            assert!(matches!(err, AppError::RemoteFetch { .. }), "{:?}", id);
        }
        assert!(is_valid_user_id("Some_user-42"));
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let record = CrawlRecord::from_item_json(7, json!({"id": 7, "type": "event"})).unwrap();
        assert_eq!(record.kind, RecordKind::Unknown);
    }

    #[test]
    fn test_serialized_record_keeps_extra_fields() {
        let value = json!({"id": 5, "type": "job", "title": "Hiring", "time": 1});
        let record = CrawlRecord::from_item_json(5, value).unwrap();

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["title"], "Hiring");
        assert_eq!(back["type"], "job");
        assert!(back.get("kids").is_none());
    }
}
