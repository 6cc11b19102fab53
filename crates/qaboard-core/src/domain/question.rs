//! Questions, replies and reply references.

use qaboard_store::{Document, DocumentData, DocumentId, DocumentRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::{BoardError, BoardResult};
use super::schema::{collections, fields};

/// Store-assigned identity of a question. The only key used to locate a
/// question in view state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        QuestionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn document_id(&self) -> DocumentId {
        DocumentId::new(self.0.clone())
    }
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&DocumentId> for QuestionId {
    fn from(id: &DocumentId) -> Self {
        QuestionId(id.as_str().to_string())
    }
}

/// Opaque pointer to a `Replies` document, embedded in a question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplyRef(DocumentRef);

impl ReplyRef {
    pub fn document_ref(&self) -> &DocumentRef {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        self.0.to_value()
    }
}

impl From<DocumentRef> for ReplyRef {
    fn from(reference: DocumentRef) -> Self {
        ReplyRef(reference)
    }
}

impl std::fmt::Display for ReplyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-generated id of an optimistic reply, stable until it is synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalReplyId(Uuid);

impl LocalReplyId {
    pub fn new() -> Self {
        LocalReplyId(Uuid::new_v4())
    }
}

impl Default for LocalReplyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LocalReplyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reply comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub content: String,
}

impl Reply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn from_document(doc: &Document) -> BoardResult<Self> {
        doc.str_field(fields::CONTENT)
            .map(Reply::new)
            .ok_or_else(|| BoardError::MalformedDocument {
                reference: doc.reference.to_string(),
                reason: format!("missing string field {}", fields::CONTENT),
            })
    }

    pub fn to_data(&self) -> DocumentData {
        let mut data = DocumentData::new();
        data.insert(fields::CONTENT.to_string(), Value::from(self.content.clone()));
        data
    }
}

/// Synchronization state of a reply shown on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReplySync {
    /// Persisted and referenced from its question.
    Synced,
    /// Shown optimistically, remote writes in flight.
    Pending,
    /// Remote writes failed; shown with an unsynced marker until retried.
    Unsynced { error: String },
}

/// A reply as held in view state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReply {
    pub reply: Reply,
    /// Persisted document, once known.
    pub reference: Option<ReplyRef>,
    /// Set for replies created on this client.
    pub local_id: Option<LocalReplyId>,
    pub sync: ReplySync,
}

impl ResolvedReply {
    /// A reply fetched from the store.
    pub fn fetched(reply: Reply, reference: ReplyRef) -> Self {
        Self {
            reply,
            reference: Some(reference),
            local_id: None,
            sync: ReplySync::Synced,
        }
    }

    /// A reply created locally and not yet persisted.
    pub fn optimistic(reply: Reply, local_id: LocalReplyId) -> Self {
        Self {
            reply,
            reference: None,
            local_id: Some(local_id),
            sync: ReplySync::Pending,
        }
    }

    pub fn is_unsynced(&self) -> bool {
        matches!(self.sync, ReplySync::Unsynced { .. })
    }
}

/// Why one reply slot of a question did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The referenced document does not exist.
    Dangling,
    /// The store call failed.
    Transport { error: String },
    /// The slot or the referenced document is not a valid reply.
    Malformed { error: String },
}

/// A reply slot that failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    /// Position in the question's `Replies` list.
    pub slot: usize,
    pub reference: Option<ReplyRef>,
    pub reason: FailureReason,
}

/// Whether every reply of a question was materialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Complete,
    Degraded { failures: Vec<ResolutionFailure> },
}

/// One entry of a question's stored `Replies` list.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplySlot {
    Reference(ReplyRef),
    /// Not a document reference; kept so it can be reported.
    Malformed(Value),
}

/// A decoded question document whose replies are not resolved yet. Never
/// reaches view state.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuestion {
    pub id: QuestionId,
    pub title: String,
    pub description: String,
    pub slots: Vec<ReplySlot>,
}

impl RawQuestion {
    /// Decode leniently: missing text fields become empty, a missing or
    /// non-array `Replies` field means no replies.
    pub fn from_document(doc: &Document) -> Self {
        let slots = doc
            .field(fields::REPLIES)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| match DocumentRef::from_value(item) {
                        Ok(reference) if reference.collection == collections::REPLIES => {
                            ReplySlot::Reference(reference.into())
                        }
                        _ => ReplySlot::Malformed(item.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: QuestionId::from(doc.id()),
            title: doc.str_field(fields::TITLE).unwrap_or_default().to_string(),
            description: doc
                .str_field(fields::DESCRIPTION)
                .unwrap_or_default()
                .to_string(),
            slots,
        }
    }

    pub fn references(&self) -> Vec<ReplyRef> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                ReplySlot::Reference(r) => Some(r.clone()),
                ReplySlot::Malformed(_) => None,
            })
            .collect()
    }

    pub fn into_question(self, resolved: Vec<ResolvedReply>, resolution: Resolution) -> Question {
        let replies = self.references();
        Question {
            id: self.id,
            title: self.title,
            description: self.description,
            replies,
            resolved_replies: resolved,
            resolution,
        }
    }
}

/// A question ready for display: its reply list is settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub description: String,
    /// References as known remotely.
    pub replies: Vec<ReplyRef>,
    pub resolved_replies: Vec<ResolvedReply>,
    pub resolution: Resolution,
}

impl Question {
    pub fn is_degraded(&self) -> bool {
        matches!(self.resolution, Resolution::Degraded { .. })
    }

    pub fn failures(&self) -> &[ResolutionFailure] {
        match &self.resolution {
            Resolution::Complete => &[],
            Resolution::Degraded { failures } => failures,
        }
    }

    /// `Err(PartialResolution)` when any reply slot failed.
    pub fn ensure_complete(&self) -> BoardResult<()> {
        match &self.resolution {
            Resolution::Complete => Ok(()),
            Resolution::Degraded { failures } => Err(BoardError::PartialResolution {
                question_id: self.id.clone(),
                failed: failures.len(),
                total: failures.len() + self.fetched_reply_count(),
            }),
        }
    }

    /// Replies that came from the remote listing, excluding ones created here.
    pub fn fetched_reply_count(&self) -> usize {
        self.resolved_replies
            .iter()
            .filter(|r| r.local_id.is_none())
            .count()
    }

    pub fn reply(&self, local_id: LocalReplyId) -> Option<&ResolvedReply> {
        self.resolved_replies
            .iter()
            .find(|r| r.local_id == Some(local_id))
    }

    pub(crate) fn reply_mut(&mut self, local_id: LocalReplyId) -> Option<&mut ResolvedReply> {
        self.resolved_replies
            .iter_mut()
            .find(|r| r.local_id == Some(local_id))
    }

    /// Content of every reply in display order.
    pub fn reply_contents(&self) -> Vec<&str> {
        self.resolved_replies
            .iter()
            .map(|r| r.reply.content.as_str())
            .collect()
    }
}
