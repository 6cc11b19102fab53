//! Board seeding.
//!
//! The board never creates questions or site config itself; they are
//! written ahead of time. `BoardSeed` describes such a board (usually read
//! from a JSON file) and writes it through any backend that can store a
//! document under a chosen id.

use async_trait::async_trait;
use qaboard_store::fakes::MemoryDocumentStore;
use qaboard_store::{
    DocumentData, DocumentId, DocumentRef, StorageResult, SurrealDocumentStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::domain::{collections, fields, QuestionId, Reply, ReplyRef, SITE_INFO};

/// Backend that accepts documents under caller-chosen ids.
#[async_trait]
pub trait SeedTarget: Send + Sync {
    async fn put(
        &self,
        collection: &str,
        id: DocumentId,
        data: DocumentData,
    ) -> StorageResult<DocumentRef>;
}

#[async_trait]
impl SeedTarget for MemoryDocumentStore {
    async fn put(
        &self,
        collection: &str,
        id: DocumentId,
        data: DocumentData,
    ) -> StorageResult<DocumentRef> {
        Ok(self.insert(collection, id, data))
    }
}

#[async_trait]
impl SeedTarget for SurrealDocumentStore {
    async fn put(
        &self,
        collection: &str,
        id: DocumentId,
        data: DocumentData,
    ) -> StorageResult<DocumentRef> {
        self.put_document(collection, &id, data).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSeed {
    pub title: String,
    #[serde(default)]
    pub questions: Vec<QuestionSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSeed {
    /// Fixed document id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Reply contents, in order.
    #[serde(default)]
    pub replies: Vec<String>,
}

impl QuestionSeed {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: description.into(),
            replies: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_reply(mut self, content: impl Into<String>) -> Self {
        self.replies.push(content.into());
        self
    }
}

/// Ids written by [`BoardSeed::apply`], in seed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeededBoard {
    pub questions: Vec<(QuestionId, Vec<ReplyRef>)>,
}

impl BoardSeed {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            questions: Vec::new(),
        }
    }

    pub fn with_question(mut self, question: QuestionSeed) -> Self {
        self.questions.push(question);
        self
    }

    /// Small board used when no seed file is given.
    pub fn demo() -> Self {
        BoardSeed::new("Ask Me")
            .with_question(
                QuestionSeed::new("What is this board?", "A place to ask and answer.")
                    .with_id("welcome")
                    .with_reply("Post a question, get replies.")
                    .with_reply("Sign in to reply."),
            )
            .with_question(
                QuestionSeed::new("How do replies sync?", "Asking for a friend.")
                    .with_id("sync"),
            )
    }

    /// Write the site config, every reply, then every question.
    ///
    /// Questions without replies get no `Replies` field at all.
    pub async fn apply(&self, target: &dyn SeedTarget) -> StorageResult<SeededBoard> {
        let mut site = DocumentData::new();
        site.insert(fields::TITLE.to_string(), Value::from(self.title.clone()));
        target
            .put(collections::CONFIG, DocumentId::from(SITE_INFO), site)
            .await?;

        let mut seeded = SeededBoard::default();
        for question in &self.questions {
            let mut references = Vec::with_capacity(question.replies.len());
            for content in &question.replies {
                let reference = target
                    .put(
                        collections::REPLIES,
                        DocumentId::generate(),
                        Reply::new(content.clone()).to_data(),
                    )
                    .await?;
                references.push(ReplyRef::from(reference));
            }

            let mut data = DocumentData::new();
            data.insert(fields::TITLE.to_string(), Value::from(question.title.clone()));
            data.insert(
                fields::DESCRIPTION.to_string(),
                Value::from(question.description.clone()),
            );
            if !references.is_empty() {
                data.insert(
                    fields::REPLIES.to_string(),
                    Value::Array(references.iter().map(ReplyRef::to_value).collect()),
                );
            }
            let id = question
                .id
                .clone()
                .map(DocumentId::new)
                .unwrap_or_else(DocumentId::generate);
            let reference = target.put(collections::QUESTIONS, id, data).await?;
            seeded
                .questions
                .push((QuestionId::from(&reference.id), references));
        }

        info!(
            event = "board.seeded",
            title = %self.title,
            questions = seeded.questions.len(),
        );
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qaboard_store::DocumentStore;

    #[tokio::test]
    async fn demo_board_is_written_to_memory_store() {
        let store = MemoryDocumentStore::new();
        let seeded = BoardSeed::demo().apply(&store).await.unwrap();

        assert_eq!(seeded.questions.len(), 2);
        assert_eq!(seeded.questions[0].0, QuestionId::new("welcome"));
        assert_eq!(seeded.questions[0].1.len(), 2);
        assert_eq!(store.len(collections::REPLIES), 2);

        let site = store
            .get_document(collections::CONFIG, &DocumentId::from(SITE_INFO))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(site.str_field(fields::TITLE), Some("Ask Me"));

        let empty = store
            .document(collections::QUESTIONS, &DocumentId::from("sync"))
            .unwrap();
        assert!(!empty.contains_key(fields::REPLIES));
    }

    #[test]
    fn seed_file_fields_are_optional() {
        let seed: BoardSeed = serde_json::from_str(
            r#"{"title": "Ask Me", "questions": [{"title": "Why?"}]}"#,
        )
        .unwrap();
        assert_eq!(seed.questions[0], QuestionSeed::new("Why?", ""));
    }

    #[tokio::test]
    async fn questions_without_id_get_generated_ids() {
        let store = MemoryDocumentStore::new();
        let seed = BoardSeed::new("t")
            .with_question(QuestionSeed::new("a", ""))
            .with_question(QuestionSeed::new("b", ""));
        let seeded = seed.apply(&store).await.unwrap();
        assert_ne!(seeded.questions[0].0, seeded.questions[1].0);
        assert_eq!(store.len(collections::QUESTIONS), 2);
    }
}
