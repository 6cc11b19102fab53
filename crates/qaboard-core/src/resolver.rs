//! Reference resolution for questions.
//!
//! A question document stores its replies as a list of references. Before a
//! question may reach view state, every reference is followed concurrently
//! and the question waits for all of them (join-all: one failing lookup
//! never cancels its siblings). Slots that fail mark the question
//! `Degraded` with one entry per failed slot; the replies that did resolve
//! are kept in reference order.
//!
//! Questions of a listing are delivered as a lazy, finite stream:
//! - `Delivery::Progressive` yields each question as soon as it is ready,
//!   in completion order.
//! - `Delivery::Buffered` waits for all of them and yields in a stable
//!   order (title, then id).

use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{self, BoxStream, FuturesUnordered, StreamExt};
use qaboard_store::DocumentStore;
use tracing::instrument;

use crate::domain::{
    collections, BoardError, BoardResult, FailureReason, Question, QuestionId, RawQuestion, Reply,
    ReplySlot, Resolution, ResolutionFailure, ResolvedReply,
};
use crate::metrics::METRICS;
use crate::obs;

/// How a listing of questions is handed to the consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Delivery {
    /// One question at a time, as each becomes ready.
    #[default]
    Progressive,
    /// All questions at once, ordered by title then id.
    Buffered,
}

/// Joins reply references into materialized replies.
#[derive(Clone)]
pub struct ReferenceResolver {
    store: Arc<dyn DocumentStore>,
    delivery: Delivery,
}

impl ReferenceResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            delivery: Delivery::default(),
        }
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Resolve every reply slot of one question.
    ///
    /// Issues exactly one `resolve_reference` per reference slot; a question
    /// without slots is ready immediately.
    #[instrument(skip(self, raw), fields(question_id = %raw.id, slots = raw.slots.len()))]
    pub async fn resolve(&self, raw: RawQuestion) -> Question {
        if raw.slots.is_empty() {
            obs::emit_question_ready(&raw.id, 0, false);
            return raw.into_question(Vec::new(), Resolution::Complete);
        }

        let outcomes = join_all(
            raw.slots
                .iter()
                .enumerate()
                .map(|(slot, entry)| self.resolve_slot(slot, entry)),
        )
        .await;

        let total = outcomes.len();
        let mut resolved = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(reply) => {
                    METRICS.inc_references_resolved();
                    resolved.push(reply);
                }
                Err(failure) => {
                    METRICS.inc_resolution_failures();
                    failures.push(failure);
                }
            }
        }

        let resolution = if failures.is_empty() {
            Resolution::Complete
        } else {
            obs::emit_partial_resolution(&raw.id, failures.len(), total);
            Resolution::Degraded { failures }
        };
        let degraded = !matches!(resolution, Resolution::Complete);
        obs::emit_question_ready(&raw.id, resolved.len(), degraded);
        raw.into_question(resolved, resolution)
    }

    async fn resolve_slot(
        &self,
        slot: usize,
        entry: &ReplySlot,
    ) -> Result<ResolvedReply, ResolutionFailure> {
        let reference = match entry {
            ReplySlot::Reference(reference) => reference,
            ReplySlot::Malformed(value) => {
                return Err(ResolutionFailure {
                    slot,
                    reference: None,
                    reason: FailureReason::Malformed {
                        error: format!("not a reply reference: {value}"),
                    },
                })
            }
        };
        let failure = |reason: FailureReason| ResolutionFailure {
            slot,
            reference: Some(reference.clone()),
            reason,
        };

        match self.store.resolve_reference(reference.document_ref()).await {
            Ok(Some(doc)) => Reply::from_document(&doc)
                .map(|reply| ResolvedReply::fetched(reply, reference.clone()))
                .map_err(|err| {
                    failure(FailureReason::Malformed {
                        error: err.to_string(),
                    })
                }),
            Ok(None) => Err(failure(FailureReason::Dangling)),
            Err(err) => Err(failure(FailureReason::Transport {
                error: err.to_string(),
            })),
        }
    }

    /// Re-fetch one question document and resolve it again.
    #[instrument(skip(self))]
    pub async fn resolve_by_id(&self, id: &QuestionId) -> BoardResult<Question> {
        let doc = self
            .store
            .get_document(collections::QUESTIONS, &id.document_id())
            .await?
            .ok_or_else(|| BoardError::NotFound {
                collection: collections::QUESTIONS.to_string(),
                id: id.to_string(),
            })?;
        Ok(self.resolve(RawQuestion::from_document(&doc)).await)
    }

    /// List the question collection and resolve every question.
    ///
    /// Fails only if the listing itself fails; per-reference failures end up
    /// in each question's `resolution`.
    #[instrument(skip(self), fields(delivery = ?self.delivery))]
    pub async fn stream_questions(&self) -> BoardResult<BoxStream<'_, Question>> {
        let docs = self.store.list_documents(collections::QUESTIONS).await?;
        obs::emit_questions_listed(docs.len());
        let raws: Vec<RawQuestion> = docs.iter().map(RawQuestion::from_document).collect();

        match self.delivery {
            Delivery::Progressive => Ok(raws
                .into_iter()
                .map(|raw| self.resolve(raw))
                .collect::<FuturesUnordered<_>>()
                .boxed()),
            Delivery::Buffered => {
                let mut ready = join_all(raws.into_iter().map(|raw| self.resolve(raw))).await;
                ready.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
                Ok(stream::iter(ready).boxed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::ReplyRef;
    use qaboard_store::fakes::MemoryDocumentStore;
    use qaboard_store::{DocumentData, DocumentRef};
    use serde_json::{json, Value};

    fn data(value: Value) -> DocumentData {
        value.as_object().cloned().unwrap()
    }

    fn reply(store: &MemoryDocumentStore, id: &str, content: &str) -> DocumentRef {
        store.insert(
            collections::REPLIES,
            id,
            data(json!({ "Content": content })),
        )
    }

    fn question(store: &MemoryDocumentStore, id: &str, title: &str, replies: &[&DocumentRef]) {
        let mut fields = data(json!({ "Title": title, "Description": "" }));
        if !replies.is_empty() {
            fields.insert(
                "Replies".to_string(),
                Value::Array(replies.iter().map(|r| r.to_value()).collect()),
            );
        }
        store.insert(collections::QUESTIONS, id, fields);
    }

    fn resolver(store: &Arc<MemoryDocumentStore>) -> ReferenceResolver {
        ReferenceResolver::new(store.clone())
    }

    #[tokio::test]
    async fn question_without_replies_is_ready_without_lookups() {
        let store = Arc::new(MemoryDocumentStore::new());
        question(&store, "q1", "empty", &[]);

        let q = resolver(&store)
            .resolve_by_id(&QuestionId::new("q1"))
            .await
            .unwrap();

        assert!(q.resolved_replies.is_empty());
        assert_eq!(q.resolution, Resolution::Complete);
        assert_eq!(store.calls().resolve, 0);
    }

    #[tokio::test]
    async fn resolves_each_reference_once_in_order() {
        let store = Arc::new(MemoryDocumentStore::new());
        let a = reply(&store, "ra", "first");
        let b = reply(&store, "rb", "second");
        let c = reply(&store, "rc", "third");
        question(&store, "q1", "three", &[&a, &b, &c]);

        let q = resolver(&store)
            .resolve_by_id(&QuestionId::new("q1"))
            .await
            .unwrap();

        assert_eq!(store.calls().resolve, 3);
        assert_eq!(q.reply_contents(), vec!["first", "second", "third"]);
        assert_eq!(q.replies.len(), 3);
        assert!(q.ensure_complete().is_ok());
    }

    #[tokio::test]
    async fn failed_reference_marks_question_degraded() {
        let store = Arc::new(MemoryDocumentStore::new());
        let a = reply(&store, "refA", "hi");
        let b = reply(&store, "refB", "unreachable");
        store.fail_reads_of(&b);
        question(&store, "q1", "mixed", &[&a, &b]);

        let q = resolver(&store)
            .resolve_by_id(&QuestionId::new("q1"))
            .await
            .unwrap();

        assert_eq!(q.reply_contents(), vec!["hi"]);
        assert!(q.is_degraded());
        let failures = q.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].slot, 1);
        assert_eq!(failures[0].reference, Some(ReplyRef::from(b)));
        assert!(matches!(failures[0].reason, FailureReason::Transport { .. }));
    }

    #[tokio::test]
    async fn dangling_and_malformed_slots_are_reported() {
        let store = Arc::new(MemoryDocumentStore::new());
        let a = reply(&store, "ra", "kept");
        let dangling = DocumentRef::new(collections::REPLIES, "gone");
        store.insert(
            collections::QUESTIONS,
            "q1",
            data(json!({ "Title": "t", "Replies": [a.to_value(), dangling.to_value(), 42] })),
        );

        let q = resolver(&store)
            .resolve_by_id(&QuestionId::new("q1"))
            .await
            .unwrap();

        assert_eq!(q.reply_contents(), vec!["kept"]);
        let reasons: Vec<_> = q.failures().iter().map(|f| f.reason.clone()).collect();
        assert_eq!(reasons[0], FailureReason::Dangling);
        assert!(matches!(reasons[1], FailureReason::Malformed { .. }));
        // the malformed slot is never looked up
        assert_eq!(store.calls().resolve, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_branch_does_not_abort_slow_siblings() {
        let store = Arc::new(MemoryDocumentStore::new());
        let fast_fail = reply(&store, "r1", "x");
        let slow = reply(&store, "r2", "slow but fine");
        store.fail_reads_of(&fast_fail);
        store.delay_reads_of(&slow, Duration::from_secs(10));
        question(&store, "q1", "t", &[&fast_fail, &slow]);

        let q = resolver(&store)
            .resolve_by_id(&QuestionId::new("q1"))
            .await
            .unwrap();

        assert_eq!(q.reply_contents(), vec!["slow but fine"]);
        assert_eq!(q.failures().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn progressive_delivery_yields_in_completion_order() {
        let store = Arc::new(MemoryDocumentStore::new());
        let slow = reply(&store, "r-slow", "slow");
        store.delay_reads_of(&slow, Duration::from_secs(30));
        let fast = reply(&store, "r-fast", "fast");
        store.delay_reads_of(&fast, Duration::from_secs(1));
        // "a-slow" sorts first in the listing but finishes last
        question(&store, "a-slow", "slow question", &[&slow]);
        question(&store, "b-fast", "fast question", &[&fast]);
        question(&store, "c-empty", "no replies", &[]);

        let resolver = resolver(&store);
        let ids: Vec<String> = resolver
            .stream_questions()
            .await
            .unwrap()
            .map(|q| q.id.to_string())
            .collect()
            .await;

        assert_eq!(ids, vec!["c-empty", "b-fast", "a-slow"]);
    }

    #[tokio::test(start_paused = true)]
    async fn buffered_delivery_orders_by_title() {
        let store = Arc::new(MemoryDocumentStore::new());
        let slow = reply(&store, "r-slow", "slow");
        store.delay_reads_of(&slow, Duration::from_secs(30));
        question(&store, "q1", "Beta", &[]);
        question(&store, "q2", "Alpha", &[&slow]);
        question(&store, "q3", "Beta", &[]);

        let resolver = resolver(&store).with_delivery(Delivery::Buffered);
        let ids: Vec<String> = resolver
            .stream_questions()
            .await
            .unwrap()
            .map(|q| q.id.to_string())
            .collect()
            .await;

        assert_eq!(ids, vec!["q2", "q1", "q3"]);
    }

    #[tokio::test]
    async fn listing_failure_is_reported() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.fail_lists_of(collections::QUESTIONS);

        let err = resolver(&store).stream_questions().await.err().unwrap();
        assert!(matches!(err, BoardError::Transport(_)));
    }

    #[tokio::test]
    async fn resolve_by_id_of_missing_question_is_not_found() {
        let store = Arc::new(MemoryDocumentStore::new());
        let err = resolver(&store)
            .resolve_by_id(&QuestionId::new("nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
