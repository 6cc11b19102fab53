//! View state reconciler.
//!
//! Drives `AppState` from three sources: the document store (site config and
//! questions), the session listener (auth status) and user actions (drafts,
//! replies, sign-in). Local updates are applied synchronously before the
//! matching remote write is issued. A remote write that fails never rolls
//! the local update back; the reply is marked unsynced instead and can be
//! retried.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::StreamExt;
use qaboard_store::{DocumentId, DocumentPatch, DocumentStore};
use tracing::{instrument, warn};

use crate::analytics::{page_view_params, AnalyticsSink, TracingAnalytics, PAGE_VIEW};
use crate::background::BackgroundTasks;
use crate::domain::{
    collections, fields, AuthStatus, BoardError, BoardResult, LocalReplyId, QuestionId, Reply,
    ReplyRef, SiteConfig, User, SITE_INFO,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::resolver::{Delivery, ReferenceResolver};
use crate::session::{AuthSubscription, SessionManager};
use crate::state::{AppSnapshot, AppState};

/// A reply that is already shown locally and still has to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub question_id: QuestionId,
    pub local_id: LocalReplyId,
    pub reply: Reply,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
    resolver: ReferenceResolver,
    session: Arc<SessionManager>,
    analytics: Arc<dyn AnalyticsSink>,
    state: Arc<Mutex<AppState>>,
    subscription: Mutex<Option<AuthSubscription>>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DocumentStore>, session: Arc<SessionManager>) -> Self {
        Self {
            resolver: ReferenceResolver::new(Arc::clone(&store)),
            store,
            session,
            analytics: Arc::new(TracingAnalytics),
            state: Arc::new(Mutex::new(AppState::new())),
            subscription: Mutex::new(None),
        }
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.resolver = self.resolver.with_delivery(delivery);
        self
    }

    fn state(&self) -> MutexGuard<'_, AppState> {
        lock(&self.state)
    }

    pub fn snapshot(&self) -> AppSnapshot {
        self.state().snapshot()
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Detached tasks started by this reconciler and its session.
    pub fn background(&self) -> &Arc<BackgroundTasks> {
        self.session.background()
    }

    /// Start the board: subscribe to the session, log the page view, then
    /// load site config and questions concurrently.
    #[instrument(skip(self))]
    pub async fn mount(&self) {
        self.attach_session();
        self.log_page_view();
        tokio::join!(self.load_site_config(), self.load_questions());
    }

    fn attach_session(&self) {
        let state = Arc::clone(&self.state);
        let subscription = self.session.on_auth_state_changed(move |identity| {
            let status = lock(&state).apply_auth_event(identity);
            obs::emit_auth_changed(status);
        });
        *lock(&self.subscription) = Some(subscription);
    }

    fn log_page_view(&self) {
        let analytics = Arc::clone(&self.analytics);
        self.background().spawn("analytics.page_view", async move {
            analytics.log_event(PAGE_VIEW, page_view_params()).await
        });
    }

    /// Fetch `Config/SiteInfo`. A missing or unreadable document keeps the
    /// placeholder title.
    #[instrument(skip(self))]
    pub async fn load_site_config(&self) {
        let fetched = self
            .store
            .get_document(collections::CONFIG, &DocumentId::from(SITE_INFO))
            .await;
        match fetched {
            Ok(Some(doc)) => {
                self.state().set_site(SiteConfig::from_document(&doc));
            }
            Ok(None) => {
                let missing = BoardError::NotFound {
                    collection: collections::CONFIG.to_string(),
                    id: SITE_INFO.to_string(),
                };
                obs::emit_read_failed("site_config", &missing);
                self.state().mark_site_missing();
            }
            Err(err) => {
                obs::emit_read_failed("site_config", &err);
                self.state().mark_site_failed();
            }
        }
    }

    /// List and resolve every question, merging each into state as soon as
    /// the resolver delivers it.
    #[instrument(skip(self))]
    pub async fn load_questions(&self) {
        let started = Instant::now();
        self.state().begin_questions_load();

        let mut questions = match self.resolver.stream_questions().await {
            Ok(questions) => questions,
            Err(err) => {
                obs::emit_read_failed("questions", &err);
                self.state().mark_questions_failed();
                return;
            }
        };

        let mut count = 0;
        while let Some(question) = questions.next().await {
            count += 1;
            self.state().upsert_question(question);
        }
        self.state().mark_questions_loaded();
        obs::emit_questions_loaded(count, started.elapsed().as_millis() as u64);
    }

    pub fn set_draft(&self, question_id: &QuestionId, text: impl Into<String>) {
        self.state().set_draft(question_id, text);
    }

    pub fn draft(&self, question_id: &QuestionId) -> String {
        self.state().draft(question_id).to_string()
    }

    /// Local half of a reply submission: append the draft to the question
    /// as a pending reply and clear the draft.
    pub fn begin_reply(&self, question_id: &QuestionId) -> BoardResult<PendingReply> {
        let mut state = self.state();
        let content = state.draft(question_id).to_string();
        if content.trim().is_empty() {
            return Err(BoardError::EmptyReply);
        }
        let reply = Reply::new(content);
        let local_id = state.push_optimistic_reply(question_id, reply.clone())?;
        state.take_draft(question_id);
        drop(state);

        METRICS.inc_replies_submitted();
        obs::emit_reply_submitted(question_id, local_id);
        Ok(PendingReply {
            question_id: question_id.clone(),
            local_id,
            reply,
        })
    }

    /// Remote half of a reply submission: write the reply document, then
    /// append its reference to the question.
    #[instrument(skip(self, pending), fields(question_id = %pending.question_id, local_id = %pending.local_id))]
    pub async fn persist_reply(&self, pending: PendingReply) -> BoardResult<ReplyRef> {
        self.sync_reply(&pending.question_id, pending.local_id, &pending.reply, None)
            .await
    }

    /// Submit the current draft of `question_id`.
    ///
    /// On a remote failure the reply stays on the board marked unsynced and
    /// the error is returned.
    pub async fn submit_reply(&self, question_id: &QuestionId) -> BoardResult<ReplyRef> {
        let pending = self.begin_reply(question_id)?;
        self.persist_reply(pending).await
    }

    /// Re-run the remote steps an unsynced reply is missing. A reply whose
    /// document was already written is not written again.
    #[instrument(skip(self))]
    pub async fn retry_reply(
        &self,
        question_id: &QuestionId,
        local_id: LocalReplyId,
    ) -> BoardResult<ReplyRef> {
        let (reply, persisted) = self.state().mark_reply_retrying(question_id, local_id)?;
        self.sync_reply(question_id, local_id, &reply, persisted)
            .await
    }

    async fn sync_reply(
        &self,
        question_id: &QuestionId,
        local_id: LocalReplyId,
        reply: &Reply,
        persisted: Option<ReplyRef>,
    ) -> BoardResult<ReplyRef> {
        match self.write_reply(question_id, local_id, reply, persisted).await {
            Ok(reference) => {
                self.state()
                    .mark_reply_synced(question_id, local_id, reference.clone())?;
                obs::emit_reply_synced(question_id, local_id, &reference);
                Ok(reference)
            }
            Err(err) => {
                METRICS.inc_reply_sync_failures();
                obs::emit_reply_sync_failed(question_id, local_id, &err);
                self.state()
                    .mark_reply_unsynced(question_id, local_id, err.to_string())?;
                Err(err)
            }
        }
    }

    async fn write_reply(
        &self,
        question_id: &QuestionId,
        local_id: LocalReplyId,
        reply: &Reply,
        persisted: Option<ReplyRef>,
    ) -> BoardResult<ReplyRef> {
        let reference = match persisted {
            Some(reference) => reference,
            None => {
                let reference: ReplyRef = self
                    .store
                    .add_document(collections::REPLIES, reply.to_data())
                    .await?
                    .into();
                self.state()
                    .mark_reply_persisted(question_id, local_id, reference.clone())?;
                reference
            }
        };
        let patch = DocumentPatch::new().array_union(fields::REPLIES, [reference.to_value()]);
        self.store
            .update_document(collections::QUESTIONS, &question_id.document_id(), patch)
            .await?;
        Ok(reference)
    }

    /// Resolve a question again and merge it back, keeping local replies.
    ///
    /// Returns `PartialResolution` if the question is still degraded.
    #[instrument(skip(self))]
    pub async fn retry_resolution(&self, question_id: &QuestionId) -> BoardResult<()> {
        let question = match self.resolver.resolve_by_id(question_id).await {
            Ok(question) => question,
            Err(err) => {
                obs::emit_read_failed("question", &err);
                return Err(err);
            }
        };
        let outcome = question.ensure_complete();
        self.state().upsert_question(question);
        outcome
    }

    /// Run the sign-in popup. The auth status is left to the listener.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> BoardResult<User> {
        self.state().set_sign_in_pending(true);
        let result = self.session.sign_in().await;
        self.state().set_sign_in_pending(false);
        if let Err(err) = &result {
            warn!(event = "auth.sign_in_failed", error = %err);
        }
        result
    }

    /// Switch to signed out right away, then end the provider session.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> BoardResult<()> {
        self.state().mark_signed_out();
        obs::emit_auth_changed(AuthStatus::SignedOut);
        self.session.sign_out().await
    }

    /// Wait for detached work (page view, provisioning) to finish.
    pub async fn settle(&self) {
        self.background().settle().await;
    }
}
