//! Application view state.
//!
//! `AppState` is the single owner of everything the board renders. Each
//! field group has its own mutation methods:
//!
//! | group     | methods                                                        |
//! |-----------|----------------------------------------------------------------|
//! | site      | `set_site`, `mark_site_missing`, `mark_site_failed`            |
//! | questions | `begin_questions_load`, `upsert_question`, `mark_questions_*`  |
//! | replies   | `push_optimistic_reply`, `mark_reply_*`                        |
//! | auth      | `apply_auth_event`, `set_sign_in_pending`, `mark_signed_out`   |
//! | drafts    | `set_draft`, `take_draft`                                      |
//!
//! Questions are keyed by store id. Arrival order is tracked separately so
//! rendering can follow the order in which questions became ready.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{
    AuthStatus, BoardError, BoardResult, Identity, LocalReplyId, Question, QuestionId, Reply,
    ReplyRef, ReplySync, ResolvedReply, SiteConfig, User,
};

/// Progress of one asynchronous load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    #[default]
    Loading,
    /// Some questions have arrived, more may follow.
    Partial,
    Loaded,
    /// The document does not exist.
    Missing,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    site: SiteConfig,
    site_phase: LoadPhase,
    questions: HashMap<QuestionId, Question>,
    arrival: Vec<QuestionId>,
    questions_phase: LoadPhase,
    auth: AuthStatus,
    current_user: User,
    sign_in_pending: bool,
    drafts: HashMap<QuestionId, String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    // -- site ---------------------------------------------------------------

    pub fn set_site(&mut self, site: SiteConfig) {
        self.site = site;
        self.site_phase = LoadPhase::Loaded;
    }

    pub fn mark_site_missing(&mut self) {
        self.site_phase = LoadPhase::Missing;
    }

    pub fn mark_site_failed(&mut self) {
        self.site_phase = LoadPhase::Failed;
    }

    // -- questions ----------------------------------------------------------

    pub fn begin_questions_load(&mut self) {
        self.questions_phase = LoadPhase::Loading;
    }

    /// Insert or replace a resolved question.
    ///
    /// Replies created on this client that the incoming copy does not carry
    /// yet (pending, unsynced, or synced after the copy was read) are kept
    /// after the remote replies. References of the synced ones are kept in
    /// `replies` so a stale copy cannot drop them.
    pub fn upsert_question(&mut self, mut incoming: Question) {
        match self.questions.remove(&incoming.id) {
            Some(existing) => {
                let local: Vec<ResolvedReply> = existing
                    .resolved_replies
                    .into_iter()
                    .filter(|r| r.local_id.is_some())
                    .filter(|r| match &r.reference {
                        Some(reference) => !incoming.replies.contains(reference),
                        None => true,
                    })
                    .collect();
                for reply in &local {
                    if let (ReplySync::Synced, Some(reference)) = (&reply.sync, &reply.reference) {
                        if !incoming.replies.contains(reference) {
                            incoming.replies.push(reference.clone());
                        }
                    }
                }
                incoming.resolved_replies.extend(local);
            }
            None => self.arrival.push(incoming.id.clone()),
        }
        self.questions.insert(incoming.id.clone(), incoming);
        if self.questions_phase == LoadPhase::Loading {
            self.questions_phase = LoadPhase::Partial;
        }
    }

    pub fn mark_questions_loaded(&mut self) {
        self.questions_phase = LoadPhase::Loaded;
    }

    pub fn mark_questions_failed(&mut self) {
        self.questions_phase = LoadPhase::Failed;
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.get(id)
    }

    fn question_mut(&mut self, id: &QuestionId) -> BoardResult<&mut Question> {
        self.questions
            .get_mut(id)
            .ok_or_else(|| BoardError::UnknownQuestion(id.clone()))
    }

    fn reply_mut(
        &mut self,
        id: &QuestionId,
        local_id: LocalReplyId,
    ) -> BoardResult<&mut ResolvedReply> {
        self.question_mut(id)?
            .reply_mut(local_id)
            .ok_or_else(|| BoardError::ReplyNotRetryable {
                question_id: id.clone(),
                local_id,
            })
    }

    // -- replies ------------------------------------------------------------

    /// Append a pending reply to the question with store id `id`.
    pub fn push_optimistic_reply(
        &mut self,
        id: &QuestionId,
        reply: Reply,
    ) -> BoardResult<LocalReplyId> {
        let local_id = LocalReplyId::new();
        self.question_mut(id)?
            .resolved_replies
            .push(ResolvedReply::optimistic(reply, local_id));
        Ok(local_id)
    }

    /// The reply document exists remotely; its reference is not yet on the
    /// question.
    pub fn mark_reply_persisted(
        &mut self,
        id: &QuestionId,
        local_id: LocalReplyId,
        reference: ReplyRef,
    ) -> BoardResult<()> {
        self.reply_mut(id, local_id)?.reference = Some(reference);
        Ok(())
    }

    pub fn mark_reply_synced(
        &mut self,
        id: &QuestionId,
        local_id: LocalReplyId,
        reference: ReplyRef,
    ) -> BoardResult<()> {
        let question = self.question_mut(id)?;
        if !question.replies.contains(&reference) {
            question.replies.push(reference.clone());
        }
        let reply = self.reply_mut(id, local_id)?;
        reply.reference = Some(reference);
        reply.sync = ReplySync::Synced;
        Ok(())
    }

    pub fn mark_reply_unsynced(
        &mut self,
        id: &QuestionId,
        local_id: LocalReplyId,
        error: impl Into<String>,
    ) -> BoardResult<()> {
        self.reply_mut(id, local_id)?.sync = ReplySync::Unsynced {
            error: error.into(),
        };
        Ok(())
    }

    /// Move an unsynced reply back to pending and return what the retry
    /// needs: the content and the persisted document, if any.
    pub fn mark_reply_retrying(
        &mut self,
        id: &QuestionId,
        local_id: LocalReplyId,
    ) -> BoardResult<(Reply, Option<ReplyRef>)> {
        let reply = self.reply_mut(id, local_id)?;
        if !reply.is_unsynced() {
            return Err(BoardError::ReplyNotRetryable {
                question_id: id.clone(),
                local_id,
            });
        }
        reply.sync = ReplySync::Pending;
        Ok((reply.reply.clone(), reply.reference.clone()))
    }

    // -- auth ---------------------------------------------------------------

    /// Apply one listener event and return the resulting status.
    pub fn apply_auth_event(&mut self, identity: Option<Identity>) -> AuthStatus {
        match identity {
            Some(identity) => {
                self.auth = AuthStatus::SignedIn;
                self.current_user = identity.user;
            }
            None => {
                self.auth = AuthStatus::SignedOut;
                self.current_user = User::default();
            }
        }
        self.sign_in_pending = false;
        self.auth
    }

    /// Affordance shown while a popup is open. Never changes `AuthStatus`.
    pub fn set_sign_in_pending(&mut self, pending: bool) {
        self.sign_in_pending = pending;
    }

    pub fn mark_signed_out(&mut self) {
        self.auth = AuthStatus::SignedOut;
        self.current_user = User::default();
        self.sign_in_pending = false;
    }

    pub fn auth(&self) -> AuthStatus {
        self.auth
    }

    // -- drafts -------------------------------------------------------------

    pub fn set_draft(&mut self, id: &QuestionId, text: impl Into<String>) {
        self.drafts.insert(id.clone(), text.into());
    }

    pub fn take_draft(&mut self, id: &QuestionId) -> String {
        self.drafts.remove(id).unwrap_or_default()
    }

    pub fn draft(&self, id: &QuestionId) -> &str {
        self.drafts.get(id).map(String::as_str).unwrap_or_default()
    }

    // -- reads --------------------------------------------------------------

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            site: self.site.clone(),
            site_phase: self.site_phase,
            questions: self
                .arrival
                .iter()
                .filter_map(|id| self.questions.get(id))
                .cloned()
                .collect(),
            questions_phase: self.questions_phase,
            auth: self.auth,
            current_user: self.current_user.clone(),
            sign_in_pending: self.sign_in_pending,
        }
    }
}

/// Owned, render-ready copy of the view state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppSnapshot {
    pub site: SiteConfig,
    pub site_phase: LoadPhase,
    /// In arrival order.
    pub questions: Vec<Question>,
    pub questions_phase: LoadPhase,
    pub auth: AuthStatus,
    pub current_user: User,
    pub sign_in_pending: bool,
}

impl AppSnapshot {
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    /// Every reply whose remote writes failed, with its question.
    pub fn unsynced_replies(&self) -> Vec<(&QuestionId, &ResolvedReply)> {
        self.questions
            .iter()
            .flat_map(|q| {
                q.resolved_replies
                    .iter()
                    .filter(|r| r.is_unsynced())
                    .map(move |r| (&q.id, r))
            })
            .collect()
    }

    pub fn degraded_questions(&self) -> Vec<&Question> {
        self.questions.iter().filter(|q| q.is_degraded()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{collections, Resolution, PLACEHOLDER_TITLE};
    use qaboard_store::DocumentRef;

    fn reference(id: &str) -> ReplyRef {
        DocumentRef::new(collections::REPLIES, id).into()
    }

    fn question(id: &str, replies: &[(&str, &str)]) -> Question {
        Question {
            id: QuestionId::new(id),
            title: format!("title of {id}"),
            description: String::new(),
            replies: replies.iter().map(|(r, _)| reference(r)).collect(),
            resolved_replies: replies
                .iter()
                .map(|(r, content)| ResolvedReply::fetched(Reply::new(*content), reference(r)))
                .collect(),
            resolution: Resolution::Complete,
        }
    }

    #[test]
    fn initial_state_is_neutral() {
        let snapshot = AppState::new().snapshot();
        assert_eq!(snapshot.site.title, PLACEHOLDER_TITLE);
        assert_eq!(snapshot.site_phase, LoadPhase::Loading);
        assert!(snapshot.questions.is_empty());
        assert_eq!(snapshot.auth, AuthStatus::Unknown);
        assert!(snapshot.current_user.is_empty());
    }

    #[test]
    fn questions_keep_arrival_order_and_phase() {
        let mut state = AppState::new();
        state.begin_questions_load();
        state.upsert_question(question("q2", &[]));
        assert_eq!(state.snapshot().questions_phase, LoadPhase::Partial);
        state.upsert_question(question("q1", &[]));
        state.mark_questions_loaded();

        let snapshot = state.snapshot();
        let ids: Vec<_> = snapshot.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q2", "q1"]);
        assert_eq!(snapshot.questions_phase, LoadPhase::Loaded);
    }

    #[test]
    fn optimistic_reply_targets_question_by_id() {
        let mut state = AppState::new();
        state.upsert_question(question("q1", &[]));
        state.upsert_question(question("q2", &[("r1", "old")]));

        let local_id = state
            .push_optimistic_reply(&QuestionId::new("q2"), Reply::new("new"))
            .unwrap();

        let snapshot = state.snapshot();
        assert!(snapshot.questions[0].resolved_replies.is_empty());
        let q2 = snapshot.question(&QuestionId::new("q2")).unwrap();
        assert_eq!(q2.reply_contents(), vec!["old", "new"]);
        assert_eq!(q2.reply(local_id).unwrap().sync, ReplySync::Pending);
    }

    #[test]
    fn optimistic_reply_on_unknown_question_fails() {
        let mut state = AppState::new();
        assert_eq!(
            state.push_optimistic_reply(&QuestionId::new("nope"), Reply::new("x")),
            Err(BoardError::UnknownQuestion(QuestionId::new("nope")))
        );
    }

    #[test]
    fn synced_reply_appends_reference_once() {
        let mut state = AppState::new();
        let id = QuestionId::new("q1");
        state.upsert_question(question("q1", &[]));
        let local_id = state.push_optimistic_reply(&id, Reply::new("hi")).unwrap();

        state.mark_reply_synced(&id, local_id, reference("r9")).unwrap();
        state.mark_reply_synced(&id, local_id, reference("r9")).unwrap();

        let q = state.question(&id).unwrap();
        assert_eq!(q.replies, vec![reference("r9")]);
        assert_eq!(q.reply(local_id).unwrap().sync, ReplySync::Synced);
    }

    #[test]
    fn only_unsynced_replies_can_be_retried() {
        let mut state = AppState::new();
        let id = QuestionId::new("q1");
        state.upsert_question(question("q1", &[]));
        let local_id = state.push_optimistic_reply(&id, Reply::new("hi")).unwrap();

        assert!(matches!(
            state.mark_reply_retrying(&id, local_id),
            Err(BoardError::ReplyNotRetryable { .. })
        ));

        state
            .mark_reply_persisted(&id, local_id, reference("r1"))
            .unwrap();
        state.mark_reply_unsynced(&id, local_id, "down").unwrap();
        assert_eq!(state.snapshot().unsynced_replies().len(), 1);

        let (reply, persisted) = state.mark_reply_retrying(&id, local_id).unwrap();
        assert_eq!(reply.content, "hi");
        assert_eq!(persisted, Some(reference("r1")));
        assert!(state.snapshot().unsynced_replies().is_empty());
    }

    #[test]
    fn upsert_keeps_local_replies_missing_remotely() {
        let mut state = AppState::new();
        let id = QuestionId::new("q1");
        state.upsert_question(question("q1", &[("r1", "a")]));
        let pending = state.push_optimistic_reply(&id, Reply::new("mine")).unwrap();
        let synced = state.push_optimistic_reply(&id, Reply::new("done")).unwrap();
        state.mark_reply_synced(&id, synced, reference("r2")).unwrap();

        // the re-fetched copy already has r2 but not the pending reply
        state.upsert_question(question("q1", &[("r1", "a"), ("r2", "done")]));

        let q = state.question(&id).unwrap();
        assert_eq!(q.reply_contents(), vec!["a", "done", "mine"]);
        assert!(q.reply(pending).is_some());
        assert!(q.reply(synced).is_none());
        assert_eq!(state.snapshot().questions.len(), 1);
    }

    #[test]
    fn stale_copy_keeps_reference_of_reply_synced_meanwhile() {
        let mut state = AppState::new();
        let id = QuestionId::new("q1");
        state.upsert_question(question("q1", &[("r1", "first")]));
        let local_id = state.push_optimistic_reply(&id, Reply::new("mine")).unwrap();
        state.mark_reply_synced(&id, local_id, reference("r2")).unwrap();

        // read before the union landed remotely
        state.upsert_question(question("q1", &[("r1", "first")]));

        let q = state.question(&id).unwrap();
        assert_eq!(q.replies, vec![reference("r1"), reference("r2")]);
        assert_eq!(q.reply_contents(), vec!["first", "mine"]);
        assert_eq!(q.reply(local_id).unwrap().sync, ReplySync::Synced);
    }

    #[test]
    fn auth_follows_listener_events_only() {
        let mut state = AppState::new();
        state.set_sign_in_pending(true);
        assert_eq!(state.auth(), AuthStatus::Unknown);

        let status = state.apply_auth_event(Some(Identity::new("u1", User::new("Ada", "p"))));
        assert_eq!(status, AuthStatus::SignedIn);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.current_user.display_name, "Ada");
        assert!(!snapshot.sign_in_pending);

        state.mark_signed_out();
        assert_eq!(state.auth(), AuthStatus::SignedOut);
        assert!(state.snapshot().current_user.is_empty());
    }

    #[test]
    fn drafts_are_per_question() {
        let mut state = AppState::new();
        let q1 = QuestionId::new("q1");
        let q2 = QuestionId::new("q2");
        state.set_draft(&q1, "one");
        state.set_draft(&q2, "two");
        assert_eq!(state.take_draft(&q1), "one");
        assert_eq!(state.draft(&q1), "");
        assert_eq!(state.draft(&q2), "two");
    }
}
