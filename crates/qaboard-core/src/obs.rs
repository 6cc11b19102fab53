//! Structured observability hooks for board lifecycle events.
//!
//! Every load, resolution, reply sync and auth transition emits one
//! `tracing` event with a stable `event` field, so log pipelines can follow
//! a reply from optimistic insert to persisted reference. Failures that the
//! UI recovers from are emitted at `warn!`.

use tracing::{info, warn};

use crate::domain::{AuthStatus, LocalReplyId, QuestionId, ReplyRef};

/// Emit event: the question collection was listed.
pub fn emit_questions_listed(count: usize) {
    info!(event = "questions.listed", count = count);
}

/// Emit event: one question finished resolving and is ready for display.
pub fn emit_question_ready(question_id: &QuestionId, replies: usize, degraded: bool) {
    info!(
        event = "question.ready",
        question_id = %question_id,
        replies = replies,
        degraded = degraded,
    );
}

/// Emit event: some reply slots of a question failed to resolve.
pub fn emit_partial_resolution(question_id: &QuestionId, failed: usize, total: usize) {
    warn!(
        event = "question.partial_resolution",
        question_id = %question_id,
        failed = failed,
        total = total,
    );
}

/// Emit event: every question of the listing has been delivered.
pub fn emit_questions_loaded(count: usize, duration_ms: u64) {
    info!(event = "questions.loaded", count = count, duration_ms = duration_ms);
}

/// Emit event: a read failed and the view falls back to a neutral state.
pub fn emit_read_failed(what: &str, error: &dyn std::fmt::Display) {
    warn!(event = "read.failed", what = %what, error = %error);
}

/// Emit event: a reply was appended optimistically.
pub fn emit_reply_submitted(question_id: &QuestionId, local_id: LocalReplyId) {
    info!(event = "reply.submitted", question_id = %question_id, local_id = %local_id);
}

/// Emit event: a reply is persisted and referenced from its question.
pub fn emit_reply_synced(question_id: &QuestionId, local_id: LocalReplyId, reference: &ReplyRef) {
    info!(
        event = "reply.synced",
        question_id = %question_id,
        local_id = %local_id,
        reference = %reference,
    );
}

/// Emit event: the remote write chain of a reply failed; the reply stays
/// visible with an unsynced marker.
pub fn emit_reply_sync_failed(
    question_id: &QuestionId,
    local_id: LocalReplyId,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "reply.sync_failed",
        question_id = %question_id,
        local_id = %local_id,
        error = %error,
    );
}

/// Emit event: the session listener reported a new status.
pub fn emit_auth_changed(status: AuthStatus) {
    info!(event = "auth.changed", status = %status);
}

/// Emit event: a detached background task failed.
pub fn emit_background_failed(task: &str, error: &dyn std::fmt::Display) {
    warn!(event = "background.failed", task = %task, error = %error);
}
