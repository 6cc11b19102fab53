//! Board-level error taxonomy.

use qaboard_store::StorageError;

use super::question::{LocalReplyId, QuestionId};

/// qaboard domain errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoardError {
    /// Expected document is absent. A handled branch, never a fault.
    #[error("not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Network/backend failure on a store call.
    #[error("transport failure: {0}")]
    Transport(#[from] StorageError),

    /// One or more reply references of a question failed to resolve.
    #[error("question {question_id}: {failed} of {total} replies failed to resolve")]
    PartialResolution {
        question_id: QuestionId,
        failed: usize,
        total: usize,
    },

    #[error("malformed document {reference}: {reason}")]
    MalformedDocument { reference: String, reason: String },

    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),

    #[error("reply is empty")]
    EmptyReply,

    #[error("reply {local_id} on question {question_id} is not awaiting a retry")]
    ReplyNotRetryable {
        question_id: QuestionId,
        local_id: LocalReplyId,
    },

    /// Identity provider failure (popup closed, provider unreachable).
    #[error("identity provider error: {0}")]
    Identity(String),
}

impl BoardError {
    /// Whether this error reports a missing document, either directly or as
    /// a store-level `NotFound`.
    pub fn is_not_found(&self) -> bool {
        match self {
            BoardError::NotFound { .. } => true,
            BoardError::Transport(err) => err.is_not_found(),
            _ => false,
        }
    }
}

/// Result type for qaboard domain operations.
pub type BoardResult<T> = std::result::Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_resolution_display() {
        let err = BoardError::PartialResolution {
            question_id: QuestionId::new("q1"),
            failed: 1,
            total: 2,
        };
        assert_eq!(
            err.to_string(),
            "question q1: 1 of 2 replies failed to resolve"
        );
    }

    #[test]
    fn store_not_found_counts_as_not_found() {
        let err: BoardError = StorageError::NotFound {
            collection: "Questions".into(),
            id: "q1".into(),
        }
        .into();
        assert!(err.is_not_found());
        assert!(!BoardError::from(StorageError::Backend("down".into())).is_not_found());
        assert!(!BoardError::EmptyReply.is_not_found());
    }
}
