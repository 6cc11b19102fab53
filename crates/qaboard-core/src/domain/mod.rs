//! Domain models for qaboard.
//!
//! Canonical definitions for the board's entities:
//! - `SiteConfig`: singleton site configuration
//! - `Question` / `RawQuestion`: a question before and after reply resolution
//! - `Reply`, `ReplyRef`, `ResolvedReply`: reply content, references and sync state
//! - `User`, `Identity`, `AuthStatus`: who is signed in

pub mod error;
pub mod question;
pub mod schema;
pub mod site;
pub mod user;

// Re-export main types and errors
pub use error::{BoardError, BoardResult};
pub use question::{
    FailureReason, LocalReplyId, Question, QuestionId, RawQuestion, Reply, ReplyRef, ReplySlot,
    ReplySync, Resolution, ResolutionFailure, ResolvedReply,
};
pub use schema::{collections, fields, SITE_INFO};
pub use site::{SiteConfig, PLACEHOLDER_TITLE};
pub use user::{AuthStatus, Identity, User};
