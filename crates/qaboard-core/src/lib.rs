//! qaboard Core Library
//!
//! Client-side sync layer of a Q&A board: reply references are resolved
//! into questions, the signed-in user is tracked through the identity
//! provider's listener, and user actions are applied optimistically to view
//! state before the matching remote writes.

pub mod analytics;
pub mod background;
pub mod domain;
pub mod identity;
pub mod metrics;
pub mod obs;
pub mod reconciler;
pub mod resolver;
pub mod seed;
pub mod session;
pub mod state;
pub mod telemetry;

pub use domain::{
    AuthStatus, BoardError, BoardResult, FailureReason, Identity, LocalReplyId, Question,
    QuestionId, RawQuestion, Reply, ReplyRef, ReplySlot, ReplySync, Resolution,
    ResolutionFailure, ResolvedReply, SiteConfig, User,
};

pub use analytics::{AnalyticsSink, TracingAnalytics};
pub use background::BackgroundTasks;
pub use identity::LocalIdentityProvider;
pub use reconciler::{PendingReply, Reconciler};
pub use resolver::{Delivery, ReferenceResolver};
pub use seed::{BoardSeed, QuestionSeed, SeedTarget, SeededBoard};
pub use session::{AuthSubscription, IdentityProvider, SessionManager, SignInOutcome};
pub use state::{AppSnapshot, AppState, LoadPhase};

pub use qaboard_store::{
    DocumentStore, StorageError, StoreConfig, SurrealDocumentStore,
};
