//! Analytics sink.
//!
//! The board only ever logs a page view at startup, fire-and-forget. The
//! sink is a trait so a hosted analytics client can be dropped in; the
//! default implementation records the event through `tracing`.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::domain::BoardResult;

/// Event name logged once per mount.
pub const PAGE_VIEW: &str = "page_view";

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Record one named event. Callers never wait on the result.
    async fn log_event(&self, name: &str, params: Value) -> BoardResult<()>;
}

/// Analytics sink that emits events as structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

#[async_trait]
impl AnalyticsSink for TracingAnalytics {
    async fn log_event(&self, name: &str, params: Value) -> BoardResult<()> {
        info!(event = "analytics", name = %name, params = %params);
        Ok(())
    }
}

/// Parameters of the startup page view.
pub fn page_view_params() -> Value {
    json!({ "page_path": "/" })
}
