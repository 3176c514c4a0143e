//! Post search capability — bridges the model to the blog's
//! vector-similarity search subsystem.
//!
//! The search backend itself is an external collaborator; this module only
//! defines the narrow contract (`PostSearch`) and adapts it to the
//! capability protocol.

use crate::capability::{Capability, ParamSpec};
use async_trait::async_trait;
use braidline_core::error::CapabilityError;
use std::sync::Arc;

/// Narrow contract over the similarity-search subsystem.
#[async_trait]
pub trait PostSearch: Send + Sync {
    /// Return up to `limit` matching posts as a JSON array of
    /// `{title, excerpt, score}` objects.
    async fn search(&self, query: &str, limit: usize) -> Result<serde_json::Value, String>;
}

pub struct PostSearchCapability {
    backend: Arc<dyn PostSearch>,
    default_limit: usize,
}

impl PostSearchCapability {
    pub fn new(backend: Arc<dyn PostSearch>) -> Self {
        Self {
            backend,
            default_limit: 5,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }
}

#[async_trait]
impl Capability for PostSearchCapability {
    fn name(&self) -> &str {
        "post_search"
    }

    fn description(&self) -> &str {
        "Search the blog's posts by semantic similarity and return the best matches."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("query", "string", "What to search for"),
            ParamSpec::optional("limit", "number", "Maximum number of posts to return"),
        ]
    }

    async fn execute(
        &self,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, CapabilityError> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CapabilityError::InvalidArguments("missing 'query' argument".into()))?;

        let limit = arguments
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(self.default_limit);

        self.backend
            .search(query, limit)
            .await
            .map_err(|reason| CapabilityError::ExecutionFailed {
                name: "post_search".into(),
                reason,
            })
    }
}
