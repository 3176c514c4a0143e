//! Capability executor — validates an invocation request against the
//! registry and runs the handler.
//!
//! The executor never propagates an error to its caller: unknown
//! capabilities, missing parameters, and handler failures all come back as
//! an `InvocationResult::Err`, so the agent loop can surface them to the
//! model as ordinary observations and let it self-correct.

use crate::capability::CapabilityRegistry;
use crate::parser::InvocationRequest;
use braidline_core::event::Envelope;
use std::sync::Arc;
use tracing::{debug, info};

/// The outcome of one capability invocation.
#[derive(Debug, Clone)]
pub enum InvocationResult {
    /// The handler completed; carries its JSON output.
    Ok(serde_json::Value),
    /// The invocation failed; carries the error message.
    Err(String),
}

impl InvocationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Convert into the JSON-RPC envelope fed back to the model and
    /// emitted as an observation event.
    pub fn into_envelope(self, id: serde_json::Value) -> Envelope {
        match self {
            Self::Ok(data) => Envelope::result(data, id),
            Self::Err(message) => Envelope::error(message, id),
        }
    }
}

/// Executes invocation requests against a shared registry.
pub struct ToolExecutor {
    registry: Arc<CapabilityRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Validate and run one invocation. Returns the result together with
    /// the request's correlation id.
    ///
    /// Required parameters are checked in spec-declared order, so the
    /// first missing parameter is reported deterministically.
    pub async fn execute(&self, request: &InvocationRequest) -> (InvocationResult, serde_json::Value) {
        let id = request.id.clone();

        let Some(capability) = self.registry.get(&request.name) else {
            debug!(capability = %request.name, "invocation for unregistered capability");
            return (
                InvocationResult::Err(format!("capability {} not found", request.name)),
                id,
            );
        };

        for param in capability.params() {
            if param.required && !request.arguments.contains_key(&param.name) {
                return (
                    InvocationResult::Err(format!("missing required parameter: {}", param.name)),
                    id,
                );
            }
        }

        info!(capability = %request.name, "capability invocation started");
        let result = match capability.execute(&request.arguments).await {
            Ok(data) => InvocationResult::Ok(data),
            Err(e) => InvocationResult::Err(e.to_string()),
        };
        info!(
            capability = %request.name,
            success = result.is_ok(),
            "capability invocation finished"
        );

        (result, id)
    }
}
