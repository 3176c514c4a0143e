//! Echo capability — returns its input unchanged.
//!
//! Mostly useful for wiring checks and end-to-end tests of the invocation
//! protocol.

use crate::capability::{Capability, ParamSpec};
use async_trait::async_trait;
use braidline_core::error::CapabilityError;

pub struct EchoCapability;

#[async_trait]
impl Capability for EchoCapability {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back unchanged."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("text", "string", "The text to echo back")]
    }

    async fn execute(
        &self,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, CapabilityError> {
        arguments
            .get("text")
            .cloned()
            .ok_or_else(|| CapabilityError::InvalidArguments("missing 'text' argument".into()))
    }
}
