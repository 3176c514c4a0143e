//! Capability trait and registry — the abstraction over model-invocable
//! functions.
//!
//! Capabilities are what give the model the ability to act: evaluate an
//! expression, search posts, echo input. The registry holds them by name
//! and renders the model-facing catalog that teaches the model the exact
//! invocation syntax.

use async_trait::async_trait;
use braidline_core::error::CapabilityError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// One entry in a capability's ordered parameter spec.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Parameter key as it appears in the arguments object.
    pub name: String,
    /// Type tag shown to the model ("string", "number", ...).
    pub type_tag: String,
    /// Free-text description for model consumption.
    pub description: String,
    /// Whether the executor rejects invocations missing this key.
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &str, type_tag: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, type_tag: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            description: description.into(),
            required: false,
        }
    }
}

/// The core Capability trait.
///
/// Each capability implements this and is registered in the
/// `CapabilityRegistry`; the agent loop executes them when the model
/// requests it.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The unique, stable name of this capability (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this capability does (sent to the model).
    fn description(&self) -> &str;

    /// The ordered parameter spec. Declaration order matters: missing
    /// required parameters are reported first-declared-first.
    fn params(&self) -> Vec<ParamSpec>;

    /// Execute the capability with the full argument mapping.
    async fn execute(
        &self,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<serde_json::Value, CapabilityError>;
}

/// A registry of available capabilities.
///
/// Built once at process start and treated as read-only during request
/// handling, so runs share it without locking.
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
    /// First-registration order, for deterministic catalog rendering.
    order: Vec<String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a capability. Replaces any existing entry with the same
    /// name — last registration wins, with a warning, never an error.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        if self.capabilities.insert(name.clone(), capability).is_some() {
            warn!(capability = %name, "capability re-registered, previous handler replaced");
        } else {
            self.order.push(name);
        }
    }

    /// Get a capability by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.get(name)
    }

    /// List registered names in first-registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Render the capability catalog for embedding in the model's system
    /// instruction: every capability with its flattened parameter list,
    /// followed by the literal invocation syntax the model must emit.
    ///
    /// An empty registry yields a fixed sentence instead of an empty
    /// catalog — the model must never be told to use tools that don't
    /// exist.
    pub fn describe_all(&self) -> String {
        if self.capabilities.is_empty() {
            return "当前没有可用的工具。".to_string();
        }

        let mut out = String::from("你可以使用以下工具:\n\n");
        for name in &self.order {
            let cap = &self.capabilities[name];
            out.push_str(&format!("**{}**\n", cap.name()));
            out.push_str(&format!("描述: {}\n", cap.description()));
            out.push_str("参数:\n");
            for p in cap.params() {
                let requirement = if p.required { "必需" } else { "可选" };
                out.push_str(&format!(
                    "  - {} ({})（{}）: {}\n",
                    p.name, p.type_tag, requirement, p.description
                ));
            }
            out.push('\n');
        }

        out.push_str(INVOCATION_SYNTAX);
        out
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The fixed invocation-syntax block appended to the catalog.
///
/// The example here must match the parser's accepted grammar
/// byte-for-byte; keep `capability.rs` and `parser.rs` in lockstep.
const INVOCATION_SYNTAX: &str = "\
需要调用工具时，请在回复中输出如下格式的调用块，参数为一个 JSON 对象:

<tool_call name=\"工具名\">
{\"参数名\": \"参数值\"}
</tool_call>

每次回复最多调用一个工具。不需要调用工具时，直接给出最终回答。
";

#[cfg(test)]
mod tests {
    use super::*;
    use braidline_core::error::CapabilityError;

    struct EchoCapability;

    #[async_trait]
    impl Capability for EchoCapability {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn params(&self) -> Vec<ParamSpec> {
            vec![ParamSpec::required("text", "string", "The text to echo")]
        }
        async fn execute(
            &self,
            arguments: &serde_json::Map<String, serde_json::Value>,
        ) -> Result<serde_json::Value, CapabilityError> {
            Ok(arguments.get("text").cloned().unwrap_or_default())
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn reregistration_overwrites_without_duplicating() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability));
        registry.register(Arc::new(EchoCapability));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn empty_registry_catalog_sentence() {
        let registry = CapabilityRegistry::new();
        assert_eq!(registry.describe_all(), "当前没有可用的工具。");
    }

    #[test]
    fn catalog_contains_name_params_and_syntax() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability));
        let catalog = registry.describe_all();
        assert!(catalog.contains("**echo**"));
        assert!(catalog.contains("描述: Echoes back the input"));
        assert!(catalog.contains("  - text (string)（必需）: The text to echo"));
        assert!(catalog.contains("<tool_call name="));
        assert!(catalog.contains("</tool_call>"));
    }
}
