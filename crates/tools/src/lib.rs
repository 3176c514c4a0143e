//! Capability registry, invocation-block parser, and executor for
//! braidline.
//!
//! This crate owns the whole invocation protocol:
//! - `capability` — the `Capability` trait, the registry, and the
//!   model-facing catalog text
//! - `parser` — extraction of tag-wrapped JSON invocation blocks from raw
//!   model output
//! - `executor` — validation and execution, normalizing every failure into
//!   a result envelope
//!
//! Plus the built-in capabilities: `echo`, `calculator`, and the
//! `post_search` bridge to the similarity-search subsystem.

pub mod calculator;
pub mod capability;
pub mod echo;
pub mod executor;
pub mod parser;
pub mod post_search;

pub use capability::{Capability, CapabilityRegistry, ParamSpec};
pub use executor::{InvocationResult, ToolExecutor};
pub use parser::{parse, strip_invocations, strip_markers, InvocationRequest};
pub use post_search::{PostSearch, PostSearchCapability};

use std::sync::Arc;

/// Create a registry with the built-in capabilities that need no external
/// collaborators. `post_search` takes an injected backend, so callers add
/// it themselves.
pub fn default_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(echo::EchoCapability));
    registry.register(Arc::new(calculator::CalculatorCapability));
    registry
}
