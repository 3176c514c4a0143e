//! # Braidline Core
//!
//! Domain types, traits, and error definitions for the braidline response
//! pipeline. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The model backend is defined as a trait here; implementations live
//! elsewhere. This enables:
//! - Swapping backends via configuration
//! - Easy testing with scripted mock clients
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod model;

// Re-export key types at crate root for ergonomics
pub use error::{CapabilityError, EncodeError, Error, ModelError, Result};
pub use event::{Envelope, EnvelopeError, LifecycleEvent, ENVELOPE_ERROR_CODE};
pub use message::{Message, Role, Transcript};
pub use model::{ModelClient, ModelRequest, TokenStream};
