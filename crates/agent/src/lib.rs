//! The core agent loop for braidline.
//!
//! The agent follows a **Thought → Action → Observation** cycle:
//!
//! 1. **Receive** a user message plus history and a capability-aware
//!    system instruction
//! 2. **Stream** the model's response, emitting `thought` events live
//! 3. **If invocation blocks**: execute them in order, emit
//!    `action`/`observation` pairs, feed results back, loop
//! 4. **If no blocks**: emit the cleaned text as `answer`, then `done`
//!
//! The loop is bounded by `max_iterations`; exhaustion produces a
//! renderable timed-out answer rather than a hung stream.

pub mod loop_runner;
pub mod scripted;

pub use loop_runner::AgentLoop;
pub use scripted::{ScriptedModel, ScriptedTurn};
