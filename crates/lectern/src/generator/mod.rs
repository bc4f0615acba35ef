//! Generation orchestration: the bounded tool-use loop and its configuration.
//!
//! The [`Generator`] drives one exchange: it composes the system context,
//! calls the inference capability, dispatches any requested retrieval tools
//! through a [`ToolRegistry`](crate::tools::ToolRegistry), feeds the results
//! back, and enforces the round limit before forcing a final tool-free
//! synthesis call.

pub mod config;
pub mod orchestrator;
pub mod prompt;

pub use config::GeneratorConfig;
pub use orchestrator::Generator;
pub use prompt::{compose_system_context, DEFAULT_SYSTEM_PROMPT};
