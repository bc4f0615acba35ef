//! Retrieval tools: the registry and the built-in adapters.
//!
//! Every capability the model can reach for during generation is a
//! [`CourseTool`]: a definition (name, description, argument schema) plus an
//! async `execute`. The [`ToolRegistry`] collects them, exports the catalog
//! for the inference API, dispatches calls by name with argument
//! validation, and buffers the attributions the most recent retrieval
//! rendered.

pub mod outline;
pub mod registry;
pub mod search;

pub use outline::CourseOutlineTool;
pub use registry::{CourseTool, SourceAttribution, ToolFuture, ToolOutput, ToolRegistry};
pub use search::CourseSearchTool;
