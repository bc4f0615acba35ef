//! Tool registry: named retrieval capabilities, dispatch, and attribution.
//!
//! The [`CourseTool`] trait defines the interface every retrieval tool
//! implements: a definition (name, description, JSON Schema arguments) and
//! an async `execute` returning formatted text plus the source attributions
//! it rendered. Tools are collected into a [`ToolRegistry`] which handles
//! definition export, dispatch-time argument validation, and the
//! per-exchange attribution buffer.

use crate::ToolDef;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

/// Boxed future returned by [`CourseTool::execute`].
///
/// An `Err` is an adapter fault (backend failure); it propagates to the
/// dispatch caller, which decides how to absorb it. Everything the model
/// should see — including "no results" and bad-argument explanations —
/// comes back as `Ok` text.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolOutput, String>> + Send + 'a>>;

// ── Attribution ────────────────────────────────────────────────────

/// A citation surfaced to the caller alongside the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAttribution {
    /// Display text, e.g. `"Introduction to Machine Learning - Lesson 2"`.
    pub text: String,
    /// Link to the cited lesson or course, when known.
    pub link: Option<String>,
}

/// What a tool execution produced: the text fed back to the model, and the
/// attributions rendered while formatting it.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub text: String,
    pub sources: Vec<SourceAttribution>,
}

impl ToolOutput {
    /// Output with no attributions (sentinels, outlines of nothing, errors
    /// the model should read).
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(text: impl Into<String>, sources: Vec<SourceAttribution>) -> Self {
        Self {
            text: text.into(),
            sources,
        }
    }
}

// ── CourseTool trait ───────────────────────────────────────────────

/// A retrieval tool the model can invoke during generation.
pub trait CourseTool: Send + Sync {
    /// The tool definition sent to the inference API.
    fn definition(&self) -> ToolDef;

    /// Execute the tool with the given argument object.
    ///
    /// Arguments have already been validated against the declared schema by
    /// the registry. Uses a boxed future so the trait is dyn-compatible.
    fn execute(&self, arguments: &serde_json::Value) -> ToolFuture<'_>;

    /// The tool's name (convenience — delegates to definition).
    fn name(&self) -> String {
        self.definition().name
    }
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// A collection of retrieval tools dispatched by name.
///
/// Registration order is stable and is the order definitions are exported
/// in. The registry owns the per-exchange attribution buffer: each dispatch
/// that rendered citations overwrites it, and the caller drains it once per
/// exchange via [`last_sources`](Self::last_sources) /
/// [`clear_sources`](Self::clear_sources).
///
/// One registry serves one exchange. The buffer has no identifying key, so
/// concurrent exchanges each need their own registry instance.
pub struct ToolRegistry {
    tools: Vec<Box<dyn CourseTool>>,
    last_sources: Mutex<Vec<SourceAttribution>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            last_sources: Mutex::new(Vec::new()),
        }
    }

    /// Register a tool.
    ///
    /// Fails with a configuration error when the definition carries no name.
    /// Re-registering an existing name overwrites silently — last write
    /// wins, keeping the original position in the definition order.
    pub fn register(&mut self, tool: impl CourseTool + 'static) -> Result<(), String> {
        let name = tool.definition().name;
        if name.is_empty() {
            return Err("tool definition is missing a name".into());
        }
        if let Some(slot) = self
            .tools
            .iter_mut()
            .find(|existing| existing.definition().name == name)
        {
            *slot = Box::new(tool);
        } else {
            self.tools.push(Box::new(tool));
        }
        Ok(())
    }

    /// All tool definitions, in registration order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch a tool call by name.
    ///
    /// An unknown name returns `Ok` text stating the tool was not found —
    /// the exchange stays alive and the model can recover. Argument
    /// validation failures likewise come back as `Ok` text for the model to
    /// self-correct. Adapter faults propagate as `Err`; the generation loop
    /// absorbs them at the call site.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<String, String> {
        let Some(tool) = self
            .tools
            .iter()
            .find(|t| t.definition().name == name)
        else {
            return Ok(format!("Tool '{name}' not found"));
        };

        if let Some(error) = validate_arguments(&tool.definition(), arguments) {
            return Ok(error);
        }

        log_tool_call(name, arguments);
        let start = Instant::now();

        let output = tool.execute(arguments).await?;

        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes, {} sources)",
            start.elapsed().as_secs_f64() * 1000.0,
            output.text.len(),
            output.sources.len(),
        );

        if !output.sources.is_empty() {
            let mut last = self.last_sources.lock().unwrap_or_else(|e| e.into_inner());
            *last = output.sources;
        }

        Ok(output.text)
    }

    /// Attributions recorded by the most recent retrieval formatting step.
    pub fn last_sources(&self) -> Vec<SourceAttribution> {
        self.last_sources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Reset recorded attributions. Called once per completed exchange,
    /// after the caller has read the sources.
    pub fn clear_sources(&self) {
        self.last_sources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate a call's arguments against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or `Some(error_string)` formatted for the model
/// to understand and self-correct.
fn validate_arguments(def: &ToolDef, arguments: &serde_json::Value) -> Option<String> {
    let validator = match jsonschema::validator_for(&def.input_schema) {
        Ok(v) => v,
        Err(_) => return None, // If the schema itself is invalid, skip validation.
    };

    let errors: Vec<String> = validator
        .iter_errors(arguments)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: argument validation failed for tool '{}':\n{}\n\
             Please fix the arguments and try again.",
            def.name,
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
fn log_tool_call(name: &str, arguments: &serde_json::Value) {
    let raw = arguments.to_string();
    let preview: String = raw.chars().take(120).collect();
    info!(
        "[tool] {name}({preview}{})",
        if raw.len() > 120 { "..." } else { "" }
    );
}

// ── Tests ──────────────────────────────────────────────────────────
