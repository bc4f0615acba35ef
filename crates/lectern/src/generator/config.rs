//! Configuration for the [`Generator`](super::orchestrator::Generator).
//!
//! The system preamble is injected configuration, not ambient global state,
//! so tests and embedders can substitute alternate prompts.

use super::prompt::DEFAULT_SYSTEM_PROMPT;

/// Configuration for one generator instance.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Model identifier (e.g. `"claude-sonnet-4-20250514"`).
    pub model: String,
    /// Maximum tool rounds before the forced synthesis call. Two rounds
    /// allow one investigate-then-refine sequence (fetch an outline, then
    /// search a specific lesson) while bounding cost and latency.
    pub max_rounds: u32,
    /// Maximum tokens per model response.
    pub max_tokens: u32,
    /// Sampling temperature. Zero keeps answers deterministic and grounded.
    pub temperature: f32,
    /// Fixed instruction preamble: available tools, when to use each, and
    /// response-style rules.
    pub system_preamble: String,
}

impl GeneratorConfig {
    /// Create a config for the given model, defaults elsewhere.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    // ── Builder methods ───────────────────────────────────────────

    /// Set the maximum number of tool rounds.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Set the maximum tokens per model response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Replace the instruction preamble.
    pub fn with_system_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.system_preamble = preamble.into();
        self
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: crate::DEFAULT_MODEL.to_string(),
            max_rounds: 2,
            max_tokens: 800,
            temperature: 0.0,
            system_preamble: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}
