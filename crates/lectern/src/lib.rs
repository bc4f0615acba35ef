//! Retrieval-augmented question answering over a course-content corpus.
//!
//! `lectern` answers natural-language questions about course materials. The
//! core abstraction is the [`Generator`](generator::Generator) — a bounded
//! tool-use loop that sends messages to a language model, dispatches the
//! retrieval tools the model requests, appends results, and repeats until the
//! model produces a plain-text answer or the round limit forces a final
//! synthesis call. Retrieval tools record source attributions as a side
//! effect, so every answer ships with citations.
//!
//! # Getting started
//!
//! ```ignore
//! use lectern::generator::GeneratorConfig;
//! use lectern::rag::RagService;
//! use lectern::search::StaticCorpus;
//! use lectern::AnthropicClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap();
//!     let client = AnthropicClient::new(api_key)?;
//!     let corpus = StaticCorpus::from_json_file("courses.json")?;
//!
//!     let service = RagService::new(client, GeneratorConfig::default(), Arc::new(corpus));
//!
//!     let response = service.query("What does lesson 3 cover?", None).await?;
//!     println!("{}", response.answer);
//!     for source in &response.sources {
//!         println!("  - {}", source.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! If you're looking for how to...
//!
//! - **Run the generation loop:** see [`Generator`](generator::Generator) and
//!   [`GeneratorConfig`](generator::GeneratorConfig). The loop allows at most
//!   two tool rounds, then issues one tool-free synthesis call so a run always
//!   terminates with text.
//! - **Register retrieval tools:** see the [`CourseTool`](tools::CourseTool)
//!   trait and [`ToolRegistry`](tools::ToolRegistry) for collection, dispatch,
//!   and per-exchange source attribution. The built-in adapters are
//!   [`CourseSearchTool`](tools::CourseSearchTool) and
//!   [`CourseOutlineTool`](tools::CourseOutlineTool).
//! - **Plug in a search backend:** implement [`CourseStore`](search::CourseStore).
//!   [`StaticCorpus`](search::StaticCorpus) is the in-memory implementation used
//!   by the CLI and tests; a vector-search engine drops in behind the same trait.
//! - **Keep conversational context:** see [`SessionLog`](session::SessionLog),
//!   which formats prior exchanges into the history section of the system
//!   prompt.
//! - **Serve callers:** see [`RagService`](rag::RagService), the
//!   `query(question, session_id) -> (answer, sources)` surface an API layer
//!   sits on.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`generator`] | Bounded tool-use loop, configuration, system prompt |
//! | [`tools`] | [`CourseTool`](tools::CourseTool) trait, registry, retrieval adapters |
//! | [`search`] | [`CourseStore`](search::CourseStore) trait, result types, in-memory corpus |
//! | [`session`] | Per-session exchange log and history formatting |
//! | [`rag`] | Caller-facing query service wiring the pieces together |
//!
//! # Design principles
//!
//! 1. **Deterministic termination.** The round limit is a hard cap. When it
//!    is exhausted the generator issues one final call *without* the tool
//!    catalog, so the model cannot request tools forever.
//!
//! 2. **A failed tool never kills the exchange.** Unknown tool names, bad
//!    arguments, and adapter faults all become tool-result text the model can
//!    recover from. Only the very first inference call is allowed to fail the
//!    whole exchange — after any progress, errors degrade into labeled text.
//!
//! 3. **Attribution is a side effect of formatting.** Adapters return the
//!    citations they rendered; the registry keeps only the most recent set,
//!    drained once per exchange by the caller.

pub mod generator;
pub mod rag;
pub mod search;
pub mod session;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, info};

// Re-export schemars for downstream crates that derive argument schemas.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

pub const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

/// API version header value sent with every request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model for all inference calls.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between strong Rust argument
/// types and the `input_schema` value the messages API expects in a tool
/// definition.
///
/// # Example
///
/// ```
/// use lectern::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct SearchArgs {
///     query: String,
///     #[serde(default)]
///     course_name: Option<String>,
/// }
///
/// let schema = json_schema_for::<SearchArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"query".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A typed content block within a message.
///
/// The messages API mixes plain text with tool-invocation requests in a
/// single assistant turn, and tool results travel back in a user turn. All
/// three are distinguished by the `type` tag on the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text from the model (or, rarely, the user).
    Text { text: String },
    /// A request from the model to invoke a tool. `id` is opaque, assigned
    /// by the inference provider, and unique within the exchange.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The outcome of a tool invocation, matched to its request by
    /// `tool_use_id`. The content is always text — success output or a
    /// formatted failure description, never a raised fault.
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
        }
    }
}

/// Message content: either a plain string or a sequence of typed blocks.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A message in the conversation sent to the inference API.
///
/// The sequence is append-only within one exchange: the full list is resent
/// on every inference call so the model sees all prior tool work.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageParam {
    pub role: Role,
    pub content: MessageContent,
}

impl MessageParam {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// An assistant turn carried verbatim from a response (text and
    /// tool-use blocks interleaved, order preserved).
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// The combined user turn carrying every tool result of a round.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(results),
        }
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// Tool definition sent to the API: the name the model dispatches on, a
/// description steering when the model reaches for it, and the declared
/// JSON Schema for its arguments.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// How the model should decide whether to use tools.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides whether and which tool to call.
    Auto,
    /// The model must call some tool.
    Any,
    /// The model must call the named tool.
    Tool { name: String },
}

// ── Request / response types ───────────────────────────────────────

/// Request body for the messages API. Optional fields are omitted from
/// serialization when unset.
#[derive(Serialize, Debug)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: String,
    pub messages: Vec<MessageParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// Why the model stopped generating. `ToolUse` is the signal that the
/// response carries tool-invocation requests; everything else is a normal
/// textual stop.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    #[serde(other)]
    Other,
}

/// Token usage statistics reported by the API.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// Response from the messages API: an ordered sequence of content blocks
/// plus the stop condition that ended the turn.
#[derive(Deserialize, Debug, Clone)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

impl MessagesResponse {
    /// The first text block's content, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Whether the model stopped to request tool invocations.
    pub fn wants_tools(&self) -> bool {
        self.stop_reason == Some(StopReason::ToolUse)
    }
}

/// Error envelope returned by the API on failure responses.
#[derive(Deserialize, Debug)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: String,
}

// ── Inference capability ───────────────────────────────────────────

/// Boxed future returned by [`InferenceClient::messages`].
pub type InferenceFuture<'a> = Pin<Box<dyn Future<Output = Result<MessagesResponse, String>> + Send + 'a>>;

/// The inference capability the generator consumes.
///
/// [`AnthropicClient`] is the real implementation; tests substitute scripted
/// mocks. Uses a boxed future so the trait is dyn-compatible.
pub trait InferenceClient: Send + Sync {
    fn messages<'a>(&'a self, request: &'a MessagesRequest) -> InferenceFuture<'a>;
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Anthropic messages API.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
}

impl AnthropicClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("lectern/0.2")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Send a messages request and parse the response.
    pub async fn messages(&self, body: &MessagesRequest) -> Result<MessagesResponse, String> {
        debug!(
            "Inference request: model={}, messages={}, tools={}, max_tokens={}, temp={}",
            body.model,
            body.messages.len(),
            if body.tools.is_some() { "enabled" } else { "disabled" },
            body.max_tokens,
            body.temperature,
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        let elapsed = start.elapsed();

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
                .ok()
                .and_then(|env| env.error.map(|e| e.message))
                .unwrap_or(text);
            return Err(format!("Anthropic API HTTP {status}: {message}"));
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;

        info!(
            "Inference response in {:.3}s: stop_reason={:?}, blocks={}",
            elapsed.as_secs_f64(),
            parsed.stop_reason,
            parsed.content.len(),
        );
        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: input={}, output={}",
                usage.input_tokens.unwrap_or(0),
                usage.output_tokens.unwrap_or(0),
            );
        }

        Ok(parsed)
    }
}

impl InferenceClient for AnthropicClient {
    fn messages<'a>(&'a self, request: &'a MessagesRequest) -> InferenceFuture<'a> {
        Box::pin(AnthropicClient::messages(self, request))
    }
}
