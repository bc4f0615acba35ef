//! The bounded tool-use loop.
//!
//! One [`Generator::generate`] call is one exchange: compose the system
//! context, call inference, dispatch any requested tools through the
//! registry, feed results back, and repeat — at most `max_rounds` tool
//! rounds, then one forced tool-free synthesis call. Termination is
//! guaranteed even if the model would keep requesting tools forever.

use super::config::GeneratorConfig;
use super::prompt::compose_system_context;
use crate::tools::ToolRegistry;
use crate::{ContentBlock, InferenceClient, MessageParam, MessagesRequest, ToolChoice, ToolDef};
use tracing::{info, warn};

// ── Generator ──────────────────────────────────────────────────────

/// The generation orchestrator.
///
/// Borrows the inference client; the registry and tool catalog are supplied
/// per call so each exchange can carry its own registry instance.
pub struct Generator<'a> {
    client: &'a dyn InferenceClient,
    config: GeneratorConfig,
}

impl<'a> Generator<'a> {
    pub fn new(client: &'a dyn InferenceClient, config: GeneratorConfig) -> Self {
        Self { client, config }
    }

    /// Run one exchange and return the final answer text.
    ///
    /// Error policy: only a failure of the very first inference call
    /// escapes as `Err` — nothing has been gathered yet. Once at least one
    /// tool round completed, downstream failures are absorbed into a
    /// labeled text result so prior tool work is not silently lost.
    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&[ToolDef]>,
        registry: Option<&ToolRegistry>,
    ) -> Result<String, String> {
        let system = compose_system_context(&self.config.system_preamble, history);
        let mut messages = vec![MessageParam::user(query)];
        let mut round: u32 = 0;

        while round < self.config.max_rounds {
            info!(
                "Inference call ({}): messages={}",
                round_label(round),
                messages.len(),
            );

            let request = self.request(&messages, &system, tools);
            let response = match self.client.messages(&request).await {
                Ok(response) => response,
                Err(e) if round == 0 => return Err(e),
                Err(e) => {
                    warn!("Inference failed after {round} completed round(s): {e}");
                    return Ok(format!("Error in round {}: {e}", round + 1));
                }
            };

            if response.wants_tools()
                && let Some(registry) = registry
            {
                round += 1;

                // The assistant's tool-request turn goes into the sequence
                // verbatim; the combined result turn follows it.
                messages.push(MessageParam::assistant_blocks(response.content.clone()));

                let outcome = dispatch_round(registry, &response.content).await;
                if !outcome.results.is_empty() {
                    messages.push(MessageParam::tool_results(outcome.results));
                }
                if outcome.degraded {
                    // Don't attempt another tool round on a degraded one —
                    // synthesize a final answer from whatever was gathered.
                    break;
                }
                continue;
            }

            // Plain-text stop, a tool request with no registry to serve it,
            // or an unrecognized signal: terminal either way.
            return Ok(response.first_text().unwrap_or_default().to_string());
        }

        // Round limit exhausted. One more call without the tool catalog
        // forces a text-only synthesis of the gathered results.
        info!("Inference call (Final): messages={}", messages.len());
        let request = self.request(&messages, &system, None);
        match self.client.messages(&request).await {
            Ok(response) => Ok(response.first_text().unwrap_or_default().to_string()),
            Err(e) => {
                warn!("Final synthesis call failed: {e}");
                Ok(format!("Error generating final response: {e}"))
            }
        }
    }

    /// Build the request for one inference call. An empty catalog is the
    /// same as no catalog; tool selection is the model's (`auto`).
    fn request(
        &self,
        messages: &[MessageParam],
        system: &str,
        tools: Option<&[ToolDef]>,
    ) -> MessagesRequest {
        let tools = tools.filter(|defs| !defs.is_empty());
        MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: tools.map(|defs| defs.to_vec()),
            tool_choice: tools.map(|_| ToolChoice::Auto),
        }
    }
}

fn round_label(round: u32) -> String {
    if round == 0 {
        "Initial".to_string()
    } else {
        format!("Round {}", round + 1)
    }
}

// ── Round dispatch ─────────────────────────────────────────────────

struct RoundOutcome {
    results: Vec<ContentBlock>,
    degraded: bool,
}

/// Dispatch every tool-use block of a response and collect one result per
/// request, in order. A dispatch fault becomes a failure-text result and
/// marks the round degraded, but never stops the siblings — all blocks are
/// processed before the caller checks the flag.
async fn dispatch_round(registry: &ToolRegistry, blocks: &[ContentBlock]) -> RoundOutcome {
    let mut results = Vec::new();
    let mut degraded = false;

    for block in blocks {
        if let ContentBlock::ToolUse { id, name, input } = block {
            match registry.dispatch(name, input).await {
                Ok(text) => results.push(ContentBlock::tool_result(id, text)),
                Err(e) => {
                    warn!("Tool '{name}' dispatch failed: {e}");
                    degraded = true;
                    results.push(ContentBlock::tool_result(
                        id,
                        format!("Tool execution failed: {e}"),
                    ));
                }
            }
        }
    }

    RoundOutcome { results, degraded }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{CourseTool, ToolFuture, ToolOutput};
    use crate::{InferenceFuture, MessagesResponse, StopReason};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    // A scripted inference capability: pops pre-baked responses and records
    // every request it saw (as JSON, for shape assertions).
    struct MockClient {
        responses: Mutex<VecDeque<Result<MessagesResponse, String>>>,
        requests: Mutex<Vec<serde_json::Value>>,
    }

    impl MockClient {
        fn new(responses: Vec<Result<MessagesResponse, String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> serde_json::Value {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    impl InferenceClient for MockClient {
        fn messages<'a>(&'a self, request: &'a MessagesRequest) -> InferenceFuture<'a> {
            let recorded = serde_json::to_value(request).expect("request serializes");
            self.requests.lock().unwrap().push(recorded);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("mock has a scripted response");
            Box::pin(async move { next })
        }
    }

    fn text_response(text: &str) -> Result<MessagesResponse, String> {
        Ok(MessagesResponse {
            content: vec![ContentBlock::text(text)],
            stop_reason: Some(StopReason::EndTurn),
            usage: None,
        })
    }

    fn tool_use_response(calls: &[(&str, &str, serde_json::Value)]) -> Result<MessagesResponse, String> {
        Ok(MessagesResponse {
            content: calls
                .iter()
                .map(|(id, name, input)| ContentBlock::ToolUse {
                    id: (*id).to_string(),
                    name: (*name).to_string(),
                    input: input.clone(),
                })
                .collect(),
            stop_reason: Some(StopReason::ToolUse),
            usage: None,
        })
    }

    // A scripted tool that records its invocations in a shared log.
    struct ScriptedTool {
        name: String,
        outcome: Result<String, String>,
        log: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    }

    impl CourseTool for ScriptedTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new(
                self.name.clone(),
                "scripted test tool",
                serde_json::json!({"type": "object"}),
            )
        }

        fn execute(&self, arguments: &serde_json::Value) -> ToolFuture<'_> {
            self.log
                .lock()
                .unwrap()
                .push((self.name.clone(), arguments.clone()));
            let outcome = self.outcome.clone().map(ToolOutput::text_only);
            Box::pin(async move { outcome })
        }
    }

    type DispatchLog = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    fn registry_with(tools: Vec<(&str, Result<&str, &str>)>) -> (ToolRegistry, DispatchLog) {
        let log: DispatchLog = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        for (name, outcome) in tools {
            registry
                .register(ScriptedTool {
                    name: name.to_string(),
                    outcome: outcome.map(str::to_string).map_err(str::to_string),
                    log: log.clone(),
                })
                .unwrap();
        }
        (registry, log)
    }

    fn generator(client: &MockClient) -> Generator<'_> {
        Generator::new(client, GeneratorConfig::new("test-model"))
    }

    // ── Terminal paths ─────────────────────────────────────────────

    #[tokio::test]
    async fn no_catalog_returns_text_verbatim() {
        let client = MockClient::new(vec![text_response("Test response")]);
        let answer = generator(&client)
            .generate("What is machine learning?", None, None, None)
            .await
            .unwrap();

        assert_eq!(answer, "Test response");
        assert_eq!(client.calls(), 1);
        assert!(client.request(0).get("tools").is_none());
    }

    #[tokio::test]
    async fn first_no_tool_response_terminates_despite_catalog() {
        let client = MockClient::new(vec![text_response("Direct answer")]);
        let (registry, log) = registry_with(vec![("search_course_content", Ok("unused"))]);
        let defs = registry.definitions();

        let answer = generator(&client)
            .generate("General question", None, Some(&defs), Some(&registry))
            .await
            .unwrap();

        assert_eq!(answer, "Direct answer");
        assert_eq!(client.calls(), 1);
        assert!(log.lock().unwrap().is_empty());
        // The catalog was offered with automatic tool selection.
        assert_eq!(client.request(0)["tool_choice"]["type"], "auto");
        assert_eq!(
            client.request(0)["tools"][0]["name"],
            "search_course_content"
        );
    }

    #[tokio::test]
    async fn empty_catalog_is_not_sent() {
        let client = MockClient::new(vec![text_response("ok")]);
        let answer = generator(&client)
            .generate("q", None, Some(&[]), None)
            .await
            .unwrap();
        assert_eq!(answer, "ok");
        assert!(client.request(0).get("tools").is_none());
        assert!(client.request(0).get("tool_choice").is_none());
    }

    #[tokio::test]
    async fn tool_request_without_registry_falls_back_to_first_text() {
        let client = MockClient::new(vec![Ok(MessagesResponse {
            content: vec![
                ContentBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: "search_course_content".into(),
                    input: serde_json::json!({"query": "x"}),
                },
                ContentBlock::text("partial text alongside the request"),
            ],
            stop_reason: Some(StopReason::ToolUse),
            usage: None,
        })]);

        let answer = generator(&client)
            .generate("q", None, None, None)
            .await
            .unwrap();

        assert_eq!(answer, "partial text alongside the request");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn tool_request_without_registry_and_no_text_returns_empty() {
        let client = MockClient::new(vec![tool_use_response(&[(
            "toolu_1",
            "search_course_content",
            serde_json::json!({"query": "x"}),
        )])]);

        let answer = generator(&client)
            .generate("q", None, None, None)
            .await
            .unwrap();

        assert_eq!(answer, "");
    }

    // ── Tool rounds ────────────────────────────────────────────────

    #[tokio::test]
    async fn single_tool_round_then_final_text() {
        let client = MockClient::new(vec![
            tool_use_response(&[(
                "toolu_1",
                "search_course_content",
                serde_json::json!({"query": "machine learning"}),
            )]),
            text_response("Final response with tool results"),
        ]);
        let (registry, log) =
            registry_with(vec![("search_course_content", Ok("Tool execution result"))]);
        let defs = registry.definitions();

        let answer = generator(&client)
            .generate("Tell me about ML", None, Some(&defs), Some(&registry))
            .await
            .unwrap();

        assert_eq!(answer, "Final response with tool results");
        assert_eq!(client.calls(), 2);

        // Exactly one dispatch, with the model-supplied arguments.
        let dispatched = log.lock().unwrap();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].0, "search_course_content");
        assert_eq!(dispatched[0].1, serde_json::json!({"query": "machine learning"}));

        // The second call saw user, assistant tool-request, and combined
        // tool-result messages, with the result matched by id.
        let second = client.request(1);
        let messages = second["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(messages[2]["content"][0]["content"], "Tool execution result");
    }

    #[tokio::test]
    async fn two_tool_rounds_then_forced_synthesis() {
        let client = MockClient::new(vec![
            tool_use_response(&[(
                "toolu_1",
                "get_course_outline",
                serde_json::json!({"course_name": "ML"}),
            )]),
            tool_use_response(&[(
                "toolu_2",
                "search_course_content",
                serde_json::json!({"query": "lesson 3", "lesson_number": 3}),
            )]),
            text_response("Synthesized final answer"),
        ]);
        let (registry, log) = registry_with(vec![
            ("get_course_outline", Ok("outline text")),
            ("search_course_content", Ok("search text")),
        ]);
        let defs = registry.definitions();

        let answer = generator(&client)
            .generate("Complex question", None, Some(&defs), Some(&registry))
            .await
            .unwrap();

        assert_eq!(answer, "Synthesized final answer");
        assert_eq!(client.calls(), 3);

        // Two dispatches, order preserved.
        let dispatched = log.lock().unwrap();
        assert_eq!(dispatched.len(), 2);
        assert_eq!(dispatched[0].0, "get_course_outline");
        assert_eq!(dispatched[1].0, "search_course_content");

        // The first two calls carry the catalog; the forced synthesis call
        // must not, so the model cannot request a third round.
        assert!(client.request(0).get("tools").is_some());
        assert!(client.request(1).get("tools").is_some());
        assert!(client.request(2).get("tools").is_none());

        // Full message sequence reached the synthesis call.
        assert_eq!(client.request(2)["messages"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn degraded_round_skips_to_synthesis() {
        let client = MockClient::new(vec![
            tool_use_response(&[(
                "toolu_1",
                "search_course_content",
                serde_json::json!({"query": "x"}),
            )]),
            text_response("Partial answer from what was gathered"),
        ]);
        let (registry, log) =
            registry_with(vec![("search_course_content", Err("backend unavailable"))]);
        let defs = registry.definitions();

        let answer = generator(&client)
            .generate("q", None, Some(&defs), Some(&registry))
            .await
            .unwrap();

        // No second tool round: one failed round, then synthesis only.
        assert_eq!(answer, "Partial answer from what was gathered");
        assert_eq!(client.calls(), 2);
        assert_eq!(log.lock().unwrap().len(), 1);

        // The failure reached the model as result text, not a fault, and
        // the synthesis call went out without the catalog.
        let second = client.request(1);
        assert_eq!(
            second["messages"][2]["content"][0]["content"],
            "Tool execution failed: backend unavailable"
        );
        assert!(second.get("tools").is_none());
    }

    #[tokio::test]
    async fn sibling_results_are_all_appended_after_a_failure() {
        let client = MockClient::new(vec![
            tool_use_response(&[
                ("toolu_1", "failing_tool", serde_json::json!({})),
                ("toolu_2", "working_tool", serde_json::json!({})),
            ]),
            text_response("done"),
        ]);
        let (registry, log) = registry_with(vec![
            ("failing_tool", Err("boom")),
            ("working_tool", Ok("sibling output")),
        ]);
        let defs = registry.definitions();

        let answer = generator(&client)
            .generate("q", None, Some(&defs), Some(&registry))
            .await
            .unwrap();
        assert_eq!(answer, "done");

        // Both siblings ran — process all, then break.
        assert_eq!(log.lock().unwrap().len(), 2);

        let results = client.request(1)["messages"][2]["content"].clone();
        let results = results.as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tool_use_id"], "toolu_1");
        assert_eq!(results[0]["content"], "Tool execution failed: boom");
        assert_eq!(results[1]["tool_use_id"], "toolu_2");
        assert_eq!(results[1]["content"], "sibling output");
    }

    // ── Failure taxonomy ───────────────────────────────────────────

    #[tokio::test]
    async fn first_call_failure_propagates() {
        let client = MockClient::new(vec![Err("connection refused".to_string())]);
        let err = generator(&client)
            .generate("q", None, None, None)
            .await
            .unwrap_err();
        assert!(err.contains("connection refused"));
    }

    #[tokio::test]
    async fn later_round_failure_degrades_to_labeled_text() {
        let client = MockClient::new(vec![
            tool_use_response(&[(
                "toolu_1",
                "search_course_content",
                serde_json::json!({"query": "x"}),
            )]),
            Err("rate limited".to_string()),
        ]);
        let (registry, _log) = registry_with(vec![("search_course_content", Ok("result"))]);
        let defs = registry.definitions();

        let answer = generator(&client)
            .generate("q", None, Some(&defs), Some(&registry))
            .await
            .unwrap();
        assert_eq!(answer, "Error in round 2: rate limited");
    }

    #[tokio::test]
    async fn final_synthesis_failure_degrades_to_labeled_text() {
        let client = MockClient::new(vec![
            tool_use_response(&[("toolu_1", "t", serde_json::json!({}))]),
            tool_use_response(&[("toolu_2", "t", serde_json::json!({}))]),
            Err("overloaded".to_string()),
        ]);
        let (registry, _log) = registry_with(vec![("t", Ok("r"))]);
        let defs = registry.definitions();

        let answer = generator(&client)
            .generate("q", None, Some(&defs), Some(&registry))
            .await
            .unwrap();
        assert_eq!(answer, "Error generating final response: overloaded");
        assert_eq!(client.calls(), 3);
    }

    // ── System context ─────────────────────────────────────────────

    #[tokio::test]
    async fn history_lands_in_the_system_context() {
        let client = MockClient::new(vec![text_response("ok")]);
        generator(&client)
            .generate("q", Some("User: hi\nAssistant: hello"), None, None)
            .await
            .unwrap();

        let system = client.request(0)["system"].as_str().unwrap().to_string();
        assert!(system.contains("Previous conversation:"));
        assert!(system.contains("User: hi"));
    }

    #[tokio::test]
    async fn without_history_the_preamble_is_sent_verbatim() {
        let client = MockClient::new(vec![text_response("ok")]);
        let config = GeneratorConfig::new("test-model").with_system_preamble("Just the preamble.");
        Generator::new(&client, config)
            .generate("q", None, None, None)
            .await
            .unwrap();

        assert_eq!(client.request(0)["system"], "Just the preamble.");
    }
}
