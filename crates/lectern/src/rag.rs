//! The caller-facing query service.
//!
//! [`RagService`] wires the pieces together for one deployment: an inference
//! client, a generator configuration, a course store, and a session log.
//! Each `query` call runs one exchange with its own [`ToolRegistry`] — the
//! registry's attribution buffer assumes single-exchange exclusivity, so
//! concurrent queries never share one.

use crate::generator::{Generator, GeneratorConfig};
use crate::search::CourseStore;
use crate::session::SessionLog;
use crate::tools::{CourseOutlineTool, CourseSearchTool, SourceAttribution, ToolRegistry};
use crate::InferenceClient;
use std::sync::Arc;
use tracing::info;

/// An answer plus the attributions recorded while producing it.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceAttribution>,
}

/// Retrieval-augmented question answering over one course store.
pub struct RagService {
    client: Box<dyn InferenceClient>,
    config: GeneratorConfig,
    store: Arc<dyn CourseStore>,
    sessions: SessionLog,
}

impl RagService {
    pub fn new(
        client: impl InferenceClient + 'static,
        config: GeneratorConfig,
        store: Arc<dyn CourseStore>,
    ) -> Self {
        Self {
            client: Box::new(client),
            config,
            store,
            sessions: SessionLog::new(),
        }
    }

    /// The session log, for creating and clearing sessions.
    pub fn sessions(&self) -> &SessionLog {
        &self.sessions
    }

    /// Answer a question, optionally inside a session whose history is fed
    /// to the model. Returns the answer and the sources the retrieval tools
    /// recorded; the per-exchange registry is drained and discarded here,
    /// so callers always see a consistent answer/sources pair.
    pub async fn query(
        &self,
        question: &str,
        session_id: Option<&str>,
    ) -> Result<QueryResponse, String> {
        info!("Query received: {} chars, session={:?}", question.len(), session_id);

        let registry = self.build_registry()?;
        let definitions = registry.definitions();
        let history = session_id.and_then(|id| self.sessions.history(id));

        let prompt = format!("Answer this question about course materials: {question}");
        let generator = Generator::new(self.client.as_ref(), self.config.clone());
        let answer = generator
            .generate(
                &prompt,
                history.as_deref(),
                Some(&definitions),
                Some(&registry),
            )
            .await?;

        let sources = registry.last_sources();
        registry.clear_sources();

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, question, &answer);
        }

        info!("Query answered: {} chars, {} sources", answer.len(), sources.len());
        Ok(QueryResponse { answer, sources })
    }

    /// Fresh registry for one exchange: both retrieval adapters over the
    /// shared store.
    fn build_registry(&self) -> Result<ToolRegistry, String> {
        let mut registry = ToolRegistry::new();
        registry.register(CourseSearchTool::new(self.store.clone()))?;
        registry.register(CourseOutlineTool::new(self.store.clone()))?;
        Ok(registry)
    }
}
