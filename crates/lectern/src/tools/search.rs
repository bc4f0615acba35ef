//! Passage search over course materials.
//!
//! [`CourseSearchTool`] wraps the [`CourseStore`] search capability: it
//! resolves lenient course names, runs the query, formats matches into
//! bracketed citation sections the model can quote from, and records one
//! attribution per section.

use super::registry::{CourseTool, SourceAttribution, ToolFuture, ToolOutput};
use crate::search::{resolve_course_title, CourseStore, SearchResults};
use crate::{json_schema_for, ToolDef};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Arguments for the `search_course_content` tool.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct SearchArgs {
    /// What to look for in the course materials.
    pub query: String,
    /// Course title to search within. Partial titles are resolved against
    /// the known courses.
    #[serde(default)]
    pub course_name: Option<String>,
    /// Lesson number to search within (e.g. 3).
    #[serde(default)]
    pub lesson_number: Option<u32>,
}

/// Retrieval tool for specific content questions.
pub struct CourseSearchTool {
    store: Arc<dyn CourseStore>,
}

impl CourseSearchTool {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }

    fn run(&self, args: SearchArgs) -> Result<ToolOutput, String> {
        // Lenient course-name resolution: exact title preferred, nearest
        // known title substituted otherwise. With no reasonable candidate
        // the search still runs unfiltered rather than failing outright.
        let resolved = args.course_name.as_deref().and_then(|requested| {
            let titles = self.store.course_titles();
            let resolved = resolve_course_title(&titles, requested);
            if resolved.as_deref() != Some(requested) {
                debug!("Course name '{requested}' resolved to {resolved:?}");
            }
            resolved
        });

        let results = self
            .store
            .search(&args.query, resolved.as_deref(), args.lesson_number, None);

        if let Some(error) = results.error {
            return Err(error);
        }

        if results.is_empty() {
            return Ok(ToolOutput::text_only(no_results_message(
                resolved.as_deref().or(args.course_name.as_deref()),
                args.lesson_number,
            )));
        }

        Ok(format_results(&results))
    }
}

impl CourseTool for CourseSearchTool {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "search_course_content",
            "Search course materials for specific content, topics, or detailed \
             explanations. Use this for questions about what a course teaches; \
             use get_course_outline for questions about course structure.",
            json_schema_for::<SearchArgs>(),
        )
    }

    fn execute(&self, arguments: &serde_json::Value) -> ToolFuture<'_> {
        let parsed: Result<SearchArgs, _> = serde_json::from_value(arguments.clone());
        Box::pin(async move {
            match parsed {
                Ok(args) => self.run(args),
                Err(e) => Ok(ToolOutput::text_only(format!(
                    "Error: invalid tool arguments: {e}"
                ))),
            }
        })
    }
}

/// Format matches into one section per passage, headed by a bracketed
/// citation, sections separated by blank lines. Records one attribution per
/// section as a side effect of the formatting.
fn format_results(results: &SearchResults) -> ToolOutput {
    let mut sections = Vec::with_capacity(results.documents.len());
    let mut sources = Vec::with_capacity(results.documents.len());

    for (i, document) in results.documents.iter().enumerate() {
        let meta = results.metadata.get(i).cloned().unwrap_or_default();
        let citation = match meta.lesson_number {
            Some(n) => format!("{} - Lesson {n}", meta.course_title),
            None => meta.course_title.clone(),
        };
        sections.push(format!("[{citation}]\n{document}"));
        sources.push(SourceAttribution {
            text: citation,
            link: results.lesson_links.get(i).cloned().flatten(),
        });
    }

    ToolOutput::with_sources(sections.join("\n\n"), sources)
}

/// The no-matches sentinel, naming any filters that were in effect.
fn no_results_message(course: Option<&str>, lesson: Option<u32>) -> String {
    let mut message = String::from("No relevant content found");
    if let Some(course) = course {
        message.push_str(&format!(" in course '{course}'"));
    }
    if let Some(lesson) = lesson {
        message.push_str(&format!(" in lesson {lesson}"));
    }
    message.push('.');
    message
}
