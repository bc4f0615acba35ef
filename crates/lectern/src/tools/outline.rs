//! Course outlines: title, link, and the full lesson listing.
//!
//! [`CourseOutlineTool`] answers structural questions — "what does this
//! course cover?" — without running a passage search. It resolves lenient
//! course names the same way the search tool does and records the course
//! itself as the attribution.

use super::registry::{CourseTool, SourceAttribution, ToolFuture, ToolOutput};
use crate::search::{resolve_course_title, CourseOutline, CourseStore};
use crate::{json_schema_for, ToolDef};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

/// Arguments for the `get_course_outline` tool.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct OutlineArgs {
    /// Title of the course to outline. Partial titles are resolved against
    /// the known courses.
    pub course_name: String,
}

/// Retrieval tool for course-structure questions.
pub struct CourseOutlineTool {
    store: Arc<dyn CourseStore>,
}

impl CourseOutlineTool {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }

    fn run(&self, args: OutlineArgs) -> Result<ToolOutput, String> {
        let titles = self.store.course_titles();
        let Some(title) = resolve_course_title(&titles, &args.course_name) else {
            return Ok(ToolOutput::text_only(format!(
                "No course found matching '{}'.",
                args.course_name
            )));
        };

        match self.store.outline(&title) {
            Some(outline) => Ok(format_outline(&outline)),
            None => Ok(ToolOutput::text_only(format!(
                "No course found matching '{}'.",
                args.course_name
            ))),
        }
    }
}

impl CourseTool for CourseOutlineTool {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            "get_course_outline",
            "Get a course's complete outline: its title, link, and full \
             lesson listing. Use this for questions about course structure \
             or overviews; use search_course_content for content questions.",
            json_schema_for::<OutlineArgs>(),
        )
    }

    fn execute(&self, arguments: &serde_json::Value) -> ToolFuture<'_> {
        let parsed: Result<OutlineArgs, _> = serde_json::from_value(arguments.clone());
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

fn format_outline(outline: &CourseOutline) -> ToolOutput {
    let mut text = format!("Course: {}\n", outline.title);
    if let Some(ref link) = outline.link {
        text.push_str(&format!("Course link: {link}\n"));
    }
    text.push_str(&format!("Lessons ({}):\n", outline.lessons.len()));
    for lesson in &outline.lessons {
        text.push_str(&format!("  Lesson {}: {}\n", lesson.number, lesson.title));
    }

    let sources = vec![SourceAttribution {
        text: outline.title.clone(),
        link: outline.link.clone(),
    }];
    ToolOutput::with_sources(text, sources)
}
