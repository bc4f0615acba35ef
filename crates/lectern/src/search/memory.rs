//! In-memory course corpus with keyword-overlap scoring.
//!
//! [`StaticCorpus`] implements [`CourseStore`](super::CourseStore) over a
//! serde-loadable set of courses. Scoring is plain keyword overlap — good
//! enough for the CLI and for tests, while a real semantic engine lives
//! behind the same trait in production deployments.

use super::{ChunkMeta, CourseOutline, CourseStore, LessonRef, SearchResults};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default maximum matches returned per search.
pub const DEFAULT_MAX_RESULTS: usize = 5;

// ── Corpus documents ───────────────────────────────────────────────

/// One course as stored in the corpus file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CourseDoc {
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub lessons: Vec<LessonDoc>,
}

/// One lesson: a number, a title, an optional link, and its text chunks.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LessonDoc {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub chunks: Vec<String>,
}

// ── StaticCorpus ───────────────────────────────────────────────────

/// An in-memory [`CourseStore`] over a fixed set of courses.
#[derive(Debug)]
pub struct StaticCorpus {
    courses: Vec<CourseDoc>,
    max_results: usize,
}

impl StaticCorpus {
    pub fn new(courses: Vec<CourseDoc>) -> Self {
        Self {
            courses,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Set the default maximum matches per search (builder pattern).
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Load a corpus from a JSON file containing an array of courses.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read corpus file {}: {e}", path.display()))?;
        let courses: Vec<CourseDoc> = serde_json::from_str(&raw)
            .map_err(|e| format!("failed to parse corpus file {}: {e}", path.display()))?;
        Ok(Self::new(courses))
    }

    /// Number of courses in the corpus.
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

/// Keyword-overlap score between a query and a chunk: the fraction of query
/// tokens present in the chunk. Zero-score chunks are never returned.
fn keyword_score(query_tokens: &HashSet<String>, chunk: &str) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let chunk_tokens: HashSet<String> = tokenize(chunk);
    let hits = query_tokens.intersection(&chunk_tokens).count();
    hits as f32 / query_tokens.len() as f32
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

impl CourseStore for StaticCorpus {
    fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
        limit: Option<usize>,
    ) -> SearchResults {
        let query_tokens = tokenize(query);
        let limit = limit.unwrap_or(self.max_results);

        // Score every chunk that survives the filters.
        let mut scored: Vec<(f32, &CourseDoc, &LessonDoc, &String)> = Vec::new();
        for course in &self.courses {
            if let Some(wanted) = course_name
                && course.title != wanted
            {
                continue;
            }
            for lesson in &course.lessons {
                if let Some(wanted) = lesson_number
                    && lesson.number != wanted
                {
                    continue;
                }
                for chunk in &lesson.chunks {
                    let score = keyword_score(&query_tokens, chunk);
                    if score > 0.0 {
                        scored.push((score, course, lesson, chunk));
                    }
                }
            }
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let mut results = SearchResults::empty();
        for (score, course, lesson, chunk) in scored {
            results.documents.push(chunk.clone());
            results.metadata.push(ChunkMeta {
                course_title: course.title.clone(),
                lesson_number: Some(lesson.number),
            });
            results.distances.push(1.0 - score);
            results.lesson_links.push(lesson.link.clone());
        }
        results
    }

    fn course_titles(&self) -> Vec<String> {
        self.courses.iter().map(|c| c.title.clone()).collect()
    }

    fn outline(&self, course_title: &str) -> Option<CourseOutline> {
        let course = self.courses.iter().find(|c| c.title == course_title)?;
        Some(CourseOutline {
            title: course.title.clone(),
            link: course.link.clone(),
            lessons: course
                .lessons
                .iter()
                .map(|l| LessonRef {
                    number: l.number,
                    title: l.title.clone(),
                    link: l.link.clone(),
                })
                .collect(),
        })
    }
}
