//! The search capability consumed by the retrieval tools.
//!
//! The [`CourseStore`] trait is the seam to the external retrieval engine:
//! passage search with optional course/lesson filters, the known course
//! titles, and per-course outlines. [`StaticCorpus`] is the in-memory
//! implementation used by the CLI and tests; a vector-search backend drops
//! in behind the same trait without touching the generation loop.

pub mod memory;

pub use memory::{CourseDoc, LessonDoc, StaticCorpus};

// ── Result types ───────────────────────────────────────────────────

/// Metadata for one matched passage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkMeta {
    /// Title of the course the passage belongs to.
    pub course_title: String,
    /// Lesson number within the course, when the passage sits inside one.
    pub lesson_number: Option<u32>,
}

/// Results of one search call. The parallel vectors are index-aligned:
/// `documents[i]` is described by `metadata[i]`, scored by `distances[i]`,
/// and linked by `lesson_links[i]`.
///
/// `error` signals a non-fatal retrieval failure — distinct from "no
/// matches", which is an empty `documents` with no error.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMeta>,
    pub distances: Vec<f32>,
    pub lesson_links: Vec<Option<String>>,
    pub error: Option<String>,
}

impl SearchResults {
    /// A successful search that matched nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A failed search carrying the backend's error message.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// One lesson entry in a course outline.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LessonRef {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
}

/// A course's structure: title, link, and the full lesson listing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CourseOutline {
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    pub lessons: Vec<LessonRef>,
}

// ── Store trait ────────────────────────────────────────────────────

/// A searchable course-content store.
///
/// Calls are synchronous from the adapter's point of view — the store owns
/// its own timeout policy. `course_name` is an exact title; lenient
/// resolution of user-supplied names happens in the tool adapters via
/// [`resolve_course_title`] before the store is queried.
pub trait CourseStore: Send + Sync {
    /// Search for passages matching `query`, optionally restricted to one
    /// course and/or one lesson. `limit` caps the number of matches; `None`
    /// uses the store's default.
    fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
        limit: Option<usize>,
    ) -> SearchResults;

    /// All known course titles, for lenient name resolution.
    fn course_titles(&self) -> Vec<String>;

    /// The outline for an exactly-titled course, if it exists.
    fn outline(&self, course_title: &str) -> Option<CourseOutline>;
}

// ── Course-name resolution ─────────────────────────────────────────

/// Minimum token-overlap similarity for a fuzzy title match to count as a
/// reasonable candidate.
const TITLE_SIMILARITY_FLOOR: f64 = 0.1;

/// Resolve a user-supplied course name against the known titles.
///
/// Preference order: exact match, case-insensitive match, substring
/// containment, then the highest token-overlap candidate above a floor.
/// Returns `None` when no reasonable candidate exists — callers fall back
/// to an unfiltered search rather than failing.
pub fn resolve_course_title(titles: &[String], requested: &str) -> Option<String> {
    if let Some(title) = titles.iter().find(|t| *t == requested) {
        return Some(title.clone());
    }
    if let Some(title) = titles.iter().find(|t| t.eq_ignore_ascii_case(requested)) {
        return Some(title.clone());
    }

    let requested_lower = requested.to_lowercase();
    if let Some(title) = titles
        .iter()
        .find(|t| t.to_lowercase().contains(&requested_lower))
    {
        return Some(title.clone());
    }

    titles
        .iter()
        .map(|t| (t, title_similarity(t, requested)))
        .filter(|(_, score)| *score >= TITLE_SIMILARITY_FLOOR)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(t, _)| t.clone())
}

/// Token-overlap (Jaccard) similarity between two titles, case-folded.
fn title_similarity(a: &str, b: &str) -> f64 {
    let a_tokens: std::collections::HashSet<String> =
        a.split_whitespace().map(|t| t.to_lowercase()).collect();
    let b_tokens: std::collections::HashSet<String> =
        b.split_whitespace().map(|t| t.to_lowercase()).collect();
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }
    let intersection = a_tokens.intersection(&b_tokens).count() as f64;
    let union = a_tokens.union(&b_tokens).count() as f64;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles() -> Vec<String> {
        vec![
            "Introduction to Machine Learning".into(),
            "Advanced Rust Programming".into(),
            "Databases and Storage Engines".into(),
        ]
    }

    #[test]
    fn exact_title_wins() {
        let resolved = resolve_course_title(&titles(), "Advanced Rust Programming");
        assert_eq!(resolved.as_deref(), Some("Advanced Rust Programming"));
    }

    #[test]
    fn case_insensitive_match() {
        let resolved = resolve_course_title(&titles(), "advanced rust programming");
        assert_eq!(resolved.as_deref(), Some("Advanced Rust Programming"));
    }

    #[test]
    fn partial_name_resolves_by_containment() {
        let resolved = resolve_course_title(&titles(), "machine learning");
        assert_eq!(
            resolved.as_deref(),
            Some("Introduction to Machine Learning")
        );
    }

    #[test]
    fn token_overlap_handles_reordered_words() {
        let resolved = resolve_course_title(&titles(), "Rust Advanced");
        assert_eq!(resolved.as_deref(), Some("Advanced Rust Programming"));
    }

    #[test]
    fn hopeless_name_resolves_to_none() {
        assert_eq!(resolve_course_title(&titles(), "underwater basket weaving"), None);
    }

    #[test]
    fn empty_catalog_resolves_to_none() {
        assert_eq!(resolve_course_title(&[], "anything"), None);
    }

    #[test]
    fn error_results_are_distinct_from_empty() {
        let empty = SearchResults::empty();
        assert!(empty.is_empty());
        assert!(empty.error.is_none());

        let failed = SearchResults::from_error("backend unavailable");
        assert!(failed.is_empty());
        assert_eq!(failed.error.as_deref(), Some("backend unavailable"));
    }
}
