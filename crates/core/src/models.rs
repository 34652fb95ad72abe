use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One addressable span of a document: a `##` section or a `###` subsection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub section_id: String,
    pub file: String,
    pub title: String,
    pub section_path: String,
    pub body: String,
    pub source_path: String,
    pub module: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScoredSection {
    pub section: Section,
    pub score: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    #[default]
    BookScope,
    SelectedTextOnly,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::BookScope => "book_scope",
            QueryMode::SelectedTextOnly => "selected_text_only",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown query mode: {}", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for QueryMode {
    type Err = UnknownMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "book_scope" => Ok(QueryMode::BookScope),
            "selected_text_only" => Ok(QueryMode::SelectedTextOnly),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

/// Shape of a question, which decides how the answer is assembled.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum QueryIntent {
    BookLevel,
    Summary,
    Specific,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    NotBuilt,
    Building,
    Ready,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerRequest {
    pub query: String,
    pub mode: QueryMode,
    pub selected_text: Option<String>,
    pub module: Option<String>,
}

impl AnswerRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_selected_text(mut self, text: impl Into<String>) -> Self {
        self.mode = QueryMode::SelectedTextOnly;
        self.selected_text = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
    pub intent: Option<QueryIntent>,
}

#[derive(Debug, Clone)]
pub struct IndexingOptions {
    /// Sections whose body is this many characters or fewer are not indexed.
    pub min_body_chars: usize,
    pub extensions: Vec<String>,
    /// File stem that always belongs to the `intro` module.
    pub intro_stem: String,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            min_body_chars: 50,
            extensions: vec!["md".to_string(), "mdx".to_string()],
            intro_stem: "intro".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringOptions {
    pub top_k: usize,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_mode_parses_wire_names() {
        assert_eq!("book_scope".parse::<QueryMode>(), Ok(QueryMode::BookScope));
        assert_eq!(
            "selected_text_only".parse::<QueryMode>(),
            Ok(QueryMode::SelectedTextOnly)
        );
        assert!("everything".parse::<QueryMode>().is_err());
    }

    #[test]
    fn index_state_serializes_to_snake_case() {
        let json = serde_json::to_value(IndexState::NotBuilt).unwrap();
        assert_eq!(json, "not_built");
    }
}
