pub mod answer;
pub mod chunking;
pub mod error;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod scoring;
pub mod traits;

pub use answer::{classify_intent, source_names, synthesize, REFUSAL, SELECTED_TEXT_LEAD_IN};
pub use chunking::{extract_title, infer_module, segment_document, split_paragraphs};
pub use error::{AnswerError, IngestError};
pub use ingest::{
    discover_document_files, ingest_folder_sections_best_effort, DocumentTree, IngestionReport,
    SkippedDocument,
};
pub use models::{
    Answer, AnswerRequest, IndexState, IndexingOptions, QueryIntent, QueryMode, ScoredSection,
    ScoringOptions, Section, UnknownMode,
};
pub use orchestrator::{AnswerService, SectionIndex};
pub use scoring::{explain_section, rank_sections, score_section, QueryContext, ScoringRule, RULES};
pub use traits::SectionSource;
