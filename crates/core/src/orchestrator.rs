use crate::answer::{classify_intent, source_names, synthesize, REFUSAL};
use crate::models::{Answer, AnswerRequest, IndexState, ScoredSection, ScoringOptions, Section};
use crate::scoring::rank_sections;
use crate::traits::SectionSource;
use crate::{AnswerError, IngestError, SkippedDocument};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// The built, immutable section index.
#[derive(Debug, Clone)]
pub struct SectionIndex {
    pub sections: Vec<Section>,
    pub skipped_files: Vec<SkippedDocument>,
    pub built_at: DateTime<Utc>,
}

/// Owns the section index and answers questions against it.
///
/// The index is built on first use. Concurrent first callers share a single
/// in-flight build; once built it is never refreshed. A failed build leaves
/// the service unbuilt so the next call tries again.
pub struct AnswerService<S>
where
    S: SectionSource,
{
    source: S,
    scoring: ScoringOptions,
    index: OnceCell<Arc<SectionIndex>>,
    building: AtomicBool,
}

impl<S> AnswerService<S>
where
    S: SectionSource,
{
    pub fn new(source: S, scoring: ScoringOptions) -> Self {
        Self {
            source,
            scoring,
            index: OnceCell::new(),
            building: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> IndexState {
        if self.index.initialized() {
            IndexState::Ready
        } else if self.building.load(Ordering::Acquire) {
            IndexState::Building
        } else {
            IndexState::NotBuilt
        }
    }

    /// The index if it has been built, without triggering a build.
    pub fn snapshot(&self) -> Option<Arc<SectionIndex>> {
        self.index.get().cloned()
    }

    pub async fn ensure_ready(&self) -> Result<Arc<SectionIndex>, IngestError> {
        self.index
            .get_or_try_init(|| self.build())
            .await
            .cloned()
    }

    async fn build(&self) -> Result<Arc<SectionIndex>, IngestError> {
        let _building = BuildFlag::raise(&self.building);
        let report = self.source.load_sections().await?;

        info!(
            sections = report.sections.len(),
            skipped = report.skipped_files.len(),
            "section index built"
        );

        Ok(Arc::new(SectionIndex {
            sections: report.sections,
            skipped_files: report.skipped_files,
            built_at: Utc::now(),
        }))
    }

    /// Top-ranked sections for a query, building the index if needed.
    pub async fn search(
        &self,
        query: &str,
        module: Option<&str>,
    ) -> Result<Vec<ScoredSection>, AnswerError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AnswerError::EmptyQuery);
        }

        let index = self.ensure_ready().await?;
        Ok(rank_sections(
            query,
            &index.sections,
            module,
            self.scoring.top_k,
        ))
    }

    pub async fn answer(&self, request: &AnswerRequest) -> Result<Answer, AnswerError> {
        let query = request.query.trim();
        let ranked = self.search(query, request.module.as_deref()).await?;

        debug!(
            query,
            module = request.module.as_deref().unwrap_or("-"),
            mode = %request.mode,
            hits = ranked.len(),
            "ranked sections"
        );

        if ranked.is_empty() {
            return Ok(Answer {
                text: REFUSAL.to_string(),
                sources: Vec::new(),
                intent: None,
            });
        }

        Ok(Answer {
            text: synthesize(
                query,
                &ranked,
                request.mode,
                request.selected_text.as_deref(),
            ),
            sources: source_names(&ranked),
            intent: Some(classify_intent(query, &ranked)),
        })
    }
}

/// Marks a build as in flight until dropped, including when the build future
/// is cancelled.
struct BuildFlag<'a>(&'a AtomicBool);

impl<'a> BuildFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for BuildFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
