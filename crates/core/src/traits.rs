use crate::{IngestError, IngestionReport};
use async_trait::async_trait;

/// Where the sections of an index come from.
#[async_trait]
pub trait SectionSource: Send + Sync {
    async fn load_sections(&self) -> Result<IngestionReport, IngestError>;
}
