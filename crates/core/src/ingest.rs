use crate::chunking::segment_document;
use crate::error::Result;
use crate::traits::SectionSource;
use crate::{IndexingOptions, IngestError, Section};
use async_trait::async_trait;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Documentation sources under `folder`, in sorted walk order.
///
/// Unreadable subtrees are reported through `skipped` and left out.
pub fn discover_document_files(
    folder: &Path,
    options: &IndexingOptions,
    skipped: &mut Vec<SkippedDocument>,
) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for item in WalkDir::new(folder).sort_by_file_name() {
        let entry = match item {
            Ok(entry) => entry,
            Err(error) => {
                let path = error
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| folder.to_path_buf());
                warn!(path = %path.display(), reason = %error, "skipping unreadable subtree");
                skipped.push(SkippedDocument {
                    path,
                    reason: IngestError::Walk(error).to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let is_document = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                options
                    .extensions
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });

        if is_document {
            files.push(entry.path().to_path_buf());
        }
    }

    files
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub sections: Vec<Section>,
    pub skipped_files: Vec<SkippedDocument>,
}

/// Walks `folder` and segments every document it finds. A document that
/// cannot be read is logged and listed in the report instead of failing the
/// whole walk; only a missing root is an error.
pub fn ingest_folder_sections_best_effort(
    folder: &Path,
    options: &IndexingOptions,
) -> Result<IngestionReport> {
    if !folder.is_dir() {
        return Err(IngestError::MissingRoot(folder.display().to_string()));
    }

    let mut skipped_files = Vec::new();
    let files = discover_document_files(folder, options, &mut skipped_files);
    let mut sections = Vec::new();

    for path in files {
        match fs::read_to_string(&path) {
            Ok(content) => sections.extend(segment_document(&path, &content, options)),
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipping unreadable document");
                skipped_files.push(SkippedDocument {
                    path,
                    reason: IngestError::Io(error).to_string(),
                });
            }
        }
    }

    Ok(IngestionReport {
        sections,
        skipped_files,
    })
}

/// A directory of markdown documents, read fresh on every load.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    root: PathBuf,
    options: IndexingOptions,
}

impl DocumentTree {
    pub fn new(root: impl Into<PathBuf>, options: IndexingOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SectionSource for DocumentTree {
    async fn load_sections(&self) -> Result<IngestionReport, IngestError> {
        let root = self.root.clone();
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || ingest_folder_sections_best_effort(&root, &options))
            .await
            .map_err(|error| IngestError::Join(error.to_string()))?
    }
}
