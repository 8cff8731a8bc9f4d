use crate::extractor::{extract_document, SourceFormat};
use crate::models::Document;
use crate::IngestError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(SourceFormat::from_name)
            .is_some();

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Expands directories into their supported files; plain file paths are kept as given.
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut expanded = Vec::new();
    for path in paths {
        if path.is_dir() {
            expanded.extend(discover_documents(path));
        } else {
            expanded.push(path.clone());
        }
    }
    expanded
}

pub fn digest_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug)]
pub struct SkippedFile {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedFile>,
}

impl IngestionReport {
    pub fn skip(&mut self, source: impl Into<String>, error: &IngestError) {
        let source = source.into();
        warn!(source = %source, reason = %error, "skipped document");
        self.skipped_files.push(SkippedFile {
            source,
            reason: error.to_string(),
        });
    }
}

/// Extracts every path, recording failures instead of stopping at the first one.
pub fn load_documents_best_effort(paths: &[PathBuf]) -> IngestionReport {
    let mut report = IngestionReport::default();

    for path in expand_paths(paths) {
        match extract_document(&path) {
            Ok(document) => report.documents.push(document),
            Err(error) => report.skip(path.display().to_string(), &error),
        }
    }

    report
}

pub fn load_folder_documents(folder: &Path) -> Result<IngestionReport, IngestError> {
    let files = discover_documents(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf, txt or md files found in {}",
            folder.display()
        )));
    }

    Ok(load_documents_best_effort(&files))
}
