//! Corpus loading.
//!
//! Reads the single corpus file named by `[corpus].path` into a
//! [`Document`]. Plain text and Markdown are read as UTF-8; PDFs go
//! through `pdf-extract`. Extraction never panics: unreadable or
//! unsupported files surface as a [`CorpusError`].

use std::path::Path;
use thiserror::Error;

use deskhand_core::models::Document;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported corpus file type: {0} (expected .txt, .md, or .pdf)")]
    UnsupportedType(String),
    #[error("PDF extraction failed for {path}: {message}")]
    Pdf { path: String, message: String },
    #[error("corpus file {0} is not valid UTF-8")]
    Encoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CorpusFormat {
    Text,
    Pdf,
}

fn detect_format(path: &Path) -> Result<CorpusFormat, CorpusError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" | "markdown" => Ok(CorpusFormat::Text),
        "pdf" => Ok(CorpusFormat::Pdf),
        _ => Err(CorpusError::UnsupportedType(path.display().to_string())),
    }
}

/// Load the configured corpus file.
pub fn load_corpus(config: &Config) -> Result<Document, CorpusError> {
    load_document(&config.corpus.path, &config.corpus_id())
}

/// Load one file as a [`Document`] with the given id.
pub fn load_document(path: &Path, id: &str) -> Result<Document, CorpusError> {
    let format = detect_format(path)?;
    let bytes = std::fs::read(path).map_err(|source| CorpusError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let text = match format {
        CorpusFormat::Text => String::from_utf8(bytes)
            .map_err(|_| CorpusError::Encoding(path.display().to_string()))?,
        CorpusFormat::Pdf => {
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| CorpusError::Pdf {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        }
    };

    tracing::info!(
        path = %path.display(),
        corpus_id = id,
        chars = text.chars().count(),
        "corpus loaded"
    );
    Ok(Document::new(id, text))
}
