use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use common::error::AppError;

/// A document handed over by the acquisition step, one JSON object per line.
/// The url is the unique key; text is truncated later by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// Reads documents from a JSON-lines file. Blank lines are ignored; records
/// that fail to parse, carry an invalid url, or repeat an already-seen url
/// are skipped with a warning.
pub fn load_documents(path: &Path) -> Result<Vec<Document>, AppError> {
    let raw = std::fs::read_to_string(path)?;

    let mut documents = Vec::new();
    let mut seen = HashSet::new();
    for (line_number, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let document: Document = match serde_json::from_str(line) {
            Ok(document) => document,
            Err(err) => {
                warn!(line = line_number + 1, error = %err, "skipping unparseable document record");
                continue;
            }
        };
        if Url::parse(&document.url).is_err() {
            warn!(line = line_number + 1, url = %document.url, "skipping document with invalid url");
            continue;
        }
        if !seen.insert(document.url.clone()) {
            warn!(url = %document.url, "skipping duplicate document url");
            continue;
        }
        documents.push(document);
    }

    Ok(documents)
}
