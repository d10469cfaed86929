//! File-backed document index
//!
//! Each index is a directory `<root>/<name>/` with an `index.json` metadata
//! file and a `documents.jsonl` file holding one document per line. Document
//! ids are unique within an index: writing an existing id replaces its line.
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Document, DocumentIndex};
use crate::error::IndexError;

const METADATA_FILE: &str = "index.json";
const DOCUMENTS_FILE: &str = "documents.jsonl";
const FORBIDDEN: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ' '];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexMetadata {
    name: String,
    created_at: DateTime<Utc>,
}

/// Check an index name against search-engine naming rules.
pub fn validate_index_name(name: &str) -> Result<(), IndexError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with(['-', '_', '+'])
        || name.chars().any(|c| c.is_uppercase() || FORBIDDEN.contains(&c));
    if invalid {
        return Err(IndexError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub struct JsonlIndex {
    root: PathBuf,
    // Serialises appends from concurrent publishers
    write_lock: Mutex<()>,
}

impl JsonlIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonlIndex {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn index_dir(&self, index: &str) -> Result<PathBuf, IndexError> {
        validate_index_name(index)?;
        Ok(self.root.join(index))
    }

    /// Read back every document of an index, in write order.
    pub fn documents(&self, index: &str) -> Result<Vec<Document>, IndexError> {
        let dir = self.index_dir(index)?;
        if !dir.join(METADATA_FILE).is_file() {
            return Err(IndexError::Unavailable(index.to_string()));
        }
        read_documents(&dir.join(DOCUMENTS_FILE))
    }
}

fn read_documents(path: &Path) -> Result<Vec<Document>, IndexError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(fs::File::open(path)?);
    let mut documents = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        documents.push(serde_json::from_str(&line)?);
    }
    Ok(documents)
}

/// Replace the documents file through a sibling temporary file.
fn rewrite_documents(path: &Path, documents: &[Document]) -> Result<(), IndexError> {
    let staging = path.with_extension("jsonl.tmp");
    let mut buf = Vec::new();
    for document in documents {
        serde_json::to_writer(&mut buf, document)?;
        buf.push(b'\n');
    }
    fs::write(&staging, buf)?;
    fs::rename(&staging, path)?;
    Ok(())
}

impl DocumentIndex for JsonlIndex {
    fn index_exists(&self, index: &str) -> Result<bool, IndexError> {
        Ok(self.index_dir(index)?.join(METADATA_FILE).is_file())
    }

    fn create_index(&self, index: &str) -> Result<(), IndexError> {
        let dir = self.index_dir(index)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let metadata_path = dir.join(METADATA_FILE);
        if metadata_path.is_file() {
            return Ok(());
        }
        fs::create_dir_all(&dir)?;
        let metadata = IndexMetadata {
            name: index.to_string(),
            created_at: Utc::now(),
        };
        fs::write(metadata_path, serde_json::to_vec_pretty(&metadata)?)?;
        Ok(())
    }

    fn put_document(&self, index: &str, document: &Document) -> Result<(), IndexError> {
        let dir = self.index_dir(index)?;
        if !dir.join(METADATA_FILE).is_file() {
            return Err(IndexError::Unavailable(index.to_string()));
        }

        let path = dir.join(DOCUMENTS_FILE);
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut documents = read_documents(&path)?;
        if let Some(existing) = documents.iter_mut().find(|d| d.id == document.id) {
            *existing = document.clone();
            return rewrite_documents(&path, &documents);
        }

        let mut line = serde_json::to_vec(document)?;
        line.push(b'\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(&line)?;
        Ok(())
    }
}
