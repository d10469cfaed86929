//! Publishing reports to a document index
//!
//! A report is flattened into a single key/value document and written to a
//! [`DocumentIndex`]. The publisher creates the index at most once and keeps
//! going when a single document cannot be written.
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IndexError;
use crate::observer::{AnalysisEvent, AnalysisObserver};
use crate::report::Report;

pub mod jsonl_index;

pub use jsonl_index::JsonlIndex;

/// Default index name.
pub const DEFAULT_INDEX: &str = "disk-reports";

/// A flattened report ready for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: BTreeMap<String, Value>,
}

impl Document {
    /// Flatten a report; the document id and the `image` field are the
    /// report's identifier.
    pub fn from_report(report: &Report) -> Result<Self, IndexError> {
        let mut fields = report.flatten()?;
        fields.insert(
            "image".to_string(),
            Value::String(report.identifier.clone()),
        );
        Ok(Document {
            id: report.identifier.clone(),
            fields,
        })
    }
}

/// Storage for documents grouped into named indices.
pub trait DocumentIndex: Send + Sync {
    fn index_exists(&self, index: &str) -> Result<bool, IndexError>;
    fn create_index(&self, index: &str) -> Result<(), IndexError>;
    fn put_document(&self, index: &str, document: &Document) -> Result<(), IndexError>;
}

/// Outcome of a publishing batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishSummary {
    pub indexed: usize,
    /// `(document id, error message)` for every document that was not written.
    pub failed: Vec<(String, String)>,
}

impl PublishSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Publisher {
    index: Arc<dyn DocumentIndex>,
    name: String,
    observer: Arc<dyn AnalysisObserver>,
    ensured: Mutex<bool>,
}

impl Publisher {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        name: impl Into<String>,
        observer: Arc<dyn AnalysisObserver>,
    ) -> Self {
        Publisher {
            index,
            name: name.into(),
            observer,
            ensured: Mutex::new(false),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.name
    }

    /// Create the index if it does not exist yet.
    ///
    /// The check runs once per publisher; later calls return immediately.
    pub fn ensure_index(&self) -> Result<(), IndexError> {
        let mut ensured = self
            .ensured
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *ensured {
            return Ok(());
        }

        if !self.index.index_exists(&self.name)? {
            self.index.create_index(&self.name)?;
            self.observer.on_event(&AnalysisEvent::IndexCreated {
                index: self.name.clone(),
            });
        }
        *ensured = true;
        Ok(())
    }

    /// Write one report.
    pub fn publish(&self, report: &Report) -> Result<(), IndexError> {
        self.ensure_index()?;
        let document = Document::from_report(report)?;
        self.index.put_document(&self.name, &document)?;
        self.observer.on_event(&AnalysisEvent::DocumentIndexed {
            index: self.name.clone(),
            document: document.id,
        });
        Ok(())
    }

    /// Write every report, reporting failures instead of stopping.
    pub fn publish_all(&self, reports: &[Report]) -> PublishSummary {
        let mut summary = PublishSummary::default();
        for report in reports {
            match self.publish(report) {
                Ok(()) => summary.indexed += 1,
                Err(e) => {
                    let message = e.to_string();
                    self.observer.on_event(&AnalysisEvent::IndexWriteFailed {
                        index: self.name.clone(),
                        document: report.identifier.clone(),
                        message: message.clone(),
                    });
                    summary.failed.push((report.identifier.clone(), message));
                }
            }
        }
        summary
    }
}
