//! Output formats for disk reports
pub mod csv;
pub mod json;
pub mod jsonl;
pub mod text;
pub mod traits;

pub use traits::{OutputDestination, OutputFormat, OutputWriter, ReportFormatter};
