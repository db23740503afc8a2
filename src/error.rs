//! Error types for rowpro-tcx
//!
//! Hard failures live in [`ConvertError`]. Recoverable irregularities in the
//! export are [`Diagnostic`]s: they are collected and handed back to the
//! caller next to the result instead of aborting the conversion.

use serde::Serialize;
use thiserror::Error;

/// Errors that abort a conversion
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Unsupported line ending on line {line}: records must be CRLF-delimited")]
    UnsupportedLineEnding { line: usize },

    #[error("XML encoding error: {0}")]
    Xml(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Strict mode: {0}")]
    Strict(Diagnostic),
}

/// Section of the export a diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Summary,
    Samples,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Summary => "summary",
            Section::Samples => "samples",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal findings produced while reading an export
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("line {line}: cannot convert {section} field `{field}` value {value:?}")]
    FieldConversion {
        section: Section,
        field: &'static str,
        value: String,
        line: usize,
    },

    #[error("line {line}: {section} record has {found} fields, {expected} expected")]
    FieldCountMismatch {
        section: Section,
        found: usize,
        expected: usize,
        line: usize,
    },

    #[error("line {line}: sample dropped, time and distance are required")]
    SampleDropped { line: usize },

    #[error("line {line}: repeated summary section ignored")]
    DuplicateSummary { line: usize },

    #[error("summary section not found")]
    SummaryNotFound,

    #[error("samples section not found")]
    SamplesNotFound,

    #[error("session start time unknown, {samples} samples cannot be timestamped")]
    MissingStartTime { samples: usize },

    #[error("could not read source {source_name}: {reason}")]
    SourceUnreadable { source_name: String, reason: String },

    #[error("{source_name} is not valid UTF-8 from byte {offset}, invalid bytes replaced")]
    InvalidUtf8 { source_name: String, offset: usize },
}
