//! rowpro-tcx - DigitalRowing RowPro exports to Garmin Training Center XML
//!
//! A RowPro CSV export goes through a deterministic pipeline: export
//! adaptation → session normalization → lap aggregation → TCX encoding.
//! Irregularities in the export are collected as diagnostics and returned
//! next to the document instead of aborting the conversion.

pub mod adapters;
pub mod aggregator;
pub mod config;
pub mod document;
pub mod encoder;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod types;

pub use adapters::{ExportAdapter, RowProAdapter};
pub use config::ConverterConfig;
pub use document::{Document, Sport};
pub use encoder::TcxEncoder;
pub use error::{ConvertError, Diagnostic};
pub use pipeline::{rowpro_to_tcx, Conversion, Converter};

/// Converter version written into the `Author` element
pub const CONVERTER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name written into the `Author` element
pub const PRODUCER_NAME: &str = "rowpro-tcx";
