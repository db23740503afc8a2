//! Pipeline orchestration
//!
//! This module provides the public conversion API. It runs the full pipeline
//! from raw RowPro export text to TCX bytes:
//! 1. RowProAdapter - parse the export into a session plus diagnostics
//! 2. Normalizer - map the session onto an activity, lap and track
//! 3. LapAggregator - fill lap statistics the export did not supply
//! 4. TcxEncoder - write the document as XML

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::adapters::{ExportAdapter, RowProAdapter};
use crate::aggregator::LapAggregator;
use crate::config::ConverterConfig;
use crate::document::Sport;
use crate::encoder::TcxEncoder;
use crate::error::{ConvertError, Diagnostic};
use crate::normalizer::{DocumentOptions, Normalizer};
use crate::types::ParsedSession;

/// Convert a RowPro export to a pretty-printed TCX document.
///
/// # Arguments
/// * `raw` - Export text, CRLF-delimited
/// * `sport` - Sport written on the activity
///
/// # Example
/// ```ignore
/// let xml = rowpro_to_tcx(&std::fs::read_to_string("row1.csv")?, Sport::Rowing)?;
/// ```
pub fn rowpro_to_tcx(raw: &str, sport: Sport) -> Result<String, ConvertError> {
    let converter = Converter::from_config(ConverterConfig {
        sport,
        ..ConverterConfig::default()
    })?;
    let conversion = converter.convert_str(raw)?;
    String::from_utf8(conversion.xml).map_err(|e| ConvertError::Xml(e.to_string()))
}

/// Result of one conversion
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Encoded TCX document
    pub xml: Vec<u8>,
    /// Everything worth reporting about the source, in discovery order
    pub diagnostics: Vec<Diagnostic>,
    pub activities: usize,
    pub trackpoints: usize,
}

/// Configured converter, reusable across inputs
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConverterConfig,
    adapter: RowProAdapter,
    encoder: TcxEncoder,
}

impl Converter {
    /// Create a converter with default settings
    pub fn new() -> Self {
        Self {
            config: ConverterConfig::default(),
            adapter: RowProAdapter::new(),
            encoder: TcxEncoder::new(),
        }
    }

    pub fn from_config(config: ConverterConfig) -> Result<Self, ConvertError> {
        let adapter = RowProAdapter::with_default_offset(config.utc_offset()?);
        let encoder = TcxEncoder::with_pretty_print(config.pretty_print);
        Ok(Self {
            config,
            adapter,
            encoder,
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Parse only, without building a document
    pub fn parse(&self, raw: &str) -> Result<ParsedSession, ConvertError> {
        self.adapter.parse(raw)
    }

    /// Convert export text
    pub fn convert_str(&self, raw: &str) -> Result<Conversion, ConvertError> {
        self.run(raw, Vec::new())
    }

    /// Convert everything readable from `reader`
    ///
    /// A read failure is reported as a diagnostic and the conversion goes on
    /// with empty input, yielding a document without activities.
    pub fn convert_reader<R: Read>(
        &self,
        reader: R,
        source_name: &str,
    ) -> Result<Conversion, ConvertError> {
        match read_export(reader, source_name) {
            Ok((raw, diagnostics)) => self.run(&raw, diagnostics),
            Err(e) => self.run("", vec![unreadable(source_name, &e)]),
        }
    }

    /// Convert the file at `path`
    pub fn convert_path(&self, path: impl AsRef<Path>) -> Result<Conversion, ConvertError> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        match File::open(path) {
            Ok(file) => self.convert_reader(file, &source_name),
            Err(e) => self.run("", vec![unreadable(&source_name, &e)]),
        }
    }

    /// Convert `input` and write the document to `output`
    pub fn convert_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<Conversion, ConvertError> {
        let conversion = self.convert_path(input)?;
        write_atomic(output, &conversion.xml)?;
        Ok(conversion)
    }

    fn run(&self, raw: &str, mut diagnostics: Vec<Diagnostic>) -> Result<Conversion, ConvertError> {
        // Stage 1: parse
        let parsed = self.adapter.parse(raw)?;
        diagnostics.extend(parsed.diagnostics);

        if self.config.strict {
            if let Some(first) = diagnostics.first() {
                return Err(ConvertError::Strict(first.clone()));
            }
        }

        // Stage 2: build the document
        let options = DocumentOptions {
            sport: self.config.sport,
            rowpro_version: self.config.rowpro_version.clone(),
        };
        let mut document = Normalizer::to_document(parsed.session, &options);

        // Stage 3: aggregate
        LapAggregator::aggregate_document(&mut document);

        // Stage 4: encode
        let xml = self.encoder.encode(&document)?;

        debug!(
            activities = document.activities.len(),
            trackpoints = document.point_count(),
            bytes = xml.len(),
            "encoded tcx document"
        );

        Ok(Conversion {
            xml,
            diagnostics,
            activities: document.activities.len(),
            trackpoints: document.point_count(),
        })
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `bytes` to `path` through a temporary file renamed into place
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), ConvertError> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|e| ConvertError::Io(e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "wrote output");
    Ok(())
}

/// Read a whole export as text
///
/// Invalid UTF-8 does not fail the read: offending bytes become U+FFFD and an
/// `InvalidUtf8` diagnostic is returned with the text.
pub fn read_export<R: Read>(
    mut reader: R,
    source_name: &str,
) -> std::io::Result<(String, Vec<Diagnostic>)> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    match String::from_utf8(bytes) {
        Ok(raw) => Ok((raw, Vec::new())),
        Err(e) => {
            let diagnostic = Diagnostic::InvalidUtf8 {
                source_name: source_name.to_string(),
                offset: e.utf8_error().valid_up_to(),
            };
            warn!("{diagnostic}");
            let raw = String::from_utf8_lossy(e.as_bytes()).into_owned();
            Ok((raw, vec![diagnostic]))
        }
    }
}

fn unreadable(source_name: &str, error: &std::io::Error) -> Diagnostic {
    let diagnostic = Diagnostic::SourceUnreadable {
        source_name: source_name.to_string(),
        reason: error.to_string(),
    };
    warn!("{diagnostic}");
    diagnostic
}
