//! Export adapters
//!
//! An adapter turns the raw text of a training-application export into a
//! [`ParsedSession`]: the typed session plus every irregularity found while
//! reading it.

mod rowpro;

pub use rowpro::RowProAdapter;

use crate::error::ConvertError;
use crate::types::ParsedSession;

/// Trait for export format adapters
pub trait ExportAdapter {
    /// Parse raw export text into a session
    fn parse(&self, raw: &str) -> Result<ParsedSession, ConvertError>;
}
