//! RowPro CSV input schema
//!
//! This module defines the two section headers of the RowPro export and the
//! positional field tables used to coerce each record into typed values.

mod fields;

pub use fields::*;
