//! Backend of the `emojic` color font compiler.
//!
//! Turns color glyphs into the records of COLR, CPAL, SVG and bitmap tables.

use write_fonts::{dump_table, validate::Validate, FontWrite};

use crate::error::Error;

pub mod bitmap;
pub mod colr;
pub mod colr_to_svg;
pub mod cpal;
pub mod error;
pub mod glyph_reuse;
pub mod grouping;
pub mod svg;

/// The binary form of a table, `context` names it in errors
pub fn table_bytes<T: FontWrite + Validate>(table: &T, context: &str) -> Result<Vec<u8>, Error> {
    dump_table(table).map_err(|report| Error::DumpTableError {
        report: format!("{report:?}"),
        context: context.to_string(),
    })
}
