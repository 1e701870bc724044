use std::{io, path::PathBuf};

use emojidrasil::types::GlyphName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("'{0}' exists but is not a directory")]
    ExpectedDirectory(PathBuf),
    #[error("io failed for '{path}': '{source}'")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unrecognized source {0}, expected emoji_u<hex>[_<hex>...].svg or .png")]
    UnrecognizedSource(PathBuf),
    #[error("{path:?} is a second source for {glyph}")]
    DuplicateGlyph { glyph: GlyphName, path: PathBuf },
    #[error("{format} can't be built from {path:?}")]
    WrongSourceKind { format: String, path: PathBuf },
    #[error("Bad glyph name filter: {0}")]
    BadGlyphNameFilter(#[from] regex::Error),
    #[error(transparent)]
    YamlSerError(#[from] serde_yaml::Error),
    #[error(transparent)]
    FontIrError(#[from] emojiir::error::Error),
    #[error(transparent)]
    Backend(#[from] emojibe::error::Error),
    #[error("{} glyph(s) failed:\n  {}", .0.len(), .0.join("\n  "))]
    GlyphErrors(Vec<String>),
}
