//! Command line arguments

use std::path::PathBuf;

use clap::Parser;
use emojiir::config::ColorFormat;
use serde::{Deserialize, Serialize};

/// What color font can we build for you today?
#[derive(Serialize, Deserialize, Parser, Debug, Clone, PartialEq)]
pub struct Args {
    /// Font config, yaml. Flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// The color table to build: glyf_colr_0, glyf_colr_1, picosvg, picosvgz, cbdt or sbix
    #[arg(long)]
    pub color_format: Option<ColorFormat>,

    /// How close shapes must be to share an outline, -1 disables reuse
    #[arg(long, allow_hyphen_values = true)]
    pub reuse_tolerance: Option<f64>,

    /// Whether to write color glyphs and the glyph order to disk as yaml
    #[arg(short, long)]
    #[clap(default_value = "false")]
    pub emit_ir: bool,

    /// Working directory for the build process, outputs are written here
    #[arg(short, long)]
    #[clap(default_value = "build")]
    pub build_dir: PathBuf,

    /// Glyph names must match this regex to be processed
    #[arg(short, long)]
    #[clap(default_value = None)]
    pub glyph_name_filter: Option<String>,

    /// Restricted svg files named like emoji_u1f600.svg, png files for bitmap formats
    pub inputs: Vec<PathBuf>,
}

impl Args {
    #[cfg(test)]
    pub fn for_test(build_dir: &std::path::Path, inputs: Vec<PathBuf>) -> Args {
        Args {
            config: None,
            color_format: None,
            reuse_tolerance: None,
            emit_ir: false,
            build_dir: build_dir.to_path_buf(),
            glyph_name_filter: None,
            inputs,
        }
    }
}
