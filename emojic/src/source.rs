//! Input files and the glyphs they become

use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use emojidrasil::types::GlyphName;
use emojiir::{glyph::glyph_name, ir::GlyphOrder, svg::SvgDocument};
use log::debug;
use regex::Regex;

use crate::Error;

/// `emoji_u1f600`, `emoji_u1f1e6_1f1e8`
fn file_stem_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^emoji_u([0-9a-fA-F]{1,6}(?:_[0-9a-fA-F]{1,6})*)$")
            .expect("a valid file name pattern")
    })
}

/// The kind of image a source file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Svg,
    Png,
}

/// A file that becomes one color glyph
#[derive(Debug, Clone, PartialEq)]
pub struct EmojiSource {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub name: GlyphName,
    pub codepoints: Vec<u32>,
}

impl EmojiSource {
    /// Codepoints come from the file name, `emoji_u1f1e6_1f1e8.svg` is 🇦🇨
    pub fn from_path(path: &Path) -> Result<EmojiSource, Error> {
        let unrecognized = || Error::UnrecognizedSource(path.to_path_buf());
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some("svg") => SourceKind::Svg,
            Some("png") => SourceKind::Png,
            _ => return Err(unrecognized()),
        };
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(unrecognized)?;
        let captures = file_stem_pattern()
            .captures(stem)
            .ok_or_else(unrecognized)?;
        let codepoints = captures[1]
            .split('_')
            .map(|hex| u32::from_str_radix(hex, 16).map_err(|_| unrecognized()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EmojiSource {
            path: path.to_path_buf(),
            kind,
            name: glyph_name(&codepoints),
            codepoints,
        })
    }

    pub fn read(&self) -> Result<Vec<u8>, Error> {
        fs::read(&self.path).map_err(|source| Error::FileIo {
            path: self.path.clone(),
            source,
        })
    }

    pub fn read_svg(&self) -> Result<SvgDocument, Error> {
        let xml = fs::read_to_string(&self.path).map_err(|source| Error::FileIo {
            path: self.path.clone(),
            source,
        })?;
        Ok(SvgDocument::parse(&xml)?)
    }
}

/// Sources for `paths`, skipping those whose glyph name doesn't match `filter`
pub fn sources(paths: &[PathBuf], filter: Option<&Regex>) -> Result<Vec<EmojiSource>, Error> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let source = EmojiSource::from_path(path)?;
        if let Some(filter) = filter {
            if !filter.is_match(source.name.as_str()) {
                debug!("{} filtered out", source.name);
                continue;
            }
        }
        sources.push(source);
    }
    Ok(sources)
}

/// `.notdef` then a glyph per source, in source order
pub fn glyph_order(sources: &[EmojiSource]) -> Result<GlyphOrder, Error> {
    let mut glyph_order = GlyphOrder::new();
    glyph_order.insert(GlyphName::NOTDEF);
    for source in sources {
        if glyph_order.contains(&source.name) {
            return Err(Error::DuplicateGlyph {
                glyph: source.name.clone(),
                path: source.path.clone(),
            });
        }
        glyph_order.insert(source.name.clone());
    }
    Ok(glyph_order)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("emoji_u1f600.svg", &[0x1f600], "g_1f600")]
    #[case("emoji_u1f1e6_1f1e8.svg", &[0x1f1e6, 0x1f1e8], "g_1f1e6_1f1e8")]
    #[case("dir/emoji_u61.png", &[0x61], "a")]
    fn codepoints_from_file_name(
        #[case] path: &str,
        #[case] codepoints: &[u32],
        #[case] name: &str,
    ) {
        let source = EmojiSource::from_path(Path::new(path)).unwrap();
        assert_eq!(codepoints, source.codepoints.as_slice());
        assert_eq!(name, source.name.as_str());
    }

    #[rstest]
    #[case("smile.svg")]
    #[case("emoji_u1f600.gif")]
    #[case("emoji_u.svg")]
    #[case("emoji_u1f600_zz.svg")]
    fn unrecognized_file_names(#[case] path: &str) {
        let err = EmojiSource::from_path(Path::new(path)).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedSource(..)), "{err:?}");
    }

    #[test]
    fn filter_by_glyph_name() {
        let paths = vec![
            PathBuf::from("emoji_u1f600.svg"),
            PathBuf::from("emoji_u1f601.svg"),
        ];
        let filter = Regex::new("1f601").unwrap();
        let sources = sources(&paths, Some(&filter)).unwrap();
        assert_eq!(
            vec!["g_1f601"],
            sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn same_codepoints_twice() {
        let paths = vec![
            PathBuf::from("a/emoji_u1f600.svg"),
            PathBuf::from("b/emoji_u1f600.svg"),
        ];
        let err = glyph_order(&sources(&paths, None).unwrap()).unwrap_err();
        assert!(matches!(err, Error::DuplicateGlyph { .. }), "{err:?}");
    }
}
