//! Glyph names for color glyphs.

use emojidrasil::types::GlyphName;

// feature files reject longer names
const MAX_NAME_LEN: usize = 63;

fn codepoint_name(cp: u32) -> String {
    match char::from_u32(cp) {
        Some(c) if c.is_ascii_alphabetic() => c.to_string(),
        _ => format!("{cp:x}"),
    }
}

// FNV-1a, stable across runs and platforms
fn stable_hash(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

/// The name of the glyph for a sequence of codepoints.
///
/// Ascii letters are used as is and other codepoints in lowercase hex, joined by
/// underscores, e.g. `g_1f1e6_1f1e8`. Names must start with a letter and fit in
/// 63 characters, overlong names are replaced by a hash.
pub fn glyph_name(codepoints: &[u32]) -> GlyphName {
    let mut name = codepoints
        .iter()
        .map(|cp| codepoint_name(*cp))
        .collect::<Vec<_>>()
        .join("_");
    if name.len() > MAX_NAME_LEN {
        name = format!("{:016x}", stable_hash(&name));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name = format!("g_{name}");
    }
    GlyphName::new(name)
}
