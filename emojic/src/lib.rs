//! A color font compiler: restricted svg in, color tables out.
//!
//! Compilation runs in two phases. Every shape of every glyph is registered
//! for reuse first, then color glyphs are built in parallel against the now
//! read-only reusable parts.

mod args;
mod config;
mod error;
mod source;

pub use args::Args;
pub use config::Config;
pub use error::Error;
pub use source::{glyph_order, sources, EmojiSource, SourceKind};

use std::{
    fs,
    path::{Path, PathBuf},
};

use emojibe::{
    bitmap::{make_cbdt_tables, make_sbix_strike, BitmapGlyph},
    colr::{colr_v0, colr_v1},
    cpal::ColorPalette,
    glyph_reuse::GlyphReuseCache,
    grouping::regroup,
    svg::make_svg_table,
    table_bytes,
};
use emojiir::{
    color_glyph::{register_shapes, ColorGlyph},
    config::{ColorFormat, FontConfig},
    ir::GlyphOrder,
    parts::ReusableParts,
    svg::SvgDocument,
    warning::Warning,
};
use indexmap::IndexMap;
use log::{debug, info, warn};
use rayon::prelude::*;
use regex::Regex;

/// Everything a compilation produced
#[derive(Debug, Default)]
pub struct Compilation {
    /// Final glyph order, including any outline glyphs COLR needed
    pub glyph_order: GlyphOrder,
    pub color_glyphs: Vec<ColorGlyph>,
    /// Binary tables by tag
    pub tables: IndexMap<String, Vec<u8>>,
    /// SVG table documents by file name
    pub documents: IndexMap<String, Vec<u8>>,
    /// Yaml dumps of records we have no binary form for, by file name
    pub records: IndexMap<String, String>,
    pub warnings: Vec<Warning>,
    /// Glyphs a table had to leave out, and why
    pub omitted_glyphs: Vec<String>,
}

pub fn require_dir(dir: &Path) -> Result<PathBuf, Error> {
    if dir.exists() && !dir.is_dir() {
        return Err(Error::ExpectedDirectory(dir.to_path_buf()));
    }
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| Error::FileIo {
            path: dir.to_path_buf(),
            source,
        })?
    }
    debug!("require_dir {:?}", dir);
    Ok(dir.to_path_buf())
}

fn write_file(path: &Path, data: impl AsRef<[u8]>) -> Result<(), Error> {
    fs::write(path, data).map_err(|source| Error::FileIo {
        path: path.to_path_buf(),
        source,
    })
}

fn check_source_kinds(format: ColorFormat, sources: &[EmojiSource]) -> Result<(), Error> {
    let expected = if format.is_bitmap() {
        SourceKind::Png
    } else {
        SourceKind::Svg
    };
    match sources.iter().find(|s| s.kind != expected) {
        Some(source) => Err(Error::WrongSourceKind {
            format: format.to_string(),
            path: source.path.clone(),
        }),
        None => Ok(()),
    }
}

/// Compile `sources` into the tables of `config.color_format`.
///
/// Glyphs that fail don't stop their siblings, all failures are reported
/// together as [`Error::GlyphErrors`].
pub fn compile(config: &FontConfig, sources: &[EmojiSource]) -> Result<Compilation, Error> {
    config.validate()?;
    check_source_kinds(config.color_format, sources)?;
    let glyph_order = glyph_order(sources)?;
    info!(
        "Compiling {} glyphs to {}",
        sources.len(),
        config.color_format
    );
    if config.color_format.is_bitmap() {
        compile_bitmaps(config, sources, glyph_order)
    } else {
        compile_vectors(config, sources, glyph_order)
    }
}

fn glyph_id(glyph_order: &GlyphOrder, source: &EmojiSource) -> Result<u32, Error> {
    glyph_order
        .glyph_id(&source.name)
        .ok_or_else(|| Error::GlyphErrors(vec![format!("{} is not in the glyph order", source.name)]))
}

fn compile_vectors(
    config: &FontConfig,
    sources: &[EmojiSource],
    glyph_order: GlyphOrder,
) -> Result<Compilation, Error> {
    let mut failures = Vec::new();

    let parsed: Vec<_> = sources.par_iter().map(EmojiSource::read_svg).collect();
    let mut svgs: Vec<(&EmojiSource, SvgDocument)> = Vec::with_capacity(sources.len());
    for (source, result) in sources.iter().zip(parsed) {
        match result {
            Ok(svg) => svgs.push((source, svg)),
            Err(e) => failures.push(format!("{}: {e}", source.name)),
        }
    }

    // Phase 1: reuse needs every shape before any glyph is built
    let parts_view_box = svgs
        .iter()
        .find_map(|(_, svg)| svg.view_box)
        .unwrap_or_else(|| config.em_square());
    let mut parts = ReusableParts::new(parts_view_box, config.reuse_tolerance);
    svgs.retain(|(source, svg)| match register_shapes(&mut parts, svg) {
        Ok(()) => true,
        Err(e) => {
            failures.push(format!("{}: {e}", source.name));
            false
        }
    });
    let mut warnings = parts.compute_donors()?;
    debug!("{} shape sets after registration", parts.shape_sets().count());

    // Phase 2: parts are read only from here on
    let glyph_ids = svgs
        .iter()
        .map(|(source, _)| glyph_id(&glyph_order, source))
        .collect::<Result<Vec<_>, _>>()?;
    let built: Vec<_> = svgs
        .par_iter()
        .zip(glyph_ids.par_iter())
        .map(|((source, svg), gid)| {
            ColorGlyph::create(
                config,
                &parts,
                source.name.clone(),
                *gid,
                source.codepoints.clone(),
                svg,
            )
        })
        .collect();
    let mut color_glyphs = Vec::with_capacity(built.len());
    for ((source, _), result) in svgs.iter().zip(built) {
        match result {
            Ok((glyph, glyph_warnings)) => {
                color_glyphs.push(glyph);
                warnings.extend(glyph_warnings);
            }
            Err(e) => failures.push(format!("{}: {e}", source.name)),
        }
    }
    if !failures.is_empty() {
        return Err(Error::GlyphErrors(failures));
    }

    let mut compilation = Compilation {
        glyph_order,
        color_glyphs,
        warnings,
        ..Default::default()
    };
    if config.color_format.is_colr() {
        add_colr(config, &mut compilation)?;
    } else {
        add_svg(config, &mut compilation)?;
    }
    Ok(compilation)
}

fn add_colr(config: &FontConfig, compilation: &mut Compilation) -> Result<(), Error> {
    let v1 = config.color_format == ColorFormat::GlyfColr1;
    let mut cache = GlyphReuseCache::new(config.reuse_tolerance);
    let mut migrated = Vec::with_capacity(compilation.color_glyphs.len());
    for glyph in compilation.color_glyphs.iter() {
        let (glyph, warnings) = cache.migrate_paths(glyph, &mut compilation.glyph_order)?;
        compilation.warnings.extend(warnings);
        migrated.push(glyph);
    }

    // COLRv1 keeps alpha in the paint, COLRv0 only has the palette
    let palette = ColorPalette::new(&migrated, !v1);
    let colr = if v1 {
        colr_v1(&migrated, &palette, &compilation.glyph_order, &cache)?
    } else {
        let (colr, warnings) = colr_v0(&migrated, &palette, &mut compilation.glyph_order, &mut cache)?;
        compilation.warnings.extend(warnings);
        colr
    };
    let cpal = palette.to_cpal()?;
    compilation
        .tables
        .insert("COLR".to_string(), table_bytes(&colr, "COLR")?);
    compilation
        .tables
        .insert("CPAL".to_string(), table_bytes(&cpal, "CPAL")?);

    // glyf is built elsewhere, hand over the outlines it needs
    let outlines: IndexMap<_, _> = cache.outlines().collect();
    compilation
        .records
        .insert("outlines.yml".to_string(), serde_yaml::to_string(&outlines)?);
    Ok(())
}

fn add_svg(config: &FontConfig, compilation: &mut Compilation) -> Result<(), Error> {
    let compressed = config.color_format == ColorFormat::Picosvgz;
    let groups = regroup(
        &mut compilation.color_glyphs,
        &mut compilation.glyph_order,
        &[],
    )?;
    let table = make_svg_table(&compilation.color_glyphs, &groups, compressed)?;
    for e in table.errors.iter() {
        warn!("Left out of the SVG table: {e}");
        compilation.omitted_glyphs.push(e.to_string());
    }
    compilation.warnings.extend(table.warnings.iter().cloned());
    compilation
        .tables
        .insert("SVG".to_string(), table.to_bytes()?);
    let extension = if compressed { "svgz" } else { "svg" };
    for doc in table.documents {
        compilation.documents.insert(
            format!(
                "glyphs_{}_{}.{extension}",
                doc.start_glyph_id, doc.end_glyph_id
            ),
            doc.data,
        );
    }
    Ok(())
}

fn compile_bitmaps(
    config: &FontConfig,
    sources: &[EmojiSource],
    glyph_order: GlyphOrder,
) -> Result<Compilation, Error> {
    let read: Vec<_> = sources.par_iter().map(EmojiSource::read).collect();
    let mut failures = Vec::new();
    let mut glyphs = Vec::with_capacity(sources.len());
    for (source, result) in sources.iter().zip(read) {
        match result {
            Ok(png) => glyphs.push(BitmapGlyph {
                name: source.name.clone(),
                glyph_id: glyph_id(&glyph_order, source)?,
                png,
            }),
            Err(e) => failures.push(format!("{}: {e}", source.name)),
        }
    }
    if !failures.is_empty() {
        return Err(Error::GlyphErrors(failures));
    }

    let mut compilation = Compilation {
        glyph_order,
        ..Default::default()
    };
    if config.color_format == ColorFormat::Cbdt {
        let tables = make_cbdt_tables(config, &glyphs)?;
        compilation
            .tables
            .insert("CBDT".to_string(), tables.cbdt_bytes());
        compilation
            .records
            .insert("CBLC.yml".to_string(), serde_yaml::to_string(&tables.strikes)?);
    } else {
        let strike = make_sbix_strike(config, &glyphs)?;
        compilation
            .records
            .insert("sbix.yml".to_string(), serde_yaml::to_string(&strike)?);
    }
    Ok(compilation)
}

/// Write what `compilation` produced into `build_dir`
pub fn write_outputs(
    build_dir: &Path,
    compilation: &Compilation,
    emit_ir: bool,
) -> Result<(), Error> {
    require_dir(build_dir)?;
    for (tag, data) in compilation.tables.iter() {
        write_file(&build_dir.join(format!("{tag}.table")), data)?;
    }
    if !compilation.documents.is_empty() {
        let svg_dir = require_dir(&build_dir.join("svg"))?;
        for (name, data) in compilation.documents.iter() {
            write_file(&svg_dir.join(name), data)?;
        }
    }
    for (name, yml) in compilation.records.iter() {
        write_file(&build_dir.join(name), yml)?;
    }
    if emit_ir {
        let glyph_dir = require_dir(&build_dir.join("glyph_ir"))?;
        for glyph in compilation.color_glyphs.iter() {
            write_file(
                &glyph_dir.join(format!("{}.yml", glyph.name)),
                serde_yaml::to_string(glyph)?,
            )?;
        }
        write_file(
            &build_dir.join("glyph_order.yml"),
            serde_yaml::to_string(&compilation.glyph_order)?,
        )?;
    }
    Ok(())
}

/// Compile what `config` asks for and write the results to its build directory
pub fn run(config: &Config) -> Result<Compilation, Error> {
    let filter = config
        .args
        .glyph_name_filter
        .as_deref()
        .map(Regex::new)
        .transpose()?;
    let sources = sources(&config.args.inputs, filter.as_ref())?;
    let compilation = compile(&config.font, &sources)?;
    write_outputs(&config.args.build_dir, &compilation, config.args.emit_ir)?;
    Ok(compilation)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};
    use write_fonts::{
        read::{FontData, FontRead},
        tables::colr::{Colr, Paint},
    };

    use super::*;

    const SQUARE: &str = r#"<svg viewBox="0 0 128 128"><path d="M0,0 L64,0 L64,64 L0,64 Z" fill="red"/></svg>"#;
    const MOVED_SQUARE: &str = r##"<svg viewBox="0 0 128 128"><path d="M32,32 L96,32 L96,96 L32,96 Z" fill="blue"/><path d="M0,100 L10,100 L10,110 Z" fill="#00ff0080"/></svg>"##;
    const GRADIENT: &str = r##"<svg viewBox="0 0 128 128"><defs><linearGradient id="g" x1="0" y1="0" x2="128" y2="0" gradientUnits="userSpaceOnUse"><stop offset="0" stop-color="red"/><stop offset="1" stop-color="blue"/></linearGradient></defs><path d="M0,0 L128,0 L128,128 Z" fill="url(#g)"/></svg>"##;

    const RADIAL: &str = r##"<svg viewBox="0 0 128 128"><defs><radialGradient id="r" cx="64" cy="64" r="64" gradientUnits="userSpaceOnUse"><stop offset="0" stop-color="yellow"/><stop offset="1" stop-color="red"/></radialGradient></defs><path d="M0,0 L128,0 L128,128 L0,128 Z" fill="url(#r)"/></svg>"##;
    const NO_VIEW_BOX: &str = r#"<svg><path d="M0,0 L10,0 L10,10 Z" fill="red"/></svg>"#;

    fn write_sources(dir: &TempDir, files: &[(&str, Vec<u8>)]) -> Vec<EmojiSource> {
        let paths: Vec<_> = files
            .iter()
            .map(|(name, content)| {
                let path = dir.path().join(name);
                fs::write(&path, content).unwrap();
                path
            })
            .collect();
        sources(&paths, None).unwrap()
    }

    fn config(color_format: ColorFormat) -> FontConfig {
        FontConfig {
            color_format,
            ..Default::default()
        }
    }

    fn compile_svgs(color_format: ColorFormat, files: &[(&str, &str)]) -> Compilation {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp_dir = tempdir().unwrap();
        let files: Vec<_> = files.iter().map(|(n, c)| (*n, c.as_bytes().to_vec())).collect();
        let sources = write_sources(&temp_dir, &files);
        compile(&config(color_format), &sources).unwrap()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut data, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer
                .write_image_data(&vec![0; (width * height * 4) as usize])
                .unwrap();
            writer.finish().unwrap();
        }
        data
    }

    fn names(order: &GlyphOrder) -> Vec<&str> {
        order.iter().map(|n| n.as_str()).collect()
    }

    #[test]
    fn colr_v1_tables() {
        let compilation = compile_svgs(
            ColorFormat::GlyfColr1,
            &[
                ("emoji_u1f600.svg", SQUARE),
                ("emoji_u1f601.svg", MOVED_SQUARE),
            ],
        );
        assert_eq!(
            vec!["COLR", "CPAL"],
            compilation.tables.keys().map(String::as_str).collect::<Vec<_>>()
        );
        // version 1
        assert_eq!(vec![0, 1], compilation.tables["COLR"][..2].to_vec());
        // the moved square reuses the first one's outline
        assert_eq!(
            vec![".notdef", "g_1f600", "g_1f601", "g_1f600.0", "g_1f601.0"],
            names(&compilation.glyph_order)
        );
        assert!(compilation.records["outlines.yml"].contains("g_1f600.0"));
    }

    /// The paint of the only outline of the only color glyph in a COLRv1 build
    fn only_fill(svg: &str) -> Paint {
        let compilation = compile_svgs(ColorFormat::GlyfColr1, &[("emoji_u1f600.svg", svg)]);
        let colr = Colr::read(FontData::new(&compilation.tables["COLR"])).unwrap();
        let records = &colr
            .base_glyph_list
            .as_ref()
            .unwrap()
            .base_glyph_paint_records;
        assert_eq!(1, records.len());
        let Paint::Glyph(glyph) = &*records[0].paint else {
            panic!("Expected a glyph paint, got {:?}", records[0].paint);
        };
        (*glyph.paint).clone()
    }

    // the default metrics put the view box origin at x 37.5
    #[test]
    fn colr_v1_linear_gradient() {
        let Paint::LinearGradient(gradient) = only_fill(GRADIENT) else {
            panic!("Expected a linear gradient");
        };
        assert_eq!(
            (38, 950, 1238, 950, 38, -250),
            (
                gradient.x0.to_i16(),
                gradient.y0.to_i16(),
                gradient.x1.to_i16(),
                gradient.y1.to_i16(),
                gradient.x2.to_i16(),
                gradient.y2.to_i16(),
            )
        );
        assert_eq!(2, gradient.color_line.color_stops.len());
    }

    #[test]
    fn colr_v1_radial_gradient() {
        let Paint::RadialGradient(gradient) = only_fill(RADIAL) else {
            panic!("Expected a radial gradient");
        };
        assert_eq!(
            (638, 350, 0, 638, 350, 600),
            (
                gradient.x0.to_i16(),
                gradient.y0.to_i16(),
                gradient.radius0.to_u16(),
                gradient.x1.to_i16(),
                gradient.y1.to_i16(),
                gradient.radius1.to_u16(),
            )
        );
    }

    #[test]
    fn colr_v0_drops_gradients() {
        let compilation = compile_svgs(
            ColorFormat::GlyfColr0,
            &[("emoji_u1f600.svg", GRADIENT)],
        );
        assert_eq!(vec![0, 0], compilation.tables["COLR"][..2].to_vec());
        assert!(
            compilation
                .warnings
                .iter()
                .any(|w| matches!(w, Warning::GradientDropped { .. })),
            "{:?}",
            compilation.warnings
        );
    }

    #[test]
    fn svg_groups_glyphs_that_share_shapes() {
        let compilation = compile_svgs(
            ColorFormat::Picosvg,
            &[
                ("emoji_u1f600.svg", SQUARE),
                ("emoji_u1f601.svg", GRADIENT),
                ("emoji_u1f602.svg", SQUARE),
            ],
        );
        assert_eq!(
            vec![".notdef", "g_1f600", "g_1f602", "g_1f601"],
            names(&compilation.glyph_order)
        );
        assert_eq!(
            vec!["glyphs_1_2.svg", "glyphs_3_3.svg"],
            compilation
                .documents
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
        );
        let table = &compilation.tables["SVG"];
        // version 0, document list at 10, 2 documents
        assert_eq!(vec![0, 0, 0, 0, 0, 10], table[..6].to_vec());
        assert_eq!(vec![0, 2], table[10..12].to_vec());
    }

    #[test]
    fn svg_leaves_out_glyphs_without_a_view_box() {
        let compilation = compile_svgs(
            ColorFormat::Picosvg,
            &[
                ("emoji_u1f600.svg", SQUARE),
                ("emoji_u1f601.svg", NO_VIEW_BOX),
                ("emoji_u1f602.svg", GRADIENT),
            ],
        );
        assert_eq!(
            vec!["glyphs_1_1.svg", "glyphs_3_3.svg"],
            compilation
                .documents
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
        );
        assert!(compilation.tables.contains_key("SVG"));
        assert_eq!(1, compilation.omitted_glyphs.len());
        assert!(
            compilation.omitted_glyphs[0].contains("g_1f601"),
            "{:?}",
            compilation.omitted_glyphs
        );
        assert!(compilation
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::MissingViewBox { .. })));
    }

    #[test]
    fn picosvgz_documents_are_gzipped() {
        let compilation = compile_svgs(ColorFormat::Picosvgz, &[("emoji_u1f600.svg", SQUARE)]);
        let data = &compilation.documents["glyphs_1_1.svgz"];
        let mut xml = String::new();
        GzDecoder::new(data.as_slice())
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.starts_with("<svg"), "{xml}");
    }

    #[test]
    fn failures_are_reported_together() {
        let temp_dir = tempdir().unwrap();
        let sources = write_sources(
            &temp_dir,
            &[
                ("emoji_u1f600.svg", SQUARE.as_bytes().to_vec()),
                (
                    "emoji_u1f601.svg",
                    br#"<svg viewBox="0 0 10 10"><rect width="1" height="1"/></svg>"#.to_vec(),
                ),
                ("emoji_u1f602.svg", b"not xml at all <".to_vec()),
            ],
        );
        let Err(Error::GlyphErrors(failures)) =
            compile(&config(ColorFormat::GlyfColr1), &sources)
        else {
            panic!("expected glyph errors");
        };
        assert_eq!(2, failures.len(), "{failures:?}");
        assert!(failures[0].starts_with("g_1f601"), "{failures:?}");
        assert!(failures[1].starts_with("g_1f602"), "{failures:?}");
    }

    #[test]
    fn cbdt_from_pngs() {
        let temp_dir = tempdir().unwrap();
        let sources = write_sources(
            &temp_dir,
            &[
                ("emoji_u1f600.png", png(136, 128)),
                ("emoji_u1f601.png", png(136, 128)),
            ],
        );
        let compilation = compile(&config(ColorFormat::Cbdt), &sources).unwrap();
        // version 3.0
        assert_eq!(vec![0, 3, 0, 0], compilation.tables["CBDT"][..4].to_vec());
        assert!(compilation.records["CBLC.yml"].contains("start_glyph_index: 1"));
    }

    #[test]
    fn sbix_from_pngs() {
        let temp_dir = tempdir().unwrap();
        let sources = write_sources(&temp_dir, &[("emoji_u1f600.png", png(136, 128))]);
        let compilation = compile(&config(ColorFormat::Sbix), &sources).unwrap();
        assert!(compilation.tables.is_empty());
        assert!(compilation.records["sbix.yml"].contains("glyph_name: g_1f600"));
    }

    #[test]
    fn bitmap_formats_need_pngs() {
        let temp_dir = tempdir().unwrap();
        let sources = write_sources(&temp_dir, &[("emoji_u1f600.svg", SQUARE.as_bytes().to_vec())]);
        let err = compile(&config(ColorFormat::Cbdt), &sources).unwrap_err();
        assert!(matches!(err, Error::WrongSourceKind { .. }), "{err:?}");
    }

    #[test]
    fn run_writes_outputs() {
        let temp_dir = tempdir().unwrap();
        let input = temp_dir.path().join("emoji_u1f600.svg");
        fs::write(&input, SQUARE).unwrap();
        let build_dir = temp_dir.path().join("build");

        let mut args = Args::for_test(&build_dir, vec![input]);
        args.emit_ir = true;
        let config = Config::new(args).unwrap();
        run(&config).unwrap();

        for file in [
            "COLR.table",
            "CPAL.table",
            "outlines.yml",
            "glyph_order.yml",
            "glyph_ir/g_1f600.yml",
        ] {
            assert!(build_dir.join(file).is_file(), "{file} missing");
        }
        let glyph: ColorGlyph =
            serde_yaml::from_str(&fs::read_to_string(build_dir.join("glyph_ir/g_1f600.yml")).unwrap())
                .unwrap();
        assert_eq!(vec![0x1f600], glyph.codepoints);
    }
}
