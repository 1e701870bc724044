use std::io::Write;

use clap::Parser;
use emojic::{run, Args, Config, Error};
use log::{info, LevelFilter};

fn main() -> Result<(), Error> {
    env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .parse_default_env()
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{:?}: {style}{}{style:#}: {}",
                std::thread::current().id(),
                record.level(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    let config = Config::new(args)?;
    emojic::require_dir(&config.args.build_dir)?;
    config.init()?;

    let compilation = run(&config)?;
    info!(
        "Wrote {} tables and {} svg documents to {:?}",
        compilation.tables.len(),
        compilation.documents.len(),
        config.args.build_dir
    );
    for warning in compilation.warnings.iter() {
        println!("warning: {warning}");
    }
    for omitted in compilation.omitted_glyphs.iter() {
        println!("omitted: {omitted}");
    }
    Ok(())
}
