//! Settings of a single compilation run

use std::{fs, path::PathBuf};

use emojiir::config::FontConfig;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{Args, Error};

/// The arguments of a compilation and the font config they resolve to.
///
/// Values from the config file are overridden by command line flags.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub args: Args,
    pub font: FontConfig,
}

impl Config {
    /// Load the config file named by `args`, if any, and apply overrides
    pub fn new(args: Args) -> Result<Config, Error> {
        let mut font = match &args.config {
            Some(path) => {
                let yml = fs::read_to_string(path).map_err(|source| Error::FileIo {
                    path: path.clone(),
                    source,
                })?;
                serde_yaml::from_str(&yml)?
            }
            None => FontConfig::default(),
        };
        if let Some(color_format) = args.color_format {
            font.color_format = color_format;
        }
        if let Some(reuse_tolerance) = args.reuse_tolerance {
            font.reuse_tolerance = reuse_tolerance;
        }
        font.validate()?;
        Ok(Config { args, font })
    }

    /// Returns the path to the config file for this compilation
    fn file(&self) -> PathBuf {
        self.args.build_dir.join("emojic.yml")
    }

    /// Record what this compilation ran with in the build directory
    pub fn init(&self) -> Result<(), Error> {
        let config_file = self.file();
        info!("Writing {config_file:?}");
        fs::write(&config_file, serde_yaml::to_string(self)?).map_err(|source| Error::FileIo {
            path: config_file,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use emojiir::config::ColorFormat;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn flags_override_file() {
        let temp_dir = tempdir().unwrap();
        let config_file = temp_dir.path().join("font.yml");
        fs::write(
            &config_file,
            "family: Test Emoji\ncolor_format: picosvg\nreuse_tolerance: 0.5\n",
        )
        .unwrap();

        let mut args = Args::for_test(temp_dir.path(), vec![]);
        args.config = Some(config_file);
        args.color_format = Some(ColorFormat::GlyfColr0);
        let config = Config::new(args).unwrap();

        assert_eq!("Test Emoji", config.font.family);
        assert_eq!(ColorFormat::GlyfColr0, config.font.color_format);
        assert_eq!(0.5, config.font.reuse_tolerance);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_file = temp_dir.path().join("font.yml");
        fs::write(&config_file, "descender: 100\n").unwrap();

        let mut args = Args::for_test(temp_dir.path(), vec![]);
        args.config = Some(config_file);
        let err = Config::new(args).unwrap_err();
        assert!(matches!(err, Error::FontIrError(..)), "{err:?}");
    }

    #[test]
    fn init_writes_config() {
        let temp_dir = tempdir().unwrap();
        let config = Config::new(Args::for_test(temp_dir.path(), vec![])).unwrap();
        config.init().unwrap();

        let yml = fs::read_to_string(config.file()).unwrap();
        assert_eq!(config, serde_yaml::from_str::<Config>(&yml).unwrap());
    }
}
