use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(version, about = "Dump MySQL databases to Google Drive", long_about = None)]
pub struct Cli {
    /// Names of the databases to dump. Defaults to the databases of the config file.
    pub databases: Vec<String>,

    /// Path to the config file.
    #[arg(long, env = "DB2DRIVE_CONFIG", default_value = "config.ini")]
    pub config: PathBuf,

    /// Compress resulting output: none, gz, bz2 or zip. Defaults to gz.
    #[arg(long, value_name = "FORMAT")]
    pub compress: Option<String>,

    /// Verbosity of the command output.
    #[arg(long)]
    pub verbose: Option<LevelFilter>,

    /// Only check the environment and show what would be dumped.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Settings of the command line taking precedence over the config file.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            databases: self.databases.clone(),
            compress: self.compress.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_arguments() {
        let cli = Cli::try_parse_from([
            "db2drive",
            "shop",
            "blog",
            "--config",
            "/etc/db2drive.ini",
            "--compress",
            "zip",
            "--verbose",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.databases, ["shop", "blog"]);
        assert_eq!(cli.config, PathBuf::from("/etc/db2drive.ini"));
        assert_eq!(cli.verbose, Some(LevelFilter::Debug));
        assert!(!cli.dry_run);

        let overrides = cli.overrides();
        assert_eq!(overrides.databases, ["shop", "blog"]);
        assert_eq!(overrides.compress.as_deref(), Some("zip"));
    }

    #[test]
    fn compression_is_validated_later() {
        // invalid modes reach the config resolution which exits with 1
        let cli = Cli::try_parse_from(["db2drive", "shop", "--compress", "rar"]).unwrap();

        assert_eq!(cli.compress.as_deref(), Some("rar"));
    }
}
