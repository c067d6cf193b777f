//! Resolution of the [EffectiveConfig] of a run.
//!
//! Settings are layered: built-in defaults are overridden by the
//! [ConfigFile] which in turn is overridden by [ConfigOverrides] given on the
//! command line. The result is resolved once and passed to every component.
//!
//! The config file is read as INI, section and key names are case
//! insensitive. Files ending in `.toml` are read as TOML instead.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};
use ini::{Ini, ParseOption};

use crate::compress::{CompressError, CompressionMode};

const DEFAULT_TMP_PATH: &str = "tmp";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;
const DEFAULT_USERNAME: &str = "username";
const DEFAULT_PASSWORD: &str = "password";
const DEFAULT_DUMP_BINARY: &str = "mysqldump";
const DEFAULT_GDRIVE_BINARY_PATH: &str = "bin";
const DEFAULT_GDRIVE_CONFIG_PATH: &str = ".gdrive";

/// On-disk configuration file.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// General application settings.
    pub app: AppSection,
    /// Connection to the MySQL server.
    pub mysql: MysqlSection,
    /// Settings of the `gdrive` upload tool.
    pub gdrive: GdriveSection,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSection {
    /// Directory for credential files and dumps.
    pub tmp_path: PathBuf,
    /// Compression applied to the dumps.
    pub compress: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            tmp_path: DEFAULT_TMP_PATH.into(),
            compress: CompressionMode::default().to_string(),
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MysqlSection {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Databases dumped if none are given on the command line.
    pub databases: Vec<String>,
    /// Program used to dump a database.
    pub dump_binary: PathBuf,
}

impl Default for MysqlSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            databases: Vec::new(),
            dump_binary: DEFAULT_DUMP_BINARY.into(),
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GdriveSection {
    /// Directory containing the `gdrive` binary.
    pub binary_path: PathBuf,
    /// Profile directory of `gdrive` holding its login.
    pub config_path: PathBuf,
    /// Id of the Google Drive folder to upload into.
    pub parent_directory: Option<String>,
}

impl Default for GdriveSection {
    fn default() -> Self {
        Self {
            binary_path: DEFAULT_GDRIVE_BINARY_PATH.into(),
            config_path: DEFAULT_GDRIVE_CONFIG_PATH.into(),
            parent_directory: None,
        }
    }
}

/// Settings given on the command line which take precedence over the [ConfigFile].
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Databases to dump. Replaces the list of the config file if not empty.
    pub databases: Vec<String>,
    /// Compression mode, not yet validated.
    pub compress: Option<String>,
}

/// Connection parameters of the MySQL server.
#[derive(Clone, PartialEq, Eq)]
pub struct Connection {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Fully resolved settings of a run.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub connection: Connection,
    /// Databases to dump in the given order. Never empty.
    pub databases: Vec<String>,
    pub compression: CompressionMode,
    pub tmp_path: PathBuf,
    pub dump_binary: PathBuf,
    pub gdrive_binary_path: PathBuf,
    pub gdrive_config_path: PathBuf,
    pub parent_directory: Option<String>,
}

#[derive(Debug, Display, Error, From)]
/// Errors on resolving the [EffectiveConfig].
pub enum ConfigError {
    /// The config file exists but can't be read.
    #[display("Reading the config file {} failed: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    /// The TOML config file isn't valid.
    #[display("Parsing the config file {} failed: {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The INI config file isn't valid.
    #[display("Parsing the config file {} failed: {source}", path.display())]
    Ini {
        path: PathBuf,
        source: ini::ParseError,
    },
    /// A key of the INI config file is unknown.
    #[display("Unknown key in config file {}: {key}", path.display())]
    UnknownKey { path: PathBuf, key: String },
    /// A value of the INI config file can't be parsed.
    #[display("Invalid value for {key} in config file {}: {value}", path.display())]
    InvalidValue {
        path: PathBuf,
        key: String,
        value: String,
    },
    /// The compression mode is not one of none, gz, bz2 or zip.
    #[display("Invalid compression mode: {_0}")]
    #[from]
    Compression(CompressError),
    /// Neither the command line nor the config file name a database.
    #[display("No database to dump given")]
    NoDatabases,
    /// A database name is empty.
    #[display("Database names must not be empty")]
    EmptyDatabaseName,
}

impl ConfigFile {
    /// Reads the config file at `path`.
    ///
    /// A missing file results in the built-in defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(target: "config", "Config file {} doesn't exist, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        log::debug!(target: "config", "Read config file {}", path.display());
        if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })
        } else {
            Self::from_ini(path, &content)
        }
    }

    /// Parses the INI `content` of the config file at `path`.
    ///
    /// Besides `databases` the key `database` is accepted. Both hold a list
    /// of database names separated by commas or whitespace.
    fn from_ini(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let options = ParseOption {
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(content, options).map_err(|source| ConfigError::Ini {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::default();
        for (section, properties) in ini.iter() {
            let section = section.unwrap_or_default().to_ascii_lowercase();
            for (key, value) in properties.iter() {
                let key = format!("{section}.{}", key.to_ascii_lowercase());
                let value = value.trim();
                config.set(path, &key, value)?;
            }
        }

        Ok(config)
    }

    fn set(&mut self, path: &Path, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "app.tmp_path" => self.app.tmp_path = value.into(),
            "app.compress" => self.app.compress = value.to_string(),
            "mysql.host" => self.mysql.host = value.to_string(),
            "mysql.port" => {
                self.mysql.port = value.parse().map_err(|_| ConfigError::InvalidValue {
                    path: path.to_path_buf(),
                    key: key.to_string(),
                    value: value.to_string(),
                })?
            }
            "mysql.username" => self.mysql.username = value.to_string(),
            "mysql.password" => self.mysql.password = value.to_string(),
            "mysql.database" | "mysql.databases" => {
                self.mysql.databases = value
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|db| !db.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            "mysql.dump_binary" => self.mysql.dump_binary = value.into(),
            "gdrive.binary_path" => self.gdrive.binary_path = value.into(),
            "gdrive.config_path" => self.gdrive.config_path = value.into(),
            "gdrive.parent_directory" => self.gdrive.parent_directory = Some(value.to_string()),
            _ => {
                return Err(ConfigError::UnknownKey {
                    path: path.to_path_buf(),
                    key: key.to_string(),
                })
            }
        }

        Ok(())
    }
}

impl EffectiveConfig {
    /// Loads the config file at `config_path` and applies the `overrides`.
    pub fn resolve(config_path: &Path, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let file = ConfigFile::load(config_path)?;
        let base_dir = config_path.parent().unwrap_or(Path::new(""));
        Self::from_layers(file, base_dir, overrides)
    }

    /// Merges an already loaded [ConfigFile] with the `overrides`.
    ///
    /// Relative paths of the file are taken relative to `base_dir`.
    pub fn from_layers(
        file: ConfigFile,
        base_dir: &Path,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let ConfigFile { app, mysql, gdrive } = file;

        let compress = overrides.compress.unwrap_or(app.compress);
        let compression: CompressionMode = compress.parse()?;

        let databases = if overrides.databases.is_empty() {
            mysql.databases
        } else {
            overrides.databases
        };
        let databases: Vec<String> = databases
            .into_iter()
            .map(|db| db.trim().to_string())
            .collect();
        if databases.is_empty() {
            return Err(ConfigError::NoDatabases);
        }
        if databases.iter().any(String::is_empty) {
            return Err(ConfigError::EmptyDatabaseName);
        }

        let parent_directory = gdrive
            .parent_directory
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let config = Self {
            connection: Connection {
                host: mysql.host,
                port: mysql.port,
                username: mysql.username,
                password: mysql.password,
            },
            databases,
            compression,
            tmp_path: base_dir.join(app.tmp_path),
            dump_binary: resolve_program(base_dir, mysql.dump_binary),
            gdrive_binary_path: base_dir.join(gdrive.binary_path),
            gdrive_config_path: base_dir.join(gdrive.config_path),
            parent_directory,
        };
        log::trace!(target: "config", "Resolved config: {config:?}");

        Ok(config)
    }
}

/// Bare program names are looked up in `PATH`, everything else is a path.
fn resolve_program(base_dir: &Path, program: PathBuf) -> PathBuf {
    if program.components().count() <= 1 && program.is_relative() {
        program
    } else {
        base_dir.join(program)
    }
}
