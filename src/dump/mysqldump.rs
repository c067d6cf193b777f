//! Implements database dumps using [Mysqldump].

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;

use super::{CredentialFile, DumpError, DumpTool};
use crate::config::{Connection, EffectiveConfig};

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("regex should be valid"));

/// Dumps databases with `mysqldump` into a temp directory.
#[derive(Debug, Clone)]
pub struct Mysqldump {
    program: PathBuf,
    tmp_dir: PathBuf,
}

impl Mysqldump {
    /// Create a new [Mysqldump] running `program` and writing into `tmp_dir`.
    pub fn new(program: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            tmp_dir: tmp_dir.into(),
        }
    }

    pub fn with_config(config: &EffectiveConfig) -> Self {
        Self::new(&config.dump_binary, &config.tmp_path)
    }

    /// Stem shared by the dump and its credentials, unique per database and run.
    fn generate_file_stem(database: &str) -> String {
        let timestamp = Local::now().format("%Y-%m-%dT%H-%M-%S%.3f");
        let database = UNSAFE_FILENAME_CHARS.replace_all(database, "_");

        format!("{database}_{timestamp}")
    }

    fn command(&self, connection: &Connection, credentials: &Path, database: &str) -> Command {
        // must be the first option
        let mut defaults_file = OsString::from("--defaults-extra-file=");
        defaults_file.push(credentials);

        let mut command = Command::new(&self.program);
        command
            .arg(defaults_file)
            .arg(format!("--host={}", connection.host))
            .arg(format!("--port={}", connection.port))
            .arg("--single-transaction")
            .arg(database);

        command
    }
}

impl DumpTool for Mysqldump {
    fn dump(&self, connection: &Connection, database: &str) -> Result<PathBuf, DumpError> {
        log::info!(target: "dump::mysqldump", "Create dump of database: {database}");

        let stem = Self::generate_file_stem(database);
        let dump_path = self.tmp_dir.join(format!("{stem}.sql"));
        log::debug!(target: "dump::mysqldump", "Save dump of {database} at: {}", dump_path.display());

        let dump_file = File::create_new(&dump_path).map_err(DumpError::output(&dump_path))?;

        let credentials = match CredentialFile::create_in(
            &self.tmp_dir,
            &format!(".{stem}_"),
            &connection.username,
            &connection.password,
        ) {
            Ok(credentials) => credentials,
            Err(e) => {
                discard(&dump_path);
                return Err(DumpError::Credentials(e));
            }
        };

        let status = self
            .command(connection, credentials.path(), database)
            .stdin(Stdio::null())
            .stdout(dump_file)
            .status();
        // the credentials must not outlive the dump process
        if let Err(e) = credentials.remove() {
            log::error!(target: "dump::mysqldump", "Removing credentials failed: {e}");
        }

        let status = match status {
            Ok(status) => status,
            Err(source) => {
                discard(&dump_path);
                return Err(DumpError::Spawn {
                    program: self.program.clone(),
                    source,
                });
            }
        };

        if !status.success() {
            discard(&dump_path);
            return Err(DumpError::Failed {
                database: database.to_string(),
                status,
            });
        }

        log::info!(target: "dump::mysqldump", "Finished dump of database: {database}");
        Ok(dump_path)
    }
}

fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!(target: "dump::mysqldump", "Discarded partial dump {}", path.display()),
        Err(e) => log::warn!(target: "dump::mysqldump", "Removing partial dump {} failed: {e}", path.display()),
    }
}
