//! Dumping of databases into local files.
//!
//! Currently the following [DumpTool]s are implemented:
//!
//! - [Mysqldump]: Logical dump of a MySQL or MariaDB database using `mysqldump`.

pub mod credentials;
pub mod mysqldump;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use derive_more::{Display, Error};

pub use credentials::CredentialFile;
pub use mysqldump::Mysqldump;

use crate::config::Connection;

/// Generic dump backend.
pub trait DumpTool {
    /// Dumps `database` into a new local file and returns its path.
    ///
    /// On error no file of the dump is left behind.
    fn dump(&self, connection: &Connection, database: &str) -> Result<PathBuf, DumpError>;
}

#[derive(Debug, Display, Error)]
/// Errors on dumping a single database.
pub enum DumpError {
    /// Staging the credentials file failed.
    #[display("Writing the credentials file failed: {_0}")]
    Credentials(io::Error),
    /// The dump file can't be created or written.
    #[display("Writing dump file {} failed: {source}", path.display())]
    Output { path: PathBuf, source: io::Error },
    /// The dump program can't be started.
    #[display("Running {} failed: {source}", program.display())]
    Spawn { program: PathBuf, source: io::Error },
    /// The dump program exited unsuccessfully.
    #[display("Dump of database {database} failed: {status}")]
    Failed { database: String, status: ExitStatus },
}

impl DumpError {
    pub(crate) fn output(path: &Path) -> impl FnOnce(io::Error) -> DumpError + '_ {
        move |source| DumpError::Output {
            path: path.to_path_buf(),
            source,
        }
    }
}
