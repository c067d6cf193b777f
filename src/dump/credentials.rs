//! Short-lived option file passing credentials to the dump program.
//!
//! Passwords given as command line arguments are visible to every process on
//! the host, therefore they are handed over in a [CredentialFile] instead.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Option file in the `[client]` format understood by `mysqldump`.
///
/// The file is only accessible by its owner and removed when the
/// [CredentialFile] is dropped.
#[derive(Debug)]
pub struct CredentialFile {
    file: NamedTempFile,
}

impl CredentialFile {
    /// Writes `username` and `password` to a new file in `dir`.
    ///
    /// The file name starts with `prefix` followed by a random part.
    pub fn create_in(dir: &Path, prefix: &str, username: &str, password: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".cnf")
            .tempfile_in(dir)?;

        write!(
            file,
            "[client]\nuser=\"{}\"\npassword=\"{}\"\n",
            escape(username),
            escape(password)
        )?;
        file.as_file().sync_all()?;
        log::trace!(target: "dump::credentials", "Staged credentials at {}", file.path().display());

        Ok(Self { file })
    }

    /// Path of the option file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Removes the option file.
    pub fn remove(self) -> io::Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        log::trace!(target: "dump::credentials", "Removed credentials {}", path.display());

        Ok(())
    }
}

/// Escapes a value for a double quoted option file entry.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}
