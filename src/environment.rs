//! Checks of the local environment a run depends on.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

/// Where the `gdrive` binary can be obtained from.
pub const GDRIVE_DOWNLOAD_URL: &str = "https://github.com/gdrive-org/gdrive#downloads";

#[derive(Debug, Display, Error)]
/// The environment doesn't allow to perform a run.
pub enum EnvironmentError {
    /// The temp path exists but isn't a directory.
    #[display("{} exists but is not a directory", _0.display())]
    TmpPathNotADirectory(#[error(ignore)] PathBuf),
    /// The temp directory can't be created.
    #[display("Creating temp directory {} failed: {source}", path.display())]
    TmpDirCreation { path: PathBuf, source: io::Error },
    /// The `gdrive` binary doesn't exist.
    #[display(
        "{} is not found, please download it from {GDRIVE_DOWNLOAD_URL}",
        _0.display()
    )]
    MissingGdriveBinary(#[error(ignore)] PathBuf),
    /// The `gdrive` profile directory doesn't exist.
    #[display(
        "{} does not exist. To create it and login, please run:\n\n\t\t{} -c {} about",
        config.display(),
        binary.display(),
        config.display()
    )]
    MissingGdriveProfile { binary: PathBuf, config: PathBuf },
}

/// Checks that nothing but a directory occupies the temp path, without creating it.
pub fn check_tmp_dir(path: &Path) -> Result<(), EnvironmentError> {
    if path.exists() && !path.is_dir() {
        return Err(EnvironmentError::TmpPathNotADirectory(path.to_path_buf()));
    }

    Ok(())
}

/// Creates the temp directory at `path` unless it already exists.
pub fn ensure_tmp_dir(path: &Path) -> Result<(), EnvironmentError> {
    check_tmp_dir(path)?;

    fs::create_dir_all(path).map_err(|source| EnvironmentError::TmpDirCreation {
        path: path.to_path_buf(),
        source,
    })?;
    log::trace!(target: "environment", "Temp directory ready: {}", path.display());

    Ok(())
}
