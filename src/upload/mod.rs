//! Upload of dump artifacts to remote storage.
//!
//! Currently the following [UploadTool]s are implemented:
//!
//! - [Gdrive]: Upload to Google Drive using the `gdrive` command line tool.

pub mod gdrive;

use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

pub use gdrive::Gdrive;

/// Generic upload backend.
pub trait UploadTool {
    /// Uploads the file at `path`, optionally into the remote `folder`.
    ///
    /// Returns the exit code of the upload, `0` on success.
    /// A non-zero exit code isn't an error of the [UploadTool] itself.
    fn upload(&self, path: &Path, folder: Option<&str>) -> Result<i32, UploadError>;
}

#[derive(Debug, Display, Error)]
/// The upload couldn't be performed at all.
pub enum UploadError {
    /// The upload program can't be started.
    #[display("Running {} failed: {source}", program.display())]
    Spawn { program: PathBuf, source: io::Error },
    /// The upload program was terminated without an exit code.
    #[display("{} was terminated by a signal", _0.display())]
    Terminated(#[error(ignore)] PathBuf),
}
