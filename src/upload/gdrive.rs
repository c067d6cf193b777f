//! Implements uploads to Google Drive using [Gdrive].

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{UploadError, UploadTool};
use crate::config::EffectiveConfig;
use crate::environment::EnvironmentError;

const GDRIVE_BINARY: &str = "gdrive";

/// Interaction with the [`gdrive`](https://github.com/gdrive-org/gdrive) command.
#[derive(Debug, Clone)]
pub struct Gdrive {
    /// Path to the `gdrive` binary.
    binary: PathBuf,
    /// Profile directory holding the login of `gdrive`.
    config: PathBuf,
}

impl Gdrive {
    /// Create a new [Gdrive] using the binary inside `binary_dir`.
    ///
    /// Both the binary and the profile directory `config_dir` have to exist.
    pub fn new(binary_dir: &Path, config_dir: &Path) -> Result<Self, EnvironmentError> {
        let binary = binary_dir.join(GDRIVE_BINARY);
        if !binary.is_file() {
            return Err(EnvironmentError::MissingGdriveBinary(binary));
        }

        if !config_dir.is_dir() {
            return Err(EnvironmentError::MissingGdriveProfile {
                binary,
                config: config_dir.to_path_buf(),
            });
        }

        Ok(Self {
            binary,
            config: config_dir.to_path_buf(),
        })
    }

    pub fn with_config(config: &EffectiveConfig) -> Result<Self, EnvironmentError> {
        Self::new(&config.gdrive_binary_path, &config.gdrive_config_path)
    }

    /// Path to the `gdrive` binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, path: &Path, folder: Option<&str>) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("-c").arg(&self.config).arg("upload");

        if let Some(folder) = folder {
            command.arg("-p").arg(folder);
        }

        command.arg(path);
        command
    }
}

impl UploadTool for Gdrive {
    fn upload(&self, path: &Path, folder: Option<&str>) -> Result<i32, UploadError> {
        log::info!(target: "upload::gdrive", "Upload {} to Google Drive", path.display());
        if let Some(folder) = folder {
            log::debug!(target: "upload::gdrive", "Upload into folder {folder}");
        }

        let status = self
            .command(path, folder)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| UploadError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        let code = status
            .code()
            .ok_or_else(|| UploadError::Terminated(self.binary.clone()))?;
        if code == 0 {
            log::info!(target: "upload::gdrive", "Finished upload of {}", path.display());
        } else {
            log::error!(target: "upload::gdrive", "Upload of {} failed with exit code {code}", path.display());
        }

        Ok(code)
    }
}
