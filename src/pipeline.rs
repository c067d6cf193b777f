//! Sequential dump, compression and upload of all configured databases.

use std::fs;
use std::path::Path;

use derive_more::{Display, Error, From};

use crate::compress::compress_file;
use crate::config::EffectiveConfig;
use crate::dump::DumpTool;
use crate::environment::{ensure_tmp_dir, EnvironmentError};
use crate::upload::{UploadError, UploadTool};

/// Exit code of a run in which a database couldn't be dumped.
pub const DUMP_FAILED_EXIT_CODE: u8 = 1;

/// Final state of a single database of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseOutcome {
    /// Dumped and uploaded.
    Done,
    /// The dump failed, the database was skipped.
    DumpFailed,
    /// Compressing the dump failed, the database was skipped.
    CompressFailed,
    /// The upload tool exited with the contained non-zero exit code.
    UploadFailed(i32),
}

/// Outcomes of every database processed in a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<(String, DatabaseOutcome)>,
}

impl RunReport {
    /// Exit code of the process.
    ///
    /// A failed upload ends the run and its exit code is passed on.
    /// Otherwise a skipped database results in [DUMP_FAILED_EXIT_CODE].
    pub fn exit_code(&self) -> u8 {
        let upload_failure = self.outcomes.iter().find_map(|(_, outcome)| match outcome {
            DatabaseOutcome::UploadFailed(code) => Some(*code),
            _ => None,
        });
        if let Some(code) = upload_failure {
            return u8::try_from(code).ok().filter(|&c| c != 0).unwrap_or(1);
        }

        let skipped = self
            .outcomes
            .iter()
            .any(|(_, outcome)| outcome != &DatabaseOutcome::Done);
        if skipped {
            DUMP_FAILED_EXIT_CODE
        } else {
            0
        }
    }
}

#[derive(Debug, Display, Error, From)]
/// Errors aborting a run.
pub enum PipelineError {
    #[display("{_0}")]
    Environment(EnvironmentError),
    #[display("{_0}")]
    Upload(UploadError),
}

/// Runs the [DumpTool] and [UploadTool] for every database of the [EffectiveConfig].
pub struct Pipeline<'a, D, U> {
    config: &'a EffectiveConfig,
    dumper: D,
    uploader: U,
}

impl<'a, D: DumpTool, U: UploadTool> Pipeline<'a, D, U> {
    pub fn new(config: &'a EffectiveConfig, dumper: D, uploader: U) -> Self {
        Self {
            config,
            dumper,
            uploader,
        }
    }

    /// Processes the databases one after another.
    ///
    /// Databases that fail to dump are skipped. A failed upload stops the run.
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        ensure_tmp_dir(&self.config.tmp_path)?;

        let mut report = RunReport::default();
        for database in &self.config.databases {
            let outcome = self.process(database)?;
            report.outcomes.push((database.clone(), outcome));

            if let DatabaseOutcome::UploadFailed(_) = outcome {
                log::error!(target: "pipeline", "Stopping after failed upload of {database}");
                break;
            }
        }

        Ok(report)
    }

    fn process(&self, database: &str) -> Result<DatabaseOutcome, UploadError> {
        let dump = match self.dumper.dump(&self.config.connection, database) {
            Ok(dump) => dump,
            Err(e) => {
                log::error!(target: "pipeline", "Skipping database {database}: {e}");
                return Ok(DatabaseOutcome::DumpFailed);
            }
        };

        let artifact = match compress_file(&dump, self.config.compression) {
            Ok(artifact) => artifact,
            Err(e) => {
                log::error!(target: "pipeline", "Skipping database {database}: {e}");
                remove_artifact(&dump);
                return Ok(DatabaseOutcome::CompressFailed);
            }
        };

        let upload = self
            .uploader
            .upload(&artifact, self.config.parent_directory.as_deref());
        remove_artifact(&artifact);

        match upload? {
            0 => {
                log::info!(target: "pipeline", "Backup of database {database} finished");
                Ok(DatabaseOutcome::Done)
            }
            code => Ok(DatabaseOutcome::UploadFailed(code)),
        }
    }
}

fn remove_artifact(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!(target: "pipeline", "Removed {}", path.display()),
        Err(e) => log::warn!(target: "pipeline", "Removing {} failed: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::io;
    use std::path::PathBuf;

    use super::*;
    use crate::compress::CompressionMode;
    use crate::config::Connection;
    use crate::dump::DumpError;

    struct FakeDumper {
        dir: PathBuf,
        failing: HashSet<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeDumper {
        fn new(dir: &Path, failing: &[&'static str]) -> Self {
            Self {
                dir: dir.to_path_buf(),
                failing: failing.iter().copied().collect(),
                calls: RefCell::default(),
            }
        }
    }

    impl DumpTool for FakeDumper {
        fn dump(&self, _connection: &Connection, database: &str) -> Result<PathBuf, DumpError> {
            self.calls.borrow_mut().push(database.to_string());
            if self.failing.contains(database) {
                return Err(DumpError::Spawn {
                    program: "mysqldump".into(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                });
            }

            let path = self.dir.join(format!("{database}_tmp.sql"));
            fs::write(&path, format!("-- dump of {database}\n")).unwrap();
            Ok(path)
        }
    }

    struct Upload {
        path: PathBuf,
        folder: Option<String>,
        existed: bool,
    }

    struct FakeUploader {
        code: i32,
        uploads: RefCell<Vec<Upload>>,
    }

    impl FakeUploader {
        fn exiting_with(code: i32) -> Self {
            Self {
                code,
                uploads: RefCell::default(),
            }
        }
    }

    impl UploadTool for FakeUploader {
        fn upload(&self, path: &Path, folder: Option<&str>) -> Result<i32, UploadError> {
            self.uploads.borrow_mut().push(Upload {
                path: path.to_path_buf(),
                folder: folder.map(str::to_string),
                existed: path.is_file(),
            });
            Ok(self.code)
        }
    }

    fn config(tmp_path: &Path, databases: &[&str], compression: CompressionMode) -> EffectiveConfig {
        EffectiveConfig {
            connection: Connection {
                host: "localhost".to_string(),
                port: 3306,
                username: "backup".to_string(),
                password: "s3cret".to_string(),
            },
            databases: databases.iter().map(|db| db.to_string()).collect(),
            compression,
            tmp_path: tmp_path.to_path_buf(),
            dump_binary: "mysqldump".into(),
            gdrive_binary_path: "bin".into(),
            gdrive_config_path: ".gdrive".into(),
            parent_directory: Some("0B1a2b3c".to_string()),
        }
    }

    fn is_empty_dir(dir: &Path) -> bool {
        fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn compressed_dumps_are_uploaded_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &["shop", "blog"], CompressionMode::Gz);
        let dumper = FakeDumper::new(dir.path(), &[]);
        let uploader = FakeUploader::exiting_with(0);

        let pipeline = Pipeline::new(&config, dumper, uploader);
        let report = pipeline.run().unwrap();

        assert_eq!(report.exit_code(), 0);
        let uploads = pipeline.uploader.uploads.borrow();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].path, dir.path().join("shop_tmp.sql.gz"));
        assert_eq!(uploads[1].path, dir.path().join("blog_tmp.sql.gz"));
        assert!(uploads.iter().all(|upload| upload.existed));
        assert!(uploads
            .iter()
            .all(|upload| upload.folder.as_deref() == Some("0B1a2b3c")));
        assert!(is_empty_dir(dir.path()));
    }

    #[test]
    fn failed_dump_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &["a", "b"], CompressionMode::None);
        let dumper = FakeDumper::new(dir.path(), &["a"]);
        let uploader = FakeUploader::exiting_with(0);

        let pipeline = Pipeline::new(&config, dumper, uploader);
        let report = pipeline.run().unwrap();

        assert_eq!(*pipeline.dumper.calls.borrow(), ["a", "b"]);
        let uploads = pipeline.uploader.uploads.borrow();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].path, dir.path().join("b_tmp.sql"));
        assert_eq!(
            report.outcomes,
            [
                ("a".to_string(), DatabaseOutcome::DumpFailed),
                ("b".to_string(), DatabaseOutcome::Done)
            ]
        );
        assert_eq!(report.exit_code(), DUMP_FAILED_EXIT_CODE);
        assert!(is_empty_dir(dir.path()));
    }

    #[test]
    fn failed_compression_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &["a", "b"], CompressionMode::Gz);
        let blocker = dir.path().join("a_tmp.sql.gz");
        fs::write(&blocker, b"not ours").unwrap();

        let pipeline = Pipeline::new(
            &config,
            FakeDumper::new(dir.path(), &[]),
            FakeUploader::exiting_with(0),
        );
        let report = pipeline.run().unwrap();

        assert_eq!(
            report.outcomes,
            [
                ("a".to_string(), DatabaseOutcome::CompressFailed),
                ("b".to_string(), DatabaseOutcome::Done)
            ]
        );
        assert_eq!(report.exit_code(), 1);
        let uploads = pipeline.uploader.uploads.borrow();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].path, dir.path().join("b_tmp.sql.gz"));
        assert!(!dir.path().join("a_tmp.sql").exists());
        assert_eq!(fs::read(&blocker).unwrap(), b"not ours");
    }

    #[test]
    fn upload_exit_code_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &["a", "b"], CompressionMode::Bz2);
        let dumper = FakeDumper::new(dir.path(), &[]);
        let uploader = FakeUploader::exiting_with(3);

        let pipeline = Pipeline::new(&config, dumper, uploader);
        let report = pipeline.run().unwrap();

        assert_eq!(report.exit_code(), 3);
        assert_eq!(report.outcomes, [("a".to_string(), DatabaseOutcome::UploadFailed(3))]);
        assert_eq!(*pipeline.dumper.calls.borrow(), ["a"]);
        assert!(is_empty_dir(dir.path()));
    }

    #[test]
    fn tmp_path_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tmp_path = dir.path().join("tmp");
        fs::write(&tmp_path, b"").unwrap();
        let config = config(&tmp_path, &["a"], CompressionMode::Gz);

        let pipeline = Pipeline::new(
            &config,
            FakeDumper::new(dir.path(), &[]),
            FakeUploader::exiting_with(0),
        );
        let err = pipeline.run().unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Environment(EnvironmentError::TmpPathNotADirectory(_))
        ));
        assert!(pipeline.dumper.calls.borrow().is_empty());
    }

    #[test]
    fn exit_codes() {
        let report = |outcomes: &[DatabaseOutcome]| RunReport {
            outcomes: outcomes
                .iter()
                .map(|outcome| ("db".to_string(), *outcome))
                .collect(),
        };

        assert_eq!(report(&[DatabaseOutcome::Done]).exit_code(), 0);
        assert_eq!(
            report(&[DatabaseOutcome::CompressFailed, DatabaseOutcome::Done]).exit_code(),
            1
        );
        assert_eq!(
            report(&[DatabaseOutcome::DumpFailed, DatabaseOutcome::UploadFailed(7)]).exit_code(),
            7
        );
        assert_eq!(report(&[DatabaseOutcome::UploadFailed(-1)]).exit_code(), 1);
        assert_eq!(report(&[DatabaseOutcome::UploadFailed(256)]).exit_code(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn works_with_real_dump_program() {
        use crate::dump::Mysqldump;

        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("tmp"), &["shop"], CompressionMode::Zip);

        // `true` accepts any arguments and writes an empty dump
        let pipeline = Pipeline::new(
            &config,
            Mysqldump::new("true", &config.tmp_path),
            FakeUploader::exiting_with(0),
        );
        let report = pipeline.run().unwrap();

        assert_eq!(report.exit_code(), 0);
        let uploads = pipeline.uploader.uploads.borrow();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].existed);
        assert_eq!(uploads[0].path.extension().unwrap(), "zip");
        assert!(is_empty_dir(&config.tmp_path));
    }
}
