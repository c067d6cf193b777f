//! Compression of dump artifacts.
//!
//! A dump is compressed into a sibling file carrying the extension of the
//! [CompressionMode]. The uncompressed input is only removed once the
//! compressed file has been completely written.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use derive_more::{Display, Error, From};
use flate2::write::GzEncoder;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Formats a dump can be compressed into.
#[derive(Copy, Clone, Debug, Default, Display, PartialEq, Eq)]
pub enum CompressionMode {
    /// Keep the plain SQL dump.
    #[display("none")]
    None,
    /// gzip compressed dump (`.gz`).
    #[default]
    #[display("gz")]
    Gz,
    /// bzip2 compressed dump (`.bz2`).
    #[display("bz2")]
    Bz2,
    /// Zip archive containing the dump as its single entry (`.zip`).
    #[display("zip")]
    Zip,
}

impl CompressionMode {
    /// All supported modes, in the order they are listed to the user.
    pub const ALL: [CompressionMode; 4] = [Self::None, Self::Gz, Self::Bz2, Self::Zip];

    /// File extension appended to the compressed file.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gz => Some("gz"),
            Self::Bz2 => Some("bz2"),
            Self::Zip => Some("zip"),
        }
    }
}

impl FromStr for CompressionMode {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "gz" => Ok(Self::Gz),
            "bz2" => Ok(Self::Bz2),
            "zip" => Ok(Self::Zip),
            _ => Err(CompressError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Display, Error, From)]
/// Errors on compression of a dump artifact.
pub enum CompressError {
    /// The requested compression format is not known.
    #[display("Unsupported compression format: {_0}")]
    UnsupportedFormat(#[error(ignore)] String),
    /// Reading the input or writing the compressed file failed.
    #[display("Compressing the dump failed: {_0}")]
    #[from]
    Io(io::Error),
    /// Writing the zip archive failed.
    #[display("Writing the zip archive failed: {_0}")]
    #[from]
    Zip(zip::result::ZipError),
}

/// Compresses `input` according to `mode` and returns the path of the result.
///
/// For [CompressionMode::None] the input path is returned untouched.
/// Otherwise the input is removed after the compressed file was written.
/// On failure the partially written output is removed and the input is kept.
pub fn compress_file(input: &Path, mode: CompressionMode) -> Result<PathBuf, CompressError> {
    let Some(extension) = mode.extension() else {
        log::debug!(target: "compress", "No compression requested for {}", input.display());
        return Ok(input.to_path_buf());
    };

    let output = with_extension_appended(input, extension);
    log::debug!(target: "compress", "Compress {} to {}", input.display(), output.display());

    let out_file = File::create_new(&output)?;
    if let Err(e) = write_compressed(input, out_file, mode) {
        if let Err(rm) = fs::remove_file(&output) {
            log::warn!(target: "compress", "Removing partial {} failed: {rm}", output.display());
        }
        return Err(e);
    }

    replace_input(input, output)
}

/// Removes the uncompressed `input` now that `output` holds its content.
///
/// If `input` can't be removed, `output` is removed instead so only one of
/// both remains.
fn replace_input(input: &Path, output: PathBuf) -> Result<PathBuf, CompressError> {
    if let Err(e) = fs::remove_file(input) {
        if let Err(rm) = fs::remove_file(&output) {
            log::warn!(target: "compress", "Removing {} failed: {rm}", output.display());
        }
        return Err(e.into());
    }
    log::trace!(target: "compress", "Removed uncompressed {}", input.display());

    Ok(output)
}

fn with_extension_appended(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    name.into()
}

fn write_compressed(input: &Path, out_file: File, mode: CompressionMode) -> Result<(), CompressError> {
    let mut reader = BufReader::new(File::open(input)?);

    let out_file = match mode {
        CompressionMode::None => {
            let mut writer = BufWriter::new(out_file);
            io::copy(&mut reader, &mut writer)?;
            writer
        }
        CompressionMode::Gz => {
            let mut encoder = GzEncoder::new(BufWriter::new(out_file), flate2::Compression::default());
            io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?
        }
        CompressionMode::Bz2 => {
            let mut encoder =
                bzip2::write::BzEncoder::new(BufWriter::new(out_file), bzip2::Compression::default());
            io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?
        }
        CompressionMode::Zip => {
            let entry_name = input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "dump.sql".to_string());

            let mut archive = ZipWriter::new(BufWriter::new(out_file));
            let options = SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .large_file(true);
            archive.start_file(entry_name, options)?;
            io::copy(&mut reader, &mut archive)?;
            archive.finish()?
        }
    };

    let out_file = out_file.into_inner().map_err(io::IntoInnerError::into_error)?;
    out_file.sync_all()?;

    Ok(())
}
