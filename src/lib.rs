//! Library to dump MySQL databases and upload them to [Google Drive][gdrive].
//!
//! A run is configured by an [`EffectiveConfig`](config::EffectiveConfig) and
//! executed by the [`Pipeline`](pipeline::Pipeline): every database is dumped
//! by a [`DumpTool`](dump::DumpTool), compressed and handed to an
//! [`UploadTool`](upload::UploadTool).
//!
//! [gdrive]: https://github.com/gdrive-org/gdrive

#![forbid(unsafe_code)]

pub mod cli;
pub mod compress;
pub mod config;
pub mod dump;
pub mod environment;
pub mod pipeline;
pub mod upload;
