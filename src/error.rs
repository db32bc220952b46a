//! Typed error hierarchy for the conversion pipeline.
//!
//! Library-internal plumbing (I/O, image decode, zip, epub) is wrapped with
//! `anyhow::Context` close to the call site; at the `Archive`/operation
//! boundary those are folded into one of the variants below so callers never
//! have to match on a third-party error type.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecbzError {
    #[error("{0}: invalid path")]
    InvalidPath(PathBuf),

    #[error("{0}: not a valid zip archive")]
    InvalidArchive(PathBuf),

    #[error("{path}: archive has {entries} entries, smaller than samples * 2 ({needed})")]
    ArchiveTooSmall {
        path: PathBuf,
        entries: usize,
        needed: usize,
    },

    #[error("{0}: can't open file as image")]
    PageIOError(PathBuf),

    #[error("{0}: invalid or unrecognized image format")]
    InvalidImageFormat(PathBuf),

    #[error("{path}: repack aborted, {bad_files} page(s) failed to convert")]
    AbortedRepack { path: PathBuf, bad_files: usize },

    #[error("{path}: compare aborted, codec analysis failed")]
    AbortedCompare { path: PathBuf },

    #[error("interrupted by user")]
    WorkerPoolInterrupt,

    #[error("'{0}': invalid format name")]
    InvalidFormatName(String),

    #[error("'{0}': invalid device profile")]
    InvalidProfile(String),

    #[error("{0} output is not implemented")]
    NotImplemented(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RecbzError>;
