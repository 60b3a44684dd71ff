use crate::types::Rejection;
use std::io;
use thiserror::Error;

/// Failures of the resolve/extract/select pipeline for a single program.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Unsupported archive format for asset '{asset}'")]
    UnsupportedArchiveFormat { asset: String },

    #[error("Attempted path traversal in archive member '{member}'")]
    PathTraversal { member: String },

    #[error("No suitable binary found in release {tag} ({} asset(s) rejected)", rejected.len())]
    NoCompatibleAsset { tag: String, rejected: Vec<Rejection> },

    #[error("Could not find binary '{program}' in extracted files")]
    NoBinaryFound { program: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to walk extracted files: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
