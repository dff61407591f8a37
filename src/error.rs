use crate::anchor::Diagnosis;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single patch run.
///
/// Every variant aborts the run. Only [`PatchError::Write`] can leave the
/// target in an unknown state; all other variants are raised before anything
/// is written.
#[derive(Error, Debug)]
pub enum PatchError {
    /// Target is missing, unreadable or not valid UTF-8.
    #[error("cannot read {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scan finished without a match. The file was not touched.
    #[error("could not find insertion point in {path}")]
    AnchorNotFound { path: PathBuf, diagnosis: Diagnosis },

    /// The block has no content besides blank lines.
    #[error("nothing to insert into {path}: the block is empty")]
    EmptyBlock { path: PathBuf },

    /// Write-back failed after the splice was computed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target changed on disk between read and commit.
    #[error("{path} changed on disk while it was being patched; nothing was written")]
    ConcurrentModification { path: PathBuf },
}

impl PatchError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            PatchError::FileAccess { path, .. }
            | PatchError::AnchorNotFound { path, .. }
            | PatchError::EmptyBlock { path }
            | PatchError::Write { path, .. }
            | PatchError::ConcurrentModification { path } => path,
        }
    }

    /// True when the target file is guaranteed to be unchanged.
    pub fn left_file_untouched(&self) -> bool {
        !matches!(self, PatchError::Write { .. })
    }
}
