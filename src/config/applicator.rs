//! Patch applicator - runs every patch of a config against a workspace
//!
//! Patches run in file order. The first failing patch stops the run; patches
//! after it are not attempted.

use crate::anchor::AnchorPattern;
use crate::config::schema::{PatchConfig, PatchDefinition};
use crate::error::PatchError;
use crate::patcher::{PatchOutcome, Patcher, RunMode};
use crate::splice::InsertionBlock;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Errors during patch application
#[derive(Debug)]
pub enum ApplicationError {
    /// The patch itself failed (read, anchor, write)
    Patch(PatchError),
    /// Block file referenced by `insert.path` could not be read
    InsertSource {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Definition could not be turned into a patcher
    Invalid { reason: String },
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Patch(e) => write!(f, "{}", e),
            ApplicationError::InsertSource { path, source } => {
                write!(f, "cannot read block file {}: {}", path.display(), source)
            }
            ApplicationError::Invalid { reason } => write!(f, "invalid patch: {}", reason),
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Patch(e) => Some(e),
            ApplicationError::InsertSource { source, .. } => Some(source),
            ApplicationError::Invalid { .. } => None,
        }
    }
}

impl From<PatchError> for ApplicationError {
    fn from(e: PatchError) -> Self {
        ApplicationError::Patch(e)
    }
}

/// Apply a patch configuration to a workspace
///
/// Relative `file` entries are resolved against `workspace_root`. Returns one
/// result per attempted patch; the last entry is the failure if one occurred.
pub fn apply_patches(
    config: &PatchConfig,
    workspace_root: &Path,
    mode: RunMode,
) -> Vec<(String, Result<PatchOutcome, ApplicationError>)> {
    run_patches(config, workspace_root, mode, true)
}

/// Evaluate every patch without touching the workspace.
///
/// Unlike [`apply_patches`] a failure does not stop the evaluation.
/// `Inserted` results carry `written: false` and mean "would insert".
pub fn check_patches(
    config: &PatchConfig,
    workspace_root: &Path,
) -> Vec<(String, Result<PatchOutcome, ApplicationError>)> {
    run_patches(config, workspace_root, RunMode::DryRun, false)
}

fn run_patches(
    config: &PatchConfig,
    workspace_root: &Path,
    mode: RunMode,
    stop_on_failure: bool,
) -> Vec<(String, Result<PatchOutcome, ApplicationError>)> {
    let mut results = Vec::with_capacity(config.patches.len());

    for patch in &config.patches {
        let result = apply_patch(patch, config.base_dir.as_deref(), workspace_root, mode);
        let failed = result.is_err();
        results.push((patch.id.clone(), result));
        if failed && stop_on_failure {
            debug!(patch = %patch.id, "stopping after failed patch");
            break;
        }
    }

    results
}

fn apply_patch(
    patch: &PatchDefinition,
    base_dir: Option<&Path>,
    workspace_root: &Path,
    mode: RunMode,
) -> Result<PatchOutcome, ApplicationError> {
    let patcher = build_patcher(patch, base_dir)?;
    let target = resolve_target(workspace_root, &patch.file);
    debug!(patch = %patch.id, file = %target.display(), ?mode, "applying patch");
    Ok(patcher.run(&target, mode)?)
}

/// Turn a definition into a [`Patcher`], loading the block from disk if needed.
pub fn build_patcher(
    patch: &PatchDefinition,
    base_dir: Option<&Path>,
) -> Result<Patcher, ApplicationError> {
    let pattern: AnchorPattern = patch
        .anchor_pattern()
        .map_err(|reason| ApplicationError::Invalid { reason })?;

    let text = match (&patch.insert.text, &patch.insert.path) {
        (Some(text), None) => text.clone(),
        (None, Some(path)) => {
            let path = match base_dir {
                Some(base) if path.is_relative() => base.join(path),
                _ => path.clone(),
            };
            fs::read_to_string(&path)
                .map_err(|source| ApplicationError::InsertSource { path, source })?
        }
        _ => {
            return Err(ApplicationError::Invalid {
                reason: "exactly one of insert.text or insert.path is required".to_string(),
            })
        }
    };

    Ok(Patcher::new(pattern, InsertionBlock::from_text(&text))
        .placement(patch.placement)
        .skip_if_present(patch.skip_if_present))
}

fn resolve_target(workspace_root: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}
