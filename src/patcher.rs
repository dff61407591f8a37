//! Anchor-based insertion: read, scan, splice, commit.
//!
//! A run moves through `read -> scanned -> {found -> spliced -> written}` or
//! `scanned -> not found`. A scan that finds nothing never reaches the write
//! step, and the containment pre-check short-circuits to "already applied"
//! before the anchor is even looked for.

use crate::anchor::AnchorPattern;
use crate::error::PatchError;
use crate::lines::{is_terminated, SourceFile};
use crate::splice::{insert, InsertionBlock};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the block goes relative to the anchor line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Before,
    #[default]
    After,
}

impl Placement {
    pub fn insertion_index(self, anchor: usize) -> usize {
        match self {
            Placement::Before => anchor,
            Placement::After => anchor + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Apply,
    /// Compute everything, write nothing.
    DryRun,
}

/// Inserts one block at the first position matching an anchor pattern.
#[derive(Debug, Clone)]
pub struct Patcher {
    pattern: AnchorPattern,
    block: InsertionBlock,
    placement: Placement,
    skip_if_present: bool,
}

/// Outcome of scanning a snapshot, before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Insert(Splice),
    /// The block's content already occurs in the file.
    AlreadyApplied { line: usize },
}

/// A computed insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    /// Zero-based index of the anchor line
    pub anchor: usize,
    /// Zero-based index the block starts at in `lines`
    pub index: usize,
    /// How many positions matched the pattern; the first one is used
    pub matches: usize,
    pub inserted: usize,
    pub lines: Vec<String>,
}

impl Splice {
    /// 1-based line number of the first inserted line.
    pub fn line_number(&self) -> usize {
        self.index + 1
    }

    pub fn text(&self) -> String {
        self.lines.concat()
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome tells whether anything was inserted"]
pub enum PatchOutcome {
    /// Block inserted (or would be, in a dry run).
    Inserted {
        file: PathBuf,
        /// 1-based line number of the first inserted line
        line: usize,
        inserted: usize,
        matches: usize,
        written: bool,
        change: Change,
    },
    AlreadyApplied {
        file: PathBuf,
        /// 1-based line where the existing block starts
        line: usize,
    },
}

/// File text before and after a splice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub before: String,
    pub after: String,
}

impl PatchOutcome {
    pub fn file(&self) -> &Path {
        match self {
            PatchOutcome::Inserted { file, .. } | PatchOutcome::AlreadyApplied { file, .. } => {
                file
            }
        }
    }
}

impl Patcher {
    /// Insert `block` after the first match of `pattern`, skipping files that
    /// already contain the block.
    pub fn new(pattern: AnchorPattern, block: InsertionBlock) -> Self {
        Self {
            pattern,
            block,
            placement: Placement::default(),
            skip_if_present: true,
        }
    }

    pub fn placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Disable (or re-enable) the already-applied containment check.
    pub fn skip_if_present(mut self, skip: bool) -> Self {
        self.skip_if_present = skip;
        self
    }

    pub fn pattern(&self) -> &AnchorPattern {
        &self.pattern
    }

    pub fn block(&self) -> &InsertionBlock {
        &self.block
    }

    pub fn locate_anchor(&self, lines: &[String]) -> Option<usize> {
        self.pattern.locate(lines)
    }

    /// Scan a snapshot and compute the patched lines. Pure: writes nothing.
    pub fn plan(&self, source: &SourceFile) -> Result<Plan, PatchError> {
        let lines = source.lines();

        if self.block.distinguishing_lines().is_empty() {
            return Err(PatchError::EmptyBlock {
                path: source.path().to_path_buf(),
            });
        }

        if self.skip_if_present {
            if let Some(at) = self.block.find_in(lines) {
                debug!(file = %source.path().display(), line = at + 1, "block already present");
                return Ok(Plan::AlreadyApplied { line: at + 1 });
            }
        }

        let matches = self.pattern.locate_all(lines);
        debug!(
            file = %source.path().display(),
            matches = matches.len(),
            "scanned for anchor"
        );
        let Some(&anchor) = matches.first() else {
            return Err(PatchError::AnchorNotFound {
                path: source.path().to_path_buf(),
                diagnosis: self.pattern.diagnose(lines),
            });
        };

        let index = self.placement.insertion_index(anchor);
        let block = self.block.with_line_ending(source.line_ending());

        // Inserting after an unterminated last line would fuse it with the block
        let spliced = match lines.last() {
            Some(last) if index == lines.len() && !is_terminated(last) => {
                let mut base = lines.to_vec();
                if let Some(last) = base.last_mut() {
                    last.push_str(source.line_ending().as_str());
                }
                insert(&base, index, block.lines())
            }
            _ => insert(lines, index, block.lines()),
        };
        debug!(anchor, index, inserted = block.len(), "spliced block");

        Ok(Plan::Insert(Splice {
            anchor,
            index,
            matches: matches.len(),
            inserted: block.len(),
            lines: spliced,
        }))
    }

    /// Read `path`, insert the block and, in [`RunMode::Apply`], write it back.
    pub fn run(&self, path: impl AsRef<Path>, mode: RunMode) -> Result<PatchOutcome, PatchError> {
        let path = path.as_ref();
        let source = SourceFile::read(path)?;
        debug!(file = %path.display(), lines = source.len(), "read target");

        match self.plan(&source)? {
            Plan::AlreadyApplied { line } => Ok(PatchOutcome::AlreadyApplied {
                file: path.to_path_buf(),
                line,
            }),
            Plan::Insert(splice) => {
                let after = splice.text();
                let written = mode == RunMode::Apply;
                if written {
                    commit(&source, &after)?;
                }
                Ok(PatchOutcome::Inserted {
                    file: path.to_path_buf(),
                    line: splice.line_number(),
                    inserted: splice.inserted,
                    matches: splice.matches,
                    written,
                    change: Change {
                        before: source.text(),
                        after,
                    },
                })
            }
        }
    }
}

/// Write `contents` over the file `source` was read from.
///
/// Refuses to write if the file changed since it was read. The write itself is
/// atomic (tempfile + fsync + rename) and keeps the original permissions;
/// symlinks are resolved so the link target is replaced, not the link.
pub fn commit(source: &SourceFile, contents: &str) -> Result<(), PatchError> {
    let path = source.path();
    let write_error = |err: std::io::Error| PatchError::Write {
        path: path.to_path_buf(),
        source: err,
    };

    let changed = || PatchError::ConcurrentModification {
        path: path.to_path_buf(),
    };

    // A target that vanished since the read was changed, not failed to write
    let recheck_error = |err: std::io::Error| match err.kind() {
        std::io::ErrorKind::NotFound => changed(),
        _ => write_error(err),
    };

    let target = fs::canonicalize(path).map_err(recheck_error)?;
    let current = fs::read(&target).map_err(recheck_error)?;
    if !source.is_unchanged(&current) {
        return Err(changed());
    }

    atomic_write(&target, contents.as_bytes()).map_err(write_error)?;
    debug!(file = %path.display(), bytes = contents.len(), "wrote target");
    Ok(())
}

fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)?.permissions();

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().set_permissions(permissions)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
