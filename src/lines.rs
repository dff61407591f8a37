//! Line-oriented view of a text file.
//!
//! Lines keep their terminators verbatim, so concatenating them reproduces the
//! file byte for byte.

use crate::error::PatchError;
use std::fs;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// Line terminator style of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }

    /// Detect the ending from the first terminated line. Defaults to LF.
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(pos) if text[..pos].ends_with('\r') => LineEnding::CrLf,
            _ => LineEnding::Lf,
        }
    }
}

/// Split text into lines, each keeping its terminator.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_owned).collect()
}

/// Line content without its `\n` or `\r\n` terminator.
pub fn line_body(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => line,
    }
}

pub fn is_terminated(line: &str) -> bool {
    line.ends_with('\n')
}

/// Replace the terminator of `line` (if any) with `ending`.
pub fn reterminate(line: &str, ending: LineEnding) -> String {
    if is_terminated(line) {
        format!("{}{}", line_body(line), ending.as_str())
    } else {
        line.to_owned()
    }
}

/// Read snapshot of a target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    lines: Vec<String>,
    line_ending: LineEnding,
    /// xxh3 of the bytes as read, used to detect changes before commit
    fingerprint: u64,
}

impl SourceFile {
    /// Read the whole file as UTF-8.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, PatchError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PatchError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(path, &text))
    }

    /// Build a snapshot from text already in memory.
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: split_lines(text),
            line_ending: LineEnding::detect(text),
            fingerprint: xxh3_64(text.as_bytes()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn text(&self) -> String {
        self.lines.concat()
    }

    /// Whether `bytes` still hash to what was read.
    pub fn is_unchanged(&self, bytes: &[u8]) -> bool {
        xxh3_64(bytes) == self.fingerprint
    }
}
