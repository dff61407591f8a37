use crate::anchor::{AnchorPattern, LineCondition, LinePredicate};
use crate::patcher::Placement;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
    /// Directory of the file this config was loaded from; `insert.path` is
    /// resolved against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.patches.is_empty() {
            issues.push(ValidationIssue::EmptyPatchList);
        }

        for patch in &self.patches {
            let patch_id = (!patch.id.trim().is_empty()).then(|| patch.id.clone());

            if patch_id.is_none() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: None,
                    field: "id",
                });
            }
            if patch.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: patch_id.clone(),
                    field: "file",
                });
            }

            if patch.anchor.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: patch_id.clone(),
                    field: "anchor",
                });
            }
            for (idx, condition) in patch.anchor.iter().enumerate() {
                if let Err(message) = condition.to_condition() {
                    issues.push(ValidationIssue::InvalidCombo {
                        patch_id: patch_id.clone(),
                        message: format!("anchor[{idx}]: {message}"),
                    });
                }
            }

            match (&patch.insert.text, &patch.insert.path) {
                (Some(_), Some(_)) => issues.push(ValidationIssue::InvalidCombo {
                    patch_id: patch_id.clone(),
                    message: "insert.text and insert.path cannot both be set".to_string(),
                }),
                (None, None) => issues.push(ValidationIssue::MissingField {
                    patch_id: patch_id.clone(),
                    field: "insert.text",
                }),
                (Some(text), None) if text.trim().is_empty() => {
                    issues.push(ValidationIssue::MissingField {
                        patch_id: patch_id.clone(),
                        field: "insert.text",
                    })
                }
                _ => {}
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatchDefinition {
    pub id: String,
    pub file: String,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default = "default_skip_if_present")]
    pub skip_if_present: bool,
    #[serde(default)]
    pub anchor: Vec<AnchorEntry>,
    #[serde(default)]
    pub insert: InsertEntry,
}

fn default_skip_if_present() -> bool {
    true
}

impl PatchDefinition {
    /// Build the anchor pattern. Only valid after [`PatchConfig::validate`].
    pub fn anchor_pattern(&self) -> Result<AnchorPattern, String> {
        self.anchor
            .iter()
            .map(AnchorEntry::to_condition)
            .collect::<Result<Vec<_>, _>>()
            .map(AnchorPattern::new)
    }
}

/// One `[[patches.anchor]]` entry: an offset and exactly one predicate.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct AnchorEntry {
    #[serde(default)]
    pub offset: isize,
    #[serde(default)]
    pub equals: Option<String>,
    #[serde(default)]
    pub equals_trimmed: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub starts_with: Option<String>,
    #[serde(default)]
    pub blank: bool,
}

impl AnchorEntry {
    pub fn to_condition(&self) -> Result<LineCondition, String> {
        let mut predicates = Vec::new();
        if let Some(text) = &self.equals {
            predicates.push(LinePredicate::Equals(text.clone()));
        }
        if let Some(text) = &self.equals_trimmed {
            predicates.push(LinePredicate::EqualsTrimmed(text.clone()));
        }
        if let Some(text) = &self.contains {
            if text.is_empty() {
                return Err("contains must not be empty".to_string());
            }
            predicates.push(LinePredicate::Contains(text.clone()));
        }
        if let Some(text) = &self.starts_with {
            if text.is_empty() {
                return Err("starts_with must not be empty".to_string());
            }
            predicates.push(LinePredicate::StartsWith(text.clone()));
        }
        if self.blank {
            predicates.push(LinePredicate::Blank);
        }

        match predicates.len() {
            0 => Err("condition needs one of equals, equals_trimmed, contains, starts_with, blank"
                .to_string()),
            1 => Ok(LineCondition::new(self.offset, predicates.remove(0))),
            _ => Err("only one predicate is allowed per condition".to_string()),
        }
    }
}

/// `[patches.insert]`: the block, inline or from a file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct InsertEntry {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPatchList,
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        patch_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatchList => write!(f, "patch config contains no patches"),
            ValidationIssue::MissingField { patch_id, field } => match patch_id {
                Some(id) => write!(f, "patch '{id}' missing required field '{field}'"),
                None => write!(f, "patch missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { patch_id, message } => match patch_id {
                Some(id) => write!(f, "patch '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid patch configuration: {message}"),
            },
        }
    }
}
