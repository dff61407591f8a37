//! Declarative anchor matching.
//!
//! An [`AnchorPattern`] is a list of `(offset, predicate)` conditions evaluated
//! against a window of lines around a candidate index. The candidate matches
//! when every condition holds. Scanning always starts at the top of the file
//! and the earliest match wins.

use crate::lines::line_body;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minimum similarity for a line to be reported as a near miss.
const NEAR_MISS_THRESHOLD: f64 = 0.6;

/// Test applied to a single line. Line terminators never take part in a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinePredicate {
    /// Line content equals the text exactly.
    Equals(String),
    /// Line content equals the text once surrounding whitespace is removed.
    EqualsTrimmed(String),
    Contains(String),
    StartsWith(String),
    /// Line is empty or whitespace only.
    Blank,
}

impl LinePredicate {
    pub fn test(&self, line: &str) -> bool {
        let body = line_body(line);
        match self {
            LinePredicate::Equals(text) => body == text,
            LinePredicate::EqualsTrimmed(text) => body.trim() == text.trim(),
            LinePredicate::Contains(text) => body.contains(text.as_str()),
            LinePredicate::StartsWith(text) => body.starts_with(text.as_str()),
            LinePredicate::Blank => body.trim().is_empty(),
        }
    }

    /// The literal text this predicate looks for, if any.
    pub fn literal(&self) -> Option<&str> {
        match self {
            LinePredicate::Equals(text)
            | LinePredicate::EqualsTrimmed(text)
            | LinePredicate::Contains(text)
            | LinePredicate::StartsWith(text) => Some(text),
            LinePredicate::Blank => None,
        }
    }
}

impl fmt::Display for LinePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinePredicate::Equals(text) => write!(f, "equals {text:?}"),
            LinePredicate::EqualsTrimmed(text) => write!(f, "equals (trimmed) {text:?}"),
            LinePredicate::Contains(text) => write!(f, "contains {text:?}"),
            LinePredicate::StartsWith(text) => write!(f, "starts with {text:?}"),
            LinePredicate::Blank => write!(f, "is blank"),
        }
    }
}

/// A predicate applied to the line at `index + offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCondition {
    pub offset: isize,
    pub predicate: LinePredicate,
}

impl LineCondition {
    pub fn new(offset: isize, predicate: LinePredicate) -> Self {
        Self { offset, predicate }
    }

    /// Evaluate against the window anchored at `index`.
    ///
    /// A condition pointing before the first or past the last line never holds.
    pub fn holds_at(&self, lines: &[String], index: usize) -> bool {
        index
            .checked_add_signed(self.offset)
            .and_then(|target| lines.get(target))
            .is_some_and(|line| self.predicate.test(line))
    }
}

impl fmt::Display for LineCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {:+} {}", self.offset, self.predicate)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionParseError {
    #[error("expected OFFSET:KIND[:TEXT], got {0:?}")]
    Malformed(String),
    #[error("invalid offset {0:?}")]
    InvalidOffset(String),
    #[error("unknown condition kind {0:?} (expected equals, trimmed, contains, starts-with or blank)")]
    UnknownKind(String),
    #[error("condition kind {0:?} requires TEXT")]
    MissingText(String),
    #[error("condition kind \"blank\" takes no TEXT")]
    UnexpectedText,
}

/// Parses `OFFSET:KIND[:TEXT]`, e.g. `0:trimmed:};` or `+2:contains:webhook`.
///
/// TEXT is everything after the second colon and may itself contain colons.
impl FromStr for LineCondition {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(offset), Some(kind)) = (parts.next(), parts.next()) else {
            return Err(ConditionParseError::Malformed(s.to_string()));
        };
        let text = parts.next();

        let offset: isize = offset
            .trim()
            .parse()
            .map_err(|_| ConditionParseError::InvalidOffset(offset.to_string()))?;

        let require_text = |kind: &str| match text {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(ConditionParseError::MissingText(kind.to_string())),
        };

        let predicate = match kind.trim() {
            // An empty line is a legitimate exact-match target
            "equals" => LinePredicate::Equals(
                text.ok_or_else(|| ConditionParseError::MissingText(kind.to_string()))?
                    .to_string(),
            ),
            "trimmed" => LinePredicate::EqualsTrimmed(require_text(kind)?),
            "contains" => LinePredicate::Contains(require_text(kind)?),
            "starts-with" => LinePredicate::StartsWith(require_text(kind)?),
            "blank" => {
                if text.is_some_and(|t| !t.is_empty()) {
                    return Err(ConditionParseError::UnexpectedText);
                }
                LinePredicate::Blank
            }
            other => return Err(ConditionParseError::UnknownKind(other.to_string())),
        };

        Ok(LineCondition::new(offset, predicate))
    }
}

/// Conjunction of line conditions identifying an anchor line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnchorPattern {
    conditions: Vec<LineCondition>,
}

impl AnchorPattern {
    pub fn new(conditions: Vec<LineCondition>) -> Self {
        Self { conditions }
    }

    /// Marker line (exact, terminator ignored) plus a substring `lookahead`
    /// lines further down.
    pub fn marker_with_lookahead(
        marker: impl Into<String>,
        lookahead: isize,
        needle: impl Into<String>,
    ) -> Self {
        Self::default()
            .with(0, LinePredicate::Equals(marker.into()))
            .with(lookahead, LinePredicate::Contains(needle.into()))
    }

    pub fn with(mut self, offset: isize, predicate: LinePredicate) -> Self {
        self.conditions.push(LineCondition::new(offset, predicate));
        self
    }

    pub fn conditions(&self) -> &[LineCondition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// An empty pattern matches nothing.
    pub fn matches_at(&self, lines: &[String], index: usize) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.holds_at(lines, index))
    }

    /// Earliest matching index.
    pub fn locate(&self, lines: &[String]) -> Option<usize> {
        (0..lines.len()).find(|&index| self.matches_at(lines, index))
    }

    /// Every matching index, in file order.
    pub fn locate_all(&self, lines: &[String]) -> Vec<usize> {
        (0..lines.len())
            .filter(|&index| self.matches_at(lines, index))
            .collect()
    }

    /// Explain why nothing matched.
    pub fn diagnose(&self, lines: &[String]) -> Diagnosis {
        let partial_hits = self
            .conditions
            .iter()
            .map(|condition| {
                let hits = (0..lines.len())
                    .filter(|&index| condition.holds_at(lines, index))
                    .count();
                (condition.clone(), hits)
            })
            .collect::<Vec<_>>();

        // Look for a near miss on the first literal condition that never held
        let closest = partial_hits
            .iter()
            .find(|(condition, hits)| *hits == 0 && condition.predicate.literal().is_some())
            .and_then(|(condition, _)| nearest_line(lines, condition));

        Diagnosis {
            partial_hits,
            closest,
        }
    }
}

fn nearest_line(lines: &[String], condition: &LineCondition) -> Option<NearMiss> {
    let literal = condition.predicate.literal()?.trim();
    let mut best: Option<NearMiss> = None;

    for (index, line) in lines.iter().enumerate() {
        let body = line_body(line).trim();
        if body.is_empty() {
            continue;
        }
        let similarity = strsim::normalized_levenshtein(literal, body);
        if similarity < NEAR_MISS_THRESHOLD {
            continue;
        }
        if best.as_ref().map_or(true, |b| similarity > b.similarity) {
            best = Some(NearMiss {
                condition: condition.clone(),
                line: index + 1,
                text: body.to_string(),
                similarity,
            });
        }
    }

    best
}

/// Why an anchor could not be found.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diagnosis {
    /// Each condition with the number of positions where it holds on its own.
    pub partial_hits: Vec<(LineCondition, usize)>,
    pub closest: Option<NearMiss>,
}

/// A line resembling a literal the pattern looks for.
#[derive(Debug, Clone, PartialEq)]
pub struct NearMiss {
    pub condition: LineCondition,
    /// 1-based line number
    pub line: usize,
    pub text: String,
    pub similarity: f64,
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.partial_hits.is_empty() {
            return write!(f, "anchor pattern has no conditions");
        }
        for (idx, (condition, hits)) in self.partial_hits.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            match hits {
                0 => write!(f, "{condition}: never holds")?,
                1 => write!(f, "{condition}: holds at 1 position")?,
                n => write!(f, "{condition}: holds at {n} positions")?,
            }
        }
        if let Some(near) = &self.closest {
            write!(
                f,
                "\nclosest line to {}: line {} {:?} ({:.0}% similar)",
                near.condition.predicate,
                near.line,
                near.text,
                near.similarity * 100.0
            )?;
        }
        Ok(())
    }
}
