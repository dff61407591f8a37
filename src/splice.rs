//! Pure line splicing.

use crate::lines::{line_body, reterminate, split_lines, LineEnding};

/// Return `lines[..index] + block + lines[index..]` without touching `lines`.
///
/// # Panics
///
/// Panics if `index > lines.len()`.
pub fn insert(lines: &[String], index: usize, block: &[String]) -> Vec<String> {
    assert!(
        index <= lines.len(),
        "insertion index {index} out of bounds for {} lines",
        lines.len()
    );
    let mut out = Vec::with_capacity(lines.len() + block.len());
    out.extend_from_slice(&lines[..index]);
    out.extend_from_slice(block);
    out.extend_from_slice(&lines[index..]);
    out
}

/// Literal payload inserted at the anchor. No placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InsertionBlock {
    lines: Vec<String>,
}

impl InsertionBlock {
    /// Use the lines exactly as given.
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Split text into lines. A missing final newline is added so the block
    /// never fuses with the line that follows it.
    pub fn from_text(text: &str) -> Self {
        let mut lines = split_lines(text);
        if let Some(last) = lines.last_mut() {
            if !last.ends_with('\n') {
                last.push('\n');
            }
        }
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Copy of the block with every terminated line ending in `ending`.
    pub fn with_line_ending(&self, ending: LineEnding) -> Self {
        Self {
            lines: self
                .lines
                .iter()
                .map(|line| reterminate(line, ending))
                .collect(),
        }
    }

    /// The block minus leading and trailing blank lines.
    ///
    /// Padding blank lines are common in generated blocks and say nothing
    /// about whether the block is already present.
    pub fn distinguishing_lines(&self) -> &[String] {
        let is_content = |line: &String| !line_body(line).trim().is_empty();
        let Some(start) = self.lines.iter().position(is_content) else {
            return &[];
        };
        // position() found a content line, so rposition() does too
        let end = self.lines.iter().rposition(is_content).unwrap_or(start);
        &self.lines[start..=end]
    }

    /// Index of the first place where the distinguishing lines already occur
    /// as a contiguous run. Terminators are ignored in the comparison.
    pub fn find_in(&self, lines: &[String]) -> Option<usize> {
        let needle = self.distinguishing_lines();
        if needle.is_empty() || needle.len() > lines.len() {
            return None;
        }
        lines.windows(needle.len()).position(|window| {
            window
                .iter()
                .zip(needle)
                .all(|(have, want)| line_body(have) == line_body(want))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_scenario() {
        let lines = owned(&["a\n", "};\n", "x\n", "marker TARGET\n", "b\n"]);
        let out = insert(&lines, 2, &owned(&["NEW\n"]));
        assert_eq!(
            out,
            owned(&["a\n", "};\n", "NEW\n", "x\n", "marker TARGET\n", "b\n"])
        );
        // Input untouched
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_insert_at_bounds() {
        let lines = owned(&["a\n", "b\n"]);
        let block = owned(&["X\n"]);
        assert_eq!(insert(&lines, 0, &block), owned(&["X\n", "a\n", "b\n"]));
        assert_eq!(insert(&lines, 2, &block), owned(&["a\n", "b\n", "X\n"]));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_insert_past_end_panics() {
        let _ = insert(&owned(&["a\n"]), 2, &owned(&["X\n"]));
    }

    #[test]
    fn test_from_text_adds_final_newline() {
        let block = InsertionBlock::from_text("one\ntwo");
        assert_eq!(block.lines(), owned(&["one\n", "two\n"]).as_slice());

        let block = InsertionBlock::from_text("one\n");
        assert_eq!(block.lines(), owned(&["one\n"]).as_slice());

        assert!(InsertionBlock::from_text("").is_empty());
    }

    #[test]
    fn test_with_line_ending() {
        let block = InsertionBlock::from_text("one\ntwo\n").with_line_ending(LineEnding::CrLf);
        assert_eq!(block.lines(), owned(&["one\r\n", "two\r\n"]).as_slice());
    }

    #[test]
    fn test_distinguishing_lines_strip_padding() {
        let block = InsertionBlock::from_text("\n  \nfn x() {}\n\nfn y() {}\n\n");
        assert_eq!(
            block.distinguishing_lines(),
            owned(&["fn x() {}\n", "\n", "fn y() {}\n"]).as_slice()
        );

        let blank = InsertionBlock::from_text("\n\n");
        assert!(blank.distinguishing_lines().is_empty());
    }

    #[test]
    fn test_find_in() {
        let block = InsertionBlock::from_text("\nexport const a = 1;\nexport const b = 2;\n\n");
        let file = owned(&[
            "x\n",
            "export const a = 1;\r\n",
            "export const b = 2;\r\n",
            "y\n",
        ]);
        assert_eq!(block.find_in(&file), Some(1));

        let partial = owned(&["export const a = 1;\n", "y\n"]);
        assert_eq!(block.find_in(&partial), None);
    }

    #[test]
    fn test_find_in_blank_block_never_matches() {
        let block = InsertionBlock::from_text("\n");
        assert_eq!(block.find_in(&owned(&["\n", "\n"])), None);
    }
}
