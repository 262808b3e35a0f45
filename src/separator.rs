//! Detection of invisible line-breaking characters in cell text.
//!
//! Spreadsheet cells pasted from web pages or word processors often carry
//! U+2028/U+2029 or vertical tabs that look like ordinary line breaks but
//! break downstream CSV and JSON consumers. [`scan`] finds and marks them,
//! [`clean`] rewrites them to plain `\n`.

use crate::table::CellValue;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The characters the scanner flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeparatorKind {
    /// U+2028
    #[serde(rename = "LS")]
    LineSeparator,
    /// U+2029
    #[serde(rename = "PS")]
    ParagraphSeparator,
    /// U+000B
    #[serde(rename = "VT")]
    VerticalTab,
}

impl SeparatorKind {
    pub fn classify(ch: char) -> Option<Self> {
        match ch {
            '\u{2028}' => Some(SeparatorKind::LineSeparator),
            '\u{2029}' => Some(SeparatorKind::ParagraphSeparator),
            '\u{000B}' => Some(SeparatorKind::VerticalTab),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            SeparatorKind::LineSeparator => '\u{2028}',
            SeparatorKind::ParagraphSeparator => '\u{2029}',
            SeparatorKind::VerticalTab => '\u{000B}',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SeparatorKind::LineSeparator => "LS",
            SeparatorKind::ParagraphSeparator => "PS",
            SeparatorKind::VerticalTab => "VT",
        }
    }

    pub fn all() -> [SeparatorKind; 3] {
        [
            SeparatorKind::LineSeparator,
            SeparatorKind::ParagraphSeparator,
            SeparatorKind::VerticalTab,
        ]
    }

    /// The inline marker spliced into annotated text in place of the character.
    pub fn marker(self) -> String {
        format!(
            "<span class=\"separator-marker\" title=\"{0}\">[{0}]</span>",
            self.label()
        )
    }
}

impl fmt::Display for SeparatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A flagged character. `position` counts Unicode scalar values from the
/// start of the original text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    #[serde(rename = "char")]
    pub ch: char,
    pub position: usize,
    pub kind: SeparatorKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub found: bool,
    pub annotated: String,
    pub occurrences: Vec<Occurrence>,
}

/// Scan `text` for LS, PS and VT characters.
///
/// # Examples
/// ```
/// use sheetdesk::separator::{scan, SeparatorKind};
///
/// let result = scan("ab\u{2028}cd");
/// assert!(result.found);
/// assert_eq!(result.occurrences[0].position, 2);
/// assert_eq!(result.occurrences[0].kind, SeparatorKind::LineSeparator);
/// ```
pub fn scan(text: &str) -> ScanResult {
    let mut occurrences = Vec::new();
    let mut byte_offsets = Vec::new();

    for (position, (offset, ch)) in text.char_indices().enumerate() {
        if let Some(kind) = SeparatorKind::classify(ch) {
            occurrences.push(Occurrence { ch, position, kind });
            byte_offsets.push(offset);
        }
    }

    if occurrences.is_empty() {
        return ScanResult {
            found: false,
            annotated: text.to_string(),
            occurrences,
        };
    }

    info!(
        "invalid separators found in {:?}: {:?}",
        preview(text, 50),
        occurrences
            .iter()
            .map(|o| (o.kind.label(), o.position))
            .collect::<Vec<_>>()
    );

    // Splice from the back so earlier byte offsets stay valid.
    let mut annotated = text.to_string();
    for (occurrence, &offset) in occurrences.iter().zip(&byte_offsets).rev() {
        let end = offset + occurrence.ch.len_utf8();
        annotated.replace_range(offset..end, &occurrence.kind.marker());
    }

    ScanResult {
        found: true,
        annotated,
        occurrences,
    }
}

/// Scan a cell of any type. Only text can carry separators; any other value
/// comes back unflagged in its display form.
pub fn scan_cell(value: &CellValue) -> ScanResult {
    match value {
        CellValue::Text(text) => scan(text),
        other => ScanResult {
            found: false,
            annotated: other.to_string(),
            occurrences: Vec::new(),
        },
    }
}

/// Undo the marker insertion performed by [`scan`].
pub fn strip_markers(annotated: &str) -> String {
    let mut restored = annotated.to_string();
    for kind in SeparatorKind::all() {
        restored = restored.replace(&kind.marker(), &kind.as_char().to_string());
    }
    restored
}

/// Replace LS/PS with `\n` and normalize CRLF and lone CR to `\n`.
///
/// Vertical tabs are left alone. Applying `clean` twice gives the same result
/// as applying it once.
pub fn clean(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\u{2028}' | '\u{2029}' => cleaned.push('\n'),
            '\r' => {
                // LS/PS become '\n' first, so "\r\u{2028}" is also a CRLF pair.
                if matches!(chars.peek(), Some('\n' | '\u{2028}' | '\u{2029}')) {
                    chars.next();
                }
                cleaned.push('\n');
            }
            _ => cleaned.push(ch),
        }
    }

    cleaned
}

/// Dump every character with its code point, e.g. `a(U+0061) b(U+0062)`.
pub fn debug_text(text: &str) -> String {
    text.chars()
        .map(|ch| format!("{}(U+{:04X})", ch, ch as u32))
        .collect::<Vec<_>>()
        .join(" ")
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut preview: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_line_separator_at_code_point_offset() {
        let result = scan("ab\u{2028}cd");
        assert!(result.found);
        assert_eq!(
            result.occurrences,
            vec![Occurrence {
                ch: '\u{2028}',
                position: 2,
                kind: SeparatorKind::LineSeparator
            }]
        );
        assert_eq!(
            result.annotated,
            format!("ab{}cd", SeparatorKind::LineSeparator.marker())
        );
    }

    #[test]
    fn positions_count_scalars_not_utf16_units() {
        // U+1F600 is a surrogate pair in UTF-16 but one scalar here.
        let result = scan("\u{1F600}\u{2029}x\u{000B}");
        let positions: Vec<_> = result.occurrences.iter().map(|o| o.position).collect();
        assert_eq!(positions, vec![1, 3]);
        assert_eq!(result.occurrences[1].kind, SeparatorKind::VerticalTab);
    }

    #[test]
    fn clean_text_is_returned_unchanged() {
        let result = scan("plain\nline");
        assert!(!result.found);
        assert_eq!(result.annotated, "plain\nline");
        assert!(result.occurrences.is_empty());
    }

    #[test]
    fn non_text_cells_are_not_flagged() {
        let result = scan_cell(&CellValue::Number(42.0));
        assert!(!result.found);
        assert_eq!(result.annotated, "42");
        assert!(result.occurrences.is_empty());
    }

    #[test]
    fn strip_markers_restores_original() {
        let original = "a\u{2028}b\u{2029}\u{2029}c\u{000B}한글";
        let result = scan(original);
        assert_eq!(result.occurrences.len(), 4);
        assert_eq!(strip_markers(&result.annotated), original);
    }

    #[test]
    fn clean_normalizes_line_endings() {
        assert_eq!(clean("a\u{2028}b\u{2029}c"), "a\nb\nc");
        assert_eq!(clean("a\r\nb\rc\n"), "a\nb\nc\n");
        assert_eq!(clean("\r\r\n"), "\n\n");
        assert_eq!(clean("\r\u{2029}\n"), "\n\n");
        assert_eq!(clean("keep\u{000B}vt"), "keep\u{000B}vt");
    }

    #[test]
    fn clean_is_idempotent() {
        for text in ["", "\r\n\r", "x\u{2028}\r\ny", "\r\u{2029}\n", "plain"] {
            let once = clean(text);
            assert_eq!(clean(&once), once, "clean not idempotent for {:?}", text);
        }
    }

    #[test]
    fn debug_text_lists_code_points() {
        assert_eq!(debug_text("a\u{2028}"), "a(U+0061) \u{2028}(U+2028)");
    }

    #[test]
    fn kinds_serialize_as_labels() {
        let json = serde_json::to_string(&SeparatorKind::ParagraphSeparator).unwrap();
        assert_eq!(json, "\"PS\"");
    }
}
