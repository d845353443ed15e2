use std::fmt;
use std::sync::Arc;

use serde::Serialize;

// ────────────────────────────────────────────────────────────────────────────
// Display name
// ────────────────────────────────────────────────────────────────────────────

/// Used when the uploader leaves the name blank.
pub const DEFAULT_DISPLAY_NAME: &str = "我的挚爱";

/// The name printed on a receipt. Never empty once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    /// Trims the submitted name; empty or whitespace-only input falls back to `fallback`.
    pub fn resolve(raw: Option<&str>, fallback: &str) -> Self {
        match raw.map(str::trim) {
            Some(name) if !name.is_empty() => Self(name.to_string()),
            _ => Self(fallback.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lines
// ────────────────────────────────────────────────────────────────────────────

/// Category of a receipt line. Drives both the content pool and the client's styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineKind {
    System,
    Ingredient,
    Analysis,
    Divider,
    Item,
    Price,
    Total,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptLine {
    pub id: String,
    pub kind: LineKind,
    pub text: String,
    /// Cumulative offset from sequence start at which the line becomes visible.
    pub offset_ms: u64,
}

/// An immutable, ordered receipt script. Clones share the same backing slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLineSequence {
    lines: Arc<[ReceiptLine]>,
}

impl ReceiptLineSequence {
    pub fn new(lines: Vec<ReceiptLine>) -> Self {
        debug_assert!(
            lines.windows(2).all(|w| w[0].offset_ms <= w[1].offset_ms),
            "line offsets must be non-decreasing"
        );
        Self {
            lines: lines.into(),
        }
    }

    pub fn lines(&self) -> &[ReceiptLine] {
        &self.lines
    }

    pub fn get(&self, index: usize) -> Option<&ReceiptLine> {
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn kinds(&self) -> Vec<LineKind> {
        self.lines.iter().map(|l| l.kind).collect()
    }
}
