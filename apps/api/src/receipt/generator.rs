//! Line Generator — assembles the timed receipt script for one playback session.
//!
//! Flow: shuffle SYSTEM → take 2 | shuffle INGREDIENT → take 4 | pick ANALYSIS →
//!       DIVIDER → ITEM (signer) → PRICE → TOTAL.
//!
//! Randomness goes through `RandomSource` so tests can script the choices.

use std::time::Duration;

use crate::receipt::content::ContentLibrary;
use crate::receipt::line::{DisplayName, LineKind, ReceiptLine, ReceiptLineSequence};

/// Placeholder replaced by the display name.
pub const YOU_TWO_TOKEN: &str = "你们";
/// Placeholder replaced by `属于 {name} 的`.
pub const BELONGS_TO_TOKEN: &str = "属于";

const DIVIDER_TEXT: &str = "--------------------------";

/// Pauses after the closing lines, replacing the print-speed interval.
const DIVIDER_GAP_MS: u64 = 400;
const ITEM_GAP_MS: u64 = 600;
const PRICE_GAP_MS: u64 = 400;
const TOTAL_GAP_MS: u64 = 800;

const OPENING_LINES: usize = 2;
const INGREDIENT_LINES: usize = 4;

// ────────────────────────────────────────────────────────────────────────────
// Randomness
// ────────────────────────────────────────────────────────────────────────────

/// A uniform index source. Implemented for every `rand::Rng`.
pub trait RandomSource {
    /// Returns an index in `0..upper`. `upper` is always non-zero.
    fn index(&mut self, upper: usize) -> usize;
}

impl<R: rand::Rng + ?Sized> RandomSource for R {
    fn index(&mut self, upper: usize) -> usize {
        self.gen_range(0..upper)
    }
}

/// Fisher–Yates shuffle into a new vector; the input is left untouched.
pub fn shuffle<T: Clone, S: RandomSource + ?Sized>(items: &[T], rng: &mut S) -> Vec<T> {
    let mut result = items.to_vec();
    for i in (1..result.len()).rev() {
        let j = rng.index(i + 1);
        result.swap(i, j);
    }
    result
}

fn pick<'a, S: RandomSource + ?Sized>(pool: &'a [String], rng: &mut S) -> &'a str {
    &pool[rng.index(pool.len())]
}

// ────────────────────────────────────────────────────────────────────────────
// Placeholder substitution
// ────────────────────────────────────────────────────────────────────────────

/// Replaces both placeholders in a single left-to-right pass.
///
/// Text inserted for one placeholder is never scanned again, so a name that
/// itself contains a placeholder token is printed verbatim.
pub fn inject_name(template: &str, name: &DisplayName) -> String {
    let mut out = String::with_capacity(template.len() + 2 * name.as_str().len());
    let mut rest = template;

    loop {
        let you_two = rest.find(YOU_TWO_TOKEN);
        let belongs_to = rest.find(BELONGS_TO_TOKEN);

        let (pos, token) = match (you_two, belongs_to) {
            (None, None) => break,
            (Some(a), Some(b)) if b < a => (b, BELONGS_TO_TOKEN),
            (Some(a), _) => (a, YOU_TWO_TOKEN),
            (None, Some(b)) => (b, BELONGS_TO_TOKEN),
        };

        out.push_str(&rest[..pos]);
        if token == YOU_TWO_TOKEN {
            out.push_str(name.as_str());
        } else {
            out.push_str(&format!("{BELONGS_TO_TOKEN} {name} 的"));
        }
        rest = &rest[pos + token.len()..];
    }

    out.push_str(rest);
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Generation
// ────────────────────────────────────────────────────────────────────────────

/// Accumulates lines and their cumulative offsets.
struct Timeline {
    lines: Vec<ReceiptLine>,
    offset_ms: u64,
}

impl Timeline {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Vec::with_capacity(capacity),
            offset_ms: 0,
        }
    }

    /// Places a line at the current offset, then advances by `gap_ms`.
    fn push(&mut self, id: impl Into<String>, kind: LineKind, text: String, gap_ms: u64) {
        self.lines.push(ReceiptLine {
            id: id.into(),
            kind,
            text,
            offset_ms: self.offset_ms,
        });
        self.offset_ms = self.offset_ms.saturating_add(gap_ms);
    }

    fn finish(self) -> ReceiptLineSequence {
        ReceiptLineSequence::new(self.lines)
    }
}

/// Builds the 11-line receipt for `name`.
///
/// The library guarantees at least two SYSTEM and four INGREDIENT entries, so
/// this never fails.
pub fn generate_lines<S: RandomSource + ?Sized>(
    name: &DisplayName,
    library: &ContentLibrary,
    print_speed: Duration,
    rng: &mut S,
) -> ReceiptLineSequence {
    let speed_ms = u64::try_from(print_speed.as_millis()).unwrap_or(u64::MAX);
    let mut timeline = Timeline::with_capacity(OPENING_LINES + INGREDIENT_LINES + 5);

    let system = shuffle(library.system(), rng);
    for (i, template) in system.iter().take(OPENING_LINES).enumerate() {
        timeline.push(
            format!("sys{}", i + 1),
            LineKind::System,
            inject_name(template, name),
            speed_ms,
        );
    }

    let ingredients = shuffle(library.ingredient(), rng);
    for (i, text) in ingredients.iter().take(INGREDIENT_LINES).enumerate() {
        timeline.push(format!("ing{i}"), LineKind::Ingredient, text.clone(), speed_ms);
    }

    let analysis = pick(library.analysis(), rng);
    timeline.push("ana1", LineKind::Analysis, inject_name(analysis, name), speed_ms);

    timeline.push(
        "div1",
        LineKind::Divider,
        DIVIDER_TEXT.to_string(),
        DIVIDER_GAP_MS,
    );
    timeline.push("item1", LineKind::Item, format!("签署人: {name}"), ITEM_GAP_MS);

    let price = pick(library.price(), rng);
    timeline.push("price1", LineKind::Price, format!("价值: {price}"), PRICE_GAP_MS);

    let total = pick(library.total(), rng);
    timeline.push("total1", LineKind::Total, format!("有效期: {total}"), TOTAL_GAP_MS);

    timeline.finish()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
