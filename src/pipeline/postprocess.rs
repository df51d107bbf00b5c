//! Post-processing: deterministic cleanup of LLM-generated summaries.
//!
//! Models asked for "only the heading and points" still sometimes wrap the
//! answer in a code fence, open with "Here is the refined summary:", or
//! leave Windows line endings and zero-width characters behind. These rules
//! remove such artefacts without touching the content.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw response; meta-text is dropped after whitespace cleanup so
//! leading blank lines do not hide it.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to a raw service response.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 1
/// 5. Drop leading meta-text lines ("Here is the summary:", "Rewritten summary")
/// 6. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 7. Trim surrounding whitespace
pub fn clean_summary(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = drop_meta_preamble(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Drop meta-text preamble ──────────────────────────────────────────

static RE_META_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(here\s+is|here's|below\s+is|sure[,!]|certainly[,!]|rewritten\s+summary|refined\s+summary|improved\s+(version|summary))\b[^\n]*$",
    )
    .unwrap()
});

/// Remove meta-text lines at the very start; content lines are kept even if
/// they happen to match.
fn drop_meta_preamble(input: &str) -> String {
    let mut lines = input.lines().peekable();
    while let Some(line) = lines.peek() {
        if line.trim().is_empty() || RE_META_LINE.is_match(line) {
            lines.next();
        } else {
            break;
        }
    }
    let rest: Vec<&str> = lines.collect();
    if rest.is_empty() {
        // Nothing but meta-text: keep the original rather than return nothing.
        return input.to_string();
    }
    rest.join("\n")
}

// ── Rule 6: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
