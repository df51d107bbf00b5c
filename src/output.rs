//! Result types and the plain-text summary report.

use crate::error::DocveilError;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// A page summary straight from the fan-out stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSummary {
    pub page_index: usize,
    pub text: String,
}

/// A page summary after refinement against the previous page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinedSummary {
    pub page_index: usize,
    pub text: String,
}

/// Timing and size statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_pages: usize,
    pub extract_duration_ms: u64,
    pub summarize_duration_ms: u64,
    pub refine_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything produced by an eager run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutput {
    /// Document display name.
    pub name: String,
    /// Raw per-page summaries, in page order.
    pub raw: Vec<RawSummary>,
    /// Refined summaries, in page order.
    pub summaries: Vec<RefinedSummary>,
    pub stats: SummaryStats,
    /// Report path, when an output directory was configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_file: Option<PathBuf>,
}

impl SummaryOutput {
    /// The refined texts, in page order.
    pub fn texts(&self) -> Vec<&str> {
        self.summaries.iter().map(|s| s.text.as_str()).collect()
    }
}

const RULE_WIDTH: usize = 80;

/// Render the report body for `stem`.
///
/// ```text
/// PDF Summary: {stem}
/// Generated: {YYYY-mm-dd HH:MM:SS}
/// Total Pages: {n}
/// ====…
///
/// ========== PAGE 1 ==========
///
/// {summary}
///
/// ----…
/// ```
pub fn format_report(stem: &str, generated: &str, summaries: &[RefinedSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PDF Summary: {}", stem);
    let _ = writeln!(out, "Generated: {}", generated);
    let _ = writeln!(out, "Total Pages: {}", summaries.len());
    let _ = writeln!(out, "{}\n", "=".repeat(RULE_WIDTH));

    for (i, summary) in summaries.iter().enumerate() {
        let _ = writeln!(out, "========== PAGE {} ==========\n", i + 1);
        out.push_str(&summary.text);
        let _ = write!(out, "\n\n{}\n\n", "-".repeat(RULE_WIDTH));
    }
    out
}

/// Write the report to `{dir}/{stem}_summary_{YYYYmmdd_HHMMSS}.txt`.
///
/// Creates `dir` if needed and returns the written path.
pub async fn save_summaries_to_file(
    dir: &Path,
    stem: &str,
    summaries: &[RefinedSummary],
) -> Result<PathBuf, DocveilError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| DocveilError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let now = Local::now();
    let path = dir.join(format!("{}_summary_{}.txt", stem, now.format("%Y%m%d_%H%M%S")));
    let body = format_report(stem, &now.format("%Y-%m-%d %H:%M:%S").to_string(), summaries);

    tokio::fs::write(&path, body)
        .await
        .map_err(|e| DocveilError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    info!("Summaries saved to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refined(texts: &[&str]) -> Vec<RefinedSummary> {
        texts
            .iter()
            .enumerate()
            .map(|(page_index, t)| RefinedSummary {
                page_index,
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn report_layout() {
        let body = format_report("q3", "2024-01-02 03:04:05", &refined(&["first", "second"]));
        let expected = format!(
            "PDF Summary: q3\nGenerated: 2024-01-02 03:04:05\nTotal Pages: 2\n{eq}\n\n\
             ========== PAGE 1 ==========\n\nfirst\n\n{dash}\n\n\
             ========== PAGE 2 ==========\n\nsecond\n\n{dash}\n\n",
            eq = "=".repeat(80),
            dash = "-".repeat(80),
        );
        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn save_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("summaries_output");
        let path = save_summaries_to_file(&out_dir, "paper", &refined(&["only page"]))
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("paper_summary_"), "got {name}");
        assert!(name.ends_with(".txt"));

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("Total Pages: 1"));
        assert!(body.contains("only page"));
    }

    #[test]
    fn output_serialises_without_saved_file() {
        let out = SummaryOutput {
            name: "x.pdf".into(),
            raw: vec![],
            summaries: refined(&["a"]),
            stats: SummaryStats::default(),
            saved_file: None,
        };
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("saved_file").is_none());
        assert_eq!(json["summaries"][0]["text"], "a");
        assert_eq!(out.texts(), vec!["a"]);
    }
}
