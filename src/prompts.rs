//! Prompts for the summary and refinement calls.
//!
//! Callers can override both via [`crate::config::SummaryConfig`]; the
//! constants here are used only when no override is provided.

/// Default prompt for summarizing one page. `{page}` is the page text.
pub const DEFAULT_SUMMARY_PROMPT: &str = r#"You are a summarizer who can generate a detailed summary of the following page of a document.

Page content:
"""
{page}
"""

Output ONLY the summary. Do NOT add commentary, greetings, or phrases like "Here is the summary"."#;

/// Default prompt for refining a page summary against the previous page.
///
/// `{previous}` is the previous page's refined summary, `{current}` the raw
/// summary of this page.
pub const DEFAULT_REFINE_PROMPT: &str = r#"You are refining a document summary page by page.

Previous page summary (for context):
{previous}

Current page summary:
{current}

Provide an improved version of the current page summary that is clearer, more detailed, and consistent with the previous context. Do NOT repeat the previous page.

IMPORTANT formatting rules:
- Start with a brief heading in bold: **Topic/Heading**
- Then provide numbered points: (1), (2), (3), (4), (5), etc. - as many as needed
- Provide a DETAILED summary - aim for 7-10 points or more for comprehensive content
- Do NOT limit yourself to just 3 points
- Do NOT include any meta-text like 'Rewritten summary' or 'Here is the summary'
- Do NOT use asterisks in the points themselves
- Output ONLY the heading and summary points"#;

/// Fill the `{page}` placeholder.
pub fn summary_prompt(template: &str, page_text: &str) -> String {
    template.replace("{page}", page_text)
}

/// Fill the `{previous}` and `{current}` placeholders.
///
/// `{current}` is substituted first so that a previous summary which happens
/// to contain the literal text `{current}` is left untouched.
pub fn refine_prompt(template: &str, previous: &str, current: &str) -> String {
    template
        .replace("{current}", current)
        .replacen("{previous}", previous, 1)
}
