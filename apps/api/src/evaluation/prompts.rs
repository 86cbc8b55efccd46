// Rubric template and prompt assembly for the evaluation call.
// The rendered prompt is also the cache key: any wording change here must bump
// RUBRIC_VERSION so old and new prompts never share a key space by accident.

use crate::extraction::ExtractedText;

pub const RUBRIC_VERSION: &str = "v1";

/// Characters kept from each document before interpolation.
pub const DEFAULT_PROMPT_CHAR_LIMIT: usize = 3000;

/// Evaluation rubric. Replace `{curriculum}` and `{report}` via `fill_template`.
pub const RUBRIC_TEMPLATE: &str = r#"
Below is text extracted from two uploaded documents. Each section may have been
truncated to its opening portion; evaluate holistically and do not penalise
content that appears to be cut off.

[CURRICULUM]
----
{curriculum}
----

[DAILY REPORT]
----
{report}
----

Questions:
1. Does the daily report accurately reflect the content of the curriculum?
2. How well does the report demonstrate learning and understanding?
3. List any points for improvement or concerns.

Answer the questions above in prose, in detail but concisely.
"#;

/// Fully rendered instruction string sent to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationPrompt {
    pub text: String,
    pub rubric_version: &'static str,
}

/// Builds the evaluation prompt. Pure: identical inputs give byte-identical output.
pub fn build_prompt(
    curriculum: &ExtractedText,
    report: &ExtractedText,
    limit: usize,
) -> EvaluationPrompt {
    let text = fill_template(
        RUBRIC_TEMPLATE,
        &[
            ("curriculum", truncate_chars(&curriculum.content, limit)),
            ("report", truncate_chars(&report.content, limit)),
        ],
    );

    EvaluationPrompt {
        text,
        rubric_version: RUBRIC_VERSION,
    }
}

/// Returns the first `limit` characters of `text`. Prefix only, no boundary smarts.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Single-pass placeholder substitution. Substituted values are never rescanned,
/// so document text containing `{report}` stays literal.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let value = after.find('}').and_then(|end| {
            let name = &after[..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end))
        });

        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
