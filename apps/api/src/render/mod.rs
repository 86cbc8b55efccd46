//! Report Renderer — presentation only.
//!
//! Turns an `EvaluationResult` into a standalone HTML document. Output depends on
//! nothing but the input value (the timestamp comes from the result), so rendering
//! the same result twice yields identical bytes. All interpolated text is escaped.

use crate::evaluation::models::{Evaluation, EvaluationFailure, EvaluationResult};
use crate::extraction::DocumentRole;

const STYLE: &str = "\
body { font-family: sans-serif; max-width: 860px; margin: 2rem auto; padding: 0 1rem; color: #222; }\n\
.meta { color: #555; font-size: 0.9rem; padding-left: 1.2rem; }\n\
.evaluation { background: #f4f4f4; padding: 15px; border-radius: 8px; }\n\
.evaluation p { margin: 0 0 0.6rem 0; }\n\
.evaluation p.blank { margin: 0; height: 0.6rem; }\n\
.notice { color: #8a5300; }\n\
.error { background: #fdecea; padding: 15px; border-radius: 8px; }\n\
.diagnostic { white-space: pre-wrap; font-size: 0.85rem; color: #555; }\n";

/// Renders either the evaluation report or the error document.
pub fn render_report(result: &EvaluationResult) -> String {
    match result {
        EvaluationResult::Success(evaluation) => render_evaluation(evaluation),
        EvaluationResult::Failure(failure) => render_failure(failure),
    }
}

fn render_evaluation(evaluation: &Evaluation) -> String {
    let mut body = String::new();
    body.push_str("<h2>Curriculum vs. Report Evaluation</h2>\n");
    body.push_str("<ul class=\"meta\">\n");
    body.push_str(&format!(
        "<li>Generated at: {}</li>\n",
        evaluation.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    body.push_str(&format!("<li>Model: {}</li>\n", escape_html(&evaluation.model)));
    body.push_str(&format!(
        "<li>Rubric: {}</li>\n",
        escape_html(&evaluation.rubric_version)
    ));
    body.push_str("</ul>\n");

    if evaluation.degraded {
        body.push_str(
            "<p class=\"notice\">The evaluation service returned no content for these documents.</p>\n",
        );
    }

    body.push_str("<div class=\"evaluation\">\n");
    for line in evaluation.text.lines() {
        if line.trim().is_empty() {
            body.push_str("<p class=\"blank\"></p>\n");
        } else {
            body.push_str(&format!("<p>{}</p>\n", escape_html(line)));
        }
    }
    body.push_str("</div>\n");
    body.push_str(BACK_LINK);

    page("Evaluation report", &body)
}

fn render_failure(failure: &EvaluationFailure) -> String {
    let mut body = String::new();
    body.push_str("<h2>Evaluation failed</h2>\n");
    body.push_str("<div class=\"error\">\n");
    body.push_str(&format!(
        "<p><strong>{}</strong></p>\n",
        failure.kind.code()
    ));
    body.push_str(&format!("<p>{}</p>\n", escape_html(failure.kind.user_message())));
    if !failure.detail.is_empty() {
        body.push_str(&format!(
            "<pre class=\"diagnostic\">{}</pre>\n",
            escape_html(&failure.detail)
        ));
    }
    body.push_str("</div>\n");
    body.push_str(BACK_LINK);

    page("Evaluation failed", &body)
}

const BACK_LINK: &str = "<p><a href=\"/\">&larr; Back</a></p>\n";

/// Upload page with one file input per document role.
pub fn render_upload_form(max_upload_bytes: usize) -> String {
    let mut body = String::new();
    body.push_str("<h2>Curriculum / Report Evaluation</h2>\n");
    body.push_str(
        "<form method=\"POST\" action=\"/upload\" enctype=\"multipart/form-data\">\n",
    );
    for (role, label) in [
        (DocumentRole::Curriculum, "Curriculum (PDF or DOCX)"),
        (DocumentRole::Report, "Daily report (PDF or DOCX)"),
    ] {
        let name = role.field_name();
        body.push_str(&format!(
            "<label for=\"{name}\">{label}:</label><br>\n\
             <input type=\"file\" id=\"{name}\" name=\"{name}\" accept=\".pdf,.docx\" required><br><br>\n"
        ));
    }
    body.push_str(&format!(
        "<p class=\"meta\">Maximum upload size: {} MiB in total.</p>\n",
        max_upload_bytes / (1024 * 1024)
    ));
    body.push_str("<button type=\"submit\">Upload and evaluate</button>\n</form>\n");

    page("Upload documents", &body)
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>\n{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape_html(title)
    )
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
