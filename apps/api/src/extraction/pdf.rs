use super::{DocumentRole, ExtractError};

/// Extracts text page by page. Each page's text runs are joined with single
/// spaces and the page is terminated by one newline, in page order.
pub(super) fn extract_text(role: DocumentRole, bytes: &[u8]) -> Result<String, ExtractError> {
    let pages =
        pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf {
            role,
            message: format!("{e:?}"),
        })?;
    Ok(join_pages(&pages))
}

/// Collapses each page's layout lines into one line of space-separated runs.
fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::new();
    for page in pages {
        let runs: Vec<&str> = page
            .as_ref()
            .lines()
            .map(str::trim)
            .filter(|run| !run.is_empty())
            .collect();
        text.push_str(&runs.join(" "));
        text.push('\n');
    }
    text
}
