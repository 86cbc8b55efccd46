// A .docx file is a ZIP package of XML parts. docx-rs parses the package
// into Document → Paragraph → Run → Text; only the text leaves are kept,
// styling, images and embedded objects are dropped.

use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild};

use super::{DocumentRole, ExtractError};

/// Extracts the raw text of every top-level paragraph, one paragraph per line.
/// Blank paragraphs (section breaks, spacing) are skipped.
pub(super) fn extract_text(role: DocumentRole, bytes: &[u8]) -> Result<String, ExtractError> {
    let docx = read_docx(bytes).map_err(|e| ExtractError::Docx {
        role,
        message: format!("{e:?}"),
    })?;

    let mut text = String::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            let line = paragraph_text(paragraph);
            if !line.trim().is_empty() {
                text.push_str(&line);
                text.push('\n');
            }
        }
    }
    Ok(text)
}

/// Runs inside a paragraph are fragments of the same sentence, so they are
/// concatenated without a separator.
fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut line = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => line.push_str(&t.text),
                    RunChild::Tab(_) => line.push('\t'),
                    _ => {}
                }
            }
        }
    }
    line
}
