//! Axum route handlers for the upload gateway.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::Html,
    Json,
};
use tracing::warn;

use crate::errors::AppError;
use crate::evaluation::models::EvaluationResult;
use crate::evaluation::pipeline::Submission;
use crate::extraction::{Document, DocumentRole, MediaType};
use crate::render::{render_report, render_upload_form};
use crate::state::AppState;

/// GET /
pub async fn handle_upload_form(State(state): State<AppState>) -> Html<String> {
    Html(render_upload_form(state.config.max_upload_bytes))
}

/// POST /upload
///
/// Always answers with a rendered document: the report, or an error page whose
/// status code follows the failure kind. A body that is not multipart at all, or
/// that is cut off by the upload limit, gets an error page too.
pub async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Html<String>) {
    let result = match read_multipart(multipart).await {
        Ok(submission) => state.pipeline.evaluate(submission).await,
        Err(e) => {
            warn!("Rejected upload: {e}");
            EvaluationResult::failure(e.kind(), e.to_string())
        }
    };
    (result.status_code(), Html(render_report(&result)))
}

/// POST /api/v1/evaluations
///
/// Same multipart contract as `/upload`, answering with the result as JSON.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<EvaluationResult>), AppError> {
    let submission = read_multipart(multipart).await?;
    let result = state.pipeline.evaluate(submission).await;
    Ok((result.status_code(), Json(result)))
}

async fn read_multipart(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Submission, AppError> {
    let multipart = multipart.map_err(|rejection| {
        AppError::Validation(format!("Not a multipart upload: {}", rejection.body_text()))
    })?;
    read_submission(multipart).await
}

/// Collects the `curriculum` and `report` file parts. Other fields are ignored,
/// only the first file per role is kept, and nothing is written to disk.
async fn read_submission(mut multipart: Multipart) -> Result<Submission, AppError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let Some(role) = field.name().and_then(DocumentRole::from_field_name) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(malformed)?;

        // Browsers send an empty, unnamed part for a file input left blank.
        if bytes.is_empty() && file_name.as_deref().map_or(true, str::is_empty) {
            continue;
        }

        let slot = match role {
            DocumentRole::Curriculum => &mut submission.curriculum,
            DocumentRole::Report => &mut submission.report,
        };
        if slot.is_some() {
            warn!("Ignoring additional {role} file {:?}", file_name);
            continue;
        }

        let media_type = MediaType::from_declared(content_type.as_deref(), file_name.as_deref());
        *slot = Some(Document::new(role, media_type, bytes));
    }

    Ok(submission)
}

/// Body-limit breaches surface as multipart read errors carrying 413.
fn malformed(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Malformed multipart body: {}", e.body_text()))
    }
}
