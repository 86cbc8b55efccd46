//! Result types shared by the evaluation pipeline, the generation client and the renderer.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Placeholder used when the backend answers successfully but supplies no text.
pub const EMPTY_EVALUATION_PLACEHOLDER: &str = "Unable to evaluate";

/// Failure taxonomy of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MissingInput,
    InvalidUpload,
    UploadTooLarge,
    UnsupportedFormat,
    ExtractionFailed,
    RateLimited,
    TransportFailure,
    Timeout,
    ConfigurationError,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::MissingInput => "MISSING_INPUT",
            ErrorKind::InvalidUpload => "INVALID_UPLOAD",
            ErrorKind::UploadTooLarge => "UPLOAD_TOO_LARGE",
            ErrorKind::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorKind::ExtractionFailed => "EXTRACTION_FAILED",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::TransportFailure => "TRANSPORT_FAILURE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    /// Actionable message shown to the person who uploaded the documents.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::MissingInput => {
                "Both a curriculum and a report document are required. Select both files and submit again."
            }
            ErrorKind::InvalidUpload => {
                "The upload could not be read. Submit the form again from the upload page."
            }
            ErrorKind::UploadTooLarge => {
                "The selected files are larger than the upload limit. Reduce their size and try again."
            }
            ErrorKind::UnsupportedFormat => {
                "Only PDF and DOCX documents are supported. Convert the file and upload it again."
            }
            ErrorKind::ExtractionFailed => {
                "The document could not be read. Check that the file is not corrupted or password protected."
            }
            ErrorKind::RateLimited => {
                "The evaluation service is busy right now. Please try again later."
            }
            ErrorKind::TransportFailure => {
                "The evaluation service could not be reached. Please try again in a moment."
            }
            ErrorKind::Timeout => {
                "The evaluation service did not answer in time. Please try again later."
            }
            ErrorKind::ConfigurationError => {
                "The evaluation service is not configured correctly. Contact the administrator."
            }
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::MissingInput | ErrorKind::InvalidUpload => StatusCode::BAD_REQUEST,
            ErrorKind::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorKind::ExtractionFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::TransportFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Failure,
}

/// Model-produced judgement of the report against the curriculum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub text: String,
    pub model: String,
    pub rubric_version: String,
    pub generated_at: DateTime<Utc>,
    /// True when the backend returned no text and `text` is the placeholder.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationFailure {
    pub kind: ErrorKind,
    /// Diagnostic string; never a backtrace.
    pub detail: String,
}

/// Terminal value of one pipeline run. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationResult {
    Success(Evaluation),
    Failure(EvaluationFailure),
}

impl EvaluationResult {
    pub fn failure(kind: ErrorKind, detail: impl Into<String>) -> Self {
        EvaluationResult::Failure(EvaluationFailure {
            kind,
            detail: detail.into(),
        })
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            EvaluationResult::Success(_) => Outcome::Success,
            EvaluationResult::Failure(_) => Outcome::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome() == Outcome::Success
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            EvaluationResult::Success(evaluation) => Some(&evaluation.text),
            EvaluationResult::Failure(_) => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            EvaluationResult::Success(_) => None,
            EvaluationResult::Failure(failure) => Some(failure.kind),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.error_kind()
            .map(ErrorKind::status_code)
            .unwrap_or(StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_with_outcome_tag() {
        let result = EvaluationResult::failure(ErrorKind::RateLimited, "status 429");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "FAILURE");
        assert_eq!(json["kind"], "RATE_LIMITED");
        assert_eq!(json["detail"], "status 429");
    }

    #[test]
    fn test_success_serializes_with_outcome_tag() {
        let result = EvaluationResult::Success(Evaluation {
            text: "Looks consistent.".to_string(),
            model: "gemini-2.5-flash".to_string(),
            rubric_version: "v1".to_string(),
            generated_at: Utc::now(),
            degraded: false,
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "SUCCESS");
        assert_eq!(json["text"], "Looks consistent.");
        assert_eq!(result.status_code(), StatusCode::OK);
    }

    #[test]
    fn test_error_codes_match_serialized_names() {
        for kind in [
            ErrorKind::MissingInput,
            ErrorKind::InvalidUpload,
            ErrorKind::UploadTooLarge,
            ErrorKind::UnsupportedFormat,
            ErrorKind::ExtractionFailed,
            ErrorKind::RateLimited,
            ErrorKind::TransportFailure,
            ErrorKind::Timeout,
            ErrorKind::ConfigurationError,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.code());
        }
    }

    #[test]
    fn test_rate_limited_maps_to_429() {
        let result = EvaluationResult::failure(ErrorKind::RateLimited, "");
        assert_eq!(result.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(result.outcome(), Outcome::Failure);
        assert!(result.text().is_none());
    }
}
