//! Evaluation pipeline — orchestrates one run end to end.
//!
//! Flow: presence check → media type check → extract ×2 (parallel, blocking pool)
//!       → build_prompt → cache.get_or_compute → generator.generate.
//!
//! Every run ends in an `EvaluationResult`; errors are converted at this boundary
//! so the renderer always has something to show. Input problems are detected
//! before any extraction starts, and nothing upstream of the cache can reach
//! the generator.

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::evaluation::cache::{CacheStats, EvaluationCache};
use crate::evaluation::models::{ErrorKind, EvaluationResult};
use crate::evaluation::prompts::build_prompt;
use crate::extraction::{extract_blocking, Document, DocumentRole, ExtractError, MediaType};
use crate::llm_client::Generator;

/// The two uploads of one request. Either may be absent.
#[derive(Debug, Default)]
pub struct Submission {
    pub curriculum: Option<Document>,
    pub report: Option<Document>,
}

pub struct EvaluationPipeline {
    generator: Arc<dyn Generator>,
    cache: EvaluationCache,
    prompt_char_limit: usize,
}

impl EvaluationPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        cache: EvaluationCache,
        prompt_char_limit: usize,
    ) -> Self {
        Self {
            generator,
            cache,
            prompt_char_limit,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Runs the pipeline for one submission.
    pub async fn evaluate(&self, submission: Submission) -> EvaluationResult {
        let run_id = Uuid::new_v4();
        let result = self
            .run(submission)
            .instrument(info_span!("evaluation", %run_id))
            .await;

        match &result {
            EvaluationResult::Success(evaluation) => info!(
                %run_id,
                degraded = evaluation.degraded,
                "Evaluation completed ({} chars)",
                evaluation.text.len()
            ),
            EvaluationResult::Failure(failure) => warn!(
                %run_id,
                kind = failure.kind.code(),
                "Evaluation failed: {}",
                failure.detail
            ),
        }
        result
    }

    async fn run(&self, submission: Submission) -> EvaluationResult {
        let (curriculum, report) = match (submission.curriculum, submission.report) {
            (Some(curriculum), Some(report)) => (curriculum, report),
            (curriculum, report) => {
                let missing: Vec<&str> = [
                    (curriculum.is_none(), DocumentRole::Curriculum),
                    (report.is_none(), DocumentRole::Report),
                ]
                .into_iter()
                .filter(|(absent, _)| *absent)
                .map(|(_, role)| role.field_name())
                .collect();
                return EvaluationResult::failure(
                    ErrorKind::MissingInput,
                    format!("Missing document(s): {}", missing.join(", ")),
                );
            }
        };

        // Reject unsupported formats before extracting either document.
        for document in [&curriculum, &report] {
            if let MediaType::Unsupported(declared) = &document.media_type {
                let err = ExtractError::UnsupportedFormat {
                    role: document.role,
                    declared: declared.clone(),
                };
                return EvaluationResult::failure(err.kind(), err.to_string());
            }
        }

        let (curriculum, report) =
            match tokio::try_join!(extract_blocking(curriculum), extract_blocking(report)) {
                Ok(texts) => texts,
                Err(err) => return EvaluationResult::failure(err.kind(), err.to_string()),
            };
        info!(
            "Extracted {}={} chars, {}={} chars",
            curriculum.role, curriculum.char_count, report.role, report.char_count
        );

        let prompt = build_prompt(&curriculum, &report, self.prompt_char_limit);
        let generator = &self.generator;
        self.cache
            .get_or_compute(&prompt, || generator.generate(&prompt))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::evaluation::models::Evaluation;
    use crate::evaluation::prompts::{EvaluationPrompt, DEFAULT_PROMPT_CHAR_LIMIT};
    use crate::render::render_report;

    /// Records every prompt and answers with a fixed outcome.
    struct FakeGenerator {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        failure: Option<ErrorKind>,
    }

    impl FakeGenerator {
        fn succeeding() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                failure: None,
            })
        }

        fn failing(kind: ErrorKind) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                failure: Some(kind),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn generate(&self, prompt: &EvaluationPrompt) -> EvaluationResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.text.clone());
            match self.failure {
                Some(kind) => EvaluationResult::failure(kind, "fake backend failure"),
                None => EvaluationResult::Success(Evaluation {
                    text: "1. Consistent.\n2. Good.\n3. None.".to_string(),
                    model: "fake".to_string(),
                    rubric_version: prompt.rubric_version.to_string(),
                    generated_at: Utc::now(),
                    degraded: false,
                }),
            }
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    fn pipeline(generator: Arc<FakeGenerator>) -> EvaluationPipeline {
        EvaluationPipeline::new(
            generator,
            EvaluationCache::new(NonZeroUsize::new(16).unwrap()),
            DEFAULT_PROMPT_CHAR_LIMIT,
        )
    }

    fn docx(role: DocumentRole, paragraphs: &[&str]) -> Document {
        Document::new(
            role,
            MediaType::Docx,
            crate::extraction::docx_fixture(paragraphs),
        )
    }

    fn empty(role: DocumentRole, media_type: MediaType) -> Document {
        Document::new(role, media_type, Vec::new())
    }

    #[tokio::test]
    async fn test_empty_documents_still_reach_the_generator() {
        let generator = FakeGenerator::succeeding();
        let pipeline = pipeline(Arc::clone(&generator));

        let result = pipeline
            .evaluate(Submission {
                curriculum: Some(empty(DocumentRole::Curriculum, MediaType::Pdf)),
                report: Some(empty(DocumentRole::Report, MediaType::Docx)),
            })
            .await;

        assert!(result.is_success());
        assert_eq!(generator.calls(), 1);
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("[CURRICULUM]\n----\n\n----"));
        assert!(prompts[0].contains("[DAILY REPORT]\n----\n\n----"));

        let html = render_report(&result);
        assert!(html.contains("<title>Evaluation report</title>"));
    }

    #[tokio::test]
    async fn test_extracted_text_flows_into_prompt() {
        let generator = FakeGenerator::succeeding();
        let pipeline = pipeline(Arc::clone(&generator));

        pipeline
            .evaluate(Submission {
                curriculum: Some(docx(DocumentRole::Curriculum, &["Week 1: ownership"])),
                report: Some(docx(DocumentRole::Report, &["Studied borrowing"])),
            })
            .await;

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("----\nWeek 1: ownership\n\n----"));
        assert!(prompts[0].contains("----\nStudied borrowing\n\n----"));
    }

    #[tokio::test]
    async fn test_identical_submissions_hit_the_cache() {
        let generator = FakeGenerator::succeeding();
        let pipeline = pipeline(Arc::clone(&generator));

        for _ in 0..3 {
            let result = pipeline
                .evaluate(Submission {
                    curriculum: Some(docx(DocumentRole::Curriculum, &["Plan"])),
                    report: Some(docx(DocumentRole::Report, &["Done"])),
                })
                .await;
            assert!(result.is_success());
        }

        assert_eq!(generator.calls(), 1);
        assert_eq!(pipeline.cache_stats().hits, 2);
    }

    #[tokio::test]
    async fn test_rate_limited_renders_retry_message_and_is_not_cached() {
        let generator = FakeGenerator::failing(ErrorKind::RateLimited);
        let pipeline = pipeline(Arc::clone(&generator));
        let submission = || Submission {
            curriculum: Some(docx(DocumentRole::Curriculum, &["Plan"])),
            report: Some(docx(DocumentRole::Report, &["Done"])),
        };

        let first = pipeline.evaluate(submission()).await;
        assert_eq!(first.error_kind(), Some(ErrorKind::RateLimited));
        let html = render_report(&first);
        assert!(html.contains("RATE_LIMITED"));
        assert!(html.contains("try again later"));

        let second = pipeline.evaluate(submission()).await;
        assert_eq!(second.error_kind(), Some(ErrorKind::RateLimited));
        assert_eq!(generator.calls(), 2);
        assert_eq!(pipeline.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_unsupported_format_stops_before_extraction_and_generation() {
        let generator = FakeGenerator::succeeding();
        let pipeline = pipeline(Arc::clone(&generator));

        // The curriculum is corrupt; it must not be parsed because the report is rejected first.
        let result = pipeline
            .evaluate(Submission {
                curriculum: Some(Document::new(
                    DocumentRole::Curriculum,
                    MediaType::Docx,
                    b"corrupt".to_vec(),
                )),
                report: Some(empty(
                    DocumentRole::Report,
                    MediaType::Unsupported("image/png".to_string()),
                )),
            })
            .await;

        match &result {
            EvaluationResult::Failure(failure) => {
                assert_eq!(failure.kind, ErrorKind::UnsupportedFormat);
                assert!(failure.detail.contains("report"));
                assert!(failure.detail.contains("image/png"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_document_is_reported() {
        let generator = FakeGenerator::succeeding();
        let pipeline = pipeline(Arc::clone(&generator));

        let result = pipeline
            .evaluate(Submission {
                curriculum: Some(empty(DocumentRole::Curriculum, MediaType::Pdf)),
                report: None,
            })
            .await;

        match &result {
            EvaluationResult::Failure(failure) => {
                assert_eq!(failure.kind, ErrorKind::MissingInput);
                assert_eq!(failure.detail, "Missing document(s): report");
            }
            other => panic!("expected failure, got {other:?}"),
        }

        let none = pipeline.evaluate(Submission::default()).await;
        match none {
            EvaluationResult::Failure(failure) => {
                assert_eq!(failure.detail, "Missing document(s): curriculum, report")
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_extraction_failure() {
        let generator = FakeGenerator::succeeding();
        let pipeline = pipeline(Arc::clone(&generator));

        let result = pipeline
            .evaluate(Submission {
                curriculum: Some(Document::new(
                    DocumentRole::Curriculum,
                    MediaType::Docx,
                    b"not a zip archive".to_vec(),
                )),
                report: Some(empty(DocumentRole::Report, MediaType::Docx)),
            })
            .await;

        assert_eq!(result.error_kind(), Some(ErrorKind::ExtractionFailed));
        assert_eq!(generator.calls(), 0);
    }
}
