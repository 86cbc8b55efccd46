use std::sync::Arc;

use crate::config::Config;
use crate::evaluation::pipeline::EvaluationPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the generator and the evaluation cache; shared by every request.
    pub pipeline: Arc<EvaluationPipeline>,
    pub config: Config,
}
