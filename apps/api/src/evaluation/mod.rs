// Document evaluation: prompt assembly, memoized generation, orchestration.
// All model calls go through llm_client::Generator — never reqwest directly.

pub mod cache;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod prompts;
