// ATS keyword analysis: LLM-backed analyzer, fallback, response normalization.

pub mod analyzer;
pub mod model;
pub mod prompts;
