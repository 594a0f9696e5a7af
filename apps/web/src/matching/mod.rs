// Keyword matching core: normalization → synonyms → patterns → presence,
// then scoring and highlighting on top of presence results.
// Pure and synchronous apart from alias providers, which may call the LLM.

pub mod aliases;
pub mod highlight;
pub mod patterns;
pub mod presence;
pub mod priority;
pub mod prompts;
pub mod scoring;
pub mod synonyms;
pub mod terms;
