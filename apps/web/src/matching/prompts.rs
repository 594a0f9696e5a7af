// Alias generation prompt templates.

pub const ALIAS_SYSTEM: &str = "\
You are a precise recruiting terminology assistant. \
You MUST respond with valid JSON only. Do NOT use markdown fences or explanations. \
Never include definitions.";

pub const ALIAS_PROMPT_TEMPLATE: &str = r#"Map each canonical term (lowercase) to a short array (0-6 items) of lowercase
synonyms, aliases, abbreviations or brand variants as commonly used for THIS job role.
Include spacing/hyphen/dot variants and known abbreviations.

TERMS:
{terms}

JOB_DESCRIPTION:
{jd_text}

OUTPUT: a single JSON object, e.g. {"kubernetes": ["k8s"], "power bi": ["powerbi", "pbi"]}"#;
