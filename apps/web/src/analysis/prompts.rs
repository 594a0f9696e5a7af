// ATS analysis prompt templates.

/// ATS keyword analysis prompt. Replace `{resume_text}` and `{jd_text}` before sending.
pub const ATS_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Act as an expert ATS optimizer.

Return ONLY a single JSON object with keys:
- jd_required_keywords: array of lowercase must-have keywords/technologies from JD
- jd_optional_keywords: array of lowercase nice-to-have keywords from JD
- resume_keywords_found: array of lowercase JD keywords found in the resume
- resume_keywords_missing: array of lowercase required JD keywords not found in the resume
- weak_language_phrases: array of vague resume phrases to tighten (original casing if possible)
- low_context_phrases: array of resume phrases that need quantification/context (original casing)
- technical_skills: array of lowercase technical skills stack for the role (from JD)
- soft_skills: array of lowercase soft skills for the role (from JD)
- smart_cv_analysis: object with integer fields:
   critical_issues, improvements, missing_skills, keywords_found
- ats_score: integer 0-100 summarizing ATS compatibility
- ats_suggestions: array of short actionable suggestions (<= 8 words each)

RESUME:
{resume_text}

JOB_DESCRIPTION:
{jd_text}"#;
