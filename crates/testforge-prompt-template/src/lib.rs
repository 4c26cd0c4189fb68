//! Prompt templates for the three testforge stages.
//!
//! Builders are pure: the same snippet, upstream text and language always
//! produce byte-identical prompts. Upstream stage output is embedded verbatim
//! inside XML-style tags (`<analysis>`, `<test_cases>`), and the snippet inside
//! `<source_code>`.

mod language;
mod templates;

pub use language::{KNOWN_LANGUAGES, TargetLanguage};
pub use templates::{
    ANALYSIS_TEMPERATURE, StagePrompt, TEST_CASES_TEMPERATURE, TEST_CODE_TEMPERATURE,
    analysis_prompt, build_stage_prompt, default_temperature, test_cases_prompt,
    test_code_prompt,
};
