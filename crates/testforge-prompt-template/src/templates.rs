use testforge_utils::types::StageId;

use crate::language::TargetLanguage;

/// Sampling temperature for the analysis stage
pub const ANALYSIS_TEMPERATURE: f32 = 0.3;
/// Sampling temperature for the test-case stage
pub const TEST_CASES_TEMPERATURE: f32 = 0.4;
/// Sampling temperature for the test-code stage
pub const TEST_CODE_TEMPERATURE: f32 = 0.2;

/// Built-in temperature for a stage.
#[must_use]
pub const fn default_temperature(stage: StageId) -> f32 {
    match stage {
        StageId::Analysis => ANALYSIS_TEMPERATURE,
        StageId::TestCases => TEST_CASES_TEMPERATURE,
        StageId::TestCode => TEST_CODE_TEMPERATURE,
    }
}

/// Prompts and sampling temperature for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePrompt {
    pub stage: StageId,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

impl StagePrompt {
    /// Replace the temperature, clamped to [0, 1].
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = if temperature.is_nan() {
            default_temperature(self.stage)
        } else {
            temperature.clamp(0.0, 1.0)
        };
        self
    }
}

fn source_block(snippet: &str) -> String {
    format!("<source_code>\n{snippet}\n</source_code>")
}

/// Stage 1: describe purpose, inputs, outputs and edge cases of the snippet.
#[must_use]
pub fn analysis_prompt(snippet: &str, language: &TargetLanguage) -> StagePrompt {
    let lang = language.display_name();
    let system = format!(
        "You are an expert software engineer specialized in {lang}. Your task is to meticulously \
         analyze {lang} code and identify its purpose, inputs, outputs, and all potential edge \
         cases or error conditions."
    );
    let user = format!(
        "Analyze the provided {lang} function delimited by <source_code></source_code> tags. \
         Describe its purpose, inputs, outputs, and any potential edge cases or error conditions \
         based on its documentation comments and code.\n\n{}\n",
        source_block(snippet)
    );

    StagePrompt {
        stage: StageId::Analysis,
        system,
        user,
        temperature: ANALYSIS_TEMPERATURE,
    }
}

/// Stage 2: turn the analysis into distinct test cases.
///
/// `analysis` is embedded verbatim.
#[must_use]
pub fn test_cases_prompt(snippet: &str, analysis: &str, language: &TargetLanguage) -> StagePrompt {
    let lang = language.display_name();
    let system = "You are a quality assurance expert. Your goal is to generate comprehensive and \
                  distinct test cases (inputs, expected outputs/behaviors) for a given function, \
                  covering all identified scenarios including positive, zero, and error cases."
        .to_string();
    let user = format!(
        "Based on the analysis delimited by <analysis></analysis> tags, generate a list of \
         distinct test cases (inputs and expected outputs/behaviors) to thoroughly test the {lang} \
         function delimited by <source_code></source_code> tags. Include positive cases, zero \
         cases, and cases that should trigger some kind of error or panic.\n\n\
         <analysis>\n{analysis}\n</analysis>\n\n{}\n",
        source_block(snippet)
    );

    StagePrompt {
        stage: StageId::TestCases,
        system,
        user,
        temperature: TEST_CASES_TEMPERATURE,
    }
}

/// Stage 3: turn the test cases into executable test code.
///
/// `test_cases` is embedded verbatim.
#[must_use]
pub fn test_code_prompt(
    snippet: &str,
    test_cases: &str,
    language: &TargetLanguage,
) -> StagePrompt {
    let lang = language.display_name();
    let mut system = format!(
        "You are an experienced {lang} developer. Your task is to write idiomatic {lang} test code \
         using {}, based on provided test cases and the function under test.",
        language.test_convention()
    );
    if let Some(notes) = language.notes() {
        system.push(' ');
        system.push_str(notes);
    }
    let user = format!(
        "Using the generated test cases delimited by <test_cases></test_cases> tags, write {lang} \
         test code for the function delimited by <source_code></source_code> tags.\n\n\
         <test_cases>\n{test_cases}\n</test_cases>\n\n{}\n",
        source_block(snippet)
    );

    StagePrompt {
        stage: StageId::TestCode,
        system,
        user,
        temperature: TEST_CODE_TEMPERATURE,
    }
}

/// Build the prompt for `stage` from the snippet and the previous stage's output.
///
/// `upstream` is ignored for the analysis stage.
#[must_use]
pub fn build_stage_prompt(
    stage: StageId,
    snippet: &str,
    upstream: &str,
    language: &TargetLanguage,
) -> StagePrompt {
    match stage {
        StageId::Analysis => analysis_prompt(snippet, language),
        StageId::TestCases => test_cases_prompt(snippet, upstream, language),
        StageId::TestCode => test_code_prompt(snippet, upstream, language),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ADD: &str = "// Add returns a + b\nfunc Add(a, b int) int { return a + b }";

    #[test]
    fn test_stage_temperatures() {
        let go = TargetLanguage::default();
        assert_eq!(analysis_prompt(ADD, &go).temperature, 0.3);
        assert_eq!(test_cases_prompt(ADD, "a", &go).temperature, 0.4);
        assert_eq!(test_code_prompt(ADD, "c", &go).temperature, 0.2);
        for stage in StageId::ALL {
            let t = default_temperature(stage);
            assert!((0.0..=1.0).contains(&t));
        }
    }

    #[test]
    fn test_analysis_prompt_wraps_snippet() {
        let prompt = analysis_prompt(ADD, &TargetLanguage::default());
        assert_eq!(prompt.stage, StageId::Analysis);
        assert!(prompt.system.contains("specialized in Go"));
        assert!(prompt.user.contains(&format!("<source_code>\n{ADD}\n</source_code>")));
        assert!(prompt.user.contains("edge cases or error conditions"));
    }

    #[test]
    fn test_case_prompt_mentions_positive_zero_error() {
        let prompt = test_cases_prompt(ADD, "ANALYSIS", &TargetLanguage::default());
        assert!(prompt.system.contains("quality assurance expert"));
        assert!(prompt.user.contains("<analysis>\nANALYSIS\n</analysis>"));
        assert!(prompt.user.contains("positive cases, zero cases"));
        assert!(prompt.user.contains(ADD));
    }

    #[test]
    fn test_code_prompt_uses_language_convention() {
        let go = test_code_prompt(ADD, "CASES", &TargetLanguage::default());
        assert!(go.system.contains("'testing' package"));
        assert!(go.system.contains("`main` package"));
        assert!(go.user.contains("<test_cases>\nCASES\n</test_cases>"));

        let python = TargetLanguage::from_name("python");
        let py = test_code_prompt("def add(a, b): return a + b", "CASES", &python);
        assert!(py.system.contains("pytest"));
        assert!(py.user.contains("write Python test code"));
    }

    #[test]
    fn test_upstream_text_is_not_trimmed() {
        let analysis = "  leading and trailing whitespace \n\n";
        let prompt = test_cases_prompt(ADD, analysis, &TargetLanguage::default());
        assert!(prompt.user.contains(analysis));
    }

    #[test]
    fn test_with_temperature_clamps() {
        let prompt = analysis_prompt(ADD, &TargetLanguage::default());
        assert_eq!(prompt.clone().with_temperature(0.7).temperature, 0.7);
        assert_eq!(prompt.clone().with_temperature(3.0).temperature, 1.0);
        assert_eq!(prompt.clone().with_temperature(-1.0).temperature, 0.0);
        assert_eq!(prompt.with_temperature(f32::NAN).temperature, 0.3);
    }

    #[test]
    fn test_build_stage_prompt_dispatches() {
        let go = TargetLanguage::default();
        assert_eq!(
            build_stage_prompt(StageId::Analysis, ADD, "ignored", &go),
            analysis_prompt(ADD, &go)
        );
        assert_eq!(
            build_stage_prompt(StageId::TestCases, ADD, "A", &go),
            test_cases_prompt(ADD, "A", &go)
        );
        assert_eq!(
            build_stage_prompt(StageId::TestCode, ADD, "C", &go),
            test_code_prompt(ADD, "C", &go)
        );
    }

    proptest! {
        #[test]
        fn prop_prompts_are_deterministic(snippet in ".*", upstream in ".*") {
            let go = TargetLanguage::default();
            for stage in StageId::ALL {
                let first = build_stage_prompt(stage, &snippet, &upstream, &go);
                let second = build_stage_prompt(stage, &snippet, &upstream, &go);
                prop_assert_eq!(first, second);
            }
        }

        #[test]
        fn prop_upstream_is_embedded(snippet in ".*", upstream in ".*") {
            let go = TargetLanguage::default();
            let cases = test_cases_prompt(&snippet, &upstream, &go);
            prop_assert!(cases.user.contains(&upstream));
            prop_assert!(cases.user.contains(&snippet));
            let code = test_code_prompt(&snippet, &upstream, &go);
            prop_assert!(code.user.contains(&upstream));
        }
    }
}
