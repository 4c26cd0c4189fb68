use std::fmt;

/// Language the generated test code is written in.
///
/// Known languages carry a description of their standard testing conventions;
/// any other name falls back to a generic instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLanguage {
    name: String,
    display_name: String,
    test_convention: String,
    notes: Option<&'static str>,
}

impl TargetLanguage {
    /// Resolve a language by name (case-insensitive, common aliases accepted).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let key = name.trim().to_ascii_lowercase();
        match key.as_str() {
            "go" | "golang" => Self::preset(
                "go",
                "Go",
                "the standard 'testing' package, preferring table-driven tests and t.Run subtests",
                Some(
                    "Ensure correct error and panic handling assertions. Assume the function is part of a `main` package unless the code declares another package.",
                ),
            ),
            "rust" | "rs" => Self::preset(
                "rust",
                "Rust",
                "a #[cfg(test)] mod tests block with #[test] functions, assert_eq! and #[should_panic] where a panic is expected",
                Some("Call the function through `use super::*;` rather than redefining it."),
            ),
            "python" | "py" => Self::preset(
                "python",
                "Python",
                "pytest test functions, using pytest.raises for expected exceptions and pytest.mark.parametrize for tables",
                None,
            ),
            "typescript" | "ts" => Self::preset(
                "typescript",
                "TypeScript",
                "Jest describe/it blocks with expect assertions and toThrow for expected errors",
                None,
            ),
            "javascript" | "js" => Self::preset(
                "javascript",
                "JavaScript",
                "Jest describe/it blocks with expect assertions and toThrow for expected errors",
                None,
            ),
            "java" => Self::preset(
                "java",
                "Java",
                "JUnit 5 with @Test methods and assertThrows for expected exceptions",
                None,
            ),
            _ => Self {
                display_name: name.trim().to_string(),
                name: key,
                test_convention: "the language's standard testing framework".to_string(),
                notes: None,
            },
        }
    }

    fn preset(
        name: &str,
        display_name: &str,
        test_convention: &str,
        notes: Option<&'static str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            test_convention: test_convention.to_string(),
            notes,
        }
    }

    /// Canonical lowercase name (`"go"`, `"rust"`, ...).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name as it appears in prompts (`"Go"`, `"TypeScript"`, ...).
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn test_convention(&self) -> &str {
        &self.test_convention
    }

    /// Extra instructions for the test-code stage, if the language has any.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes
    }

    /// Whether this language has a built-in preset.
    #[must_use]
    pub fn is_known(&self) -> bool {
        KNOWN_LANGUAGES.contains(&self.name.as_str())
    }
}

/// Languages with built-in testing conventions.
pub const KNOWN_LANGUAGES: [&str; 6] = ["go", "rust", "python", "typescript", "javascript", "java"];

impl Default for TargetLanguage {
    fn default() -> Self {
        Self::from_name("go")
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}
