use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stage identifiers for the test generation chain.
///
/// `StageId` names the three steps of the chain. Stages always execute in the
/// same order, and each stage consumes the output of the one before it.
///
/// # Stage Order
///
/// ```text
/// Analysis → TestCases → TestCode
/// ```
///
/// # Example
///
/// ```rust
/// use testforge_utils::types::StageId;
///
/// let stage = StageId::Analysis;
/// assert_eq!(stage.as_str(), "analysis");
/// assert_eq!(stage.next(), Some(StageId::TestCases));
/// ```
///
/// # Serialization
///
/// `StageId` serializes to its snake_case name (e.g., `"test_cases"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Analysis stage: describes purpose, inputs, outputs and edge cases of the snippet.
    Analysis,
    /// Test-case stage: turns the analysis into a list of distinct test cases.
    TestCases,
    /// Test-code stage: turns the test cases into executable test code.
    TestCode,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [StageId; 3] = [Self::Analysis, Self::TestCases, Self::TestCode];

    /// Returns the canonical snake_case name used in config keys, logs and JSON.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::TestCases => "test_cases",
            Self::TestCode => "test_code",
        }
    }

    /// Zero-based position in the chain.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Analysis => 0,
            Self::TestCases => 1,
            Self::TestCode => 2,
        }
    }

    /// The stage that runs after this one, if any.
    #[must_use]
    pub const fn next(&self) -> Option<StageId> {
        match self {
            Self::Analysis => Some(Self::TestCases),
            Self::TestCases => Some(Self::TestCode),
            Self::TestCode => None,
        }
    }

    /// Short human-readable label shown while the stage is running.
    #[must_use]
    pub const fn progress_label(&self) -> &'static str {
        match self {
            Self::Analysis => "Analyzing source code",
            Self::TestCases => "Generating test cases",
            Self::TestCode => "Generating test code",
        }
    }

    /// Prefix for the single error message recorded when this stage fails.
    #[must_use]
    pub const fn failure_label(&self) -> &'static str {
        match self {
            Self::Analysis => "Failed to perform code analysis",
            Self::TestCases => "Failed to generate test cases",
            Self::TestCode => "Failed to generate test code",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "analysis" => Ok(Self::Analysis),
            "test_cases" | "cases" => Ok(Self::TestCases),
            "test_code" | "code" => Ok(Self::TestCode),
            other => Err(format!(
                "Unknown stage '{other}'. Available stages: analysis, test_cases, test_code"
            )),
        }
    }
}

/// Source of a configuration value.
///
/// Indicates where a configuration value originated from in the precedence chain:
/// CLI arguments > environment > config file > programmatic overrides > built-in defaults.
///
/// Serializes to lowercase strings: `"cli"`, `"env"`, `"config"`, `"programmatic"`, `"default"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value read from a `TESTFORGE_*` environment variable.
    Env,
    /// Value loaded from configuration file.
    Config,
    /// Value provided programmatically (e.g., `Config::builder()`).
    Programmatic,
    /// Built-in default value (lowest precedence).
    Default,
}

impl ConfigSource {
    /// Stable label used in `testforge config` output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Env => "env",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
