//! Exit codes for the testforge CLI

/// CLI exit code.
///
/// A newtype so that library code can describe how the binary should exit
/// without calling `std::process::exit()` itself.
///
/// # Example
///
/// ```rust
/// use testforge_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::CHAIN_FAILED.as_i32(), 70);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - all three stages completed
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments, configuration or input error
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// A backend could not be used at all (raised outside a chain run)
    pub const BACKEND_FAILURE: ExitCode = ExitCode(70);

    /// The chain ran but stopped at a failed stage
    pub const CHAIN_FAILED: ExitCode = ExitCode(70);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CLI_ARGS.as_i32(), 2);
        assert_eq!(ExitCode::CHAIN_FAILED.as_i32(), 70);
    }

    #[test]
    fn test_exit_code_conversions() {
        let code: ExitCode = 2.into();
        assert_eq!(code, ExitCode::CLI_ARGS);
        let raw: i32 = ExitCode::CHAIN_FAILED.into();
        assert_eq!(raw, 70);
        assert_eq!(ExitCode::from_i32(1), ExitCode::INTERNAL);
    }
}
