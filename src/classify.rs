use crate::mutants::{ExecutionResult, MutantStatus};

/// Output fragments that mean the mutated code never got to run its tests.
const COMPILE_MARKERS: &[&str] = &[
    "SyntaxError",
    "IndentationError",
    "ImportError",
    "ModuleNotFoundError",
    "error[E",
    "could not compile",
];

pub fn has_compile_markers(output: &str) -> bool {
    COMPILE_MARKERS.iter().any(|m| output.contains(m))
}

/// Map the build and test results of one attempt to a terminal status.
///
/// `build` is `None` when no separate build command is configured, and
/// `test` is `None` when the build step already decided the outcome.
pub fn classify(
    build: Option<&ExecutionResult>,
    test: Option<&ExecutionResult>,
    separate_build: bool,
) -> MutantStatus {
    if build.is_some_and(|b| b.cancelled) || test.is_some_and(|t| t.cancelled) {
        return MutantStatus::Skipped;
    }
    if let Some(build) = build {
        if build.timed_out {
            return MutantStatus::TimedOut;
        }
        if !build.success() {
            return MutantStatus::Stillborn;
        }
    }
    let Some(test) = test else {
        return MutantStatus::Errored;
    };
    if test.timed_out {
        MutantStatus::TimedOut
    } else if test.success() {
        MutantStatus::Survived
    } else if !separate_build && has_compile_markers(&test.output) {
        MutantStatus::Stillborn
    } else {
        MutantStatus::Killed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(code: Option<i32>, output: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code: code,
            duration: Duration::from_millis(1),
            timed_out: false,
            cancelled: false,
            output: output.to_string(),
        }
    }

    #[test]
    fn failing_test_kills() {
        let t = result(Some(1), "AssertionError");
        assert_eq!(classify(None, Some(&t), false), MutantStatus::Killed);
    }

    #[test]
    fn passing_test_survives() {
        let t = result(Some(0), "1 passed");
        assert_eq!(classify(None, Some(&t), false), MutantStatus::Survived);
    }

    #[test]
    fn failed_build_is_stillborn() {
        let b = result(Some(101), "error[E0308]: mismatched types");
        assert_eq!(classify(Some(&b), None, true), MutantStatus::Stillborn);
    }

    #[test]
    fn syntax_error_in_single_command_is_stillborn() {
        let t = result(Some(2), "E   SyntaxError: invalid syntax");
        assert_eq!(classify(None, Some(&t), false), MutantStatus::Stillborn);
    }

    #[test]
    fn markers_ignored_with_separate_build() {
        let b = result(Some(0), "");
        let t = result(Some(1), "SyntaxError in fixture");
        assert_eq!(classify(Some(&b), Some(&t), true), MutantStatus::Killed);
    }

    #[test]
    fn timeout_and_cancel() {
        let mut t = result(None, "");
        t.timed_out = true;
        assert_eq!(classify(None, Some(&t), false), MutantStatus::TimedOut);
        t.timed_out = false;
        t.cancelled = true;
        assert_eq!(classify(None, Some(&t), false), MutantStatus::Skipped);
    }

    #[test]
    fn build_timeout_is_timed_out() {
        let mut b = result(None, "");
        b.timed_out = true;
        assert_eq!(classify(Some(&b), None, true), MutantStatus::TimedOut);
    }
}
