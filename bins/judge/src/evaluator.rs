/// Output Evaluator - Line-by-Line Comparison
///
/// **Core Responsibility:**
/// Decide whether one test run produced exactly the expected output.
///
/// **Critical Properties:**
/// - Knows nothing about compilers or processes
/// - Knows nothing about test case discovery
/// - Pure with respect to its inputs: (execution output, expected output) → status
///
/// **Comparison Rules:**
/// - Lines are split on `\n` only; a final newline does not add a line
/// - Every expected line must exist in the actual output and be byte-equal
/// - Whitespace and `\r` are significant
/// - Extra trailing lines in the actual output are a failure
/// - No numeric tolerance
use judge_common::types::{TestCase, TestResult, TestStatus};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Outcome of one build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationResult {
    pub success: bool,
    /// Executable to run; present only on success.
    pub artifact: Option<PathBuf>,
    pub stderr: String,
    pub compilation_time_ms: u64,
}

impl CompilationResult {
    pub fn success(artifact: impl Into<PathBuf>) -> Self {
        Self {
            success: true,
            artifact: Some(artifact.into()),
            stderr: String::new(),
            compilation_time_ms: 0,
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            artifact: None,
            stderr: stderr.into(),
            compilation_time_ms: 0,
        }
    }

    pub fn with_time(mut self, compilation_time_ms: u64) -> Self {
        self.compilation_time_ms = compilation_time_ms;
        self
    }
}

/// Raw outcome of one run invocation.
/// Produced by the engine, consumed by the evaluator.
#[derive(Debug, Clone)]
pub struct TestExecutionOutput {
    /// Where the program's stdout was written.
    pub output_path: PathBuf,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u64,
    pub timed_out: bool,
    pub runtime_error: bool,
}

/// Compare expected and actual output line by line.
pub fn compare_output<E: BufRead, A: BufRead>(expected: E, actual: A) -> io::Result<bool> {
    let mut actual_lines = actual.split(b'\n');

    for expected_line in expected.split(b'\n') {
        let expected_line = expected_line?;
        match actual_lines.next() {
            Some(actual_line) => {
                if actual_line? != expected_line {
                    return Ok(false);
                }
            }
            None => return Ok(false),
        }
    }

    Ok(actual_lines.next().is_none())
}

/// Compare two files with [`compare_output`].
pub fn compare_files(expected: &Path, actual: &Path) -> io::Result<bool> {
    let expected = BufReader::new(File::open(expected)?);
    let actual = BufReader::new(File::open(actual)?);
    compare_output(expected, actual)
}

/// Evaluate a single test case execution output
///
/// Runtime errors (including timeouts) take priority over comparison. The
/// output file must be read before the next run overwrites it.
pub fn evaluate_test(output: &TestExecutionOutput, test_case: &TestCase) -> TestResult {
    let status = if output.runtime_error || output.timed_out {
        TestStatus::RuntimeError
    } else {
        match compare_files(&test_case.expected_output, &output.output_path) {
            Ok(true) => TestStatus::Passed,
            Ok(false) => TestStatus::WrongAnswer,
            Err(e) => {
                warn!(
                    test_id = test_case.id,
                    expected = %test_case.expected_output.display(),
                    actual = %output.output_path.display(),
                    error = %e,
                    "Could not compare outputs"
                );
                TestStatus::WrongAnswer
            }
        }
    };

    TestResult {
        test_id: test_case.id,
        name: test_case.name.clone(),
        status,
        stderr: output.stderr.clone(),
        execution_time_ms: output.execution_time_ms,
        timed_out: output.timed_out,
    }
}
