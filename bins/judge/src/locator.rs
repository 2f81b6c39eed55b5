/// Test Case Locator
///
/// Discovers `<name>.in` / `<name>.out` pairs under a problem's `testcases`
/// directory and orders them by input file name in byte order, so "1", "10"
/// and "2" run in that order on every platform and every call.
use judge_common::types::{Problem, TestCase, EXPECTED_EXTENSION, INPUT_EXTENSION};
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("testcases directory missing: {0}")]
    MissingDirectory(PathBuf),

    #[error("cannot read testcases directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no .in testcases found in {0}")]
    NoTestCases(PathBuf),
}

impl LocateError {
    /// Every locator failure means there is nothing to evaluate against.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LocateError::MissingDirectory(_)
                | LocateError::Unreadable { .. }
                | LocateError::NoTestCases(_)
        )
    }
}

/// Locate and order the test cases of a problem.
pub fn locate(problem: &Problem) -> Result<Vec<TestCase>, LocateError> {
    let dir = problem.testcases_dir();
    if !dir.is_dir() {
        return Err(LocateError::MissingDirectory(dir));
    }

    let entries = fs::read_dir(&dir).map_err(|source| LocateError::Unreadable {
        path: dir.clone(),
        source,
    })?;

    let mut inputs: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LocateError::Unreadable {
            path: dir.clone(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension() == Some(OsStr::new(INPUT_EXTENSION)) {
            inputs.push(path);
        }
    }

    inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut cases = Vec::with_capacity(inputs.len());
    for input in inputs {
        let expected_output = input.with_extension(EXPECTED_EXTENSION);
        if !expected_output.is_file() {
            warn!(
                problem = problem.id,
                input = %input.display(),
                "Expected output missing, skipping test case"
            );
            continue;
        }

        let name = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        cases.push(TestCase {
            id: cases.len() as u32 + 1,
            name,
            input,
            expected_output,
        });
    }

    if cases.is_empty() {
        return Err(LocateError::NoTestCases(dir));
    }

    debug!(problem = problem.id, test_cases = cases.len(), "Located test cases");
    Ok(cases)
}
