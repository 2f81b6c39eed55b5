/// Submission Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Drive one attempt: build once, then run and compare each test case in
/// order, stopping at the first case that does not pass.
///
/// **Architecture:**
/// 1. Use an `ExecutionEngine` to build and run (engine.rs)
/// 2. Use the evaluator to judge each run (evaluator.rs)
/// 3. Return an aggregated `EvaluationResult`
///
/// This module is the glue layer - it knows nothing about:
/// - How code is compiled or executed (engine's job)
/// - How outputs are compared (evaluator's job)
///
/// **Attempt state machine:**
/// ```text
/// Init -> Compiling -> CompileFailed
///                   -> NoCases
///                   -> RunningCase(1) -> CaseFailed(1)
///                                     -> RunningCase(2) -> ... -> AllPassed
/// ```
/// Only one build or run is in flight at any time, so the engine's fixed
/// artifact and output locations are never shared.
use crate::engine::ExecutionEngine;
use crate::evaluator::{evaluate_test, TestExecutionOutput};
use chrono::Utc;
use judge_common::types::{EvaluationResult, TestCase, TestResult, TestStatus, Verdict};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Position of an attempt in the state machine. Indices are 0-based
/// positions in the test case list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Init,
    Compiling,
    CompileFailed,
    NoCases,
    RunningCase(usize),
    CaseFailed(usize),
    AllPassed,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::CompileFailed
                | AttemptState::NoCases
                | AttemptState::CaseFailed(_)
                | AttemptState::AllPassed
        )
    }
}

/// Reported to the caller as the attempt advances.
#[derive(Debug, Clone, Copy)]
pub enum Progress<'a> {
    Compiling,
    CompileFailed { diagnostics: &'a str },
    Running(&'a TestCase),
    Finished(&'a TestResult),
}

/// Run one attempt of `source` against `test_cases`.
pub async fn evaluate_submission<E, F>(
    engine: &E,
    source: &Path,
    test_cases: &[TestCase],
    mut progress: F,
) -> EvaluationResult
where
    E: ExecutionEngine,
    F: FnMut(Progress<'_>),
{
    let attempt_id = Uuid::new_v4();
    let started_at = Utc::now();
    let start = Instant::now();

    info!(
        attempt_id = %attempt_id,
        source = %source.display(),
        test_count = test_cases.len(),
        "Starting attempt"
    );

    let mut state = AttemptState::Init;
    let mut artifact = PathBuf::new();
    let mut compile_output = String::new();
    let mut results: Vec<TestResult> = Vec::new();

    let verdict = loop {
        state = match state {
            AttemptState::Init => AttemptState::Compiling,

            AttemptState::Compiling => {
                progress(Progress::Compiling);
                match engine.build(source).await {
                    Ok(compilation) => {
                        compile_output = compilation.stderr;
                        match compilation.artifact {
                            Some(built) if compilation.success => {
                                artifact = built;
                                if test_cases.is_empty() {
                                    AttemptState::NoCases
                                } else {
                                    AttemptState::RunningCase(0)
                                }
                            }
                            _ => AttemptState::CompileFailed,
                        }
                    }
                    Err(e) => {
                        error!(attempt_id = %attempt_id, error = %e, "Compilation process failed");
                        compile_output = format!("Compilation process error: {:#}", e);
                        AttemptState::CompileFailed
                    }
                }
            }

            AttemptState::RunningCase(idx) => {
                let test_case = &test_cases[idx];
                progress(Progress::Running(test_case));

                let output = match engine.run(&artifact, &test_case.input).await {
                    Ok(output) => output,
                    Err(e) => {
                        error!(attempt_id = %attempt_id, test_id = test_case.id, error = %e, "Execution error");
                        TestExecutionOutput {
                            output_path: PathBuf::new(),
                            stderr: format!("Execution error: {:#}", e),
                            exit_code: None,
                            execution_time_ms: 0,
                            timed_out: false,
                            runtime_error: true,
                        }
                    }
                };

                let result = evaluate_test(&output, test_case);
                progress(Progress::Finished(&result));

                let passed = result.status == TestStatus::Passed;
                results.push(result);

                if !passed {
                    AttemptState::CaseFailed(idx)
                } else if idx + 1 < test_cases.len() {
                    AttemptState::RunningCase(idx + 1)
                } else {
                    AttemptState::AllPassed
                }
            }

            AttemptState::CompileFailed => {
                progress(Progress::CompileFailed {
                    diagnostics: &compile_output,
                });
                break Verdict::CompileError;
            }
            AttemptState::NoCases => break Verdict::NoTestCases,
            AttemptState::AllPassed => break Verdict::Accepted,
            AttemptState::CaseFailed(idx) => {
                let test_id = test_cases[idx].id;
                match results.last().map(|r| r.status) {
                    Some(TestStatus::RuntimeError) => break Verdict::RuntimeError { test_id },
                    _ => break Verdict::WrongAnswer { test_id },
                }
            }
        };

        debug!(attempt_id = %attempt_id, state = ?state, "Attempt transition");
    };

    debug_assert!(state.is_terminal());
    let elapsed_ms = start.elapsed().as_millis() as u64;

    info!(
        attempt_id = %attempt_id,
        verdict = %verdict,
        passed = results.iter().filter(|r| r.status == TestStatus::Passed).count(),
        total = test_cases.len(),
        elapsed_ms = elapsed_ms,
        "Attempt finished"
    );

    EvaluationResult {
        attempt_id,
        source: source.to_path_buf(),
        started_at,
        verdict,
        compile_output,
        results,
        total_cases: test_cases.len(),
        elapsed_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::CompilationResult;
    use anyhow::{bail, Result};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;

    /// What the fake program does for one test input
    #[derive(Clone)]
    enum Behavior {
        Print(&'static str),
        Crash,
        Hang,
    }

    /// Engine double: no processes, scripted per input file name
    struct FakeEngine {
        compiles: bool,
        build_error: bool,
        behaviors: HashMap<String, Behavior>,
        output_path: PathBuf,
        builds: RefCell<usize>,
        runs: RefCell<Vec<String>>,
    }

    impl FakeEngine {
        fn new(dir: &Path, behaviors: &[(&str, Behavior)]) -> Self {
            Self {
                compiles: true,
                build_error: false,
                behaviors: behaviors
                    .iter()
                    .map(|(name, b)| (name.to_string(), b.clone()))
                    .collect(),
                output_path: dir.join("user_output.txt"),
                builds: RefCell::new(0),
                runs: RefCell::new(Vec::new()),
            }
        }

        fn run_count(&self) -> usize {
            self.runs.borrow().len()
        }
    }

    impl ExecutionEngine for FakeEngine {
        async fn build(&self, _source: &Path) -> Result<CompilationResult> {
            *self.builds.borrow_mut() += 1;
            if self.build_error {
                bail!("compiler missing");
            }
            if self.compiles {
                Ok(CompilationResult::success("build/user_program"))
            } else {
                Ok(CompilationResult::failure("main.cpp:1: error: expected ';'"))
            }
        }

        async fn run(&self, artifact: &Path, input: &Path) -> Result<TestExecutionOutput> {
            assert_eq!(artifact, Path::new("build/user_program"));
            let name = input.file_stem().unwrap().to_string_lossy().into_owned();
            self.runs.borrow_mut().push(name.clone());

            let mut output = TestExecutionOutput {
                output_path: self.output_path.clone(),
                stderr: String::new(),
                exit_code: Some(0),
                execution_time_ms: 1,
                timed_out: false,
                runtime_error: false,
            };

            match self.behaviors.get(&name).cloned().unwrap_or(Behavior::Crash) {
                Behavior::Print(text) => fs::write(&self.output_path, text)?,
                Behavior::Crash => {
                    output.exit_code = Some(1);
                    output.runtime_error = true;
                }
                Behavior::Hang => {
                    output.exit_code = None;
                    output.timed_out = true;
                    output.runtime_error = true;
                }
            }
            Ok(output)
        }
    }

    /// Create test cases named `names` whose expected output is `name * 2`
    fn make_cases(dir: &Path, names: &[&str]) -> Vec<TestCase> {
        names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let input = dir.join(format!("{}.in", name));
                let expected_output = dir.join(format!("{}.out", name));
                fs::write(&input, name).unwrap();
                fs::write(&expected_output, format!("{}{}\n", name, name)).unwrap();
                TestCase {
                    id: idx as u32 + 1,
                    name: name.to_string(),
                    input,
                    expected_output,
                }
            })
            .collect()
    }

    fn statuses(result: &EvaluationResult) -> Vec<TestStatus> {
        result.results.iter().map(|r| r.status).collect()
    }

    #[tokio::test]
    async fn test_compile_failure_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cases = make_cases(dir.path(), &["1", "2"]);
        let mut engine = FakeEngine::new(dir.path(), &[("1", Behavior::Print("11\n"))]);
        engine.compiles = false;

        let result = evaluate_submission(&engine, Path::new("a.cpp"), &cases, |_| {}).await;

        assert_eq!(result.verdict, Verdict::CompileError);
        assert!(!result.success());
        assert!(result.results.is_empty());
        assert_eq!(engine.run_count(), 0);
        assert!(result.compile_output.contains("expected ';'"));
    }

    #[tokio::test]
    async fn test_engine_build_error_is_compile_error() {
        let dir = tempfile::tempdir().unwrap();
        let cases = make_cases(dir.path(), &["1"]);
        let mut engine = FakeEngine::new(dir.path(), &[]);
        engine.build_error = true;

        let result = evaluate_submission(&engine, Path::new("a.cpp"), &cases, |_| {}).await;

        assert_eq!(result.verdict, Verdict::CompileError);
        assert!(result.compile_output.contains("compiler missing"));
        assert_eq!(engine.run_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_answer_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let cases = make_cases(dir.path(), &["1", "2", "3"]);
        let engine = FakeEngine::new(
            dir.path(),
            &[
                ("1", Behavior::Print("11\n")),
                ("2", Behavior::Print("wrong\n")),
                ("3", Behavior::Print("33\n")),
            ],
        );

        let result = evaluate_submission(&engine, Path::new("a.cpp"), &cases, |_| {}).await;

        assert_eq!(result.verdict, Verdict::WrongAnswer { test_id: 2 });
        assert_eq!(statuses(&result), vec![TestStatus::Passed, TestStatus::WrongAnswer]);
        assert_eq!(engine.run_count(), 2);
        assert_eq!(*engine.runs.borrow(), vec!["1", "2"]);
        assert!(!result.success());
        assert_eq!(result.total_cases, 3);
    }

    #[tokio::test]
    async fn test_runtime_error_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let cases = make_cases(dir.path(), &["1", "2", "3", "4"]);
        let engine = FakeEngine::new(
            dir.path(),
            &[("1", Behavior::Crash), ("2", Behavior::Print("22\n"))],
        );

        let result = evaluate_submission(&engine, Path::new("a.cpp"), &cases, |_| {}).await;

        assert_eq!(result.verdict, Verdict::RuntimeError { test_id: 1 });
        assert_eq!(statuses(&result), vec![TestStatus::RuntimeError]);
        assert_eq!(engine.run_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_reported_as_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let cases = make_cases(dir.path(), &["1", "2"]);
        let engine = FakeEngine::new(
            dir.path(),
            &[("1", Behavior::Print("11\n")), ("2", Behavior::Hang)],
        );

        let result = evaluate_submission(&engine, Path::new("a.cpp"), &cases, |_| {}).await;

        assert_eq!(result.verdict, Verdict::RuntimeError { test_id: 2 });
        assert!(result.results[1].timed_out);
    }

    #[tokio::test]
    async fn test_all_cases_pass_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let cases = make_cases(dir.path(), &["1", "10", "2"]);
        let engine = FakeEngine::new(
            dir.path(),
            &[
                ("1", Behavior::Print("11\n")),
                ("10", Behavior::Print("1010\n")),
                ("2", Behavior::Print("22")),
            ],
        );

        let result = evaluate_submission(&engine, Path::new("a.cpp"), &cases, |_| {}).await;

        assert!(result.success());
        assert_eq!(result.verdict, Verdict::Accepted);
        assert_eq!(statuses(&result), vec![TestStatus::Passed; 3]);
        assert_eq!(
            result.results.iter().map(|r| r.test_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(*engine.runs.borrow(), vec!["1", "10", "2"]);
        assert_eq!(*engine.builds.borrow(), 1);
        assert_eq!(result.passed_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_case_list_is_distinct_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new(dir.path(), &[]);

        let result = evaluate_submission(&engine, Path::new("a.cpp"), &[], |_| {}).await;

        assert_eq!(result.verdict, Verdict::NoTestCases);
        assert!(!result.success());
        assert_eq!(engine.run_count(), 0);
    }

    #[tokio::test]
    async fn test_engine_run_error_is_runtime_error() {
        struct BrokenRunner;

        impl ExecutionEngine for BrokenRunner {
            async fn build(&self, _source: &Path) -> Result<CompilationResult> {
                Ok(CompilationResult::success("prog"))
            }

            async fn run(&self, _artifact: &Path, _input: &Path) -> Result<TestExecutionOutput> {
                bail!("cannot open input")
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let cases = make_cases(dir.path(), &["1"]);

        let result = evaluate_submission(&BrokenRunner, Path::new("a.cpp"), &cases, |_| {}).await;

        assert_eq!(result.verdict, Verdict::RuntimeError { test_id: 1 });
        assert!(result.results[0].stderr.contains("cannot open input"));
    }

    #[tokio::test]
    async fn test_progress_events_follow_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let cases = make_cases(dir.path(), &["1", "2"]);
        let engine = FakeEngine::new(
            dir.path(),
            &[("1", Behavior::Print("11\n")), ("2", Behavior::Print("x\n"))],
        );

        let mut events = Vec::new();
        evaluate_submission(&engine, Path::new("a.cpp"), &cases, |event| {
            events.push(match event {
                Progress::Compiling => "compiling".to_string(),
                Progress::CompileFailed { .. } => "compile-failed".to_string(),
                Progress::Running(tc) => format!("running {}", tc.id),
                Progress::Finished(r) => format!("{} {}", r.test_id, r.status),
            })
        })
        .await;

        assert_eq!(
            events,
            vec!["compiling", "running 1", "1 PASSED", "running 2", "2 WRONG_ANSWER"]
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AttemptState::Init.is_terminal());
        assert!(!AttemptState::Compiling.is_terminal());
        assert!(!AttemptState::RunningCase(0).is_terminal());
        assert!(AttemptState::CompileFailed.is_terminal());
        assert!(AttemptState::NoCases.is_terminal());
        assert!(AttemptState::CaseFailed(2).is_terminal());
        assert!(AttemptState::AllPassed.is_terminal());
    }
}
