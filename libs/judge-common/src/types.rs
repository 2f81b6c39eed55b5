use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

pub const DESCRIPTION_FILE: &str = "description.txt";
pub const TESTCASES_DIR: &str = "testcases";
pub const INPUT_EXTENSION: &str = "in";
pub const EXPECTED_EXTENSION: &str = "out";

/// A problem from the catalog. `id` is its 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: usize,
    pub title: String,
    pub base_path: PathBuf,
}

impl Problem {
    pub fn new(id: usize, title: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            title: title.into(),
            base_path: base_path.into(),
        }
    }

    pub fn description_path(&self) -> PathBuf {
        self.base_path.join(DESCRIPTION_FILE)
    }

    pub fn testcases_dir(&self) -> PathBuf {
        self.base_path.join(TESTCASES_DIR)
    }
}

/// One input/expected-output pair. `id` is the 1-based run position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: u32,
    pub name: String,
    pub input: PathBuf,
    pub expected_output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Passed,
    WrongAnswer,
    RuntimeError,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "PASSED"),
            TestStatus::WrongAnswer => write!(f, "WRONG_ANSWER"),
            TestStatus::RuntimeError => write!(f, "RUNTIME_ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: u32,
    pub name: String,
    pub status: TestStatus,
    pub stderr: String,
    pub execution_time_ms: u64,
    pub timed_out: bool,
}

/// Terminal outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    CompileError,
    RuntimeError { test_id: u32 },
    WrongAnswer { test_id: u32 },
    NoTestCases,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => write!(f, "Accepted"),
            Verdict::CompileError => write!(f, "Compile error"),
            Verdict::RuntimeError { test_id } => write!(f, "Runtime error on test case {}", test_id),
            Verdict::WrongAnswer { test_id } => write!(f, "Wrong Answer on test case {}", test_id),
            Verdict::NoTestCases => write!(f, "No test cases available"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub attempt_id: Uuid,
    pub source: PathBuf,
    pub started_at: DateTime<Utc>,
    pub verdict: Verdict,
    pub compile_output: String,
    pub results: Vec<TestResult>,
    pub total_cases: usize,
    pub elapsed_ms: u64,
}

impl EvaluationResult {
    /// True iff the build succeeded and every case passed.
    pub fn success(&self) -> bool {
        self.verdict == Verdict::Accepted
    }

    pub fn passed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == TestStatus::Passed)
            .count()
    }
}

/// The logged-in user for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
}

impl Session {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn is_admin(&self, admin_user: &str) -> bool {
        self.username == admin_user
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    NotReady,
    UserLogin,
    Ready(Session),
    Exit,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::NotReady => write!(f, "NOT READY"),
            SessionStatus::UserLogin => write!(f, "USER LOGIN"),
            SessionStatus::Ready(_) => write!(f, "READY"),
            SessionStatus::Exit => write!(f, "EXIT"),
        }
    }
}
