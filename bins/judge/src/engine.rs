/// Execution Engine - Abstraction for Building and Running Submissions
///
/// **Core Responsibility:**
/// Compile a source file into the artifact and run the artifact against one
/// test input, capturing raw output.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to build and run (local toolchain, fakes in tests)
/// - Engine does NOT compare outputs
/// - Engine does NOT decide verdicts
/// - Engine returns raw outputs for the evaluator to judge
///
/// Production uses `LocalToolchain`, which spawns the configured compiler
/// directly (no shell) and enforces a per-run wall-clock timeout.
use crate::evaluator::{CompilationResult, TestExecutionOutput};
use anyhow::{Context, Result};
use judge_common::config::ToolchainConfig;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Build/run capability the submission evaluator drives.
///
/// `Err` means the engine itself failed (could not launch, could not open
/// files); a compiler rejecting the source or a program exiting non-zero is a
/// normal result.
#[allow(async_fn_in_trait)]
pub trait ExecutionEngine {
    async fn build(&self, source: &Path) -> Result<CompilationResult>;

    async fn run(&self, artifact: &Path, input: &Path) -> Result<TestExecutionOutput>;
}

/// Compiles and runs submissions with the locally installed toolchain.
///
/// The artifact and the output file are fixed, reused locations; callers
/// must not run two attempts at once.
#[derive(Debug, Clone)]
pub struct LocalToolchain {
    config: ToolchainConfig,
}

impl LocalToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

impl ExecutionEngine for LocalToolchain {
    #[tracing::instrument(skip(self), fields(compiler = %self.config.compiler))]
    async fn build(&self, source: &Path) -> Result<CompilationResult> {
        let start_time = Instant::now();

        if !source.is_file() {
            warn!(source = %source.display(), "Source file not found");
            return Ok(CompilationResult::failure(format!(
                "Source file not found: {}",
                source.display()
            )));
        }

        let artifact = self.config.artifact();
        ensure_parent(&artifact)?;

        let args = self.config.compile_command(source);
        debug!(args = ?args, "Invoking compiler");

        let output = Command::new(&self.config.compiler)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to launch compiler '{}'", self.config.compiler))?;

        let compilation_time_ms = start_time.elapsed().as_millis() as u64;

        if output.status.success() {
            info!(
                compilation_time_ms = compilation_time_ms,
                artifact = %artifact.display(),
                "Compilation succeeded"
            );
            return Ok(CompilationResult::success(artifact).with_time(compilation_time_ms));
        }

        let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));

        warn!(
            compilation_time_ms = compilation_time_ms,
            exit_code = ?output.status.code(),
            error_preview = diagnostics.lines().next().unwrap_or(""),
            "Compilation failed"
        );

        Ok(CompilationResult::failure(diagnostics).with_time(compilation_time_ms))
    }

    #[tracing::instrument(skip(self), fields(timeout_ms = ?self.config.run_timeout_ms))]
    async fn run(&self, artifact: &Path, input: &Path) -> Result<TestExecutionOutput> {
        let output_path: PathBuf = self.config.output_path.clone();

        let stdin = File::open(input)
            .with_context(|| format!("Failed to open test input {}", input.display()))?;
        ensure_parent(&output_path)?;
        let stdout = File::create(&output_path)
            .with_context(|| format!("Failed to create output file {}", output_path.display()))?;

        let start_time = Instant::now();

        let child = Command::new(artifact)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to launch {}", artifact.display()))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let waited = match self.config.run_timeout_ms {
            Some(timeout_ms) => {
                tokio::time::timeout(Duration::from_millis(timeout_ms), child.wait_with_output())
                    .await
                    .ok()
            }
            None => Some(child.wait_with_output().await),
        };

        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        let (stderr, exit_code, timed_out, runtime_error) = match waited {
            Some(Ok(out)) => {
                let code = out.status.code();
                let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
                (stderr, code, false, !out.status.success())
            }
            Some(Err(e)) => (format!("Execution failed: {}", e), None, false, true),
            None => (String::from("[Execution timed out]"), None, true, true),
        };

        if timed_out {
            warn!(execution_time_ms = execution_time_ms, "Test execution timed out");
        } else if runtime_error {
            warn!(
                execution_time_ms = execution_time_ms,
                exit_code = ?exit_code,
                "Test execution had runtime error"
            );
        } else {
            debug!(execution_time_ms = execution_time_ms, "Test execution completed successfully");
        }

        Ok(TestExecutionOutput {
            output_path,
            stderr,
            exit_code,
            execution_time_ms,
            timed_out,
            runtime_error,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// `sh` reads its script from stdin, so each test input doubles as the
    /// program being judged.
    const SHELL: &str = "sh";

    fn input_file(dir: &Path, name: &str, script: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, script).unwrap();
        path
    }

    fn toolchain(dir: &Path, timeout_ms: Option<u64>) -> LocalToolchain {
        LocalToolchain::new(ToolchainConfig {
            compiler: "sh".to_string(),
            compile_args: vec!["{source}".to_string()],
            artifact_path: dir.join("build").join("user_program"),
            output_path: dir.join("out").join("user_output.txt"),
            run_timeout_ms: timeout_ms,
        })
    }

    #[tokio::test]
    async fn test_run_redirects_stdin_and_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "1.in", "echo hello\necho world\n");

        let engine = toolchain(dir.path(), Some(5_000));
        let output = engine.run(Path::new(SHELL), &input).await.unwrap();

        assert!(!output.runtime_error);
        assert!(!output.timed_out);
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(fs::read_to_string(&output.output_path).unwrap(), "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_run_overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let long = input_file(dir.path(), "long.in", "echo a much longer line\n");
        let short = input_file(dir.path(), "short.in", "echo x\n");

        let engine = toolchain(dir.path(), None);
        engine.run(Path::new(SHELL), &long).await.unwrap();
        let output = engine.run(Path::new(SHELL), &short).await.unwrap();

        assert_eq!(fs::read_to_string(&output.output_path).unwrap(), "x\n");
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_is_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "1.in", "echo boom >&2\nexit 3\n");

        let output = toolchain(dir.path(), Some(5_000))
            .run(Path::new(SHELL), &input)
            .await
            .unwrap();

        assert!(output.runtime_error);
        assert_eq!(output.exit_code, Some(3));
        assert!(output.stderr.contains("boom"));
    }

    #[tokio::test]
    async fn test_run_timeout_kills_program() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "1.in", "sleep 5\n");

        let output = toolchain(dir.path(), Some(200))
            .run(Path::new(SHELL), &input)
            .await
            .unwrap();

        assert!(output.timed_out);
        assert!(output.runtime_error);
        assert!(output.execution_time_ms < 5_000);
    }

    #[tokio::test]
    async fn test_run_missing_input_is_engine_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = toolchain(dir.path(), None)
            .run(Path::new(SHELL), &dir.path().join("nope.in"))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_build_missing_source_fails_without_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = toolchain(dir.path(), None)
            .build(&dir.path().join("missing.cpp"))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.artifact.is_none());
        assert!(result.stderr.contains("Source file not found"));
    }

    #[tokio::test]
    async fn test_build_reports_compiler_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let engine = toolchain(dir.path(), None);

        // `sh <source>` stands in for the compiler.
        let good = dir.path().join("good.sh");
        fs::write(&good, "exit 0\n").unwrap();
        let bad = dir.path().join("bad.sh");
        fs::write(&bad, "echo 'error: expected ;' >&2\nexit 1\n").unwrap();

        let ok = engine.build(&good).await.unwrap();
        assert!(ok.success);
        assert_eq!(ok.artifact, Some(dir.path().join("build").join("user_program")));
        assert!(dir.path().join("build").is_dir());

        let failed = engine.build(&bad).await.unwrap();
        assert!(!failed.success);
        assert!(failed.stderr.contains("expected ;"));
    }

    #[tokio::test]
    async fn test_build_unknown_compiler_is_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.cpp");
        fs::write(&source, "int main() {}").unwrap();

        let mut config = toolchain(dir.path(), None).config;
        config.compiler = "definitely-not-a-compiler-xyz".to_string();

        assert!(LocalToolchain::new(config).build(&source).await.is_err());
    }
}
