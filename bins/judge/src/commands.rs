// Judge commands shared by the interactive session and the command line
use crate::console::{Console, Terminal};
use crate::engine::{ExecutionEngine, LocalToolchain};
use crate::executor::{evaluate_submission, Progress};
use crate::locator::locate;
use anyhow::{Context, Result};
use judge_common::catalog::ProblemCatalog;
use judge_common::config::{JudgeConfig, DEFAULT_CONFIG_PATH};
use judge_common::types::{
    EvaluationResult, Problem, TestCase, TestStatus, Verdict, INPUT_EXTENSION, EXPECTED_EXTENSION,
    DESCRIPTION_FILE, TESTCASES_DIR,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Answer to the source prompt that starts authoring a new file.
pub const NEW_SOURCE_SENTINEL: &str = "-1";

pub fn print_problem_list<T: Terminal>(
    console: &mut T,
    catalog: &ProblemCatalog,
) -> Result<()> {
    if catalog.is_empty() {
        console.warn("No problems available.")?;
        return Ok(());
    }

    console.info("Problem list:")?;
    for problem in catalog.problems() {
        console.println(format!("  {}. {}", problem.id, problem.title))?;
    }
    Ok(())
}

pub fn show_description<T: Terminal>(
    console: &mut T,
    problem: &Problem,
) -> Result<()> {
    console.info(format!("[{}] {}", problem.id, problem.title))?;
    match fs::read_to_string(problem.description_path()) {
        Ok(description) => console.println(description.trim_end())?,
        Err(e) => {
            warn!(
                problem = problem.id,
                path = %problem.description_path().display(),
                error = %e,
                "Description not readable"
            );
            console.warn("Description not available.")?;
        }
    }
    Ok(())
}

/// Ask for a 1-based problem id until it names a catalog entry.
pub fn select_problem<'a, T: Terminal>(
    console: &mut T,
    catalog: &'a ProblemCatalog,
) -> Result<&'a Problem> {
    loop {
        let answer = console.input("Enter problem number")?;
        match answer.trim().parse::<usize>().ok().and_then(|id| catalog.get(id)) {
            Some(problem) => return Ok(problem),
            None => console.warn(format!(
                "Invalid problem number. Choose between 1 and {}.",
                catalog.len()
            ))?,
        }
    }
}

/// Ask which source file to submit, or author a new one under `program_dir`.
pub fn choose_source<T: Terminal>(
    console: &mut T,
    program_dir: &Path,
) -> Result<PathBuf> {
    loop {
        let answer = console.input(&format!(
            "Enter code file name in {} (or {} to write new code)",
            program_dir.display(),
            NEW_SOURCE_SENTINEL
        ))?;
        let answer = answer.trim();

        if answer == NEW_SOURCE_SENTINEL {
            return write_new_source(console, program_dir);
        }
        if answer.is_empty() {
            continue;
        }

        let source = program_dir.join(answer);
        if source.is_file() {
            return Ok(source);
        }
        console.warn(format!("File not found: {}", source.display()))?;
    }
}

fn write_new_source<T: Terminal>(
    console: &mut T,
    program_dir: &Path,
) -> Result<PathBuf> {
    let name = loop {
        let name = console.input("Enter new file name (e.g. solution.cpp)")?;
        let name = name.trim();
        if !name.is_empty() && !name.contains(['/', '\\']) {
            break name.to_string();
        }
        console.warn("Invalid file name.")?;
    };

    console.info("Enter your code. Finish with a line containing only '.':")?;
    let code = console.read_block()?;

    fs::create_dir_all(program_dir)
        .with_context(|| format!("Failed to create directory {}", program_dir.display()))?;
    let source = program_dir.join(name);
    fs::write(&source, code).with_context(|| format!("Failed to write {}", source.display()))?;

    info!(source = %source.display(), "New source file written");
    console.success(format!("Saved {}", source.display()))?;
    Ok(source)
}

fn report_progress<T: Terminal>(
    console: &mut T,
    event: Progress<'_>,
) -> Result<()> {
    match event {
        Progress::Compiling => console.info("Compiling..."),
        Progress::CompileFailed { diagnostics } if !diagnostics.trim().is_empty() => {
            console.println(diagnostics.trim_end())
        }
        Progress::CompileFailed { .. } => Ok(()),
        Progress::Running(test_case) => console.println(format!("Running test case {}...", test_case.id)),
        Progress::Finished(result) => match result.status {
            TestStatus::Passed => console.success(format!(
                "Test case {}: {} ({} ms)",
                result.test_id, result.status, result.execution_time_ms
            )),
            _ => console.error(format!(
                "Test case {}: {} ({} ms)",
                result.test_id, result.status, result.execution_time_ms
            )),
        },
    }
}

pub fn report_verdict<T: Terminal>(
    console: &mut T,
    result: &EvaluationResult,
) -> Result<()> {
    match result.verdict {
        Verdict::Accepted => console.success(format!(
            "Accepted! {}/{} test cases passed ({} ms)",
            result.passed_count(),
            result.total_cases,
            result.elapsed_ms
        )),
        Verdict::RuntimeError { .. } => {
            console.error(result.verdict)?;
            if let Some(stderr) = result.results.last().map(|r| r.stderr.trim_end()) {
                if !stderr.is_empty() {
                    console.println(stderr)?;
                }
            }
            Ok(())
        }
        _ => console.error(result.verdict),
    }
}

/// Submit against a problem until the user accepts the outcome.
///
/// Test cases are located once; each retry rebuilds from a freshly chosen
/// source. Returns `None` when the problem has no usable test cases.
pub async fn submit_problem<E, T>(
    console: &mut T,
    engine: &E,
    problem: &Problem,
    program_dir: &Path,
) -> Result<Option<EvaluationResult>>
where
    E: ExecutionEngine,
    T: Terminal,
{
    let test_cases = match locate(problem) {
        Ok(test_cases) => test_cases,
        Err(e) if e.is_not_found() => {
            warn!(problem = problem.id, error = %e, "Cannot submit");
            console.error(format!("Testcases not found for problem '{}'.", problem.title))?;
            return Ok(None);
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to locate testcases for '{}'", problem.title))
        }
    };

    loop {
        let source = choose_source(console, program_dir)?;
        let result = run_attempt(console, engine, &source, &test_cases).await?;

        if result.success() || !console.confirm("Retry?")? {
            return Ok(Some(result));
        }
    }
}

async fn run_attempt<E, T>(
    console: &mut T,
    engine: &E,
    source: &Path,
    test_cases: &[TestCase],
) -> Result<EvaluationResult>
where
    E: ExecutionEngine,
    T: Terminal,
{
    let mut console_error = None;
    let result = evaluate_submission(engine, source, test_cases, |event| {
        if console_error.is_none() {
            console_error = report_progress(console, event).err();
        }
    })
    .await;

    if let Some(e) = console_error {
        return Err(e);
    }

    report_verdict(console, &result)?;
    Ok(result)
}

/// Create a new problem bundle and add it to the catalog.
pub fn add_problem<T: Terminal>(
    console: &mut T,
    catalog: &mut ProblemCatalog,
    problem_root: &Path,
) -> Result<()> {
    let title = loop {
        let title = console.input("Enter problem title")?;
        let title = title.trim().to_string();
        if title.is_empty() {
            console.warn("Title cannot be empty.")?;
        } else if title.contains(',') {
            console.warn("Title cannot contain ','.")?;
        } else if title.contains(['/', '\\']) || title.contains("..") {
            console.warn("Title cannot contain '/', '\\' or '..'.")?;
        } else {
            break title;
        }
    };

    let base_path = problem_root.join(title.replace(' ', "-"));
    if base_path.exists() {
        console.error(format!("Problem folder already exists: {}", base_path.display()))?;
        return Ok(());
    }

    console.info("Enter problem description. Finish with a line containing only '.':")?;
    let description = console.read_block()?;

    let count = loop {
        let answer = console.input("Enter number of test cases")?;
        match answer.trim().parse::<u32>() {
            Ok(count) if count > 0 => break count,
            _ => console.warn("Please enter a positive number.")?,
        }
    };

    let testcases_dir = base_path.join(TESTCASES_DIR);
    fs::create_dir_all(&testcases_dir)
        .with_context(|| format!("Failed to create directory {}", testcases_dir.display()))?;
    fs::write(base_path.join(DESCRIPTION_FILE), description)
        .with_context(|| format!("Failed to write description for '{}'", title))?;

    for i in 1..=count {
        console.info(format!(
            "Test case {} input. Finish with a line containing only '.':",
            i
        ))?;
        let input = console.read_block()?;
        console.info(format!(
            "Test case {} expected output. Finish with a line containing only '.':",
            i
        ))?;
        let expected = console.read_block()?;

        let input_path = testcases_dir.join(format!("{}.{}", i, INPUT_EXTENSION));
        fs::write(&input_path, input)
            .with_context(|| format!("Failed to write {}", input_path.display()))?;
        let expected_path = testcases_dir.join(format!("{}.{}", i, EXPECTED_EXTENSION));
        fs::write(&expected_path, expected)
            .with_context(|| format!("Failed to write {}", expected_path.display()))?;
    }

    match catalog.append(&title, &base_path) {
        Ok(problem) => {
            let message = format!("Problem '{}' added as #{}.", problem.title, problem.id);
            console.success(message)?;
        }
        Err(e) => {
            error!(title = %title, error = %e, "Failed to record problem");
            console.error(format!("Failed to save problem: {}", e))?;
        }
    }

    Ok(())
}

/// Initialize a judge data directory
pub fn init_project(path: &Path) -> Result<()> {
    println!("🚀 Initializing judge data at: {}", path.display());

    let config = JudgeConfig::default();

    let dirs = [
        config.program_dir.clone(),
        config.problem_root.clone(),
        config
            .toolchain
            .artifact_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    ];

    for dir in dirs.iter().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(path.join(dir))
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        println!("  ✅ Created: {}", dir.display());
    }

    let config_path = path.join(DEFAULT_CONFIG_PATH);
    if !config_path.exists() {
        config.save(&config_path)?;
        println!("  ✅ Created: {}", DEFAULT_CONFIG_PATH);
    }

    for data_file in [&config.user_data_path, &config.problem_data_path] {
        let file_path = path.join(data_file);
        if !file_path.exists() {
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&file_path, "")
                .with_context(|| format!("Failed to create {}", data_file.display()))?;
            println!("  ✅ Created: {}", data_file.display());
        }
    }

    println!("✅ Judge data initialized successfully!");
    println!("\n📋 Next steps:");
    println!("  1. Start the judge: judge");
    println!("  2. Sign up, or log in as '{}' to add problems", config.admin_user);

    Ok(())
}

/// Print the catalog to stdout
pub fn list_problems(catalog: &ProblemCatalog) {
    if catalog.is_empty() {
        println!("No problems available.");
        return;
    }
    for problem in catalog.problems() {
        println!("{:>3}. {}  ({})", problem.id, problem.title, problem.base_path.display());
    }
}

/// One non-interactive attempt. Returns whether the verdict was Accepted.
pub async fn submit_once(
    config: &JudgeConfig,
    catalog: &ProblemCatalog,
    problem_id: usize,
    source: &Path,
    json: bool,
) -> Result<bool> {
    let problem = catalog
        .get(problem_id)
        .with_context(|| format!("Problem {} not found", problem_id))?;

    let test_cases = locate(problem)
        .with_context(|| format!("Testcases not found for problem '{}'", problem.title))?;

    let engine = LocalToolchain::new(config.toolchain.clone());
    let result = evaluate_submission(&engine, source, &test_cases, |_| {}).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let mut console = Console::new(io::stdin().lock(), io::stdout());
        console.info(format!("[{}] {}", problem.id, problem.title))?;
        if result.verdict == Verdict::CompileError {
            console.println(result.compile_output.trim_end())?;
        }
        for test in &result.results {
            let line = format!(
                "Test case {} ({}): {} ({} ms)",
                test.test_id, test.name, test.status, test.execution_time_ms
            );
            if test.status == TestStatus::Passed {
                console.success(line)?;
            } else {
                console.error(line)?;
            }
        }
        report_verdict(&mut console, &result)?;
    }

    Ok(result.success())
}
