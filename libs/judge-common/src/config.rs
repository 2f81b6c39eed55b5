// Judge configuration: data locations and the toolchain command template
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/judge.json";
pub const CONFIG_ENV_VAR: &str = "JUDGE_CONFIG";

pub const SOURCE_PLACEHOLDER: &str = "{source}";
pub const ARTIFACT_PLACEHOLDER: &str = "{artifact}";

/// How submissions are compiled and run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub compiler: String,
    /// Compiler arguments; `{source}` and `{artifact}` are substituted.
    pub compile_args: Vec<String>,
    /// Artifact location without the platform executable suffix.
    pub artifact_path: PathBuf,
    pub output_path: PathBuf,
    /// Wall-clock limit per test run. `None` waits indefinitely.
    pub run_timeout_ms: Option<u64>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: "g++".to_string(),
            compile_args: vec![
                SOURCE_PLACEHOLDER.to_string(),
                "-o".to_string(),
                ARTIFACT_PLACEHOLDER.to_string(),
            ],
            artifact_path: PathBuf::from("build/user_program"),
            output_path: PathBuf::from("data/user/user_output.txt"),
            run_timeout_ms: Some(10_000),
        }
    }
}

impl ToolchainConfig {
    /// Artifact path with the platform executable suffix (".exe" on Windows).
    pub fn artifact(&self) -> PathBuf {
        let suffix = std::env::consts::EXE_SUFFIX;
        if suffix.is_empty() {
            return self.artifact_path.clone();
        }
        let mut name = self.artifact_path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Expand the compile argument template for one source file.
    pub fn compile_command(&self, source: &Path) -> Vec<String> {
        let source = source.to_string_lossy();
        let artifact = self.artifact();
        let artifact = artifact.to_string_lossy();
        self.compile_args
            .iter()
            .map(|arg| {
                arg.replace(SOURCE_PLACEHOLDER, &source)
                    .replace(ARTIFACT_PLACEHOLDER, &artifact)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub user_data_path: PathBuf,
    pub problem_data_path: PathBuf,
    /// Where new problem bundles are created.
    pub problem_root: PathBuf,
    /// Where submitted source files live.
    pub program_dir: PathBuf,
    pub version: String,
    pub admin_user: String,
    pub max_password_attempts: u32,
    pub toolchain: ToolchainConfig,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            user_data_path: PathBuf::from("data/user/user.csv"),
            problem_data_path: PathBuf::from("data/problem/problem.csv"),
            problem_root: PathBuf::from("data/problem"),
            program_dir: PathBuf::from("data/user/program"),
            version: "4.4".to_string(),
            admin_user: "admin".to_string(),
            max_password_attempts: 3,
            toolchain: ToolchainConfig::default(),
        }
    }
}

impl JudgeConfig {
    /// Load configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Judge config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: JudgeConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        if config.max_password_attempts == 0 {
            bail!("max_password_attempts must be at least 1");
        }

        Ok(config)
    }

    /// Resolve configuration: explicit path, then `$JUDGE_CONFIG`, then
    /// `config/judge.json` if it exists, then built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write this configuration as pretty JSON, creating parent directories.
    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json_content = serde_json::to_string_pretty(self)
            .context("Failed to serialize judge config")?;

        fs::write(config_path, json_content)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        Ok(())
    }
}
