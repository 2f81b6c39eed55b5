/// Problem catalog backed by a flat `title,basePath` file.
///
/// Problem ids are 1-based positions in load order; appended problems take
/// the next id.
use crate::error::StoreError;
use crate::types::Problem;
use rand::seq::SliceRandom;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ProblemCatalog {
    path: PathBuf,
    problems: Vec<Problem>,
}

impl ProblemCatalog {
    /// Load the catalog. Unlike the account store, a missing catalog file is
    /// an error.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::unavailable(path, e))?;

        let mut problems = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let Some((title, base_path)) = parse_record(line) else {
                if !line.trim().is_empty() {
                    warn!(path = %path.display(), line = line_no + 1, "Skipping malformed problem record");
                }
                continue;
            };

            let problem = Problem::new(problems.len() + 1, title, base_path);
            if !problem.testcases_dir().exists() {
                warn!(
                    title = %problem.title,
                    testcases = %problem.testcases_dir().display(),
                    "testcases directory not found"
                );
            }
            problems.push(problem);
        }

        info!(path = %path.display(), problems = problems.len(), "Loaded problem data");

        Ok(Self {
            path: path.to_path_buf(),
            problems,
        })
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Look up a problem by its 1-based id.
    pub fn get(&self, id: usize) -> Option<&Problem> {
        id.checked_sub(1).and_then(|idx| self.problems.get(idx))
    }

    pub fn random(&self) -> Option<&Problem> {
        self.problems.choose(&mut rand::thread_rng())
    }

    /// Add a problem and append its record to the catalog file.
    ///
    /// The in-memory catalog is updated even if the file append fails; the
    /// error is returned so the caller can report it.
    pub fn append(&mut self, title: &str, base_path: &Path) -> Result<&Problem, StoreError> {
        if title.trim().is_empty() || title.contains([',', '\n', '\r']) {
            return Err(StoreError::InvalidRecord(format!(
                "problem title '{}' cannot be stored",
                title
            )));
        }

        let problem = Problem::new(self.problems.len() + 1, title.trim(), base_path);
        let record = format!("{},{}\n", problem.title, base_path.display());
        self.problems.push(problem);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::unavailable(&self.path, e))?;
        file.write_all(record.as_bytes())
            .map_err(|e| StoreError::unavailable(&self.path, e))?;

        info!(path = %self.path.display(), title = %title, "Problem appended to catalog");

        let last = self.problems.len() - 1;
        Ok(&self.problems[last])
    }
}

fn parse_record(line: &str) -> Option<(&str, &str)> {
    let mut fields = line.split(',');
    let title = fields.next()?.trim();
    let base_path = fields.next()?.trim();
    if title.is_empty() || base_path.is_empty() {
        return None;
    }
    Some((title, base_path))
}
