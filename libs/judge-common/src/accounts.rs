/// Flat-file account store
///
/// One `username,password` record per line. The record is split at the
/// first comma, so passwords may contain commas but usernames may not.
/// Every change rewrites the whole file, sorted by username.
use crate::error::StoreError;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const FIELD_SEPARATOR: char = ',';
pub const SIGN_UP_SENTINEL: &str = "-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password: String,
}

/// Why a requested username cannot be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameRejection {
    Empty,
    Reserved,
    Taken,
    InvalidCharacter,
}

impl fmt::Display for UsernameRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsernameRejection::Empty => write!(f, "Username cannot be empty."),
            UsernameRejection::Reserved => {
                write!(f, "Username is reserved. Please choose another name.")
            }
            UsernameRejection::Taken => {
                write!(f, "Username already exists. Please try another one.")
            }
            UsernameRejection::InvalidCharacter => {
                write!(f, "Username cannot contain ',' or whitespace.")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountStore {
    path: PathBuf,
    users: BTreeMap<String, User>,
}

impl AccountStore {
    /// Load the store. A missing file yields an empty store; the file is
    /// created on the first write. Any other I/O error is reported.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "User data file not found, starting with no accounts");
                String::new()
            }
            Err(e) => return Err(StoreError::unavailable(path, e)),
        };

        let mut users = BTreeMap::new();
        for (line_no, line) in content.lines().enumerate() {
            match parse_record(line) {
                Some(user) => {
                    users.insert(user.username.clone(), user);
                }
                None if !line.trim().is_empty() => {
                    warn!(path = %path.display(), line = line_no + 1, "Skipping malformed user record");
                }
                None => {}
            }
        }

        info!(path = %path.display(), users = users.len(), "Loaded user data");

        Ok(Self {
            path: path.to_path_buf(),
            users,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn search(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    /// An empty password never verifies.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        if password.is_empty() {
            return false;
        }
        self.search(username)
            .map(|user| user.password == password)
            .unwrap_or(false)
    }

    /// Check whether `username` may be registered.
    pub fn check_new_username(
        &self,
        username: &str,
        admin_user: &str,
    ) -> Result<(), UsernameRejection> {
        if username.is_empty() {
            return Err(UsernameRejection::Empty);
        }
        if username == admin_user || username == SIGN_UP_SENTINEL {
            return Err(UsernameRejection::Reserved);
        }
        if username.contains(FIELD_SEPARATOR) || username.chars().any(char::is_whitespace) {
            return Err(UsernameRejection::InvalidCharacter);
        }
        if self.users.contains_key(username) {
            return Err(UsernameRejection::Taken);
        }
        Ok(())
    }

    /// Insert or replace a user and rewrite the backing file.
    pub fn add_user(&mut self, username: &str, password: &str) -> Result<(), StoreError> {
        if username.is_empty() || username.contains(FIELD_SEPARATOR) {
            return Err(StoreError::InvalidRecord(format!(
                "username '{}' cannot be stored",
                username
            )));
        }
        if password.is_empty() {
            return Err(StoreError::InvalidRecord("password cannot be empty".to_string()));
        }
        if password.contains(['\n', '\r']) {
            return Err(StoreError::InvalidRecord(
                "password cannot contain line breaks".to_string(),
            ));
        }

        self.users.insert(
            username.to_string(),
            User {
                username: username.to_string(),
                password: password.to_string(),
            },
        );

        self.persist()
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::unavailable(parent, e))?;
            }
        }

        let mut content = String::new();
        for user in self.users.values() {
            content.push_str(&user.username);
            content.push(FIELD_SEPARATOR);
            content.push_str(&user.password);
            content.push('\n');
        }

        fs::write(&self.path, content).map_err(|e| StoreError::unavailable(&self.path, e))?;
        debug!(path = %self.path.display(), users = self.users.len(), "User data written");
        Ok(())
    }
}

fn parse_record(line: &str) -> Option<User> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() {
        return None;
    }

    let (username, password) = line.split_once(FIELD_SEPARATOR)?;
    if username.is_empty() || password.is_empty() {
        return None;
    }

    Some(User {
        username: username.to_string(),
        password: password.to_string(),
    })
}
