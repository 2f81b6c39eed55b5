/// Interactive Session
///
/// Drives the terminal judge as an explicit status loop:
/// `NotReady -> UserLogin -> Ready(session) -> ... -> UserLogin | Exit`.
/// Each loop iteration performs one step and returns the next status; the
/// logged-in user lives only inside `SessionStatus::Ready`.
use crate::commands::{add_problem, print_problem_list, select_problem, show_description, submit_problem};
use crate::console::Terminal;
use crate::engine::ExecutionEngine;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use judge_common::accounts::{AccountStore, SIGN_UP_SENTINEL};
use judge_common::catalog::ProblemCatalog;
use judge_common::config::JudgeConfig;
use judge_common::types::{Session, SessionStatus};
use judge_common::StoreError;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MENU_RULE_WIDTH: usize = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    CurrentUser,
    Version,
    ListProblems,
    RandomProblem,
    Submit,
    AddProblem,
    SignOut,
    Exit,
}

impl FromStr for MenuChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(MenuChoice::CurrentUser),
            "2" => Ok(MenuChoice::Version),
            "3" => Ok(MenuChoice::ListProblems),
            "4" => Ok(MenuChoice::RandomProblem),
            "5" => Ok(MenuChoice::Submit),
            "6" => Ok(MenuChoice::AddProblem),
            "7" => Ok(MenuChoice::SignOut),
            "8" => Ok(MenuChoice::Exit),
            _ => Err(()),
        }
    }
}

pub struct JudgeApp<E, T> {
    config: JudgeConfig,
    engine: E,
    console: T,
    accounts: AccountStore,
    catalog: ProblemCatalog,
}

impl<E, T> JudgeApp<E, T>
where
    E: ExecutionEngine,
    T: Terminal,
{
    /// Load both stores. A missing user file is tolerated; a missing
    /// catalog is not.
    pub fn new(config: JudgeConfig, engine: E, console: T) -> Result<Self> {
        let accounts = with_spinner("Loading user data...", || {
            AccountStore::load(&config.user_data_path)
        })?;
        let catalog = with_spinner("Loading problem data...", || {
            ProblemCatalog::load(&config.problem_data_path)
        })?;

        Ok(Self {
            config,
            engine,
            console,
            accounts,
            catalog,
        })
    }

    pub fn console(&self) -> &T {
        &self.console
    }

    /// Run the session until the user exits or input ends.
    pub async fn run(&mut self) -> Result<()> {
        let mut status = SessionStatus::NotReady;

        loop {
            debug!(status = %status, "Session step");
            status = match status {
                SessionStatus::NotReady => {
                    self.banner()?;
                    SessionStatus::UserLogin
                }
                SessionStatus::UserLogin => self.login()?,
                SessionStatus::Ready(session) => self.main_page(session).await?,
                SessionStatus::Exit => break,
            };
        }

        info!("Session ended");
        Ok(())
    }

    fn banner(&mut self) -> Result<()> {
        self.console.clear()?;
        self.console.info(format!("Judge System v{}", self.config.version))?;
        self.console.success(format!(
            "Status - {} users and {} problems loaded.",
            self.accounts.len(),
            self.catalog.len()
        ))?;
        Ok(())
    }

    fn login(&mut self) -> Result<SessionStatus> {
        loop {
            let username = self
                .console
                .input(&format!("User Name (Enter {} to sign up)", SIGN_UP_SENTINEL))?;
            let username = username.trim();

            if username == SIGN_UP_SENTINEL {
                while !self.sign_up()? {}
                return Ok(SessionStatus::UserLogin);
            }

            if self.accounts.search(username).is_none() {
                self.console.error("User does not exist!")?;
                continue;
            }

            self.console.success(format!("Welcome back, {}.", username))?;
            if self.verify_password(username)? {
                self.console.clear()?;
                self.console.success("Login Success!!!")?;
                info!(username = %username, "User logged in");
                return Ok(SessionStatus::Ready(Session::new(username)));
            }
        }
    }

    fn verify_password(&mut self, username: &str) -> Result<bool> {
        for attempt in 1..=self.config.max_password_attempts {
            let password = self.console.password("Please enter your password")?;
            if self.accounts.verify(username, &password) {
                return Ok(true);
            }
            warn!(username = %username, attempt = attempt, "Incorrect password");
            self.console.error("Password incorrect... please try again.")?;
        }

        self.console.warn("Too many failed login attempts...")?;
        Ok(false)
    }

    /// One sign-up attempt. Returns `true` once an account was created.
    fn sign_up(&mut self) -> Result<bool> {
        let username = self.console.input("Welcome! please enter your name")?;
        let username = username.trim().to_string();

        if let Err(rejection) = self
            .accounts
            .check_new_username(&username, &self.config.admin_user)
        {
            self.console.error(rejection)?;
            return Ok(false);
        }

        let password = loop {
            let first = self.console.password("Please enter your password")?;
            let second = self.console.password("Please enter your password again")?;
            if first.is_empty() {
                self.console.error("Password cannot be empty.")?;
            } else if first != second {
                self.console.error("The two passwords do not match. Please try again.")?;
            } else {
                break first;
            }
        };

        match self.accounts.add_user(&username, &password) {
            Ok(()) => {
                info!(username = %username, "User signed up");
                self.console.warn("Sign-up success! Please login now.")?;
                Ok(true)
            }
            Err(e) => {
                error!(username = %username, error = %e, "Failed to save user");
                self.console.error(format!("Sign-up failed: {}", e))?;
                Ok(false)
            }
        }
    }

    fn print_menu(&mut self) -> Result<()> {
        let rule = format!("+{}+", "-".repeat(MENU_RULE_WIDTH));
        self.console.println(&rule)?;
        self.console.warn("Please choose an operation:")?;
        self.console.println(&rule)?;
        for line in [
            "(1) Current user",
            "(2) Judge system version",
            "(3) Print all problems",
            "(4) Random problem",
            "(5) Submit code",
            "(6) Add new problem (admin only)",
            "(7) Sign out",
            "(8) Exit program",
        ] {
            self.console.println(line)?;
        }
        self.console.println(&rule)
    }

    async fn main_page(&mut self, session: Session) -> Result<SessionStatus> {
        self.print_menu()?;
        let input = self.console.input("User input")?;
        self.console.clear()?;

        let Ok(choice) = input.parse::<MenuChoice>() else {
            self.console
                .error("Invalid input. Please enter a number between 1 and 8.")?;
            return Ok(SessionStatus::Ready(session));
        };
        debug!(username = %session.username, choice = ?choice, "Menu choice");

        match choice {
            MenuChoice::CurrentUser => {
                self.console.success(format!("Username: {}", session.username))?;
            }
            MenuChoice::Version => {
                self.console.success(format!("VERSION: {}", self.config.version))?;
            }
            MenuChoice::ListProblems => {
                print_problem_list(&mut self.console, &self.catalog)?;
                if !self.catalog.is_empty()
                    && self.console.confirm("Do you want to select a problem to solve?")?
                {
                    let problem = select_problem(&mut self.console, &self.catalog)?;
                    show_description(&mut self.console, problem)?;
                    submit_problem(&mut self.console, &self.engine, problem, &self.config.program_dir)
                        .await?;
                }
            }
            MenuChoice::RandomProblem => match self.catalog.random() {
                Some(problem) => {
                    show_description(&mut self.console, problem)?;
                    if self.console.confirm("Do you want to solve this problem?")? {
                        submit_problem(&mut self.console, &self.engine, problem, &self.config.program_dir)
                            .await?;
                    }
                }
                None => self.console.warn("No problems available.")?,
            },
            MenuChoice::Submit => {
                print_problem_list(&mut self.console, &self.catalog)?;
                if !self.catalog.is_empty() {
                    let problem = select_problem(&mut self.console, &self.catalog)?;
                    submit_problem(&mut self.console, &self.engine, problem, &self.config.program_dir)
                        .await?;
                }
            }
            MenuChoice::AddProblem => {
                if session.is_admin(&self.config.admin_user) {
                    add_problem(&mut self.console, &mut self.catalog, &self.config.problem_root)?;
                } else {
                    self.console.error("Only admin can add new problem!")?;
                }
            }
            MenuChoice::SignOut => {
                info!(username = %session.username, "User signed out");
                self.console.warn("User logged out!!")?;
                return Ok(SessionStatus::UserLogin);
            }
            MenuChoice::Exit => {
                self.console.info("Thanks for visiting! See you next time!")?;
                return Ok(SessionStatus::Exit);
            }
        }

        Ok(SessionStatus::Ready(session))
    }
}

/// Run one store load behind a spinner. Hidden when stderr is not a terminal.
fn with_spinner<S>(
    message: &'static str,
    load: impl FnOnce() -> Result<S, StoreError>,
) -> Result<S, StoreError> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));

    let loaded = load();
    match &loaded {
        Ok(_) => spinner.finish_with_message(format!("{}OK!", message)),
        Err(_) => spinner.abandon_with_message(format!("{}FAILED", message)),
    }
    loaded
}
