/// Terminal I/O for the interactive session.
///
/// `Terminal` is what the session and the commands talk to. On a real
/// terminal `InteractiveConsole` asks through dialoguer widgets, so
/// passwords are never echoed. `Console` is line based over any reader and
/// writer; it serves piped input and scripted sessions in tests.
use anyhow::{bail, Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use dialoguer::{Confirm, Input, Password};
use std::fmt::Display;
use std::io::{self, BufRead, StdinLock, Stdout, Write};

/// A line containing only this marker ends a multi-line block.
pub const BLOCK_TERMINATOR: &str = ".";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Info,
    Success,
    Warn,
    Error,
}

pub trait Terminal {
    /// Ask for one line of visible input. `prompt` carries no trailing colon.
    fn input(&mut self, prompt: &str) -> Result<String>;

    fn password(&mut self, prompt: &str) -> Result<String>;

    /// Ask a yes/no question until it is answered.
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Read one raw line without its line ending. End of input is an error.
    fn read_line(&mut self) -> Result<String>;

    fn emit(&mut self, tone: Tone, message: &str) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    /// Collect lines until a line that is exactly `.`; the returned text has
    /// one `\n` after every collected line.
    fn read_block(&mut self) -> Result<String> {
        let mut block = String::new();
        loop {
            let line = self.read_line()?;
            if line == BLOCK_TERMINATOR {
                return Ok(block);
            }
            block.push_str(&line);
            block.push('\n');
        }
    }

    fn println(&mut self, message: impl Display) -> Result<()> {
        self.emit(Tone::Plain, &message.to_string())
    }

    fn info(&mut self, message: impl Display) -> Result<()> {
        self.emit(Tone::Info, &message.to_string())
    }

    fn success(&mut self, message: impl Display) -> Result<()> {
        self.emit(Tone::Success, &message.to_string())
    }

    fn warn(&mut self, message: impl Display) -> Result<()> {
        self.emit(Tone::Warn, &message.to_string())
    }

    fn error(&mut self, message: impl Display) -> Result<()> {
        self.emit(Tone::Error, &message.to_string())
    }
}

/// Line-based console over a reader and a writer.
pub struct Console<R, W> {
    input: R,
    output: W,
    styled: bool,
}

impl<R: BufRead, W: Write> Console<R, W> {
    /// Console with colored output and screen clearing.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            styled: true,
        }
    }

    /// Console that writes plain text only.
    pub fn plain(input: R, output: W) -> Self {
        Self {
            input,
            output,
            styled: false,
        }
    }

    pub fn output(&self) -> &W {
        &self.output
    }
}

impl<R: BufRead, W: Write> Terminal for Console<R, W> {
    fn input(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}: ", prompt)?;
        self.output.flush()?;
        self.read_line()
    }

    fn password(&mut self, prompt: &str) -> Result<String> {
        self.input(prompt)
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        loop {
            let answer = self.input(&format!("{} (y/n)", question))?;
            match answer.trim() {
                "y" | "Y" => return Ok(true),
                "n" | "N" => return Ok(false),
                _ => self.warn("Invalid input. Please enter 'y' or 'n'.")?,
            }
        }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read from console")?;
        if read == 0 {
            bail!("console input closed");
        }
        while line.ends_with(['\n', '\r']) {
            line.pop();
        }
        Ok(line)
    }

    fn emit(&mut self, tone: Tone, message: &str) -> Result<()> {
        if !self.styled {
            writeln!(self.output, "{}", message)?;
            return Ok(());
        }
        match tone {
            Tone::Plain => writeln!(self.output, "{}", message)?,
            Tone::Info => writeln!(self.output, "{}", message.cyan())?,
            Tone::Success => writeln!(self.output, "{}", message.green().bold())?,
            Tone::Warn => writeln!(self.output, "{}", message.yellow())?,
            Tone::Error => writeln!(self.output, "{}", message.red().bold())?,
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.styled {
            execute!(self.output, Clear(ClearType::All), MoveTo(0, 0))
                .context("Failed to clear screen")?;
        }
        Ok(())
    }
}

/// Console for an attended terminal: dialoguer prompts with hidden
/// password entry, crossterm styling for everything printed.
pub struct InteractiveConsole {
    lines: Console<StdinLock<'static>, Stdout>,
}

impl InteractiveConsole {
    pub fn new() -> Self {
        Self {
            lines: Console::new(io::stdin().lock(), io::stdout()),
        }
    }
}

impl Default for InteractiveConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for InteractiveConsole {
    fn input(&mut self, prompt: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .context("Failed to read from terminal")
    }

    fn password(&mut self, prompt: &str) -> Result<String> {
        Password::new()
            .with_prompt(prompt)
            .interact()
            .context("Failed to read password")
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        Confirm::new()
            .with_prompt(question)
            .interact()
            .context("Failed to read answer")
    }

    fn read_line(&mut self) -> Result<String> {
        self.lines.read_line()
    }

    fn emit(&mut self, tone: Tone, message: &str) -> Result<()> {
        self.lines.emit(tone, message)
    }

    fn clear(&mut self) -> Result<()> {
        self.lines.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn console(input: &str) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::plain(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn written(console: &Console<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(console.output().clone()).unwrap()
    }

    #[test]
    fn test_input_strips_line_endings() {
        let mut c = console("alice\r\nbob\n");
        assert_eq!(c.input("Name").unwrap(), "alice");
        assert_eq!(c.input("Name").unwrap(), "bob");
        assert_eq!(written(&c), "Name: Name: ");
    }

    #[test]
    fn test_eof_is_error() {
        let mut c = console("");
        assert!(c.read_line().is_err());
        assert!(c.password("Password").is_err());
    }

    #[test]
    fn test_confirm_repeats_until_valid() {
        let mut c = console("maybe\n\nY\n");
        assert!(c.confirm("Retry?").unwrap());
        assert_eq!(written(&c).matches("Retry? (y/n): ").count(), 3);
        assert!(written(&c).contains("Invalid input"));
    }

    #[test]
    fn test_confirm_no() {
        let mut c = console("n\n");
        assert!(!c.confirm("Submit?").unwrap());
    }

    #[test]
    fn test_read_block_stops_at_lone_dot() {
        let mut c = console("int main() {\n  return 0; .\n}\n.\nafter\n");
        assert_eq!(c.read_block().unwrap(), "int main() {\n  return 0; .\n}\n");
        assert_eq!(c.read_line().unwrap(), "after");
    }

    #[test]
    fn test_read_block_without_terminator_is_error() {
        let mut c = console("line\n");
        assert!(c.read_block().is_err());
    }

    #[test]
    fn test_plain_output_has_no_escape_codes() {
        let mut c = console("");
        c.error("boom").unwrap();
        c.clear().unwrap();
        assert_eq!(written(&c), "boom\n");
    }

    #[test]
    fn test_styled_output_colors_by_tone() {
        let mut c = Console::new(Cursor::new(Vec::new()), Vec::new());
        c.println("plain").unwrap();
        c.error("boom").unwrap();
        let out = String::from_utf8(c.output().clone()).unwrap();
        assert!(out.starts_with("plain\n"));
        assert!(out.contains("\u{1b}["));
        assert!(out.contains("boom"));
    }
}
