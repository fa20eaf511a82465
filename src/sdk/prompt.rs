//! Operator interaction: secret entry, yes/no gates and progress messages.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use zeroize::Zeroizing;

use super::error::{ClientError, Result};

pub trait Prompter {
    /// Read a secret without echoing it.
    fn read_secret(&mut self, message: &str) -> Result<Zeroizing<String>>;

    /// Ask a `[y/N]` question; anything but `y` is a no.
    fn confirm(&mut self, message: &str) -> Result<bool>;

    /// Show a line to the operator.
    fn notify(&mut self, message: &str);
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn read_secret(&mut self, message: &str) -> Result<Zeroizing<String>> {
        Ok(Zeroizing::new(rpassword::prompt_password(message)?))
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        print!("{message} [y/N]: ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().eq_ignore_ascii_case("y"))
    }

    fn notify(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Replays canned answers in order and records everything shown. Used by
/// tests in place of a terminal.
///
/// Running out of answers is treated as the operator declining.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub transcript: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn read_secret(&mut self, message: &str) -> Result<Zeroizing<String>> {
        self.transcript.push(message.to_string());
        self.answers
            .pop_front()
            .map(Zeroizing::new)
            .ok_or(ClientError::UserAborted)
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        self.transcript.push(message.to_string());
        Ok(self
            .answers
            .pop_front()
            .is_some_and(|a| a.trim().eq_ignore_ascii_case("y")))
    }

    fn notify(&mut self, message: &str) {
        self.transcript.push(message.to_string());
    }
}
