//! Interactive password acquisition.
//!
//! The runner never talks to the terminal directly. It holds a
//! [`LineInput`], which is a [`TerminalInput`] in the binary and a
//! [`ScriptedInput`] in tests.

use std::collections::VecDeque;
use std::io::{self, IsTerminal};
use std::sync::{Arc, Mutex};

use dialoguer::Password;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, ShiftError};

/// Question asked when a password is needed.
pub const PASSWORD_QUESTION: &str = "Password";

/// A source of operator replies, one line per question.
pub trait LineInput: Send {
    /// Whether an operator can answer questions at all.
    fn is_interactive(&self) -> bool;

    /// Ask one question and block until one reply is read.
    fn read_line(&mut self, question: &str) -> io::Result<String>;
}

/// Hidden-echo terminal input on stdin.
#[derive(Debug, Default)]
pub struct TerminalInput;

impl LineInput for TerminalInput {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn read_line(&mut self, question: &str) -> io::Result<String> {
        Password::new()
            .with_prompt(question)
            .allow_empty_password(true)
            .interact()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

/// Questions asked of a [`ScriptedInput`], shared with the test that built it.
pub type QuestionLog = Arc<Mutex<Vec<String>>>;

/// Canned replies, for tests and non-terminal automation.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    replies: VecDeque<String>,
    interactive: bool,
    questions: QuestionLog,
}

impl ScriptedInput {
    /// Interactive input that answers with `replies` in order.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            interactive: true,
            questions: QuestionLog::default(),
        }
    }

    /// Input that reports no operator is present.
    pub fn non_interactive() -> Self {
        Self::default()
    }

    /// Handle to the questions asked so far.
    pub fn questions(&self) -> QuestionLog {
        Arc::clone(&self.questions)
    }
}

impl LineInput for ScriptedInput {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn read_line(&mut self, question: &str) -> io::Result<String> {
        if let Ok(mut asked) = self.questions.lock() {
            asked.push(question.to_string());
        }
        self.replies
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted reply left"))
    }
}

/// Prompting is enabled and no password is set. An explicitly configured
/// empty password counts as set.
pub fn needs_password(config: &Config) -> bool {
    config.prompt_password && config.password.is_none()
}

/// Fill in the password from `input` when [`needs_password`] holds.
pub fn resolve_password(config: &Config, input: &mut dyn LineInput) -> Result<Config> {
    if !needs_password(config) {
        return Ok(config.clone());
    }
    if !input.is_interactive() {
        return Err(ShiftError::NoInteractiveInput);
    }

    let question = match &config.username {
        Some(user) => format!("{} for {}", PASSWORD_QUESTION, user),
        None => PASSWORD_QUESTION.to_string(),
    };
    let reply = input.read_line(&question)?;
    debug!("Password read from operator input");
    Ok(config.with_password(reply.trim()))
}
