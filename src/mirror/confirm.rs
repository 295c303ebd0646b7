//! # Deletion Confirmation Module
//!
//! Gate interattivo prima delle eliminazioni: `y` conferma, `n` o una
//! risposta vuota annullano, qualsiasi altra risposta ripete la domanda.

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub const DELETE_QUESTION: &str =
    "Warning! The files listed above will be deleted. Do you want to proceed? (y/[n]):";

/// Source of answers to yes/no questions
#[async_trait]
pub trait Prompt: Send {
    /// Show `question` and return the answer, `None` on end of input
    async fn ask(&mut self, question: &str) -> std::io::Result<Option<String>>;
}

/// Prompt on the terminal
#[derive(Debug, Default)]
pub struct StdinPrompt;

#[async_trait]
impl Prompt for StdinPrompt {
    async fn ask(&mut self, question: &str) -> std::io::Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(question.as_bytes()).await?;
        stdout.write_all(b" ").await?;
        stdout.flush().await?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Prompt answering from a fixed list, `None` once exhausted
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    pub asked: usize,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: 0,
        }
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn ask(&mut self, _question: &str) -> std::io::Result<Option<String>> {
        self.asked += 1;
        Ok(self.answers.pop_front())
    }
}

/// Ask until the answer is `y` (true) or `n`/empty/end of input (false)
pub async fn confirm_deletion(prompt: &mut dyn Prompt) -> std::io::Result<bool> {
    loop {
        match prompt.ask(DELETE_QUESTION).await?.as_deref() {
            Some("y") => return Ok(true),
            Some("n") | Some("") | None => return Ok(false),
            Some(_) => continue,
        }
    }
}
