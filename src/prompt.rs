use crate::playlist::OrderingMode;
use anyhow::{Context, Result, bail};
use std::io::{BufRead, Stdin, StdinLock, Stdout, Write};
use std::path::PathBuf;

/// Asks the operator for settings that were not given on the command line.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        let stdin: Stdin = std::io::stdin();
        Self::new(stdin.lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Prints `question` and returns the trimmed answer. End of input is an error.
    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read answer")?;
        if read == 0 {
            bail!("Input closed while asking: {}", question.trim_end());
        }
        Ok(line.trim().to_string())
    }

    /// Re-asks until the answer names an existing directory.
    pub fn folder(&mut self) -> Result<PathBuf> {
        loop {
            let answer = self.ask("Video folder path: ")?;
            let path = PathBuf::from(&answer);
            if !answer.is_empty() && path.is_dir() {
                return Ok(path);
            }
            writeln!(self.output, "'{answer}' is not a directory, try again.")?;
        }
    }

    /// Re-asks until the answer is not blank.
    pub fn non_empty(&mut self, question: &str) -> Result<String> {
        loop {
            let answer = self.ask(question)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            writeln!(self.output, "A value is required.")?;
        }
    }

    pub fn ordering(&mut self) -> Result<OrderingMode> {
        loop {
            let answer = self.ask("Shuffle videos? (y/n): ")?;
            match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(OrderingMode::Shuffled),
                "n" | "no" => return Ok(OrderingMode::Sequential),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }
}
