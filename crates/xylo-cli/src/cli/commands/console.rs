//! Line-oriented terminal shared by the REPL loop and removal prompts.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use xylo_core::runtime::Confirm;

pub struct Console<R, W> {
    input: R,
    output: W,
}

pub type SharedConsole<R, W> = Arc<Mutex<Console<R, W>>>;

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn shared(input: R, output: W) -> SharedConsole<R, W> {
        Arc::new(Mutex::new(Self { input, output }))
    }

    /// Reads one line without its terminator. `None` at end of input.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.output
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.output
    }
}

pub fn lock<R, W>(console: &SharedConsole<R, W>) -> MutexGuard<'_, Console<R, W>> {
    console.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Asks `[y/N]` on the console; anything but yes declines.
pub struct ConsoleConfirm<R, W>(SharedConsole<R, W>);

impl<R, W> ConsoleConfirm<R, W> {
    pub fn new(console: SharedConsole<R, W>) -> Self {
        Self(console)
    }
}

impl<R, W> Confirm for ConsoleConfirm<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        let mut console = lock(&self.0);
        if write!(console.out(), "{prompt} [y/N] ")
            .and_then(|()| console.out().flush())
            .is_err()
        {
            return false;
        }
        match console.read_line() {
            Ok(Some(answer)) => is_yes(&answer),
            Ok(None) | Err(_) => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
