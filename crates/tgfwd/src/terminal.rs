use std::io::{self, BufRead, Write};

use tgfwd_core::{credentials::Prompter, Error, Result};

/// Prompts on the controlling terminal. Secrets are read without echo.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&self, label: &str) -> Result<String> {
        let mut out = io::stdout().lock();
        out.write_all(label.as_bytes())?;
        out.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(Error::Auth("input closed".to_string()));
        }
        Ok(line.trim().to_string())
    }

    fn ask_secret(&self, label: &str) -> Result<String> {
        Ok(rpassword::prompt_password(label)?)
    }
}
