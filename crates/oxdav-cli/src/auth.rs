use std::io::{self, IsTerminal, Read, Write};

use anyhow::{Result, bail};
use rpassword::read_password;

/// Prompt for a secret without echoing it to the terminal.
pub fn prompt_secret(prompt: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        bail!("{prompt} required, but stdin is not a terminal");
    }

    eprint!("{prompt}: ");
    io::stderr().flush()?;

    let secret = read_password()?;
    if secret.is_empty() {
        bail!("{prompt} cannot be empty");
    }

    Ok(secret)
}

/// Read a secret piped on stdin (first line only).
pub fn read_secret_from_stdin(flag: &str) -> Result<String> {
    if io::stdin().is_terminal() {
        bail!(
            "{flag} requires the value to be piped in.\n\
             Example: echo \"$DRIME_API_KEY\" | oxdav config add cloud --type drime {flag}"
        );
    }

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let secret = input.lines().next().unwrap_or_default().trim_end_matches('\r');
    if secret.is_empty() {
        bail!("Value from stdin is empty");
    }

    Ok(secret.to_string())
}
