//! API key file management.

use std::io::{BufRead, IsTerminal, Write};

use crate::cli::args::KeyCommand;
use crate::core::credentials::{delete_key_file, write_key_file};
use crate::error::{FwqError, Result};
use crate::storage::paths::AppPaths;

/// Run a `key` subcommand.
///
/// # Errors
///
/// Returns config errors for invalid input and I/O errors for key-file
/// operations.
pub fn run(command: &KeyCommand) -> Result<()> {
    let paths = AppPaths::new();
    let key_file = paths.key_file();

    match command {
        KeyCommand::Set { key } => {
            let key = match key {
                Some(k) => k.clone(),
                None => prompt_for_key()?,
            };
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(FwqError::Config("no key provided".into()));
            }
            write_key_file(&key_file, &key)?;
            println!("Key stored in {}", key_file.display());
        }
        KeyCommand::Clear => {
            delete_key_file(&key_file)?;
            println!("Key file removed ({})", key_file.display());
        }
        KeyCommand::Path => {
            println!("{}", key_file.display());
        }
    }
    Ok(())
}

/// Read a key from stdin, prompting when attached to a terminal.
fn prompt_for_key() -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        print!("API key: ");
        std::io::stdout().flush()?;
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line)
}
