//! Shell completion generation for wildline
//!
//! Generates completion scripts for the `wildline` binary's own flags and
//! subcommands for bash, zsh, fish and PowerShell.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

use crate::cli::CliArgs;
use crate::error::{ConfigError, Result, WildError};

/// Generate shell completion script
///
/// # Arguments
/// * `shell_name` - Shell type (bash, zsh, fish, powershell)
///
/// # Returns
/// * `Result<()>` - Success or error
pub fn generate_completion(shell_name: &str) -> Result<()> {
    let shell = parse_shell(shell_name)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_completion(shell, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Write the script for `shell` into `out`
pub fn write_completion(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = CliArgs::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
    Ok(())
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        "powershell" | "pwsh" => Ok(Shell::PowerShell),
        _ => Err(WildError::Config(ConfigError::Generic(format!(
            "Unsupported shell: {}. Supported shells: bash, zsh, fish, powershell",
            shell_name
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shell() {
        assert!(matches!(parse_shell("bash"), Ok(Shell::Bash)));
        assert!(matches!(parse_shell("zsh"), Ok(Shell::Zsh)));
        assert!(matches!(parse_shell("fish"), Ok(Shell::Fish)));
        assert!(matches!(parse_shell("pwsh"), Ok(Shell::PowerShell)));
        assert!(parse_shell("invalid").is_err());
    }

    #[test]
    fn test_parse_shell_case_insensitive() {
        assert!(matches!(parse_shell("BASH"), Ok(Shell::Bash)));
        assert!(matches!(parse_shell("Zsh"), Ok(Shell::Zsh)));
        assert!(matches!(parse_shell("FiSh"), Ok(Shell::Fish)));
    }

    #[test]
    fn test_write_completion_mentions_subcommands() {
        let mut buffer = Vec::new();
        write_completion(Shell::Bash, &mut buffer).unwrap();
        let script = String::from_utf8_lossy(&buffer);
        assert!(script.contains("wildline"));
        assert!(script.contains("complete"));
    }
}
