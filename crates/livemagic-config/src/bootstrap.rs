//! Seeding a new configuration tree with the external `lh_config` tool.

use std::path::Path;
use std::process::Command;

use tracing::{info, warn};

use crate::errors::ConfigError;

/// Program live-helper ships for writing a default `config/` tree.
pub const DEFAULT_BOOTSTRAP_PROGRAM: &str = "lh_config";

/// Populates an empty root directory with a default configuration tree.
pub trait Bootstrap {
    /// Run in `dir`, blocking until done.
    fn run(&self, dir: &Path) -> Result<(), ConfigError>;

    /// Human-readable command line, for logs and errors.
    fn describe(&self) -> String;
}

/// Bootstrap by running an external program in the target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBootstrap {
    program: String,
    args: Vec<String>,
}

impl Default for CommandBootstrap {
    fn default() -> Self {
        Self::new(DEFAULT_BOOTSTRAP_PROGRAM)
    }
}

impl CommandBootstrap {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Bootstrap for CommandBootstrap {
    /// Success is a zero exit status. Otherwise the error carries stdout
    /// followed by stderr.
    fn run(&self, dir: &Path) -> Result<(), ConfigError> {
        let command = self.describe();
        info!(
            event = "config.bootstrap.run_started",
            command = %command,
            path = %dir.display()
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(dir)
            .output()
            .map_err(|e| {
                warn!(
                    event = "config.bootstrap.spawn_failed",
                    command = %command,
                    error = %e
                );
                ConfigError::Bootstrap {
                    command: command.clone(),
                    output: format!("Failed to execute {}: {}", self.program, e),
                }
            })?;

        if output.status.success() {
            info!(event = "config.bootstrap.run_completed", command = %command);
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim_end().to_string();

        warn!(
            event = "config.bootstrap.run_failed",
            command = %command,
            status = ?output.status.code(),
            output = %combined
        );
        Err(ConfigError::Bootstrap {
            command,
            output: combined,
        })
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
