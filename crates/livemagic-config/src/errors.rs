use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Bootstrap command '{command}' failed: {output}")]
    Bootstrap { command: String, output: String },

    #[error("Unknown key '{key}' in section '{section}'")]
    UnknownKey { section: String, key: String },

    #[error("Unknown section '{name}'")]
    UnknownSection { name: String },

    #[error("Invalid entry name '{name}': must be a plain file name")]
    InvalidEntryName { name: String },

    #[error("IO error on {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to save {} section(s): {}", failures.len(), describe_failures(failures))]
    SaveFailed { failures: Vec<SectionFailure> },

    #[error("Failed to parse schema: {message}")]
    SchemaParse { message: String },

    #[error(transparent)]
    Path(#[from] livemagic_paths::PathError),
}

/// One child that could not be saved during an aggregate save.
#[derive(Debug)]
pub struct SectionFailure {
    pub section: String,
    pub error: ConfigError,
}

fn describe_failures(failures: &[SectionFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.section, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ConfigError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::Bootstrap { .. } => "BOOTSTRAP_FAILED",
            ConfigError::UnknownKey { .. } => "UNKNOWN_KEY",
            ConfigError::UnknownSection { .. } => "UNKNOWN_SECTION",
            ConfigError::InvalidEntryName { .. } => "INVALID_ENTRY_NAME",
            ConfigError::Persistence { .. } => "PERSISTENCE_ERROR",
            ConfigError::SaveFailed { .. } => "SAVE_FAILED",
            ConfigError::SchemaParse { .. } => "SCHEMA_PARSE_ERROR",
            ConfigError::Path(_) => "PATH_ERROR",
        }
    }

    /// Whether this error was caused by user input rather than the environment
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ConfigError::UnknownKey { .. }
                | ConfigError::UnknownSection { .. }
                | ConfigError::InvalidEntryName { .. }
                | ConfigError::SchemaParse { .. }
        )
    }

    /// Names of the sections that failed, for an aggregate save error.
    pub fn failed_sections(&self) -> Vec<&str> {
        match self {
            ConfigError::SaveFailed { failures } => {
                failures.iter().map(|f| f.section.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}
