use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("home directory not found: set $HOME environment variable")]
    HomeNotFound,
}

/// Directory under `$HOME` where new configuration trees are created.
pub const DEFAULT_BASE_DIR: &str = "DebianLive";

/// Timestamp format of a freshly created tree's directory name.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Centralized path construction for a live-helper configuration tree.
///
/// Every path under `<root>/config/` is built here. Use `default_root()` when
/// the caller did not pick a directory and `from_root()` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivePaths {
    root: PathBuf,
}

impl LivePaths {
    /// Paths for an explicit root directory.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/DebianLive/<YYYY-MM-DD-HHMMSS>` for the current local time.
    pub fn default_root() -> Result<PathBuf, PathError> {
        let home = dirs::home_dir().ok_or(PathError::HomeNotFound)?;
        let stamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        Ok(home.join(DEFAULT_BASE_DIR).join(stamp))
    }

    /// Paths rooted at [`LivePaths::default_root`].
    pub fn resolve_default() -> Result<Self, PathError> {
        Self::default_root().map(Self::from_root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/config`, the directory `lh_config` populates.
    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    /// Backing file of a key-value section: `<root>/config/<section>`.
    pub fn section_file(&self, section: &str) -> PathBuf {
        self.config_dir().join(section)
    }

    /// Backing directory of a folder-of-files section: `<root>/config/<dir_name>`.
    pub fn folder_dir(&self, dir_name: &str) -> PathBuf {
        self.config_dir().join(dir_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_paths() -> LivePaths {
        LivePaths::from_root("/home/user/DebianLive/2024-01-01-120000")
    }

    #[test]
    fn test_from_root() {
        let paths = LivePaths::from_root("/tmp/live");
        assert_eq!(paths.root(), Path::new("/tmp/live"));
    }

    #[test]
    fn test_config_dir() {
        assert_eq!(
            test_paths().config_dir(),
            PathBuf::from("/home/user/DebianLive/2024-01-01-120000/config")
        );
    }

    #[test]
    fn test_section_file() {
        assert_eq!(
            test_paths().section_file("binary"),
            PathBuf::from("/home/user/DebianLive/2024-01-01-120000/config/binary")
        );
    }

    #[test]
    fn test_folder_dir() {
        assert_eq!(
            test_paths().folder_dir("chroot_local-hooks"),
            PathBuf::from("/home/user/DebianLive/2024-01-01-120000/config/chroot_local-hooks")
        );
    }

    #[test]
    fn test_default_root_under_home() {
        temp_env::with_var("HOME", Some("/home/tester"), || {
            let root = LivePaths::default_root().unwrap();
            assert!(root.starts_with("/home/tester/DebianLive"));

            let stamp = root.file_name().unwrap().to_string_lossy().to_string();
            assert!(
                chrono::NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).is_ok(),
                "directory name should be a timestamp, got {stamp}"
            );
        });
    }

    #[test]
    fn test_resolve_default_wraps_default_root() {
        temp_env::with_var("HOME", Some("/home/tester"), || {
            let paths = LivePaths::resolve_default().unwrap();
            assert!(paths.config_dir().starts_with("/home/tester/DebianLive"));
            assert!(paths.config_dir().ends_with("config"));
        });
    }
}
