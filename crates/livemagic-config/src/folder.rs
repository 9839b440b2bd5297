//! A directory of opaque named files, such as live-helper's chroot hooks.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::atomic::write_atomic;
use crate::errors::ConfigError;

/// Hooks are scripts run inside the chroot.
const ENTRY_MODE: u32 = 0o755;

/// In-memory mirror of a folder of files.
///
/// Entry contents are never interpreted. The folder counts as altered when
/// its entries differ from what is on disk as of the last load or save.
#[derive(Debug, Clone)]
pub struct FolderOfFiles {
    section: String,
    path: PathBuf,
    entries: BTreeMap<String, Vec<u8>>,
    on_disk: BTreeMap<String, Vec<u8>>,
}

impl FolderOfFiles {
    pub fn new(section: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            section: section.into(),
            path: path.into(),
            entries: BTreeMap::new(),
            on_disk: BTreeMap::new(),
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every regular file in the directory, following symlinks. A missing
    /// directory is empty.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        let read_dir = match fs::read_dir(&self.path) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    event = "config.folder.load_missing",
                    section = %self.section,
                    path = %self.path.display()
                );
                self.entries.clear();
                self.on_disk.clear();
                return Ok(());
            }
            Err(e) => return Err(self.load_failed(&self.path, e)),
        };

        let mut entries = BTreeMap::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| self.load_failed(&self.path, e))?;
            let entry_path = entry.path();
            // Follows symlinks, so a linked script counts as a file.
            let metadata = match fs::metadata(&entry_path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(
                        event = "config.folder.entry_skipped",
                        section = %self.section,
                        path = %entry_path.display(),
                        reason = "dangling symlink"
                    );
                    continue;
                }
                Err(e) => return Err(self.load_failed(&entry_path, e)),
            };
            if !metadata.is_file() {
                warn!(
                    event = "config.folder.entry_skipped",
                    section = %self.section,
                    path = %entry_path.display(),
                    reason = "not a regular file"
                );
                continue;
            }

            let Ok(name) = entry.file_name().into_string() else {
                warn!(
                    event = "config.folder.entry_skipped",
                    section = %self.section,
                    path = %entry_path.display(),
                    reason = "non-utf8 name"
                );
                continue;
            };
            let content = fs::read(&entry_path).map_err(|e| self.load_failed(&entry_path, e))?;
            entries.insert(name, content);
        }

        debug!(
            event = "config.folder.load_completed",
            section = %self.section,
            entries = entries.len()
        );
        self.on_disk = entries.clone();
        self.entries = entries;
        Ok(())
    }

    /// Names of the current entries.
    pub fn list(&self) -> BTreeSet<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Add or replace an entry in memory.
    ///
    /// # Errors
    ///
    /// `InvalidEntryName` when `name` is not a plain file name.
    pub fn insert(&mut self, name: &str, content: impl Into<Vec<u8>>) -> Result<(), ConfigError> {
        validate_entry_name(name)?;
        self.entries.insert(name.to_string(), content.into());
        Ok(())
    }

    /// Remove an entry in memory, returning its content if it existed.
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.remove(name)
    }

    pub fn altered(&self) -> bool {
        self.entries != self.on_disk
    }

    /// Write added and changed entries, delete removed ones.
    ///
    /// The directory is created if needed. Each entry is written atomically;
    /// entries that were saved before a failure stay saved.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        info!(
            event = "config.folder.save_started",
            section = %self.section,
            path = %self.path.display()
        );

        if let Err(e) = fs::create_dir_all(&self.path) {
            return Err(self.save_failed(&self.path, e));
        }

        let changed: Vec<String> = self
            .entries
            .iter()
            .filter(|(name, content)| self.on_disk.get(*name) != Some(*content))
            .map(|(name, _)| name.clone())
            .collect();
        for name in changed {
            let entry_path = self.path.join(&name);
            let content = &self.entries[&name];
            if let Err(e) = write_atomic(&entry_path, content, ENTRY_MODE) {
                return Err(self.save_failed(&entry_path, e));
            }
            self.on_disk.insert(name, content.clone());
        }

        let removed: Vec<String> = self
            .on_disk
            .keys()
            .filter(|name| !self.entries.contains_key(*name))
            .cloned()
            .collect();
        for name in removed {
            let entry_path = self.path.join(&name);
            match fs::remove_file(&entry_path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(self.save_failed(&entry_path, e)),
            }
            self.on_disk.remove(&name);
        }

        info!(
            event = "config.folder.save_completed",
            section = %self.section,
            entries = self.entries.len()
        );
        Ok(())
    }

    fn load_failed(&self, path: &Path, e: std::io::Error) -> ConfigError {
        error!(
            event = "config.folder.load_failed",
            section = %self.section,
            path = %path.display(),
            error = %e
        );
        ConfigError::persistence(path, e)
    }

    fn save_failed(&self, path: &Path, e: std::io::Error) -> ConfigError {
        error!(
            event = "config.folder.save_failed",
            section = %self.section,
            path = %path.display(),
            error = %e
        );
        ConfigError::persistence(path, e)
    }
}

fn validate_entry_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidEntryName {
            name: name.to_string(),
        })
    }
}
