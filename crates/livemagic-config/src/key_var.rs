//! A single `KEY="value"` configuration file with a fixed, typed key set.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::codec::{self, Value, ValueType};
use crate::atomic::write_atomic;
use crate::errors::ConfigError;
use crate::line::{format_entry, has_open_quote, parse_entry};
use crate::schema::SectionSpec;

/// One logical line of the file as last loaded or saved.
///
/// A quoted value running over several physical lines is one logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    /// Written back byte for byte: comments, blank lines, keys outside the
    /// schema. Need not be UTF-8.
    Verbatim(Vec<u8>),
    /// Regenerated from the in-memory value of this schema key.
    Entry(String),
}

/// Typed mirror of one key-value configuration file.
///
/// Every key of the section's schema always has a value; keys the file does
/// not set hold their type's default. Edits stay in memory until [`save`].
///
/// [`save`]: KeyVarConfigFile::save
#[derive(Debug, Clone)]
pub struct KeyVarConfigFile {
    section: String,
    path: PathBuf,
    spec: Arc<SectionSpec>,
    values: BTreeMap<String, Value>,
    dirty: BTreeSet<String>,
    lines: Vec<Line>,
}

impl KeyVarConfigFile {
    /// Create the mirror without touching disk. All keys hold their defaults
    /// until [`load`](Self::load) is called.
    pub fn new(section: impl Into<String>, path: impl Into<PathBuf>, spec: Arc<SectionSpec>) -> Self {
        let values = default_values(&spec);
        Self {
            section: section.into(),
            path: path.into(),
            spec,
            values,
            dirty: BTreeSet::new(),
            lines: Vec::new(),
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema keys in name order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.spec.keys().map(String::as_str)
    }

    /// Schema keys with their current values, in name order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn value_type(&self, key: &str) -> Result<ValueType, ConfigError> {
        self.spec
            .get(key)
            .copied()
            .ok_or_else(|| self.unknown_key(key))
    }

    /// Replace the in-memory state with the file's current content.
    ///
    /// A missing file loads as every key absent. Unsaved edits are discarded.
    /// Bytes that are not UTF-8 never fail the load: lines outside the schema
    /// keep them as they are, entry values get replacement characters.
    ///
    /// # Errors
    ///
    /// `Persistence` when the file exists but cannot be read. The previous
    /// in-memory state is kept in that case.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    event = "config.key_var.load_missing",
                    section = %self.section,
                    path = %self.path.display()
                );
                Vec::new()
            }
            Err(e) => {
                error!(
                    event = "config.key_var.load_failed",
                    section = %self.section,
                    path = %self.path.display(),
                    error = %e
                );
                return Err(ConfigError::persistence(&self.path, e));
            }
        };

        let mut values = default_values(&self.spec);
        let mut lines = Vec::new();
        let mut physical = split_lines(&content).into_iter();
        while let Some(first) = physical.next() {
            let mut bytes = first.to_vec();
            let mut text = decode_line(first);
            while has_open_quote(&text) {
                let Some(next) = physical.next() else {
                    break;
                };
                bytes.push(b'\n');
                bytes.extend_from_slice(next);
                text.push('\n');
                text.push_str(&decode_line(next));
            }

            match parse_entry(&text) {
                Some((key, raw)) if self.spec.contains_key(key) => {
                    let ty = self.spec[key];
                    values.insert(key.to_string(), codec::decode(ty, &raw));
                    lines.push(Line::Entry(key.to_string()));
                }
                _ => lines.push(Line::Verbatim(bytes)),
            }
        }

        self.values = values;
        self.lines = lines;
        self.dirty.clear();

        debug!(
            event = "config.key_var.load_completed",
            section = %self.section,
            keys = self.values.len()
        );
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&Value, ConfigError> {
        self.values.get(key).ok_or_else(|| self.unknown_key(key))
    }

    pub fn get_str(&self, key: &str) -> Result<String, ConfigError> {
        Ok(codec::encode(self.get(key)?))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let value = codec::coerce(ValueType::Boolean, self.get(key)?.clone());
        Ok(value.as_bool().unwrap_or_default())
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        let value = codec::coerce(ValueType::Integer, self.get(key)?.clone());
        Ok(value.as_int().unwrap_or_default())
    }

    pub fn get_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        match codec::coerce(ValueType::List, self.get(key)?.clone()) {
            Value::List(items) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    /// Set a key in memory and mark it dirty.
    ///
    /// The value is coerced to the key's declared type.
    ///
    /// # Errors
    ///
    /// `UnknownKey` when the key is not part of this section's schema. No
    /// state changes in that case.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let ty = self.value_type(key)?;
        let value = codec::coerce(ty, value.into());

        debug!(
            event = "config.key_var.value_set",
            section = %self.section,
            key = key,
            value = %value
        );
        self.values.insert(key.to_string(), value);
        self.dirty.insert(key.to_string());
        Ok(())
    }

    /// True when any key was set since the last load or save.
    pub fn altered(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Keys set since the last load or save, in name order.
    pub fn dirty_keys(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Write every schema key to disk and clear the dirty flags.
    ///
    /// Entry lines from the loaded file are rewritten in place, schema keys the
    /// file never had are appended, and every other line is kept. The new
    /// content goes to a temp file in the target directory which then replaces
    /// the target, so a failed save leaves the old file as it was.
    ///
    /// # Errors
    ///
    /// `Persistence` when the temp file cannot be created or written, or
    /// cannot replace the target. Dirty flags are kept so the save can be retried.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        info!(
            event = "config.key_var.save_started",
            section = %self.section,
            path = %self.path.display(),
            dirty = self.dirty.len()
        );

        let lines = self.layout();
        let content = self.render(&lines);

        if let Err(e) = write_atomic(&self.path, &content, FILE_MODE) {
            error!(
                event = "config.key_var.save_failed",
                section = %self.section,
                path = %self.path.display(),
                error = %e
            );
            return Err(ConfigError::persistence(&self.path, e));
        }

        self.lines = lines;
        self.dirty.clear();

        info!(
            event = "config.key_var.save_completed",
            section = %self.section,
            path = %self.path.display()
        );
        Ok(())
    }

    /// Loaded lines plus an entry for every schema key they lack.
    fn layout(&self) -> Vec<Line> {
        let present: BTreeSet<&str> = self
            .lines
            .iter()
            .filter_map(|line| match line {
                Line::Entry(key) => Some(key.as_str()),
                Line::Verbatim(_) => None,
            })
            .collect();

        let mut lines = self.lines.clone();
        lines.extend(
            self.spec
                .keys()
                .filter(|key| !present.contains(key.as_str()))
                .map(|key| Line::Entry(key.clone())),
        );
        lines
    }

    fn render(&self, lines: &[Line]) -> Vec<u8> {
        let mut out = Vec::new();
        for line in lines {
            match line {
                Line::Verbatim(bytes) => out.extend_from_slice(bytes),
                Line::Entry(key) => {
                    let raw = self.values.get(key).map(codec::encode).unwrap_or_default();
                    out.extend_from_slice(format_entry(key, &raw).as_bytes());
                }
            }
            out.push(b'\n');
        }
        out
    }

    fn unknown_key(&self, key: &str) -> ConfigError {
        ConfigError::UnknownKey {
            section: self.section.clone(),
            key: key.to_string(),
        }
    }
}

/// Mode of a newly created config file.
const FILE_MODE: u32 = 0o644;

/// Physical lines without their `\n`. A final line break does not start
/// another line.
fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    if content.is_empty() {
        return Vec::new();
    }
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    body.split(|&b| b == b'\n').collect()
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

fn default_values(spec: &SectionSpec) -> BTreeMap<String, Value> {
    spec.iter()
        .map(|(key, ty)| (key.clone(), ty.default_value()))
        .collect()
}
