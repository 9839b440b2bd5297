//! The schema of a configuration tree: which sections exist, which keys each
//! key-value section holds and how each key is typed.
//!
//! A `Schema` is built once (from the built-in live-helper table, a TOML file,
//! or a [`SchemaBuilder`]) and then shared read-only by every object loaded
//! from it.

use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error};

use crate::codec::ValueType;
use crate::errors::ConfigError;

/// Key name to type tag for one key-value section.
pub type SectionSpec = BTreeMap<String, ValueType>;

/// Section names of the built-in live-helper schema.
pub mod sections {
    pub const BINARY: &str = "binary";
    pub const BOOTSTRAP: &str = "bootstrap";
    pub const CHROOT: &str = "chroot";
    pub const COMMON: &str = "common";
    pub const SOURCE: &str = "source";
    pub const HOOKS: &str = "hooks";
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    key_value: BTreeMap<String, Arc<SectionSpec>>,
    folder_of_files: BTreeMap<String, String>,
}

/// On-disk shape of a schema file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    #[serde(default)]
    key_value: BTreeMap<String, SectionSpec>,
    #[serde(default)]
    folder_of_files: BTreeMap<String, String>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Parse a schema from TOML.
    ///
    /// ```toml
    /// [folder_of_files]
    /// hooks = "chroot_local-hooks"
    ///
    /// [key_value.common]
    /// LH_DEBUG = "boolean"
    /// LH_APT_PIPELINE = "int"
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: SchemaFile = toml::from_str(content).map_err(|e| ConfigError::SchemaParse {
            message: e.to_string(),
        })?;

        let mut builder = Schema::builder();
        for (name, spec) in file.key_value {
            builder = builder.section(name, spec);
        }
        for (name, dir) in file.folder_of_files {
            builder = builder.folder(name, dir);
        }
        builder.build()
    }

    /// Read and parse a TOML schema file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::persistence(path, e))?;
        let schema = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::SchemaParse { message } => ConfigError::SchemaParse {
                message: format!("'{}': {}", path.display(), message),
            },
            other => other,
        })?;

        debug!(
            event = "config.schema.loaded",
            path = %path.display(),
            sections = schema.key_value.len(),
            folders = schema.folder_of_files.len()
        );
        Ok(schema)
    }

    /// The live-helper configuration layout written by `lh_config`.
    pub fn live_helper() -> Self {
        use ValueType::{Boolean as B, Integer as I, List as L, String as S};

        let tables: [(&str, &[(&str, ValueType)]); 5] = [
            (
                sections::BINARY,
                &[
                    ("LH_BINARY_IMAGES", S),
                    ("LH_BINARY_INDICES", B),
                    ("LH_BOOTAPPEND", S),
                    ("LH_BOOTLOADER", S),
                    ("LH_DEBIAN_INSTALLER", B),
                    ("LH_ENCRYPTION", S),
                    ("LH_GRUB_SPLASH", S),
                    ("LH_HOSTNAME", S),
                    ("LH_ISO_APPLICATION", S),
                    ("LH_ISO_PREPARER", S),
                    ("LH_ISO_PUBLISHER", S),
                    ("LH_ISO_VOLUME", S),
                    ("LH_MEMTEST", S),
                    ("LH_NET_PATH", S),
                    ("LH_NET_SERVER", S),
                    ("LH_SYSLINUX_SPLASH", S),
                    ("LH_USERNAME", S),
                ],
            ),
            (
                sections::BOOTSTRAP,
                &[
                    ("LH_ARCHITECTURE", L),
                    ("LH_BOOTSTRAP_CONFIG", S),
                    ("LH_BOOTSTRAP_FLAVOUR", S),
                    ("LH_BOOTSTRAP_KEYRING", S),
                    ("LH_DISTRIBUTION", S),
                    ("LH_MIRROR_BINARY", S),
                    ("LH_MIRROR_BINARY_SECURITY", S),
                    ("LH_MIRROR_BOOTSTRAP", S),
                    ("LH_MIRROR_BOOTSTRAP_SECURITY", S),
                    ("LH_SECTIONS", L),
                ],
            ),
            (
                sections::CHROOT,
                &[
                    ("LH_CHROOT_FILESYSTEM", S),
                    ("LH_HOOKS", L),
                    ("LH_INTERACTIVE", B),
                    ("LH_KEYRING_PACKAGES", L),
                    ("LH_LANGUAGE", S),
                    ("LH_LINUX_FLAVOURS", L),
                    ("LH_LINUX_PACKAGES", L),
                    ("LH_PACKAGES", L),
                    ("LH_PACKAGES_LISTS", S),
                    ("LH_PRESEED", S),
                    ("LH_SECURITY", B),
                    ("LH_SYMLINKS", B),
                    ("LH_SYSVINIT", B),
                    ("LH_TASKS", L),
                    ("LH_UNION_FILESYSTEM", S),
                ],
            ),
            (
                sections::COMMON,
                &[
                    ("LH_APT", S),
                    ("LH_APT_FTPPROXY", S),
                    ("LH_APT_HTTPPROXY", S),
                    ("LH_APT_PDIFFS", B),
                    ("LH_APT_PIPELINE", I),
                    ("LH_APT_RECOMMENDS", B),
                    ("LH_APT_SECURE", B),
                    ("LH_BOOTSTRAP", S),
                    ("LH_BREAKPOINTS", B),
                    ("LH_CACHE_INDICES", B),
                    ("LH_CACHE_PACKAGES", B),
                    ("LH_CACHE_STAGES", L),
                    ("LH_DEBCONF_FRONTEND", S),
                    ("LH_DEBCONF_NOWARNINGS", B),
                    ("LH_DEBCONF_PRIORITY", S),
                    ("LH_DEBUG", B),
                    ("LH_FORCE", B),
                    ("LH_GENISOIMAGE", S),
                    ("LH_INCLUDES", S),
                    ("LH_INITRAMFS", S),
                    ("LH_LOSETUP", S),
                    ("LH_MODE", S),
                    ("LH_QUIET", B),
                    ("LH_ROOT", S),
                    ("LH_ROOT_COMMAND", S),
                    ("LH_TASKSEL", S),
                    ("LH_TEMPLATES", S),
                    ("LH_VERBOSE", B),
                ],
            ),
            (
                sections::SOURCE,
                &[("LH_SOURCE", B), ("LH_SOURCE_IMAGES", L)],
            ),
        ];

        let key_value = tables
            .iter()
            .map(|(section, keys)| {
                let spec: SectionSpec = keys
                    .iter()
                    .map(|(key, ty)| (key.to_string(), *ty))
                    .collect();
                (section.to_string(), Arc::new(spec))
            })
            .collect();

        let folder_of_files = BTreeMap::from([(
            sections::HOOKS.to_string(),
            "chroot_local-hooks".to_string(),
        )]);

        Self {
            key_value,
            folder_of_files,
        }
    }

    /// Key-value sections in iteration order.
    pub fn key_value_sections(&self) -> impl Iterator<Item = (&str, &Arc<SectionSpec>)> {
        self.key_value.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Folder-of-files sections and their directory names, in iteration order.
    pub fn folder_sections(&self) -> impl Iterator<Item = (&str, &str)> {
        self.folder_of_files
            .iter()
            .map(|(name, dir)| (name.as_str(), dir.as_str()))
    }

    pub fn section(&self, name: &str) -> Option<&Arc<SectionSpec>> {
        self.key_value.get(name)
    }

    pub fn folder_dir_name(&self, name: &str) -> Option<&str> {
        self.folder_of_files.get(name).map(String::as_str)
    }

    pub fn key_type(&self, section: &str, key: &str) -> Option<ValueType> {
        self.key_value.get(section)?.get(key).copied()
    }
}

/// Programmatic schema construction, validated by [`SchemaBuilder::build`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    key_value: Vec<(String, SectionSpec)>,
    folder_of_files: Vec<(String, String)>,
}

impl SchemaBuilder {
    pub fn section<K, I>(mut self, name: impl Into<String>, keys: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ValueType)>,
    {
        let spec = keys.into_iter().map(|(k, ty)| (k.into(), ty)).collect();
        self.key_value.push((name.into(), spec));
        self
    }

    pub fn folder(mut self, name: impl Into<String>, dir_name: impl Into<String>) -> Self {
        self.folder_of_files.push((name.into(), dir_name.into()));
        self
    }

    /// Validate names and assemble the schema.
    ///
    /// # Errors
    ///
    /// `SchemaParse` when a section name or directory is not a relative path
    /// inside the config directory, a key is not a shell variable name, or a
    /// name is declared twice.
    pub fn build(self) -> Result<Schema, ConfigError> {
        let mut schema = Schema::default();

        for (name, spec) in self.key_value {
            validate_relative(&name, "section")?;
            for key in spec.keys() {
                validate_key(&name, key)?;
            }
            if schema.key_value.insert(name.clone(), Arc::new(spec)).is_some() {
                return Err(duplicate(&name));
            }
        }

        for (name, dir) in self.folder_of_files {
            validate_relative(&name, "folder section")?;
            validate_relative(&dir, "folder directory")?;
            if schema.key_value.contains_key(&name)
                || schema.folder_of_files.insert(name.clone(), dir).is_some()
            {
                return Err(duplicate(&name));
            }
        }

        Ok(schema)
    }
}

fn duplicate(name: &str) -> ConfigError {
    error!(event = "config.schema.validation_failed", section = name, reason = "duplicate");
    ConfigError::SchemaParse {
        message: format!("section '{}' is declared more than once", name),
    }
}

fn validate_relative(name: &str, what: &str) -> Result<(), ConfigError> {
    let path = Path::new(name);
    let is_relative = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if is_relative {
        Ok(())
    } else {
        error!(event = "config.schema.validation_failed", name = name, reason = what);
        Err(ConfigError::SchemaParse {
            message: format!("{} name '{}' must be a relative path without '..'", what, name),
        })
    }
}

fn validate_key(section: &str, key: &str) -> Result<(), ConfigError> {
    let mut chars = key.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::SchemaParse {
            message: format!("key '{}' in section '{}' is not a valid variable name", key, section),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_helper_sections() {
        let schema = Schema::live_helper();
        let names: Vec<&str> = schema.key_value_sections().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["binary", "bootstrap", "chroot", "common", "source"]);
        assert_eq!(schema.folder_dir_name(sections::HOOKS), Some("chroot_local-hooks"));
    }

    #[test]
    fn test_live_helper_key_types() {
        let schema = Schema::live_helper();
        assert_eq!(schema.key_type("common", "LH_APT_PIPELINE"), Some(ValueType::Integer));
        assert_eq!(schema.key_type("common", "LH_DEBUG"), Some(ValueType::Boolean));
        assert_eq!(schema.key_type("bootstrap", "LH_ARCHITECTURE"), Some(ValueType::List));
        assert_eq!(schema.key_type("binary", "LH_HOSTNAME"), Some(ValueType::String));
        assert_eq!(schema.key_type("binary", "LH_DEBUG"), None);
        assert_eq!(schema.section("common").map(|s| s.len()), Some(28));
    }

    #[test]
    fn test_live_helper_passes_validation() {
        let schema = Schema::live_helper();
        let mut builder = Schema::builder();
        for (name, spec) in schema.key_value_sections() {
            builder = builder.section(name, spec.iter().map(|(k, ty)| (k.clone(), *ty)));
        }
        for (name, dir) in schema.folder_sections() {
            builder = builder.folder(name, dir);
        }
        assert_eq!(builder.build().unwrap(), schema);
    }

    #[test]
    fn test_from_toml_str() {
        let schema = Schema::from_toml_str(
            r#"
            [folder_of_files]
            hooks = "chroot_local-hooks"

            [key_value.common]
            LH_DEBUG = "boolean"
            LH_APT_PIPELINE = "int"
            LH_CACHE_STAGES = "list"
            "#,
        )
        .unwrap();
        assert_eq!(schema.key_type("common", "LH_APT_PIPELINE"), Some(ValueType::Integer));
        assert_eq!(schema.key_type("common", "LH_CACHE_STAGES"), Some(ValueType::List));
        assert_eq!(schema.folder_dir_name("hooks"), Some("chroot_local-hooks"));
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_type() {
        let result = Schema::from_toml_str("[key_value.common]\nLH_DEBUG = \"float\"\n");
        assert!(matches!(result, Err(ConfigError::SchemaParse { .. })));
    }

    #[test]
    fn test_builder_rejects_escaping_section() {
        let result = Schema::builder()
            .section("../outside", [("LH_X", ValueType::String)])
            .build();
        assert!(matches!(result, Err(ConfigError::SchemaParse { .. })));
    }

    #[test]
    fn test_builder_rejects_bad_key() {
        let result = Schema::builder()
            .section("common", [("LH-DEBUG", ValueType::Boolean)])
            .build();
        assert!(matches!(result, Err(ConfigError::SchemaParse { .. })));
    }

    #[test]
    fn test_builder_rejects_duplicate_names() {
        let result = Schema::builder()
            .section("hooks", [("LH_X", ValueType::String)])
            .folder("hooks", "chroot_local-hooks")
            .build();
        assert!(matches!(result, Err(ConfigError::SchemaParse { .. })));
    }

    #[test]
    fn test_builder_allows_nested_section_file() {
        let schema = Schema::builder()
            .section("extra/binary", [("LH_X", ValueType::String)])
            .build()
            .unwrap();
        assert!(schema.section("extra/binary").is_some());
    }

    #[test]
    fn test_from_file_reports_path_on_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schema.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let err = Schema::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("schema.toml"));
    }

    #[test]
    fn test_from_file_missing_is_persistence_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Schema::from_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Persistence { .. }));
    }
}
