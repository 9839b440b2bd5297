//! # livemagic-config
//!
//! Typed, observable mirror of a live-helper configuration tree.
//!
//! A tree is a root directory holding `config/<section>` files of
//! `KEY="value"` lines plus folder-of-files sections such as
//! `config/chroot_local-hooks/`. The [`Schema`] declares which sections and
//! keys exist and how each key is typed.
//!
//! # Main Entry Points
//!
//! - [`LiveHelperConfiguration`] - create, open, reload and save a whole tree
//! - [`KeyVarConfigFile`] - one typed key-value file
//! - [`FolderOfFiles`] - one directory of opaque entries
//! - [`codec`] - text to typed value conversion

mod atomic;
mod line;

pub mod bootstrap;
pub mod codec;
pub mod configuration;
pub mod errors;
pub mod folder;
pub mod key_var;
pub mod logging;
pub mod schema;

// Public API re-exports
pub use bootstrap::{Bootstrap, CommandBootstrap, DEFAULT_BOOTSTRAP_PROGRAM};
pub use codec::{Value, ValueType};
pub use configuration::{Child, LiveHelperConfiguration, LoadObserver, LoadState};
pub use errors::{ConfigError, SectionFailure};
pub use folder::FolderOfFiles;
pub use key_var::KeyVarConfigFile;
pub use logging::init_logging;
pub use schema::{Schema, SchemaBuilder, SectionSpec, sections};
