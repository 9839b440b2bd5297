//! The aggregate over a whole configuration tree.
//!
//! `LiveHelperConfiguration` owns one child per schema section, rebuilds all of
//! them on every load and tells registered observers when a reload has
//! replaced the children they may be holding views of.

use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use livemagic_paths::LivePaths;
use tracing::{error, info, warn};

use crate::bootstrap::{Bootstrap, CommandBootstrap};
use crate::errors::{ConfigError, SectionFailure};
use crate::folder::FolderOfFiles;
use crate::key_var::KeyVarConfigFile;
use crate::schema::Schema;

/// Whether the aggregate has completed its first load.
///
/// Observers are only told about loads after the first one: before it there
/// is no state anyone could be holding a stale view of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotYetLoaded,
    Loaded,
}

/// One section of the tree.
#[derive(Debug, Clone)]
pub enum Child {
    KeyValue(KeyVarConfigFile),
    Folder(FolderOfFiles),
}

impl Child {
    pub fn name(&self) -> &str {
        match self {
            Child::KeyValue(file) => file.section(),
            Child::Folder(folder) => folder.section(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Child::KeyValue(file) => file.path(),
            Child::Folder(folder) => folder.path(),
        }
    }

    pub fn altered(&self) -> bool {
        match self {
            Child::KeyValue(file) => file.altered(),
            Child::Folder(folder) => folder.altered(),
        }
    }

    fn load(&mut self) -> Result<(), ConfigError> {
        match self {
            Child::KeyValue(file) => file.load(),
            Child::Folder(folder) => folder.load(),
        }
    }

    fn save(&mut self) -> Result<(), ConfigError> {
        match self {
            Child::KeyValue(file) => file.save(),
            Child::Folder(folder) => folder.save(),
        }
    }
}

/// Callback run after every load except the first.
///
/// It receives the aggregate with its new children in place.
pub type LoadObserver = Box<dyn FnMut(&LiveHelperConfiguration)>;

pub struct LiveHelperConfiguration {
    dir: PathBuf,
    schema: Arc<Schema>,
    children: Vec<Child>,
    state: LoadState,
    observers: Vec<LoadObserver>,
    bootstrap: Box<dyn Bootstrap>,
}

impl std::fmt::Debug for LiveHelperConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveHelperConfiguration")
            .field("dir", &self.dir)
            .field("children", &self.children)
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .field("bootstrap", &self.bootstrap.describe())
            .finish()
    }
}

impl LiveHelperConfiguration {
    /// Create an unloaded aggregate. Nothing is read or written.
    ///
    /// Without `dir` the root defaults to `~/DebianLive/<timestamp>`.
    pub fn new(dir: Option<PathBuf>, schema: Arc<Schema>) -> Result<Self, ConfigError> {
        let dir = match dir {
            Some(dir) => dir,
            None => LivePaths::default_root()?,
        };

        Ok(Self {
            dir,
            schema,
            children: Vec::new(),
            state: LoadState::NotYetLoaded,
            observers: Vec::new(),
            bootstrap: Box::new(CommandBootstrap::default()),
        })
    }

    /// Replace the command used by [`create`](Self::create).
    pub fn with_bootstrap(mut self, bootstrap: impl Bootstrap + 'static) -> Self {
        self.bootstrap = Box::new(bootstrap);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    /// Seed a fresh tree with the bootstrap command and load it.
    ///
    /// With `tempdir` the tree is created there and the aggregate is rebound
    /// to it; otherwise the current root is used. The root is created if
    /// missing.
    ///
    /// # Errors
    ///
    /// `Persistence` if the root cannot be created, `Bootstrap` if the command
    /// fails, or any load error. On failure the previous root and children
    /// are kept.
    pub fn create(&mut self, tempdir: Option<PathBuf>) -> Result<(), ConfigError> {
        let target = tempdir.unwrap_or_else(|| self.dir.clone());
        info!(event = "config.configuration.create_started", path = %target.display());

        if let Err(e) = fs::create_dir_all(&target) {
            error!(
                event = "config.configuration.create_failed",
                path = %target.display(),
                error = %e
            );
            return Err(ConfigError::persistence(&target, e));
        }

        self.bootstrap.run(&target)?;
        self.load_from(target)?;

        info!(event = "config.configuration.create_completed", path = %self.dir.display());
        Ok(())
    }

    /// Discard the current state and load the tree rooted at `dir`.
    ///
    /// Unsaved edits are lost; check [`altered`](Self::altered) first if they
    /// matter. On failure the previous root and children are kept.
    pub fn open(&mut self, dir: impl Into<PathBuf>) -> Result<(), ConfigError> {
        self.load_from(dir.into())
    }

    /// Discard unsaved edits and reload the current root from disk.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        self.load_from(self.dir.clone())
    }

    /// Load every section under `dir` and swap them in as a whole.
    fn load_from(&mut self, dir: PathBuf) -> Result<(), ConfigError> {
        let children = match self.load_children(&dir) {
            Ok(children) => children,
            Err(e) => {
                error!(
                    event = "config.configuration.load_failed",
                    path = %dir.display(),
                    error = %e
                );
                return Err(e);
            }
        };

        self.dir = dir;
        self.children = children;
        info!(
            event = "config.configuration.load_completed",
            path = %self.dir.display(),
            children = self.children.len()
        );

        match self.state {
            LoadState::NotYetLoaded => self.state = LoadState::Loaded,
            LoadState::Loaded => self.notify_load_observers(),
        }
        Ok(())
    }

    fn load_children(&self, dir: &Path) -> Result<Vec<Child>, ConfigError> {
        let paths = LivePaths::from_root(dir);
        let mut children = Vec::new();

        for (name, spec) in self.schema.key_value_sections() {
            let mut file = KeyVarConfigFile::new(name, paths.section_file(name), Arc::clone(spec));
            file.load()?;
            children.push(Child::KeyValue(file));
        }

        for (name, dir_name) in self.schema.folder_sections() {
            let mut folder = FolderOfFiles::new(name, paths.folder_dir(dir_name));
            folder.load()?;
            children.push(Child::Folder(folder));
        }

        Ok(children)
    }

    /// Run every observer in registration order.
    ///
    /// A panicking observer is logged and does not stop the others.
    fn notify_load_observers(&mut self) {
        let mut observers = std::mem::take(&mut self.observers);
        for (index, observer) in observers.iter_mut().enumerate() {
            let config = &*self;
            if catch_unwind(AssertUnwindSafe(|| observer(config))).is_err() {
                warn!(event = "config.configuration.observer_panicked", observer = index);
            }
        }
        self.observers = observers;
    }

    /// Register a callback run after every reload.
    ///
    /// Every reload replaces the children, so observers re-read whatever they
    /// need from the aggregate they are handed.
    pub fn attach_load_observer(
        &mut self,
        observer: impl FnMut(&LiveHelperConfiguration) + 'static,
    ) {
        self.observers.push(Box::new(observer));
    }

    /// Save every section in order.
    ///
    /// A failing section does not stop the others from being saved.
    ///
    /// # Errors
    ///
    /// `SaveFailed` listing each section that could not be saved.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        info!(event = "config.configuration.save_started", path = %self.dir.display());

        let mut failures = Vec::new();
        for child in &mut self.children {
            if let Err(error) = child.save() {
                failures.push(SectionFailure {
                    section: child.name().to_string(),
                    error,
                });
            }
        }

        if failures.is_empty() {
            info!(event = "config.configuration.save_completed", path = %self.dir.display());
            Ok(())
        } else {
            error!(
                event = "config.configuration.save_failed",
                path = %self.dir.display(),
                failed = failures.len()
            );
            Err(ConfigError::SaveFailed { failures })
        }
    }

    /// True if any section has unsaved changes.
    pub fn altered(&self) -> bool {
        self.children.iter().any(Child::altered)
    }

    /// Names of the sections with unsaved changes, in child order.
    pub fn altered_sections(&self) -> Vec<&str> {
        self.children
            .iter()
            .filter(|child| child.altered())
            .map(Child::name)
            .collect()
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn section(&self, name: &str) -> Result<&KeyVarConfigFile, ConfigError> {
        self.children
            .iter()
            .find_map(|child| match child {
                Child::KeyValue(file) if file.section() == name => Some(file),
                _ => None,
            })
            .ok_or_else(|| unknown_section(name))
    }

    pub fn section_mut(&mut self, name: &str) -> Result<&mut KeyVarConfigFile, ConfigError> {
        self.children
            .iter_mut()
            .find_map(|child| match child {
                Child::KeyValue(file) if file.section() == name => Some(file),
                _ => None,
            })
            .ok_or_else(|| unknown_section(name))
    }

    pub fn folder(&self, name: &str) -> Result<&FolderOfFiles, ConfigError> {
        self.children
            .iter()
            .find_map(|child| match child {
                Child::Folder(folder) if folder.section() == name => Some(folder),
                _ => None,
            })
            .ok_or_else(|| unknown_section(name))
    }

    pub fn folder_mut(&mut self, name: &str) -> Result<&mut FolderOfFiles, ConfigError> {
        self.children
            .iter_mut()
            .find_map(|child| match child {
                Child::Folder(folder) if folder.section() == name => Some(folder),
                _ => None,
            })
            .ok_or_else(|| unknown_section(name))
    }
}

fn unknown_section(name: &str) -> ConfigError {
    ConfigError::UnknownSection {
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ValueType;
    use crate::schema::sections;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Writes a minimal tree the way `lh_config` would.
    struct FakeLhConfig;

    impl Bootstrap for FakeLhConfig {
        fn run(&self, dir: &Path) -> Result<(), ConfigError> {
            let config = dir.join("config");
            fs::create_dir_all(config.join("chroot_local-hooks"))
                .map_err(|e| ConfigError::persistence(&config, e))?;
            fs::write(config.join("common"), "LH_DEBUG=\"disabled\"\nLH_APT_PIPELINE=\"2\"\n")
                .map_err(|e| ConfigError::persistence(&config, e))?;
            Ok(())
        }

        fn describe(&self) -> String {
            "fake-lh_config".to_string()
        }
    }

    struct FailingLhConfig;

    impl Bootstrap for FailingLhConfig {
        fn run(&self, _dir: &Path) -> Result<(), ConfigError> {
            Err(ConfigError::Bootstrap {
                command: self.describe(),
                output: "E: need root".to_string(),
            })
        }

        fn describe(&self) -> String {
            "failing-lh_config".to_string()
        }
    }

    fn configuration(dir: &Path) -> LiveHelperConfiguration {
        LiveHelperConfiguration::new(Some(dir.to_path_buf()), Arc::new(Schema::live_helper()))
            .unwrap()
            .with_bootstrap(FakeLhConfig)
    }

    fn counter(
        log: &Rc<RefCell<Vec<usize>>>,
        id: usize,
    ) -> impl FnMut(&LiveHelperConfiguration) + 'static {
        let log = Rc::clone(log);
        move |_| log.borrow_mut().push(id)
    }

    #[test]
    fn test_new_does_not_load() {
        let dir = TempDir::new().unwrap();
        let config = configuration(dir.path());
        assert_eq!(config.state(), LoadState::NotYetLoaded);
        assert!(config.children().is_empty());
        assert!(!config.altered());
        assert!(!dir.path().join("config").exists());
    }

    #[test]
    fn test_new_without_dir_uses_default_root() {
        temp_env::with_var("HOME", Some("/home/tester"), || {
            let config = LiveHelperConfiguration::new(None, Arc::new(Schema::live_helper())).unwrap();
            assert!(config.dir().starts_with("/home/tester/DebianLive"));
        });
    }

    #[test]
    fn test_create_bootstraps_and_loads() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("live");
        let mut config = configuration(&root);
        config.create(None).unwrap();

        assert!(config.is_loaded());
        assert_eq!(config.children().len(), 6);
        let common = config.section(sections::COMMON).unwrap();
        assert_eq!(common.get_int("LH_APT_PIPELINE").unwrap(), 2);
        assert!(!config.altered());
    }

    #[test]
    fn test_create_into_tempdir_rebinds_root() {
        let dir = TempDir::new().unwrap();
        let mut config = configuration(&dir.path().join("unused"));
        let target = dir.path().join("elsewhere");
        config.create(Some(target.clone())).unwrap();

        assert_eq!(config.dir(), target);
        assert!(target.join("config").join("common").exists());
    }

    #[test]
    fn test_create_failure_leaves_unloaded() {
        let dir = TempDir::new().unwrap();
        let mut config =
            LiveHelperConfiguration::new(Some(dir.path().to_path_buf()), Arc::new(Schema::live_helper()))
                .unwrap()
                .with_bootstrap(FailingLhConfig);

        let err = config.create(None).unwrap_err();
        match err {
            ConfigError::Bootstrap { output, .. } => assert_eq!(output, "E: need root"),
            other => panic!("expected bootstrap error, got {other:?}"),
        }
        assert_eq!(config.state(), LoadState::NotYetLoaded);
        assert!(config.children().is_empty());
    }

    #[test]
    fn test_failed_create_after_load_keeps_previous_tree() {
        let dir = TempDir::new().unwrap();
        let mut config = configuration(dir.path());
        config.create(None).unwrap();
        config
            .section_mut(sections::COMMON)
            .unwrap()
            .set("LH_DEBUG", true)
            .unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        config.attach_load_observer(counter(&log, 1));

        let mut config = config.with_bootstrap(FailingLhConfig);
        let other = dir.path().join("other");
        let err = config.create(Some(other)).unwrap_err();
        assert!(matches!(err, ConfigError::Bootstrap { .. }));

        assert_eq!(config.dir(), dir.path());
        assert_eq!(config.state(), LoadState::Loaded);
        assert_eq!(config.children().len(), 6);
        let common = config.section(sections::COMMON).unwrap();
        assert!(common.get_bool("LH_DEBUG").unwrap());
        assert_eq!(common.get_int("LH_APT_PIPELINE").unwrap(), 2);
        assert!(config.altered());
        assert!(log.borrow().is_empty(), "failed create must not notify");
    }

    #[test]
    fn test_children_follow_schema_order() {
        let dir = TempDir::new().unwrap();
        let mut config = configuration(dir.path());
        config.open(dir.path()).unwrap();

        let names: Vec<&str> = config.children().iter().map(Child::name).collect();
        assert_eq!(names, vec!["binary", "bootstrap", "chroot", "common", "source", "hooks"]);
        assert_eq!(
            config.children()[0].path(),
            dir.path().join("config").join("binary")
        );
        assert_eq!(
            config.folder(sections::HOOKS).unwrap().path(),
            dir.path().join("config").join("chroot_local-hooks")
        );
    }

    #[test]
    fn test_unknown_section_lookup() {
        let dir = TempDir::new().unwrap();
        let mut config = configuration(dir.path());
        config.open(dir.path()).unwrap();

        assert!(matches!(
            config.section("nope"),
            Err(ConfigError::UnknownSection { .. })
        ));
        // A folder section is not a key-value section and vice versa.
        assert!(config.section(sections::HOOKS).is_err());
        assert!(config.folder(sections::COMMON).is_err());
    }

    #[test]
    fn test_first_load_does_not_notify() {
        let dir = TempDir::new().unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut config = configuration(dir.path());
        config.attach_load_observer(counter(&log, 1));

        config.open(dir.path()).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_later_loads_notify_in_registration_order() {
        let dir = TempDir::new().unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut config = configuration(dir.path());
        config.create(None).unwrap();

        config.attach_load_observer(counter(&log, 1));
        config.attach_load_observer(counter(&log, 2));
        assert!(log.borrow().is_empty());

        config.reload().unwrap();
        assert_eq!(*log.borrow(), vec![1, 2]);

        config.open(dir.path()).unwrap();
        assert_eq!(*log.borrow(), vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_panicking_observer_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut config = configuration(dir.path());
        config.open(dir.path()).unwrap();

        config.attach_load_observer(counter(&log, 1));
        config.attach_load_observer(|_| panic!("view went away"));
        config.attach_load_observer(counter(&log, 3));

        config.reload().unwrap();
        assert_eq!(*log.borrow(), vec![1, 3]);
    }

    #[test]
    fn test_observer_reads_new_children() {
        let dir = TempDir::new().unwrap();
        let mut config = configuration(dir.path());
        config.create(None).unwrap();

        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        config.attach_load_observer(move |tree| {
            let pipeline = tree
                .section(sections::COMMON)
                .and_then(|common| common.get_int("LH_APT_PIPELINE"))
                .ok();
            *sink.borrow_mut() = pipeline;
        });

        fs::write(
            dir.path().join("config").join("common"),
            "LH_APT_PIPELINE=\"7\"\n",
        )
        .unwrap();
        config.reload().unwrap();

        assert_eq!(*seen.borrow(), Some(7));
    }

    #[test]
    fn test_observers_survive_notification() {
        let dir = TempDir::new().unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut config = configuration(dir.path());
        config.create(None).unwrap();
        config.attach_load_observer(counter(&log, 1));

        config.reload().unwrap();
        config.reload().unwrap();
        assert_eq!(*log.borrow(), vec![1, 1]);
    }

    #[test]
    fn test_reload_discards_edits() {
        let dir = TempDir::new().unwrap();
        let mut config = configuration(dir.path());
        config.create(None).unwrap();

        config
            .section_mut(sections::COMMON)
            .unwrap()
            .set("LH_APT_PIPELINE", 9i64)
            .unwrap();
        assert!(config.altered());
        assert_eq!(config.altered_sections(), vec!["common"]);

        config.reload().unwrap();
        assert_eq!(
            config.section(sections::COMMON).unwrap().get_int("LH_APT_PIPELINE").unwrap(),
            2
        );
        assert!(!config.altered());
    }

    #[test]
    fn test_failed_open_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let mut config = configuration(dir.path());
        config.create(None).unwrap();
        config
            .section_mut(sections::COMMON)
            .unwrap()
            .set("LH_DEBUG", true)
            .unwrap();

        // A directory where `config/binary` should be cannot be read.
        let broken = dir.path().join("broken");
        fs::create_dir_all(broken.join("config").join("binary")).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        config.attach_load_observer(counter(&log, 1));
        let err = config.open(&broken).unwrap_err();
        assert!(matches!(err, ConfigError::Persistence { .. }));

        assert_eq!(config.dir(), dir.path());
        assert!(config.section(sections::COMMON).unwrap().get_bool("LH_DEBUG").unwrap());
        assert!(config.altered());
        assert!(log.borrow().is_empty(), "failed load must not notify");
    }

    #[test]
    fn test_save_persists_every_child() {
        let dir = TempDir::new().unwrap();
        let mut config = configuration(dir.path());
        config.create(None).unwrap();

        config
            .section_mut(sections::BINARY)
            .unwrap()
            .set("LH_HOSTNAME", "livebox")
            .unwrap();
        config
            .folder_mut(sections::HOOKS)
            .unwrap()
            .insert("01-hello", "#!/bin/sh\necho hello\n")
            .unwrap();
        config.save().unwrap();
        assert!(!config.altered());

        for name in ["binary", "bootstrap", "chroot", "common", "source"] {
            assert!(dir.path().join("config").join(name).is_file(), "{name} missing");
        }
        assert!(dir.path().join("config/chroot_local-hooks/01-hello").is_file());
    }

    #[test]
    fn test_save_collects_failures_and_saves_the_rest() {
        let dir = TempDir::new().unwrap();
        let schema = Schema::builder()
            .section("common", [("LH_DEBUG", ValueType::Boolean)])
            .section("extra/binary", [("LH_HOSTNAME", ValueType::String)])
            .folder("hooks", "chroot_local-hooks")
            .build()
            .unwrap();
        fs::create_dir_all(dir.path().join("config").join("extra")).unwrap();

        let mut config =
            LiveHelperConfiguration::new(Some(dir.path().to_path_buf()), Arc::new(schema)).unwrap();
        config.open(dir.path()).unwrap();
        config.section_mut("common").unwrap().set("LH_DEBUG", true).unwrap();
        config
            .section_mut("extra/binary")
            .unwrap()
            .set("LH_HOSTNAME", "lost")
            .unwrap();

        fs::remove_dir_all(dir.path().join("config").join("extra")).unwrap();

        let err = config.save().unwrap_err();
        assert_eq!(err.failed_sections(), vec!["extra/binary"]);
        match &err {
            ConfigError::SaveFailed { failures } => {
                assert!(matches!(failures[0].error, ConfigError::Persistence { .. }));
            }
            other => panic!("expected SaveFailed, got {other:?}"),
        }

        assert_eq!(config.altered_sections(), vec!["extra/binary"]);
        let content = fs::read_to_string(dir.path().join("config").join("common")).unwrap();
        assert!(content.contains("LH_DEBUG=\"enabled\""));
    }
}
