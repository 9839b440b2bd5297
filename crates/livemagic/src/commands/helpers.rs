use std::path::PathBuf;
use std::sync::Arc;

use clap::ArgMatches;
use tracing::error;

use livemagic_config::{ConfigError, LiveHelperConfiguration, Schema};

use crate::color;

/// The `--schema` file if given, else the built-in live-helper schema.
pub(crate) fn load_schema(matches: &ArgMatches) -> Result<Arc<Schema>, ConfigError> {
    match matches.get_one::<String>("schema") {
        Some(path) => Schema::from_file(&PathBuf::from(path)).map(Arc::new),
        None => Ok(Arc::new(Schema::live_helper())),
    }
}

/// Open the tree named by the `dir` argument.
pub(crate) fn open_tree(matches: &ArgMatches) -> Result<LiveHelperConfiguration, ConfigError> {
    let dir = PathBuf::from(
        matches
            .get_one::<String>("dir")
            .map(String::as_str)
            .unwrap_or("."),
    );
    let schema = load_schema(matches)?;
    let mut config = LiveHelperConfiguration::new(Some(dir.clone()), schema)?;
    config.open(dir)?;
    Ok(config)
}

/// Print an error for the user, log it, and hand it back for propagation.
pub(crate) fn report(event: &'static str, e: ConfigError) -> Box<dyn std::error::Error> {
    error!(event = event, code = e.error_code(), error = %e);
    eprintln!("{}", color::error(&e.to_string()));
    if let ConfigError::SaveFailed { failures } = &e {
        for failure in failures {
            eprintln!(
                "  {} {}",
                color::hint(&format!("{}:", failure.section)),
                failure.error
            );
        }
    }
    e.into()
}
