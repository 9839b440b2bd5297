use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ArgMatches;
use tracing::info;

use livemagic_config::{
    Bootstrap, Child, CommandBootstrap, ConfigError, LiveHelperConfiguration, Value,
};

use super::helpers::{load_schema, open_tree, report};
use crate::color;

#[derive(serde::Serialize)]
struct TreeResponse<'a> {
    dir: String,
    sections: BTreeMap<&'a str, BTreeMap<&'a str, &'a Value>>,
    folders: BTreeMap<&'a str, Vec<&'a str>>,
}

pub(crate) fn handle_create_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let dir = matches.get_one::<String>("dir").map(PathBuf::from);
    let schema = load_schema(matches).map_err(|e| report("cli.create_failed", e))?;

    let mut bootstrap = match matches.get_one::<String>("command") {
        Some(program) => CommandBootstrap::new(program.as_str()),
        None => CommandBootstrap::default(),
    };
    if let Some(args) = matches.get_many::<String>("arg") {
        bootstrap = bootstrap.with_args(args.cloned());
    }

    info!(event = "cli.create_started", command = %bootstrap.describe());

    let mut config = LiveHelperConfiguration::new(dir, schema)
        .map_err(|e| report("cli.create_failed", e))?
        .with_bootstrap(bootstrap);
    config
        .create(None)
        .map_err(|e| report("cli.create_failed", e))?;

    println!(
        "{} {}",
        color::success("Configuration created:"),
        color::key(&config.dir().display().to_string())
    );
    info!(event = "cli.create_completed", path = %config.dir().display());
    Ok(())
}

pub(crate) fn handle_show_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let config = open_tree(matches).map_err(|e| report("cli.show_failed", e))?;
    let only = matches.get_one::<String>("section").map(String::as_str);

    let children: Vec<&Child> = config
        .children()
        .iter()
        .filter(|child| only.is_none_or(|name| child.name() == name))
        .collect();
    if let Some(name) = only {
        if children.is_empty() {
            let e = ConfigError::UnknownSection {
                name: name.to_string(),
            };
            return Err(report("cli.show_failed", e));
        }
    }

    if matches.get_flag("json") {
        let mut response = TreeResponse {
            dir: config.dir().display().to_string(),
            sections: BTreeMap::new(),
            folders: BTreeMap::new(),
        };
        for child in &children {
            match child {
                Child::KeyValue(file) => {
                    response.sections.insert(file.section(), file.values().collect());
                }
                Child::Folder(folder) => {
                    response
                        .folders
                        .insert(folder.section(), folder.list().into_iter().collect());
                }
            }
        }
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", color::bold(&config.dir().display().to_string()));
    for child in children {
        println!(
            "{} {}",
            color::section(child.name()),
            color::muted(&child.path().display().to_string())
        );
        match child {
            Child::KeyValue(file) => {
                for (key, value) in file.values() {
                    println!("  {} = {}", color::key(key), value);
                }
            }
            Child::Folder(folder) => {
                let names = folder.list();
                if names.is_empty() {
                    println!("  {}", color::muted("(no entries)"));
                }
                for name in names {
                    println!("  {}", name);
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn handle_get_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let section = matches
        .get_one::<String>("section")
        .ok_or("Section argument is required")?;
    let key = matches
        .get_one::<String>("key")
        .ok_or("Key argument is required")?;

    let config = open_tree(matches).map_err(|e| report("cli.get_failed", e))?;
    let value = config
        .section(section)
        .and_then(|file| file.get(key))
        .map_err(|e| report("cli.get_failed", e))?;

    println!("{}", value);
    Ok(())
}

pub(crate) fn handle_set_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let section = matches
        .get_one::<String>("section")
        .ok_or("Section argument is required")?;
    let key = matches
        .get_one::<String>("key")
        .ok_or("Key argument is required")?;
    let value = matches
        .get_one::<String>("value")
        .ok_or("Value argument is required")?;

    info!(
        event = "cli.set_started",
        section = section.as_str(),
        key = key.as_str()
    );

    let mut config = open_tree(matches).map_err(|e| report("cli.set_failed", e))?;
    config
        .section_mut(section)
        .and_then(|file| file.set(key, value.as_str()))
        .map_err(|e| report("cli.set_failed", e))?;
    config.save().map_err(|e| report("cli.set_failed", e))?;

    let stored = config
        .section(section)
        .and_then(|file| file.get(key))
        .map_err(|e| report("cli.set_failed", e))?;
    println!(
        "{} {}.{} = {}",
        color::success("Set"),
        color::section(section),
        color::key(key),
        color::changed(&stored.to_string())
    );
    info!(event = "cli.set_completed", section = section.as_str(), key = key.as_str());
    Ok(())
}
