use std::fs;

use clap::ArgMatches;
use tracing::{error, info};

use livemagic_config::{ConfigError, FolderOfFiles, LiveHelperConfiguration, sections};

use super::helpers::{open_tree, report};
use crate::color;

pub(crate) fn handle_hooks_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    match matches.subcommand() {
        Some(("list", sub)) => handle_hooks_list(sub),
        Some(("add", sub)) => handle_hooks_add(sub),
        Some(("remove", sub)) => handle_hooks_remove(sub),
        _ => Err("Unknown hooks subcommand".into()),
    }
}

fn hooks_mut(config: &mut LiveHelperConfiguration) -> Result<&mut FolderOfFiles, ConfigError> {
    config.folder_mut(sections::HOOKS)
}

fn handle_hooks_list(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let config = open_tree(matches).map_err(|e| report("cli.hooks.list_failed", e))?;
    let hooks = config
        .folder(sections::HOOKS)
        .map_err(|e| report("cli.hooks.list_failed", e))?;

    let names = hooks.list();
    if names.is_empty() {
        println!("{}", color::muted("No hooks."));
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn handle_hooks_add(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let name = matches
        .get_one::<String>("name")
        .ok_or("Name argument is required")?;
    let file = matches
        .get_one::<String>("file")
        .ok_or("File argument is required")?;

    info!(event = "cli.hooks.add_started", name = name.as_str(), file = file.as_str());

    let content = match fs::read(file) {
        Ok(content) => content,
        Err(e) => {
            error!(event = "cli.hooks.add_failed", file = file.as_str(), error = %e);
            eprintln!("{}", color::error(&format!("Cannot read '{}': {}", file, e)));
            return Err(e.into());
        }
    };

    let mut config = open_tree(matches).map_err(|e| report("cli.hooks.add_failed", e))?;
    hooks_mut(&mut config)
        .and_then(|hooks| hooks.insert(name, content))
        .map_err(|e| report("cli.hooks.add_failed", e))?;
    config.save().map_err(|e| report("cli.hooks.add_failed", e))?;

    println!("{} {}", color::success("Hook added:"), color::key(name));
    info!(event = "cli.hooks.add_completed", name = name.as_str());
    Ok(())
}

fn handle_hooks_remove(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let name = matches
        .get_one::<String>("name")
        .ok_or("Name argument is required")?;

    let mut config = open_tree(matches).map_err(|e| report("cli.hooks.remove_failed", e))?;
    let removed = hooks_mut(&mut config)
        .map(|hooks| hooks.remove(name).is_some())
        .map_err(|e| report("cli.hooks.remove_failed", e))?;
    if !removed {
        eprintln!("{}", color::error(&format!("No hook named '{}'", name)));
        return Err(format!("No hook named '{}'", name).into());
    }
    config.save().map_err(|e| report("cli.hooks.remove_failed", e))?;

    println!("{} {}", color::success("Hook removed:"), color::key(name));
    info!(event = "cli.hooks.remove_completed", name = name.as_str());
    Ok(())
}
