use clap::{Arg, ArgAction, Command};

pub fn root_command() -> Command {
    Command::new("livemagic")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Edit Debian Live (live-helper) configuration trees")
        .long_about("livemagic creates live-helper configuration trees with lh_config and reads or edits their typed settings and chroot hooks without hand-editing the shell fragments under config/.")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .help("TOML schema to use instead of the built-in live-helper one")
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
}
