use clap::ArgMatches;
use tracing::error;

mod helpers;
mod hooks;
mod tree;

pub fn run_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    match matches.subcommand() {
        Some(("create", sub_matches)) => tree::handle_create_command(sub_matches),
        Some(("show", sub_matches)) => tree::handle_show_command(sub_matches),
        Some(("get", sub_matches)) => tree::handle_get_command(sub_matches),
        Some(("set", sub_matches)) => tree::handle_set_command(sub_matches),
        Some(("hooks", sub_matches)) => hooks::handle_hooks_command(sub_matches),
        _ => {
            error!(event = "cli.command_unknown");
            Err("Unknown command".into())
        }
    }
}
