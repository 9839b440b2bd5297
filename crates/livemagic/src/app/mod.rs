mod global;
mod hooks;
mod tree;


use clap::Command;

pub fn build_cli() -> Command {
    global::root_command()
        .subcommand(tree::create_command())
        .subcommand(tree::show_command())
        .subcommand(tree::get_command())
        .subcommand(tree::set_command())
        .subcommand(hooks::hooks_command())
}
