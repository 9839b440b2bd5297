use clap::{Arg, Command};

fn dir_arg() -> Arg {
    Arg::new("dir")
        .help("Root directory of the configuration tree")
        .required(true)
        .index(1)
}

pub fn hooks_command() -> Command {
    Command::new("hooks")
        .about("Manage chroot hook scripts")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("list")
                .about("List hook scripts")
                .arg(dir_arg()),
        )
        .subcommand(
            Command::new("add")
                .about("Add or replace a hook script")
                .arg(dir_arg())
                .arg(
                    Arg::new("name")
                        .help("Hook file name")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("file")
                        .help("Script to copy into the hooks directory")
                        .required(true)
                        .index(3),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove a hook script")
                .arg(dir_arg())
                .arg(
                    Arg::new("name")
                        .help("Hook file name")
                        .required(true)
                        .index(2),
                ),
        )
}
