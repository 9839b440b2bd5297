use clap::{Arg, ArgAction, Command};

fn dir_arg() -> Arg {
    Arg::new("dir")
        .help("Root directory of the configuration tree")
        .required(true)
        .index(1)
}

pub fn create_command() -> Command {
    Command::new("create")
        .about("Create a new configuration tree by running lh_config")
        .arg(
            Arg::new("dir")
                .help("Directory to create (default: ~/DebianLive/<timestamp>)")
                .index(1),
        )
        .arg(
            Arg::new("command")
                .long("command")
                .help("Bootstrap program to run instead of lh_config"),
        )
        .arg(
            Arg::new("arg")
                .long("arg")
                .help("Argument passed to the bootstrap program (repeatable)")
                .action(ArgAction::Append)
                .allow_hyphen_values(true),
        )
}

pub fn show_command() -> Command {
    Command::new("show")
        .about("Show every setting of a configuration tree")
        .arg(dir_arg())
        .arg(
            Arg::new("section")
                .long("section")
                .short('s')
                .help("Only show this section"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Output as JSON")
                .action(ArgAction::SetTrue),
        )
}

pub fn get_command() -> Command {
    Command::new("get")
        .about("Print the value of one setting")
        .arg(dir_arg())
        .arg(Arg::new("section").help("Section name").required(true).index(2))
        .arg(Arg::new("key").help("Key name").required(true).index(3))
}

pub fn set_command() -> Command {
    Command::new("set")
        .about("Change one setting and save the tree")
        .arg(dir_arg())
        .arg(Arg::new("section").help("Section name").required(true).index(2))
        .arg(Arg::new("key").help("Key name").required(true).index(3))
        .arg(
            Arg::new("value")
                .help("New value, converted to the key's type")
                .required(true)
                .allow_hyphen_values(true)
                .index(4),
        )
}
