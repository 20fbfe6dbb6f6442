use anyhow::Result;
use clap::{Arg, Command};

use ddmon::commands;

fn main() -> Result<()> {
    ddmon::init_logging();

    let matches = Command::new("ddmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Monitors Docker disk usage and alerts when it runs high")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .short_alias('V')
                .long("version")
                .help("Print version information")
                .action(clap::ArgAction::SetTrue)
        )
        .subcommand(
            Command::new("watch")
                .about("Check disk usage periodically until interrupted")
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("SECONDS")
                        .help("Override the configured check interval")
                        .value_parser(clap::value_parser!(u64).range(1..))
                )
        )
        .subcommand(
            Command::new("check")
                .about("Run one check now, bypassing the alert throttle")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the result as JSON")
                        .action(clap::ArgAction::SetTrue)
                )
        )
        .subcommand(
            Command::new("status")
                .about("Report whether the Docker daemon is reachable")
        )
        .subcommand(
            Command::new("config")
                .about("Show or change settings (use 'ddmon config --help' for subcommands)")
                .long_about("Show or change settings\n\nKEYS:\n    warning         Warning threshold (%)\n    critical        Critical threshold (%)\n    interval        Seconds between checks\n    notifications   on/off\n    docker-path     Docker executable, or 'auto'\n    docker-host     DOCKER_HOST value, or 'auto'\n    image           Image used to run df\n    timeout         Command timeout in seconds")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Show current settings"))
                .subcommand(
                    Command::new("set")
                        .about("Set a setting")
                        .arg(
                            Arg::new("key")
                                .help("Setting name")
                                .required(true)
                                .index(1)
                        )
                        .arg(
                            Arg::new("value")
                                .help("New value")
                                .required(true)
                                .index(2)
                        )
                )
                .subcommand(Command::new("reset").about("Restore default settings"))
                .subcommand(
                    Command::new("reset-throttle")
                        .about("Forget the last alert so the next high reading alerts again")
                )
        )
        .subcommand(
            Command::new("notify-test")
                .about("Show a sample alert")
        )
        .subcommand(
            Command::new("version")
                .about("Shows version information")
        )
        .get_matches();

    if matches.get_flag("version") {
        return commands::version();
    }

    match matches.subcommand() {
        Some(("watch", sub_matches)) => commands::watch::execute(sub_matches),
        Some(("check", sub_matches)) => commands::check::execute(sub_matches),
        Some(("status", _)) => commands::status::execute(),
        Some(("config", sub_matches)) => commands::config::execute(sub_matches),
        Some(("notify-test", _)) => commands::notify::execute(),
        Some(("version", _)) => commands::version(),
        _ => {
            println!("Welcome to ddmon!");
            println!("Use 'ddmon --help' for more information.");
            Ok(())
        }
    }
}
