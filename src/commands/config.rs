use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::config::SUGGESTED_INTERVALS_SECS;
use crate::core::disk_monitor::{FileThrottleStore, ThrottleStore};
use crate::core::Config;
use crate::ui::format_time;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => show(),
        Some(("set", sub_matches)) => set(sub_matches),
        Some(("reset", _)) => reset(),
        Some(("reset-throttle", _)) => reset_throttle(),
        _ => {
            println!("Use 'ddmon config --help' for more information.");
            Ok(())
        }
    }
}

fn show() -> Result<()> {
    let config = Config::load()?;
    let throttle = FileThrottleStore::default_location()?;
    let last = throttle.load();

    println!("{}", "Docker Disk Monitor settings".white().bold());
    println!("  {} {}%", "Warning threshold:".dimmed(), config.warning_threshold);
    println!("  {} {}%", "Critical threshold:".dimmed(), config.critical_threshold);
    println!("  {} {}s", "Check interval:".dimmed(), config.check_interval_secs);
    println!(
        "  {} {}",
        "Notifications:".dimmed(),
        if config.notifications_enabled {
            "on".green()
        } else {
            "off".yellow()
        }
    );
    println!(
        "  {} {}",
        "Docker path:".dimmed(),
        config
            .get_docker_path()
            .map(String::as_str)
            .unwrap_or("(auto-detect)")
    );
    println!(
        "  {} {}",
        "Docker host:".dimmed(),
        config.docker_host.as_deref().unwrap_or("(per-user socket)")
    );
    println!("  {} {}", "Probe image:".dimmed(), config.probe_image);
    println!("  {} {}s", "Command timeout:".dimmed(), config.command_timeout_secs);

    println!();
    match last.last_notified_at {
        Some(at) => println!(
            "  {} {}% at {}",
            "Last alert:".dimmed(),
            last.last_percentage,
            format_time(at)
        ),
        None => println!("  {} {}", "Last alert:".dimmed(), "never".dimmed()),
    }

    Ok(())
}

fn set(matches: &ArgMatches) -> Result<()> {
    let key = matches
        .get_one::<String>("key")
        .context("Key argument is required")?;
    let value = matches
        .get_one::<String>("value")
        .context("Value argument is required")?;

    let mut config = Config::load()?;
    config.set_value(key, value)?;
    config.save()?;

    println!("{} {} = {}", "✓ Set".green(), key, value.cyan().bold());

    if key == "interval" && !SUGGESTED_INTERVALS_SECS.contains(&config.check_interval_secs) {
        println!(
            "{}",
            format!(
                "Note: common intervals are {} seconds",
                SUGGESTED_INTERVALS_SECS
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
            .dimmed()
        );
    }

    Ok(())
}

fn reset() -> Result<()> {
    Config::default().save()?;
    println!("{}", "✓ Settings restored to defaults".green());
    Ok(())
}

fn reset_throttle() -> Result<()> {
    FileThrottleStore::default_location()?.reset()?;
    println!("{}", "✓ Alert history cleared".green());
    Ok(())
}
