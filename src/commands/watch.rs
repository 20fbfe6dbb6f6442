//! Continuous monitoring until Ctrl-C.
//!
//! Settings edited with `ddmon config set` while this runs are picked up
//! by polling the config file; interval changes re-arm the schedule.

use anyhow::{Context, Result};
use chrono::Local;
use clap::ArgMatches;
use colored::Colorize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use super::{build_runtime, persist_tool_path};
use crate::core::Config;
use crate::ui::format_status_line;

const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let interval_override = matches.get_one::<u64>("interval").copied();

    let mut config = Config::load()?;
    if let Some(secs) = interval_override {
        config.check_interval_secs = secs.max(1);
    }

    let runtime = build_runtime(&config)?;
    let monitor = runtime.monitor().clone();

    let (stop_tx, mut stop_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    })
    .context("Failed to install Ctrl-C handler")?;

    println!(
        "{} every {}s {}",
        "Monitoring Docker disk usage".cyan().bold(),
        config.check_interval_secs,
        "(Ctrl-C to stop)".dimmed()
    );

    let mut current = config.clone();
    runtime.block_on(async {
        let mut states = monitor.subscribe();
        let mut config_poll = interval(CONFIG_POLL_INTERVAL);
        config_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        monitor.start(monitor.config().check_interval);

        loop {
            tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = states.borrow_and_update().clone();
                    println!(
                        "{} {}",
                        format!("[{}]", Local::now().format("%H:%M:%S")).dimmed(),
                        format_status_line(&state, &current.thresholds())
                    );
                }
                _ = config_poll.tick() => {
                    let Ok(mut reloaded) = Config::load() else { continue };
                    if let Some(secs) = interval_override {
                        reloaded.check_interval_secs = secs.max(1);
                    }
                    if reloaded != current && reloaded.validate().is_ok() {
                        log::info!("Settings changed, applying");
                        monitor.update_config(reloaded.monitor_config());
                        current = reloaded;
                    }
                }
                _ = stop_rx.changed() => break,
            }
        }
    });

    monitor.stop();
    // Reload so settings changed during the run are not overwritten
    let mut latest = Config::load().unwrap_or(config);
    persist_tool_path(&mut latest, monitor.tool_path());
    runtime.shutdown();

    println!("{}", "Monitoring stopped".dimmed());
    Ok(())
}
