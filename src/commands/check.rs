//! One forced check, as the "Refresh Now" action.

use anyhow::{anyhow, Result};
use clap::ArgMatches;
use colored::Colorize;

use super::{build_runtime, persist_tool_path};
use crate::core::disk_monitor::CheckOutcome;
use crate::core::Config;
use crate::ui::print_state;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = Config::load()?;
    let json_output = matches.get_flag("json");

    let runtime = build_runtime(&config)?;
    let monitor = runtime.monitor().clone();

    let outcome = runtime.block_on(monitor.force_check());
    persist_tool_path(&mut config, monitor.tool_path());
    runtime.shutdown();

    let state = match outcome {
        CheckOutcome::Completed(state) => state,
        CheckOutcome::Skipped => return Err(anyhow!("Another check is already running")),
        CheckOutcome::Discarded => return Err(anyhow!("Check was cancelled")),
    };

    if json_output {
        let value = serde_json::json!({
            "status": format!("{:?}", state.status),
            "usage": state.usage,
            "error": state.last_error.as_ref().map(|e| serde_json::json!({
                "kind": e.kind(),
                "message": e.to_string(),
            })),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_state(&state, &config.thresholds());
    }

    match state.last_error {
        Some(error) => {
            if !json_output {
                println!();
                println!("{}", "Check did not complete.".red());
            }
            Err(error.into())
        }
        None => Ok(()),
    }
}
