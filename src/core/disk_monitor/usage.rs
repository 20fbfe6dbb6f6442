//! Parsing of `df -h` output captured inside the Docker VM.
//!
//! The table is fixed-width with a header row. The parser picks one data
//! row and maps its columns positionally.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::Thresholds;
use crate::error::ProbeError;

const MIN_COLUMNS: usize = 6;

/// One row of `df` output. Size columns are kept exactly as the tool printed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub filesystem: String,
    pub size: String,
    pub used: String,
    pub available: String,
    /// Always within 0..=100
    pub use_percentage: u8,
    pub mounted_on: String,
    /// False when the percentage column could not be read and defaulted to 0
    pub percent_known: bool,
}

impl UsageRecord {
    pub fn is_warning(&self, thresholds: &Thresholds) -> bool {
        self.use_percentage >= thresholds.warning
    }

    pub fn is_critical(&self, thresholds: &Thresholds) -> bool {
        self.use_percentage >= thresholds.critical
    }
}

impl fmt::Display for UsageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Filesystem: {}", self.filesystem)?;
        writeln!(f, "Size: {}", self.size)?;
        writeln!(f, "Used: {}", self.used)?;
        writeln!(f, "Available: {}", self.available)?;
        writeln!(f, "Usage: {}%", self.use_percentage)?;
        write!(f, "Mounted: {}", self.mounted_on)
    }
}

/// Parse raw `df -h` output into a usage record.
///
/// The data row is the first line mentioning `overlay` or containing a `/`.
/// If no line matches, the second line is used so tables without those
/// markers still parse.
pub fn parse_usage(output: &str) -> Result<UsageRecord, ProbeError> {
    let lines: Vec<&str> = output.split('\n').collect();

    let data_line = match lines
        .iter()
        .find(|line| line.contains("overlay") || line.contains('/'))
    {
        Some(line) => *line,
        None if lines.len() >= 2 => lines[1],
        None => return Err(ProbeError::ParseFailed),
    };

    parse_data_line(data_line)
}

fn parse_data_line(line: &str) -> Result<UsageRecord, ProbeError> {
    let columns: Vec<&str> = line.split_whitespace().collect();

    if columns.len() < MIN_COLUMNS {
        log::debug!("df row has {} columns, need {}: {:?}", columns.len(), MIN_COLUMNS, line);
        return Err(ProbeError::ParseFailed);
    }

    let (use_percentage, percent_known) = match columns[4].replace('%', "").parse::<i64>() {
        Ok(pct) if (0..=100).contains(&pct) => (pct as u8, true),
        Ok(pct) => {
            log::debug!("df reported out-of-range percentage {}", pct);
            return Err(ProbeError::ParseFailed);
        }
        // Unreadable percentages count as 0% for compatibility
        Err(_) => (0, false),
    };

    Ok(UsageRecord {
        filesystem: columns[0].to_string(),
        size: columns[1].to_string(),
        used: columns[2].to_string(),
        available: columns[3].to_string(),
        use_percentage,
        mounted_on: columns[5].to_string(),
        percent_known,
    })
}
