// UI and formatting module

pub mod formatters;

// Re-export commonly used items for cleaner imports
pub use formatters::{
    format_percentage, format_status_line, format_time, gauge_glyph, print_state, state_glyph,
    TerminalAlertSink,
};
