//! Duration formatting for status displays

use std::time::Duration;

/// Render a duration as `H:MM:SS`, truncated to whole seconds.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
