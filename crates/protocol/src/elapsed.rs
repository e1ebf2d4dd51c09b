//! Human-readable elapsed time.

use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

fn plural(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Format a duration as e.g. `"1 Day, 2 Hours, 3 Minutes & 4 Seconds"`.
///
/// Zero-valued leading units are omitted; seconds are always present.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let days = total / DAY;
    let hours = (total % DAY) / HOUR;
    let minutes = (total % HOUR) / MINUTE;
    let seconds = total % MINUTE;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{} Day{}, ", days, plural(days)));
    }
    if hours > 0 {
        out.push_str(&format!("{} Hour{}, ", hours, plural(hours)));
    }
    if minutes > 0 {
        out.push_str(&format!("{} Minute{} & ", minutes, plural(minutes)));
    }
    out.push_str(&format!("{} Second{}", seconds, plural(seconds)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_only() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0 Seconds");
        assert_eq!(format_elapsed(Duration::from_secs(1)), "1 Second");
        assert_eq!(format_elapsed(Duration::from_secs(59)), "59 Seconds");
    }

    #[test]
    fn test_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(61)), "1 Minute & 1 Second");
        assert_eq!(format_elapsed(Duration::from_secs(300)), "5 Minutes & 0 Seconds");
    }

    #[test]
    fn test_all_units() {
        let elapsed = Duration::from_secs(DAY + 2 * HOUR + 3 * MINUTE + 4);
        assert_eq!(format_elapsed(elapsed), "1 Day, 2 Hours, 3 Minutes & 4 Seconds");
    }

    #[test]
    fn test_skips_zero_units() {
        let elapsed = Duration::from_secs(2 * DAY + 5);
        assert_eq!(format_elapsed(elapsed), "2 Days, 5 Seconds");
    }

    #[test]
    fn test_ignores_subsecond_part() {
        assert_eq!(format_elapsed(Duration::from_millis(1999)), "1 Second");
    }
}
