//! # Duration Parsing
//!
//! Parses Kubernetes-style duration strings used for the regeneration lead time.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$")
        .expect("duration regex is a valid literal pattern")
});

/// Parse a Kubernetes duration string into [`Duration`]
///
/// Supports `<number><unit>` with unit one of `s`, `m`, `h`, `d`
/// (case insensitive), e.g. `"30s"`, `"10m"`, `"1h"`, `"7d"`.
/// Zero is accepted: a lead time of `"0s"` rotates only once the
/// certificate has actually expired.
///
/// # Errors
///
/// Returns an error if the string is empty, does not match the format,
/// or overflows.
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let trimmed = duration_str.trim();

    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let lower = trimmed.to_lowercase();
    let captures = DURATION_REGEX.captures(&lower).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid duration format '{trimmed}'. Expected format: <number><unit> (e.g., '30m', '1h', '7d')"
        )
    })?;

    let number: u64 = captures["number"]
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid duration number in '{trimmed}': {e}"))?;

    let multiplier = match &captures["unit"] {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        unit => {
            return Err(anyhow::anyhow!(
                "Invalid unit '{unit}' in duration '{trimmed}'. Expected: s, m, h, or d"
            ));
        }
    };

    let seconds = number
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Duration '{trimmed}' is too large"))?;

    Ok(Duration::from_secs(seconds))
}
