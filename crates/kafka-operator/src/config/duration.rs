//! Duration literals accepted by the configuration schema.
//!
//! Two forms are recognised, both case-sensitive:
//!
//! - a bare integer, taken as milliseconds (`"20000"`)
//! - an integer followed by the word `seconds`, with optional whitespace
//!   in between (`"13 seconds"`, `"13seconds"`)

use std::time::Duration;

const SECONDS: &str = "seconds";

/// Parse a duration literal.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let digits_end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, rest) = input.split_at(digits_end);

    if digits.is_empty() {
        return Err("expected a non-negative integer".into());
    }
    let amount: u64 = digits
        .parse()
        .map_err(|e| format!("invalid integer {digits:?}: {e}"))?;

    if rest.is_empty() {
        return Ok(Duration::from_millis(amount));
    }

    match rest.trim_start() {
        SECONDS => amount
            .checked_mul(1000)
            .map(Duration::from_millis)
            .ok_or_else(|| format!("{amount} seconds overflows")),
        unit => Err(format!("unknown unit {unit:?}, expected \"{SECONDS}\"")),
    }
}
