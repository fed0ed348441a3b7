use crate::error::{Result, TimestamperError};

/// Converts a millisecond integer token (e.g. `"25000"`) into seconds.
pub fn parse_milli(token: &str) -> Result<f64> {
    let millis = token
        .trim()
        .parse::<i64>()
        .map_err(|_| TimestamperError::InvalidDuration(token.to_owned()))?;

    Ok(millis as f64 / 1000.0)
}
