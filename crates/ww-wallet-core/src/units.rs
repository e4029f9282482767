use chrono::{DateTime, SecondsFormat, Utc};

use crate::SyncError;

fn scale(decimals: u8) -> Result<u128, SyncError> {
    10_u128
        .checked_pow(u32::from(decimals))
        .ok_or_else(|| SyncError::InvalidInput(format!("{decimals} decimals is too many")))
}

/// Parses a decimal amount such as `"1.25"` into base units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<u128, SyncError> {
    let invalid = || SyncError::InvalidInput(format!("invalid amount: {amount:?}"));
    let trimmed = amount.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().chain(fraction.chars()).all(|ch| ch.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > usize::from(decimals) {
        return Err(SyncError::InvalidInput(format!(
            "amount {amount:?} has more than {decimals} fractional digits"
        )));
    }

    let unit = scale(decimals)?;
    let whole_value = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().map_err(|_| invalid())?
    };
    let fraction_value = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{fraction:0<width$}", width = usize::from(decimals));
        padded.parse::<u128>().map_err(|_| invalid())?
    };

    whole_value
        .checked_mul(unit)
        .and_then(|value| value.checked_add(fraction_value))
        .ok_or_else(invalid)
}

/// Formats base units for display, keeping at most `max_fraction` digits.
pub fn format_units(value: u128, decimals: u8, max_fraction: usize) -> String {
    let Ok(unit) = scale(decimals) else {
        return value.to_string();
    };
    let whole = value / unit;
    let fraction = format!("{:0>width$}", value % unit, width = usize::from(decimals));
    let fraction = fraction[..fraction.len().min(max_fraction)].trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// `YYYY-MM-DDTHH:MM:SS.mmmZ` in UTC.
pub fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_rfc3339() -> String {
    rfc3339(Utc::now())
}
