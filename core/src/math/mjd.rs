use std::time::{SystemTime, UNIX_EPOCH};

/// MJD of the Unix epoch (1970-01-01 00:00 UTC).
const MJD_UNIX_EPOCH: f64 = 40_587.0;

/// Current time as a fractional Modified Julian Day.
pub fn mjd_now() -> f64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    mjd_from_unix(now.as_secs_f64())
}

/// Converts seconds since the Unix epoch to a fractional MJD.
pub fn mjd_from_unix(unix_seconds: f64) -> f64 {
    MJD_UNIX_EPOCH + unix_seconds / 86_400.0
}

/// Converts a calendar date to an integral MJD.
/// Gregorian calendar, after Fliegel & van Flandern (1968).
pub fn mjd_from_date(year: i64, month: i64, day: i64) -> i64 {
    367 * year - 7 * (year + (month + 9) / 12) / 4
        - 3 * ((year + (month - 9) / 7) / 100 + 1) / 4
        + 275 * month / 9
        + day
        + 1_721_028
        - 2_400_000
}
