use std::{str::FromStr, sync::LazyLock};

use chrono::prelude::*;
use regex::Regex;

use crate::error::AppError;

/// Zero padded so string order is time order.
pub const TIME_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

static COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^/\\\x00]+$").expect("component pattern is valid")
});

pub fn format_time<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(TIME_FORMAT).to_string()
}

pub fn now_stamp() -> String {
    format_time(&Local::now())
}

/// Parses a `key=value` path segment such as `cnt=30` or `chunk=2`.
pub fn parse_segment<T: FromStr>(segment: &str, key: &str) -> Result<T, AppError> {
    segment
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix('='))
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| AppError::InvalidParameter(format!("expected {key}=<number>, got '{segment}'")))
}

pub fn parse_index(value: &str, name: &str) -> Result<usize, AppError> {
    value
        .parse()
        .map_err(|_| AppError::InvalidParameter(format!("{name} must be a non-negative integer, got '{value}'")))
}

/// Usernames and filenames become path components under the music root, so
/// they must not be able to leave it.
pub fn check_component(name: &str) -> Result<&str, AppError> {
    if name == "." || name == ".." || !COMPONENT.is_match(name) {
        return Err(AppError::InvalidParameter(format!("invalid name '{name}'")));
    }

    Ok(name)
}
