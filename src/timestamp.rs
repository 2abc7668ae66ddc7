//! Wall-clock timestamps in the `YYYY-MM-DD HH:MM:SS` form used by the
//! record files and document metadata.

use chrono::{Local, NaiveDateTime, Timelike};

/// Format shared by the index record file and document metadata
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time truncated to whole seconds
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Render a timestamp in [`FORMAT`]
pub fn format(at: &NaiveDateTime) -> String {
    at.format(FORMAT).to_string()
}

/// Parse a timestamp written in [`FORMAT`]
pub fn parse(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, FORMAT)
}

/// Serde adapter for `NaiveDateTime` fields stored in [`FORMAT`]
pub mod serde_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(at: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format(at))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        super::parse(&text).map_err(serde::de::Error::custom)
    }
}
