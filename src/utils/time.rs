//! Timestamp serde for backend payloads.
//!
//! The chat backend writes local date-times without an offset (`2024-01-02T10:15:00`),
//! the auth service writes RFC 3339, and fixtures frequently carry bare dates.  All three
//! deserialize into an `OffsetDateTime`; offset-less values are taken as UTC.  Serialization
//! always produces RFC 3339.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Parse a timestamp in any of the accepted layouts.
pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
    if let Ok(datetime) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(datetime);
    }
    if let Ok(datetime) = PrimitiveDateTime::parse(s, &Iso8601::DEFAULT) {
        return Ok(datetime.assume_utc());
    }
    let date = Date::parse(s, format_description!("[year]-[month]-[day]"))?;
    Ok(date.midnight().assume_utc())
}

/// Deserialize a timestamp string into an OffsetDateTime
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s).map_err(serde::de::Error::custom)
}

/// Serialize an OffsetDateTime into an RFC 3339 formatted string
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}
