// Module name shadows the `serde` crate; use `::serde` for the external crate.
use ::serde::{Deserialize, Deserializer};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// RFC 3339 with 3-digit fractional seconds and a `Z` suffix, the shape the
/// remote store accepts for `timestamptz` columns.
pub fn format_rfc3339_ms(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Deserialize an optional calendar date, treating `null` and `""` as absent.
///
/// Older profile rows were written with empty strings for unknown dates.
/// Use with `#[serde(default, deserialize_with = "...")]`.
pub fn optional_date<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(::serde::de::Error::custom),
    }
}
