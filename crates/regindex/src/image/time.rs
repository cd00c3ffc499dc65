//! Timestamp parsing and the two string forms timestamps take.
//!
//! Stored records carry RFC 3339 UTC timestamps with microsecond precision so
//! that re-serialising an unchanged value always yields the same string.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Display form used for `*_human_readable` fields.
pub const HUMAN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an upstream timestamp.
///
/// Accepts RFC 3339 with any offset, plus naive `T`- or space-separated forms
/// which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn format_human(ts: &DateTime<Utc>) -> String {
    ts.format(HUMAN_FORMAT).to_string()
}

/// Canonical stored form: `2024-01-02T03:04:05.123456Z`.
pub fn canonical(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Serde adapter writing timestamps in [`canonical`] form.
pub mod canonical_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::canonical(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }

    /// Same as the parent module for `Option<DateTime<Utc>>`.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S: Serializer>(
            ts: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => serializer.serialize_str(&super::super::canonical(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::super::parse_timestamp(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_gitlab_timestamps() {
        let expected = Utc.with_ymd_and_hms(2019, 1, 10, 13, 38, 57).unwrap()
            + chrono::Duration::milliseconds(391);
        assert_eq!(parse_timestamp("2019-01-10T13:38:57.391Z"), Some(expected));
        assert_eq!(parse_timestamp("2019-01-10T14:38:57.391+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2019-01-10T13:38:57.391"), Some(expected));
        assert_eq!(parse_timestamp("2019-01-10 13:38:57.391"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_string_forms() {
        let ts = Utc.with_ymd_and_hms(2024, 2, 29, 23, 5, 1).unwrap();
        assert_eq!(format_human(&ts), "2024-02-29 23:05:01");
        assert_eq!(canonical(&ts), "2024-02-29T23:05:01.000000Z");
    }

    #[test]
    fn test_canonical_form_survives_reparse() {
        let raw = "2021-06-01T10:00:00.5+02:00";
        let ts = parse_timestamp(raw).expect("parse");
        let again = parse_timestamp(&canonical(&ts)).expect("reparse");
        assert_eq!(ts, again);
        assert_eq!(canonical(&again), "2021-06-01T08:00:00.500000Z");
    }
}
