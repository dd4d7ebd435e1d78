//! Serde helpers for human-readable durations in configuration.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

/// `#[serde(with = "duration_serde::duration")]` for `Duration` fields.
///
/// Accepts a number of seconds or a humantime string (`"30s"`, `"1m 30s"`), and
/// always serializes to the humantime form.
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DurationVisitor)
    }
}

struct DurationVisitor;

impl Visitor<'_> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a duration as seconds or a human-readable string such as '30s'")
    }

    fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Duration::from_secs(seconds))
    }

    fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        u64::try_from(seconds)
            .map(Duration::from_secs)
            .map_err(|_| de::Error::custom(format!("Negative duration: {seconds}")))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        humantime::parse_duration(value)
            .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
    }
}

/// Parse a humantime string used as a default value.
pub(crate) fn parse_default(value: &str) -> Duration {
    humantime::parse_duration(value).unwrap_or(Duration::from_secs(30))
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "super::duration")]
        timeout: Duration,
    }

    #[test]
    fn test_human_readable_and_seconds() {
        let parsed: Holder = toml::from_str(r#"timeout = "1m 30s""#).unwrap();
        assert_eq!(parsed.timeout, Duration::from_secs(90));

        let parsed: Holder = toml::from_str("timeout = 45").unwrap();
        assert_eq!(parsed.timeout, Duration::from_secs(45));

        assert!(toml::from_str::<Holder>(r#"timeout = "soon""#).is_err());
    }

    #[test]
    fn test_serializes_to_humantime() {
        let text = toml::to_string(&Holder {
            timeout: Duration::from_secs(30),
        })
        .unwrap();
        assert_eq!(text.trim(), r#"timeout = "30s""#);
    }
}
