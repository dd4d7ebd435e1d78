//! Lenient serde helpers for provider JSON
//!
//! Xtream panels are inconsistent about types: ids arrive as numbers or strings, empty
//! strings stand in for null and nested objects are sometimes empty arrays.

use serde::de::{self, DeserializeOwned, Deserializer, Unexpected, Visitor};
use serde::Deserialize;
use serde_json::Value;

/// A required id given as string or number.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrNumberVisitor;

    impl Visitor<'_> for StringOrNumberVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<String, E> {
            if value.fract() == 0.0 {
                Ok(format!("{value:.0}"))
            } else {
                Err(E::invalid_value(Unexpected::Float(value), &self))
            }
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
            let value = value.trim();
            if value.is_empty() {
                return Err(E::invalid_value(Unexpected::Str(value), &self));
            }
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumberVisitor)
}

/// Optional text; numbers are stringified and blank strings become `None`.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Optional integer given as number or numeric string.
pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Optional float given as number or numeric string. Zero means unrated.
pub fn opt_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let rating = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(rating.filter(|r| r.is_finite() && *r > 0.0))
}

/// Boolean flag given as `1`/`0`, `"1"`/`"0"` or a JSON bool.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

/// First non-blank string of either a string or an array of strings.
pub fn first_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let first = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Array(values)) => values.into_iter().find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        }),
        _ => None,
    };
    Ok(first
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// A nested object that some panels replace with `[]` or `null` when empty.
pub fn lenient_object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).map_err(de::Error::custom),
        _ => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    struct Inner {
        #[serde(default, deserialize_with = "opt_string")]
        plot: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        #[serde(default, deserialize_with = "opt_string")]
        name: Option<String>,
        #[serde(default, deserialize_with = "opt_i64")]
        num: Option<i64>,
        #[serde(default, deserialize_with = "opt_rating")]
        rating: Option<f64>,
        #[serde(default, deserialize_with = "flag")]
        archive: bool,
        #[serde(default, deserialize_with = "first_string")]
        backdrop: Option<String>,
        #[serde(default, deserialize_with = "lenient_object")]
        info: Inner,
    }

    #[test]
    fn test_provider_quirks_are_normalized() {
        let sample: Sample = serde_json::from_value(json!({
            "id": 1234,
            "name": "  ",
            "num": "7",
            "rating": "0",
            "archive": "1",
            "backdrop": ["", "http://img/b.jpg"],
            "info": []
        }))
        .unwrap();

        assert_eq!(sample.id, "1234");
        assert_eq!(sample.name, None);
        assert_eq!(sample.num, Some(7));
        assert_eq!(sample.rating, None);
        assert!(sample.archive);
        assert_eq!(sample.backdrop.as_deref(), Some("http://img/b.jpg"));
        assert!(sample.info.plot.is_none());
    }

    #[test]
    fn test_typed_values_pass_through() {
        let sample: Sample = serde_json::from_value(json!({
            "id": "abc",
            "name": 42,
            "rating": 7.5,
            "archive": 0,
            "backdrop": "http://img/a.jpg",
            "info": {"plot": "A plot"}
        }))
        .unwrap();

        assert_eq!(sample.id, "abc");
        assert_eq!(sample.name.as_deref(), Some("42"));
        assert_eq!(sample.rating, Some(7.5));
        assert!(!sample.archive);
        assert_eq!(sample.info.plot.as_deref(), Some("A plot"));
    }

    #[test]
    fn test_blank_id_is_rejected() {
        assert!(serde_json::from_value::<Sample>(json!({"id": ""})).is_err());
    }
}
