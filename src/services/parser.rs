//! Weather payload parser.
//!
//! Decodes the provider's JSON into [`WeatherRecord`]s. Key order is never
//! assumed and unknown keys are skipped, at every level. The whole object is
//! scanned; nothing is treated as a terminating field.
//!
//! Accepted envelopes:
//! - a single weather object (`{"name": ..., "wind": {...}, ...}`)
//! - an array of weather objects
//! - an object with a `list` array of weather objects (group/search responses)
//!
//! An object is a weather entry only if it carries `name`. Provider error
//! bodies such as `{"cod": "404", "message": "city not found"}` therefore
//! decode to zero records rather than a failure.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;

use crate::errors::ParseError;
use crate::models::WeatherRecord;

// --- provider JSON types ---

#[derive(Debug, Deserialize)]
struct RawWeather {
    name: Option<String>,
    wind: Option<RawWind>,
    main: Option<RawMain>,
    sys: Option<RawSys>,
}

#[derive(Debug, Default, Deserialize)]
struct RawWind {
    speed: Option<f64>,
    deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMain {
    temp: Option<f64>,
    #[serde(default, deserialize_with = "integral")]
    humidity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSys {
    #[serde(default, deserialize_with = "integral")]
    sunrise: Option<i64>,
    #[serde(default, deserialize_with = "integral")]
    sunset: Option<i64>,
}

/// Accept `60` and `60.0`, reject `60.5` and anything non-numeric.
fn integral<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(Some(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                _ => Err(de::Error::custom(format!("expected an integer, got {}", n))),
            }
        }
        Some(other) => Err(de::Error::custom(format!(
            "expected an integer, got {}",
            other
        ))),
    }
}

impl From<RawWeather> for WeatherRecord {
    fn from(raw: RawWeather) -> Self {
        let wind = raw.wind.unwrap_or_default();
        let main = raw.main.unwrap_or_default();
        let sys = raw.sys.unwrap_or_default();

        WeatherRecord {
            location_name: raw.name.unwrap_or_default(),
            wind_speed: wind.speed.unwrap_or(0.0),
            wind_direction_deg: wind.deg.unwrap_or(0.0),
            temperature: main.temp.unwrap_or(0.0),
            humidity: main.humidity.unwrap_or(0),
            sunrise: sys.sunrise.unwrap_or(0),
            sunset: sys.sunset.unwrap_or(0),
        }
    }
}

/// Parse a weather payload from a byte stream.
///
/// The reader is consumed and dropped before this returns, on success and on
/// every error path.
///
/// Returns an empty `Vec` when the payload is well-formed but holds no weather
/// entries; that is a valid outcome, not an error.
pub fn parse_weather<R: Read>(reader: R) -> Result<Vec<WeatherRecord>, ParseError> {
    let payload: Value = serde_json::from_reader(reader)?;

    match payload {
        Value::Array(items) => parse_entries(items),
        Value::Object(mut map) => match map.remove("list") {
            Some(Value::Array(items)) => parse_entries(items),
            Some(other) => Err(ParseError::InvalidField {
                field: "list".to_string(),
                message: format!("expected an array, got {}", json_kind(&other)),
            }),
            None => Ok(parse_entry(Value::Object(map), None)?
                .into_iter()
                .collect()),
        },
        other => Err(ParseError::NotAnObject(format!(
            "top-level value is {}",
            json_kind(&other)
        ))),
    }
}

fn parse_entries(items: Vec<Value>) -> Result<Vec<WeatherRecord>, ParseError> {
    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            return Err(ParseError::NotAnObject(format!(
                "element {} is {}",
                i,
                json_kind(&item)
            )));
        }
        if let Some(record) = parse_entry(item, Some(i))? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Decode one object; `Ok(None)` if it is not a weather entry.
fn parse_entry(value: Value, index: Option<usize>) -> Result<Option<WeatherRecord>, ParseError> {
    let is_entry = value.get("name").map(|n| !n.is_null()).unwrap_or(false);
    if !is_entry {
        tracing::debug!("Skipping payload object without a name (index {:?})", index);
        return Ok(None);
    }

    let raw: RawWeather = serde_json::from_value(value).map_err(|e| ParseError::InvalidField {
        field: match index {
            Some(i) => format!("[{}]", i),
            None => "weather".to_string(),
        },
        message: e.to_string(),
    })?;

    Ok(Some(raw.into()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "name": "Nashville",
        "wind": {"speed": 3.2, "deg": 180},
        "main": {"temp": 21.5, "humidity": 60},
        "sys": {"sunrise": 1700000000, "sunset": 1700040000}
    }"#;

    fn nashville() -> WeatherRecord {
        WeatherRecord {
            location_name: "Nashville".to_string(),
            wind_speed: 3.2,
            wind_direction_deg: 180.0,
            temperature: 21.5,
            humidity: 60,
            sunrise: 1_700_000_000,
            sunset: 1_700_040_000,
        }
    }

    #[test]
    fn test_parse_minimal_object() {
        let records = parse_weather(MINIMAL.as_bytes()).unwrap();
        assert_eq!(records, vec![nashville()]);
    }

    #[test]
    fn test_parse_ignores_unknown_keys_in_any_order() {
        // Shaped like a full OpenWeatherMap response, keys shuffled.
        let payload = r#"{
            "sys": {"country": "US", "sunset": 1700040000, "type": 2, "sunrise": 1700000000},
            "coord": {"lon": -86.78, "lat": 36.17},
            "weather": [{"id": 800, "main": "Clear", "icon": "01d"}],
            "main": {"humidity": 60, "pressure": 1016, "temp": 21.5, "feels_like": 21.1},
            "visibility": 10000,
            "wind": {"gust": 5.1, "deg": 180, "speed": 3.2},
            "dt": 1700020000,
            "name": "Nashville",
            "cod": 200
        }"#;
        let records = parse_weather(payload.as_bytes()).unwrap();
        assert_eq!(records, parse_weather(MINIMAL.as_bytes()).unwrap());
    }

    #[test]
    fn test_parse_does_not_stop_at_last_field_of_interest() {
        // `sunset` first; `sunrise` arrives after a nested unknown object.
        let payload = r#"{
            "name": "Oslo",
            "sys": {"sunset": 20, "extra": {"deep": [1, 2, {"x": null}]}, "sunrise": 10}
        }"#;
        let records = parse_weather(payload.as_bytes()).unwrap();
        assert_eq!(records[0].sunrise, 10);
        assert_eq!(records[0].sunset, 20);
    }

    #[test]
    fn test_parse_missing_sub_objects_default_to_zero() {
        let records = parse_weather(r#"{"name": "Nowhere"}"#.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.location_name, "Nowhere");
        assert_eq!(r.wind_speed, 0.0);
        assert_eq!(r.temperature, 0.0);
        assert_eq!(r.humidity, 0);
        assert_eq!(r.sunrise, 0);
    }

    #[test]
    fn test_parse_null_sub_object_defaults() {
        let payload = r#"{"name": "X", "wind": null, "main": {"temp": 1.5}}"#;
        let records = parse_weather(payload.as_bytes()).unwrap();
        assert_eq!(records[0].wind_speed, 0.0);
        assert_eq!(records[0].temperature, 1.5);
        assert_eq!(records[0].humidity, 0);
    }

    #[test]
    fn test_parse_empty_array_is_empty_not_error() {
        let records = parse_weather("[]".as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_empty_list_envelope() {
        let payload = r#"{"message": "accurate", "cod": "200", "count": 0, "list": []}"#;
        assert!(parse_weather(payload.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_list_envelope_keeps_order() {
        let payload = r#"{"list": [{"name": "A"}, {"name": "B"}], "count": 2}"#;
        let records = parse_weather(payload.as_bytes()).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.location_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_parse_city_not_found_body_is_empty() {
        let payload = r#"{"cod": "404", "message": "city not found"}"#;
        assert!(parse_weather(payload.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_top_level_scalar_fails() {
        let err = parse_weather("42".as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::NotAnObject(_)));
    }

    #[test]
    fn test_parse_array_of_scalars_fails() {
        let err = parse_weather(r#"["Nashville"]"#.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::NotAnObject(_)));
    }

    #[test]
    fn test_parse_truncated_payload_fails() {
        let err = parse_weather(r#"{"name": "Nash"#.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_parse_non_numeric_temperature_fails() {
        let payload = r#"{"name": "X", "main": {"temp": "warm", "humidity": 60}}"#;
        let err = parse_weather(payload.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { .. }), "{:?}", err);
    }

    #[test]
    fn test_parse_sub_object_of_wrong_type_fails() {
        let payload = r#"{"name": "X", "wind": "calm"}"#;
        assert!(parse_weather(payload.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_integral_float_humidity_accepted() {
        let payload = r#"{"name": "X", "main": {"humidity": 60.0}}"#;
        let records = parse_weather(payload.as_bytes()).unwrap();
        assert_eq!(records[0].humidity, 60);
    }

    #[test]
    fn test_parse_fractional_humidity_rejected() {
        let payload = r#"{"name": "X", "main": {"humidity": 60.5}}"#;
        assert!(parse_weather(payload.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_list_not_array_fails() {
        let payload = r#"{"list": {"name": "X"}}"#;
        let err = parse_weather(payload.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { ref field, .. } if field == "list"));
    }
}
