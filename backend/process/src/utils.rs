use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::models::{Coordinates, RawRow, Sighting, Temperature, Weather};

static REPORT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Report \d*: ").expect("static regex"));

static COUNTY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" County$").expect("static regex"));

static LEADING_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+").expect("static regex"));

/// Returns `None` when the row carries no usable report number.
pub fn to_sighting(row: &RawRow) -> Option<Sighting> {
    let id = to_integer(&row.number)?.to_string();

    Some(Sighting {
        id,
        title: to_title(&row.title),
        date: to_tag(&row.date),
        timestamp: to_timestamp(&row.date),
        observed: to_tag(&row.observed),
        classification: to_tag(&row.classification),
        county: to_county(&row.county),
        state: to_tag(&row.state),
        latitude: to_float(&row.latitude),
        longitude: to_float(&row.longitude),
        coordinates: to_coordinates(&row.longitude, &row.latitude),
        location_details: to_tag(&row.location_details),
        temperature: to_temperature(
            &row.temperature_high,
            &row.temperature_mid,
            &row.temperature_low,
        ),
        weather: Weather {
            dew_point: to_float(&row.dew_point),
            humidity: to_float(&row.humidity),
            cloud_cover: to_float(&row.cloud_cover),
            moon_phase: to_float(&row.moon_phase),
            precip_intensity: to_float(&row.precip_intensity),
            precip_probability: to_float(&row.precip_probability),
            precip_type: to_tag(&row.precip_type),
            pressure: to_float(&row.pressure),
            summary: to_tag(&row.summary),
            uv_index: to_integer(&row.uv_index),
            visibility: to_float(&row.visibility),
            wind_bearing: to_integer(&row.wind_bearing),
            wind_speed: to_float(&row.wind_speed),
        },
    })
}

pub fn to_tag(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

pub fn to_title(value: &str) -> Option<String> {
    to_tag(&REPORT_PREFIX.replace(value, ""))
}

pub fn to_county(value: &str) -> Option<String> {
    to_tag(&COUNTY_SUFFIX.replace(value, ""))
}

pub fn to_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp());
    }

    if let Ok(date_time) = DateTime::parse_from_rfc3339(value) {
        return Some(date_time.timestamp());
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|d| d.and_utc().timestamp())
}

pub fn to_float(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .and_then(round)
}

/// Leading-digit parse: `"12abc"` is 12, `"abc"` is absent.
pub fn to_integer(value: &str) -> Option<i64> {
    LEADING_INTEGER
        .find(value.trim())
        .and_then(|m| m.as_str().parse().ok())
}

pub fn to_coordinates(longitude: &str, latitude: &str) -> Option<Coordinates> {
    Some(Coordinates {
        longitude: to_float(longitude)?,
        latitude: to_float(latitude)?,
    })
}

pub fn to_temperature(high: &str, mid: &str, low: &str) -> Temperature {
    Temperature {
        high: to_float(high),
        mid: to_float(mid),
        low: to_float(low),
    }
}

/// Rounds to 5 decimal places on the decimal representation, so already
/// rounded values come back unchanged.
pub fn round(value: f64) -> Option<f64> {
    format!("{value:.5}").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title() {
        assert_eq!(
            to_title("Report 12345: Strange encounter").as_deref(),
            Some("Strange encounter")
        );
        assert_eq!(to_title("Report : Odd").as_deref(), Some("Odd"));
        assert_eq!(
            to_title("Nothing to strip").as_deref(),
            Some("Nothing to strip")
        );
        assert_eq!(to_title(""), None);
    }

    #[test]
    fn test_county() {
        assert_eq!(to_county("Multnomah County").as_deref(), Some("Multnomah"));
        assert_eq!(to_county("County Cork").as_deref(), Some("County Cork"));
        assert_eq!(to_county(" County"), None);
        assert_eq!(to_county(""), None);
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(to_timestamp("2000-06-16"), Some(961_113_600));
        assert_eq!(to_timestamp("1970-01-01T00:00:10Z"), Some(10));
        assert_eq!(to_timestamp("1970-01-01 00:01:00"), Some(60));
        assert_eq!(to_timestamp("sometime in June"), None);
        assert_eq!(to_timestamp(""), None);
    }

    #[test]
    fn test_float() {
        assert_eq!(to_float("37.774912345"), Some(37.77491));
        assert_eq!(to_float("-122.4194"), Some(-122.4194));
        assert_eq!(to_float(""), None);
        assert_eq!(to_float("warm"), None);
        assert_eq!(to_float("NaN"), None);
        assert_eq!(to_float("inf"), None);
    }

    #[test]
    fn test_round_is_idempotent() {
        for value in [0.12345, -122.4194, 37.7749, 1e-5, 55.5, 1013.25] {
            let once = round(value).unwrap();
            assert_eq!(round(once), Some(once));
        }
    }

    #[test]
    fn test_integer() {
        assert_eq!(to_integer("12"), Some(12));
        assert_eq!(to_integer("12abc"), Some(12));
        assert_eq!(to_integer("-7"), Some(-7));
        assert_eq!(to_integer("3.9"), Some(3));
        assert_eq!(to_integer("abc"), None);
        assert_eq!(to_integer(""), None);
    }

    #[test]
    fn test_coordinates_need_both() {
        assert_eq!(
            to_coordinates("-122.4194", "37.7749"),
            Some(Coordinates {
                longitude: -122.4194,
                latitude: 37.7749
            })
        );
        assert_eq!(to_coordinates("-122.4194", ""), None);
        assert_eq!(to_coordinates("", "37.7749"), None);
    }

    #[test]
    fn test_temperature_partial() {
        let temperature = to_temperature("", "55.5", "");
        assert_eq!(
            temperature,
            Temperature {
                high: None,
                mid: Some(55.5),
                low: None
            }
        );

        assert_eq!(to_temperature("", "", ""), Temperature::default());
    }

    #[test]
    fn test_row_without_number_is_skipped() {
        let row = RawRow {
            title: "Report 1: Tracks".to_string(),
            ..Default::default()
        };

        assert_eq!(to_sighting(&row), None);
    }

    #[test]
    fn test_empty_row_fields_are_absent() {
        let row = RawRow {
            number: "42".to_string(),
            ..Default::default()
        };
        let sighting = to_sighting(&row).unwrap();

        assert_eq!(sighting.id, "42");
        assert_eq!(sighting.title, None);
        assert_eq!(sighting.timestamp, None);
        assert_eq!(sighting.coordinates, None);
        assert_eq!(sighting.weather, Weather::default());
        assert_eq!(sighting.temperature, Temperature::default());
    }
}
