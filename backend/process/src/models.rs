use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const KEY_PREFIX: &str = "bigfoot-sighting";

/// One row of the geocoded BFRO export. Every column is read as a raw string,
/// missing columns and empty cells both land as `""`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRow {
    pub number: String,
    pub title: String,
    pub date: String,
    pub observed: String,
    pub classification: String,
    pub county: String,
    pub state: String,
    pub latitude: String,
    pub longitude: String,
    pub location_details: String,
    pub temperature_high: String,
    pub temperature_mid: String,
    pub temperature_low: String,
    pub dew_point: String,
    pub humidity: String,
    pub cloud_cover: String,
    pub moon_phase: String,
    pub precip_intensity: String,
    pub precip_probability: String,
    pub precip_type: String,
    pub pressure: String,
    pub summary: String,
    pub uv_index: String,
    pub visibility: String,
    pub wind_bearing: String,
    pub wind_speed: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

/// Present sub-fields only. An empty group still serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Temperature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weather {
    pub dew_point: Option<f64>,
    pub humidity: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub moon_phase: Option<f64>,
    pub precip_intensity: Option<f64>,
    pub precip_probability: Option<f64>,
    pub precip_type: Option<String>,
    pub pressure: Option<f64>,
    pub summary: Option<String>,
    pub uv_index: Option<i64>,
    pub visibility: Option<f64>,
    pub wind_bearing: Option<i64>,
    pub wind_speed: Option<f64>,
}

/// Canonical in-memory sighting, already coerced. Every view is derived from this.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub id: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub timestamp: Option<i64>,
    pub observed: Option<String>,
    pub classification: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub coordinates: Option<Coordinates>,
    pub location_details: Option<String>,
    pub temperature: Temperature,
    pub weather: Weather,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LocationFormat {
    /// `"lon,lat"` string, what GEO index fields expect
    #[default]
    Composite,
    /// `{ longitude, latitude }` object
    Point,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Location {
    Composite(String),
    Point { longitude: f64, latitude: f64 },
}

impl Location {
    pub fn new(coordinates: Coordinates, format: LocationFormat) -> Self {
        match format {
            LocationFormat::Composite => Location::Composite(format!(
                "{},{}",
                coordinates.longitude, coordinates.latitude
            )),
            LocationFormat::Point => Location::Point {
                longitude: coordinates.longitude,
                latitude: coordinates.latitude,
            },
        }
    }
}

/// Reduced field set for stores that index flat, manually declared fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexView<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_narrative: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_details: Option<&'a str>,
}

/// Every field, with `location` in the requested representation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_narrative: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_details: Option<&'a str>,
    pub temperature: &'a Temperature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dew_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_cover: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moon_phase: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precip_intensity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precip_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precip_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_bearing: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
}

impl Sighting {
    pub fn index_view(&self) -> IndexView<'_> {
        IndexView {
            id: &self.id,
            title: self.title.as_deref(),
            date: self.date.as_deref(),
            observed_narrative: self.observed.as_deref(),
            classification: self.classification.as_deref(),
            county: self.county.as_deref(),
            state: self.state.as_deref(),
            location: self
                .coordinates
                .map(|c| Location::new(c, LocationFormat::Composite)),
            location_details: self.location_details.as_deref(),
        }
    }

    pub fn document_view(&self, format: LocationFormat) -> DocumentView<'_> {
        let weather = &self.weather;

        DocumentView {
            id: &self.id,
            title: self.title.as_deref(),
            date: self.date.as_deref(),
            timestamp: self.timestamp,
            observed_narrative: self.observed.as_deref(),
            classification: self.classification.as_deref(),
            county: self.county.as_deref(),
            state: self.state.as_deref(),
            latitude: self.latitude,
            longitude: self.longitude,
            location: self.coordinates.map(|c| Location::new(c, format)),
            location_details: self.location_details.as_deref(),
            temperature: &self.temperature,
            dew_point: weather.dew_point,
            humidity: weather.humidity,
            cloud_cover: weather.cloud_cover,
            moon_phase: weather.moon_phase,
            precip_intensity: weather.precip_intensity,
            precip_probability: weather.precip_probability,
            precip_type: weather.precip_type.as_deref(),
            pressure: weather.pressure,
            summary: weather.summary.as_deref(),
            uv_index: weather.uv_index,
            visibility: weather.visibility,
            wind_bearing: weather.wind_bearing,
            wind_speed: weather.wind_speed,
        }
    }
}

/// The three on-disk targets, each in its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Index,
    Full,
    Point,
}

impl View {
    pub const ALL: [View; 3] = [View::Index, View::Full, View::Point];

    pub fn directory(self) -> &'static str {
        match self {
            View::Index => "index",
            View::Full => "json",
            View::Point => "point",
        }
    }

    pub fn file_name(self, id: &str) -> String {
        match self {
            View::Index => format!("{KEY_PREFIX}-{id}.index.json"),
            View::Full => format!("{KEY_PREFIX}-{id}.json"),
            View::Point => format!("{KEY_PREFIX}-{id}.point.json"),
        }
    }
}
