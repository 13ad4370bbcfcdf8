use serde_json::{Map, Value};

use crate::{
    error::AppError,
    store::{LATITUDE_FIELD, LONGITUDE_FIELD},
};

const ID_FIELD: &str = "id";
pub const LOCATION_FIELD: &str = "location";

/// Body of a create or replace: the whole document to store under `id`.
pub fn document_from_body(body: Value, id: &str) -> Result<Map<String, Value>, AppError> {
    let mut document = object_with_id(body, id)?;

    strip_empty(&mut document);
    derive_location(&mut document);
    document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));

    Ok(document)
}

/// Body of a patch: top-level field changes, `id` excluded. `null` and `""`
/// values are kept, they mean "remove this field". `location` is left to the
/// patch, which knows the stored coordinates.
pub fn changes_from_body(body: Value, id: &str) -> Result<Map<String, Value>, AppError> {
    let mut changes = object_with_id(body, id)?;
    changes.remove(ID_FIELD);

    if let Some(field) = changes.keys().find(|field| !is_field_name(field)) {
        return Err(AppError::InvalidField(field.clone()));
    }

    for value in changes.values_mut() {
        if let Value::Object(nested) = value {
            strip_empty(nested);
        }
    }

    Ok(changes)
}

fn object_with_id(body: Value, id: &str) -> Result<Map<String, Value>, AppError> {
    let Value::Object(object) = body else {
        return Err(AppError::MalformedPayload);
    };

    match object.get(ID_FIELD) {
        Some(Value::String(body_id)) if body_id == id => Ok(object),
        Some(_) => Err(AppError::InvalidField(ID_FIELD.to_string())),
        None => Ok(object),
    }
}

pub fn is_empty_value(value: &Value) -> bool {
    matches!(value, Value::Null) || value.as_str().is_some_and(str::is_empty)
}

/// Drops `null` and `""` values, nested objects included.
pub fn strip_empty(object: &mut Map<String, Value>) {
    object.retain(|_, value| !is_empty_value(value));

    for value in object.values_mut() {
        if let Value::Object(nested) = value {
            strip_empty(nested);
        }
    }
}

/// Plain identifiers only, so a field name is always a single-step path.
pub fn is_field_name(field: &str) -> bool {
    let mut chars = field.chars();

    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Fills `location` as `"lon,lat"` when both coordinates are numbers and no
/// location was given.
pub fn derive_location(object: &mut Map<String, Value>) {
    if object.contains_key(LOCATION_FIELD) {
        return;
    }

    let longitude = object.get(LONGITUDE_FIELD).and_then(Value::as_f64);
    let latitude = object.get(LATITUDE_FIELD).and_then(Value::as_f64);

    if let (Some(longitude), Some(latitude)) = (longitude, latitude) {
        object.insert(LOCATION_FIELD.to_string(), composite_location(longitude, latitude));
    }
}

/// `"lon,lat"`, the form GEO index fields read.
pub fn composite_location(longitude: f64, latitude: f64) -> Value {
    Value::String(format!("{longitude},{latitude}"))
}

/// `"-122.4194,37.7749"` into `(longitude, latitude)`.
pub fn parse_coordinates(coordinates: &str) -> Result<(f64, f64), AppError> {
    let invalid = || AppError::InvalidParameter(coordinates.to_string());

    let (longitude, latitude) = coordinates.split_once(',').ok_or_else(invalid)?;
    let longitude: f64 = longitude.trim().parse().map_err(|_| invalid())?;
    let latitude: f64 = latitude.trim().parse().map_err(|_| invalid())?;

    if !(-180.0..=180.0).contains(&longitude) || !(-90.0..=90.0).contains(&latitude) {
        return Err(invalid());
    }

    Ok((longitude, latitude))
}

/// Report queue entries are stored as text, JSON when they were JSON.
pub fn report_from_text(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

pub fn report_to_text(report: Value) -> String {
    match report {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
