use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    error::AppError,
    index::IndexStatus,
    keys::IndexSet,
    patch::{PatchOutcome, apply_patch},
    search::SightingQuery,
    sightings::{self, lookup},
    state::AppState,
    store::SightingStore,
    utils::{changes_from_body, parse_coordinates, report_from_text, report_to_text},
};

type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expire_in: Option<u64>,
}

impl Envelope {
    fn ok(message: String) -> Self {
        Self {
            status: "OK",
            message,
            expire_in: None,
        }
    }

    /// Primary write landed, membership sets may be stale.
    fn indexed(message: String, status: IndexStatus) -> Self {
        match status {
            IndexStatus::Current => Self::ok(message),
            IndexStatus::Stale { failures } => {
                warn!(failures, "{message} Index update incomplete");

                Self {
                    status: "DEGRADED",
                    message: format!("{message} Index may be stale."),
                    expire_in: None,
                }
            }
        }
    }

    fn conflict(message: String) -> Self {
        Self {
            status: "CONFLICT",
            message,
            expire_in: None,
        }
    }
}

#[derive(Serialize)]
pub struct Created {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotdPayload {
    motd: String,
    expire_in: Option<u64>,
}

#[derive(Deserialize)]
pub struct PageParams {
    size: Option<usize>,
}

pub async fn status_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let ping_response = state.store.ping().await?;

    Ok(Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "pingResponse": ping_response,
    })))
}

pub async fn get_motd_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let motd = state.store.motd().await?;

    Ok(Json(json!({ "motd": motd })))
}

pub async fn put_motd_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MotdPayload>,
) -> AppResult<impl IntoResponse> {
    state.store.set_motd(&payload.motd, payload.expire_in).await?;

    Ok(Json(Envelope {
        expire_in: payload.expire_in,
        ..Envelope::ok(format!("MOTD set to: {}", payload.motd))
    }))
}

pub async fn delete_motd_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    state.store.clear_motd().await?;

    Ok(Json(Envelope::ok("MOTD removed.".to_string())))
}

pub async fn post_report_handler(
    State(state): State<Arc<AppState>>,
    Json(report): Json<Value>,
) -> AppResult<impl IntoResponse> {
    state.store.push_report(&report_to_text(report)).await?;

    Ok(Json(Envelope::ok("Report accepted.".to_string())))
}

pub async fn get_reports_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let reports: Vec<Value> = state
        .store
        .reports()
        .await?
        .into_iter()
        .map(report_from_text)
        .collect();

    Ok(Json(reports))
}

pub async fn pop_report_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let report = state.store.pop_report().await?.map(report_from_text);

    Ok(Json(report))
}

pub async fn create_sighting_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> AppResult<impl IntoResponse> {
    let (id, status) = sightings::create(&state.store, body).await?;

    let warning = match status {
        IndexStatus::Current => None,
        IndexStatus::Stale { failures } => {
            warn!(id = %id, failures, "Sighting created, index update incomplete");
            Some("Sighting saved, index may be stale.".to_string())
        }
    };

    Ok(Json(Created { id, warning }))
}

pub async fn get_sighting_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.read_document(&id).await?))
}

pub async fn put_sighting_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> AppResult<impl IntoResponse> {
    let status = sightings::replace(&state.store, &id, body).await?;

    Ok(Json(Envelope::indexed(
        format!("Sighting {id} created or replaced."),
        status,
    )))
}

pub async fn patch_sighting_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> AppResult<Response> {
    let changes = changes_from_body(body, &id)?;

    let response = match apply_patch(&state.store, &id, &changes).await? {
        PatchOutcome::Applied(status) => {
            Json(Envelope::indexed(format!("Sighting {id} patched."), status)).into_response()
        }
        PatchOutcome::Conflict => (
            StatusCode::CONFLICT,
            Json(Envelope::conflict(format!(
                "Sighting {id} changed concurrently, patch not applied."
            ))),
        )
            .into_response(),
        PatchOutcome::NotFound => return Err(AppError::NotFound(id)),
    };

    Ok(response)
}

pub async fn delete_sighting_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let status = sightings::remove(&state.store, &id).await?;

    Ok(Json(Envelope::indexed(format!("Sighting {id} removed."), status)))
}

pub async fn all_sightings_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    Ok(Json(lookup(&state.store, &[IndexSet::All]).await?))
}

pub async fn page_handler(
    State(state): State<Arc<AppState>>,
    Path(page): Path<usize>,
    Query(params): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let size = params.size.unwrap_or(state.config.page_size);

    let query = SightingQuery::page(page, size)
        .ok_or_else(|| AppError::InvalidParameter(format!("page {page} of size {size}")))?;

    Ok(Json(state.store.search(&query).await?))
}

pub async fn by_state_handler(
    State(state): State<Arc<AppState>>,
    Path(us_state): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(lookup(&state.store, &[IndexSet::ByState(us_state)]).await?))
}

pub async fn by_class_handler(
    State(state): State<Arc<AppState>>,
    Path(class): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(lookup(&state.store, &[IndexSet::ByClass(class)]).await?))
}

pub async fn by_state_and_class_handler(
    State(state): State<Arc<AppState>>,
    Path((us_state, class)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let sets = [IndexSet::ByState(us_state), IndexSet::ByClass(class)];

    Ok(Json(lookup(&state.store, &sets).await?))
}

pub async fn containing_handler(
    State(state): State<Arc<AppState>>,
    Path(word): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.search(&SightingQuery::Containing(word)).await?))
}

pub async fn above_temperature_handler(
    State(state): State<Arc<AppState>>,
    Path(temperature): Path<f64>,
) -> AppResult<impl IntoResponse> {
    if !temperature.is_finite() {
        return Err(AppError::InvalidParameter(temperature.to_string()));
    }

    Ok(Json(
        state
            .store
            .search(&SightingQuery::AboveTemperature(temperature))
            .await?,
    ))
}

pub async fn within_handler(
    State(state): State<Arc<AppState>>,
    Path((radius, coordinates)): Path<(f64, String)>,
) -> AppResult<impl IntoResponse> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(AppError::InvalidParameter(format!("radius {radius}")));
    }

    let (longitude, latitude) = parse_coordinates(&coordinates)?;

    let query = SightingQuery::Within {
        radius,
        longitude,
        latitude,
    };

    Ok(Json(state.store.search(&query).await?))
}
