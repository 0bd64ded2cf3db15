use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use utoipa::OpenApi;

use super::{
    dto::{
        BmeReadingRequest, BmeSensorsInput, ComplianceResponse, CurrentSources,
        CurrentStatsResponse, DailySeriesResponse, DailyStatsResponse, DateRange,
        DerivedMetrics, DhtLightReadingRequest, DhtLightSensorsInput, EvaluatedMetric,
        LatestParams, LightCompliance, ListParams, PageMeta, PlainMetric, ReadingPage,
        TemperatureHumidityCompliance,
    },
    errors::AppError,
    state::{ApiSettings, AppState},
};
use crate::{
    db::{
        models::{BmeSensors, DeviceClass, DhtLightSensors, NewReading, Reading, Sensors},
        query::{PageRequest, ReadingFilter, TimeWindow},
    },
    readings::{light::LightLevel, validate},
    stats::{
        calendar, total_pages, ClassifiedStats, DailySummary, MetricStats, Range, RangeStatus,
    },
};

// ---------------------------------------------------------------------------
// Parameter handling
// ---------------------------------------------------------------------------

/// Resolve `page`/`limit`: page >= 1, limit defaults when missing, zero or
/// unparsable, and is capped at the configured maximum.
fn page_request(params: &ListParams, settings: &ApiSettings) -> PageRequest {
    let limits = settings.page_limits;
    let page = params
        .page
        .as_deref()
        .and_then(|p| p.trim().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1);
    let limit = params
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<u32>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(limits.default_limit)
        .min(limits.max_limit);
    PageRequest { page, limit }
}

/// Normalize an optional `deviceId` query value. A blank value is no filter.
fn device_filter(raw: Option<&str>) -> Option<String> {
    raw.and_then(|id| validate::normalize_device_id(id).ok())
}

/// `[from, end of the "to" day)`. Unparsable dates are rejected.
fn list_window(params: &ListParams, settings: &ApiSettings) -> Result<TimeWindow, AppError> {
    let tz = settings.time_zone;
    let parse = |name: &str, raw: &str| {
        calendar::parse_date(raw, tz).ok_or_else(|| {
            AppError::BadRequest(format!("{name} must be YYYY-MM-DD or RFC 3339, got {raw:?}"))
        })
    };

    let from = params.from.as_deref().map(|raw| parse("from", raw)).transpose()?;
    let until = params
        .to
        .as_deref()
        .map(|raw| parse("to", raw).map(|to| calendar::end_of_day(to, tz)))
        .transpose()?;
    Ok(TimeWindow { from, until })
}

fn reject_payload(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

pub(super) fn reject_query(rejection: QueryRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

async fn store_reading(state: &AppState, reading: NewReading) -> Result<Reading, AppError> {
    let stored = state.store().insert(reading).await?;
    info!(
        device_id = %stored.device_id,
        device_class = %stored.device_class,
        id = %stored.id,
        "Reading stored"
    );
    Ok(stored)
}

async fn list_page(
    state: &AppState,
    device_class: Option<DeviceClass>,
    params: &ListParams,
) -> Result<ReadingPage, AppError> {
    let settings = state.settings();
    let filter = ReadingFilter {
        device_class,
        device_id: device_filter(params.device_id.as_deref()),
        window: list_window(params, settings)?,
    };
    let page = page_request(params, settings);

    let total = state.store().count(&filter).await?;
    let data = state.store().find(&filter, page).await?;

    Ok(ReadingPage {
        data,
        meta: PageMeta {
            total,
            page: page.page,
            limit: page.limit,
            total_pages: total_pages(total, page.limit),
        },
    })
}

async fn latest_of(
    state: &AppState,
    device_class: Option<DeviceClass>,
    params: &LatestParams,
) -> Result<Json<Reading>, AppError> {
    let device_id = device_filter(params.device_id.as_deref());
    let filter = ReadingFilter { device_class, device_id: device_id.clone(), ..Default::default() };

    match state.store().latest(&filter).await? {
        Some(reading) => Ok(Json(reading)),
        None => Err(AppError::NotFound(match device_id {
            Some(id) => format!("no readings for device {id}"),
            None => "no readings yet".to_owned(),
        })),
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Store one DHT22 + light reading. `light_state` and `light_level` are
/// derived from `light_lux`.
#[utoipa::path(
    post,
    path = "/api/dht-light-readings",
    request_body = DhtLightReadingRequest,
    responses(
        (status = 201, description = "Stored reading", body = Reading),
        (status = 400, description = "Missing, mistyped or out-of-range field"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn create_dht_light_reading(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>), AppError> {
    let Json(payload) = payload.map_err(reject_payload)?;
    let reading = validate::dht_light_reading(&payload, &state.settings().light_thresholds)?;
    let stored = store_reading(&state, reading).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Store one BME680 reading.
#[utoipa::path(
    post,
    path = "/api/bme-readings",
    request_body = BmeReadingRequest,
    responses(
        (status = 201, description = "Stored reading", body = Reading),
        (status = 400, description = "Missing, mistyped or out-of-range field"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn create_bme_reading(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>), AppError> {
    let Json(payload) = payload.map_err(reject_payload)?;
    let reading = validate::bme_reading(&payload)?;
    let stored = store_reading(&state, reading).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Readings of every device class, newest first, paginated.
#[utoipa::path(
    get,
    path = "/api/readings",
    params(ListParams),
    responses(
        (status = 200, description = "One page of readings", body = ReadingPage),
        (status = 400, description = "Unparsable date"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn list_readings(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ReadingPage>, AppError> {
    let Query(params) = params.map_err(reject_query)?;
    Ok(Json(list_page(&state, None, &params).await?))
}

#[utoipa::path(
    get,
    path = "/api/dht-light-readings",
    params(ListParams),
    responses(
        (status = 200, description = "One page of DHT+Light readings", body = ReadingPage),
        (status = 400, description = "Unparsable date"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn list_dht_light_readings(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ReadingPage>, AppError> {
    let Query(params) = params.map_err(reject_query)?;
    Ok(Json(list_page(&state, Some(DeviceClass::DhtLight), &params).await?))
}

#[utoipa::path(
    get,
    path = "/api/bme-readings",
    params(ListParams),
    responses(
        (status = 200, description = "One page of BME680 readings", body = ReadingPage),
        (status = 400, description = "Unparsable date"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn list_bme_readings(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ReadingPage>, AppError> {
    let Query(params) = params.map_err(reject_query)?;
    Ok(Json(list_page(&state, Some(DeviceClass::Bme), &params).await?))
}

/// Most recent reading of a device (any class), or of any device when
/// `deviceId` is omitted.
#[utoipa::path(
    get,
    path = "/api/readings/last",
    params(LatestParams),
    responses(
        (status = 200, description = "Latest reading", body = Reading),
        (status = 404, description = "No reading found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn latest_reading(
    State(state): State<AppState>,
    params: Result<Query<LatestParams>, QueryRejection>,
) -> Result<Json<Reading>, AppError> {
    let Query(params) = params.map_err(reject_query)?;
    latest_of(&state, None, &params).await
}

#[utoipa::path(
    get,
    path = "/api/dht-light-readings/latest",
    params(LatestParams),
    responses(
        (status = 200, description = "Latest DHT+Light reading", body = Reading),
        (status = 404, description = "No reading found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn latest_dht_light_reading(
    State(state): State<AppState>,
    params: Result<Query<LatestParams>, QueryRejection>,
) -> Result<Json<Reading>, AppError> {
    let Query(params) = params.map_err(reject_query)?;
    latest_of(&state, Some(DeviceClass::DhtLight), &params).await
}

#[utoipa::path(
    get,
    path = "/api/bme-readings/latest",
    params(LatestParams),
    responses(
        (status = 200, description = "Latest BME680 reading", body = Reading),
        (status = 404, description = "No reading found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn latest_bme_reading(
    State(state): State<AppState>,
    params: Result<Query<LatestParams>, QueryRejection>,
) -> Result<Json<Reading>, AppError> {
    let Query(params) = params.map_err(reject_query)?;
    latest_of(&state, Some(DeviceClass::Bme), &params).await
}

// ---------------------------------------------------------------------------
// Service endpoints
// ---------------------------------------------------------------------------

/// Service status and endpoint map.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is running")),
    tag = "system"
)]
pub async fn root() -> Json<Value> {
    Json(json!({
        "ok": true,
        "message": "ESP32 Sensors API running",
        "endpoints": {
            "readings": "/api/readings",
            "dhtLightReadings": "/api/dht-light-readings",
            "bmeReadings": "/api/bme-readings",
            "stats": "/api/stats",
            "dailyStats": "/api/dayle-stats",
            "openapi": "/api-docs/openapi.json"
        }
    }))
}

/// Returns `200 OK` with `{"status":"ok"}` when the store answers.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Store unreachable"),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.store().ping().await?;
    Ok(Json(json!({ "status": "ok", "database": "connected" })))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        create_dht_light_reading,
        create_bme_reading,
        list_readings,
        list_dht_light_readings,
        list_bme_readings,
        latest_reading,
        latest_dht_light_reading,
        latest_bme_reading,
        super::stats::current,
        super::stats::daily,
        super::stats::compliance,
        super::stats::daily_bme,
        super::stats::daily_dht_light,
        root,
        health,
    ),
    components(schemas(
        Reading, Sensors, DhtLightSensors, BmeSensors, DeviceClass, LightLevel,
        DhtLightReadingRequest, DhtLightSensorsInput, BmeReadingRequest, BmeSensorsInput,
        ReadingPage, PageMeta, DateRange, DailySummary, ClassifiedStats, MetricStats,
        RangeStatus, Range, DailyStatsResponse, DailySeriesResponse, ComplianceResponse,
        TemperatureHumidityCompliance, LightCompliance, CurrentStatsResponse,
        CurrentSources, DerivedMetrics, EvaluatedMetric, PlainMetric,
    )),
    tags(
        (name = "readings", description = "Sensor reading ingestion and queries"),
        (name = "stats",    description = "Daily summaries and range compliance"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "ESP32 Sensors API",
        version = "0.1.0",
        description = "REST API collecting and summarizing ESP32 sensor readings"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
