use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::models::Reading,
    stats::{DailySummary, RangeStatus},
};

// ---------------------------------------------------------------------------
// Request bodies (documentation only: handlers validate raw JSON so errors can
// name the offending field)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DhtLightReadingRequest {
    /// Trimmed and lowercased before storage.
    #[schema(example = "esp32-dht-light-01")]
    pub device_id: String,
    pub sensors: DhtLightSensorsInput,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DhtLightSensorsInput {
    pub temp_dht_c: f64,
    /// 0–100
    pub humidity_pct: f64,
    /// >= 0. `light_state` and `light_level` are derived from it.
    pub light_lux: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BmeReadingRequest {
    #[schema(example = "esp32-bme-01")]
    pub device_id: String,
    pub sensors: BmeSensorsInput,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BmeSensorsInput {
    pub temp_bme_c: f64,
    /// 0–100
    pub humidity_bme_pct: f64,
    /// 300–1100
    pub pressure_hpa: f64,
    /// >= 0
    pub gas_resistance_ohms: f64,
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Filters for list endpoints. Numbers are parsed leniently: anything
/// unparsable falls back to the default.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ListParams {
    /// Device to filter by (normalized).
    pub device_id: Option<String>,
    /// Inclusive start, `YYYY-MM-DD` or RFC 3339.
    pub from: Option<String>,
    /// Inclusive end day, `YYYY-MM-DD` or RFC 3339.
    pub to: Option<String>,
    /// 1-based page number.
    pub page: Option<String>,
    /// Page size, capped by the server.
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct LatestParams {
    pub device_id: Option<String>,
}

/// Window for `/api/stats/*`. Absent or unparsable values fall back to the
/// last 7 days through today.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsWindowParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Window for `/api/dayle-stats/*`. Absent or unparsable bounds are open.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DayRangeParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadingPage {
    pub data: Vec<Reading>,
    pub meta: PageMeta,
}

/// Inclusive window actually used for a stats query.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatsResponse {
    pub range: DateRange,
    pub bme: Vec<DailySummary>,
    pub dht_light: Vec<DailySummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailySeriesResponse {
    pub ok: bool,
    pub data: Vec<DailySummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureHumidityCompliance {
    pub total: u64,
    pub temp_ok_pct: f64,
    pub hum_ok_pct: f64,
    pub both_ok_pct: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LightCompliance {
    pub total: u64,
    pub light_ok_pct: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResponse {
    pub range: DateRange,
    pub temperature_humidity: TemperatureHumidityCompliance,
    pub light: LightCompliance,
}

/// Latest raw value of a metric plus its range classification.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EvaluatedMetric {
    pub value: Option<f64>,
    pub unit: String,
    pub status: RangeStatus,
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlainMetric {
    pub value: Option<f64>,
    pub unit: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DerivedMetrics {
    pub temperature: EvaluatedMetric,
    pub humidity: EvaluatedMetric,
    pub light: EvaluatedMetric,
    pub pressure: PlainMetric,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSources {
    pub bme_latest: Option<Reading>,
    pub dht_latest: Option<Reading>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CurrentStatsResponse {
    pub sources: CurrentSources,
    pub derived: DerivedMetrics,
}
