//! Aggregation endpoints: daily summaries, range compliance and the current
//! environmental snapshot.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};

use super::{
    dto::{
        ComplianceResponse, CurrentSources, CurrentStatsResponse, DailySeriesResponse,
        DailyStatsResponse, DateRange, DayRangeParams, DerivedMetrics, EvaluatedMetric,
        LightCompliance, PlainMetric, StatsWindowParams, TemperatureHumidityCompliance,
    },
    errors::AppError,
    handlers::reject_query,
    state::{ApiSettings, AppState},
};
use crate::{
    db::{
        models::{DeviceClass, Reading},
        query::{
            ComplianceCheck, ComplianceQuery, DailyGroup, DailySummaryQuery, Metric,
            RangeCondition, ReadingFilter, TimeWindow,
        },
    },
    stats::{calendar, classify_range, ClassifiedStats, DailySummary, Range, RecommendedRanges},
};

const DEFAULT_WINDOW_DAYS: i64 = 7;

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

/// `[from, until)` for `/api/stats/*`. Missing or unparsable bounds fall back
/// to "7 days ago" and "now"; `until` is then pushed to the end of its day.
fn stats_window(params: &StatsWindowParams, settings: &ApiSettings) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = settings.time_zone;
    let now = Utc::now();
    let parse = |raw: Option<&str>| raw.and_then(|r| calendar::parse_date(r, tz));

    let from = parse(params.from.as_deref()).unwrap_or(now - Duration::days(DEFAULT_WINDOW_DAYS));
    let to = parse(params.to.as_deref()).unwrap_or(now);
    (from, calendar::end_of_day(to, tz))
}

/// Open-ended window for `/api/dayle-stats/*`.
fn day_range_window(params: &DayRangeParams, settings: &ApiSettings) -> TimeWindow {
    let tz = settings.time_zone;
    TimeWindow {
        from: params.start.as_deref().and_then(|s| calendar::parse_date(s, tz)),
        until: params
            .end
            .as_deref()
            .and_then(|e| calendar::parse_date(e, tz))
            .map(|end| calendar::end_of_day(end, tz)),
    }
}

/// The inclusive range reported back to the client.
fn reported_range(from: DateTime<Utc>, until: DateTime<Utc>) -> DateRange {
    DateRange { from, to: until - Duration::milliseconds(1) }
}

// ---------------------------------------------------------------------------
// Daily summaries
// ---------------------------------------------------------------------------

const BME_METRICS: [Metric; 3] = [Metric::TempBme, Metric::HumidityBme, Metric::Pressure];
const DHT_LIGHT_METRICS: [Metric; 3] = [Metric::TempDht, Metric::HumidityDht, Metric::LightLux];

fn summarize(class: DeviceClass, group: &DailyGroup, ranges: &RecommendedRanges) -> DailySummary {
    let (pressure, light) = match class {
        DeviceClass::Bme => (Some(group.metric(2)), None),
        DeviceClass::DhtLight => (None, Some(ClassifiedStats::new(group.metric(2), ranges.light))),
    };
    DailySummary {
        date: group.day.format("%Y-%m-%d").to_string(),
        count: group.count,
        temperature: ClassifiedStats::new(group.metric(0), ranges.temperature),
        humidity: ClassifiedStats::new(group.metric(1), ranges.humidity),
        pressure,
        light,
    }
}

async fn daily_for_class(
    state: &AppState,
    class: DeviceClass,
    window: TimeWindow,
) -> Result<Vec<DailySummary>, AppError> {
    let settings = state.settings();
    let metrics = match class {
        DeviceClass::Bme => BME_METRICS.to_vec(),
        DeviceClass::DhtLight => DHT_LIGHT_METRICS.to_vec(),
    };
    let query = DailySummaryQuery {
        filter: ReadingFilter { device_class: Some(class), window, ..Default::default() },
        time_zone: settings.time_zone,
        metrics,
    };

    let groups = state.store().daily_summary(&query).await?;
    Ok(groups.iter().map(|g| summarize(class, g, &settings.ranges)).collect())
}

/// Per-day min/max/avg for both device classes.
#[utoipa::path(
    get,
    path = "/api/stats/daily",
    params(StatsWindowParams),
    responses(
        (status = 200, description = "Daily summaries per device class", body = DailyStatsResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "stats"
)]
pub async fn daily(
    State(state): State<AppState>,
    params: Result<Query<StatsWindowParams>, QueryRejection>,
) -> Result<Json<DailyStatsResponse>, AppError> {
    let Query(params) = params.map_err(reject_query)?;
    let (from, until) = stats_window(&params, state.settings());
    let window = TimeWindow { from: Some(from), until: Some(until) };

    let bme = daily_for_class(&state, DeviceClass::Bme, window).await?;
    let dht_light = daily_for_class(&state, DeviceClass::DhtLight, window).await?;

    Ok(Json(DailyStatsResponse { range: reported_range(from, until), bme, dht_light }))
}

#[utoipa::path(
    get,
    path = "/api/dayle-stats/daily-bme",
    params(DayRangeParams),
    responses(
        (status = 200, description = "Daily BME680 summaries", body = DailySeriesResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "stats"
)]
pub async fn daily_bme(
    State(state): State<AppState>,
    params: Result<Query<DayRangeParams>, QueryRejection>,
) -> Result<Json<DailySeriesResponse>, AppError> {
    let Query(params) = params.map_err(reject_query)?;
    let window = day_range_window(&params, state.settings());
    let data = daily_for_class(&state, DeviceClass::Bme, window).await?;
    Ok(Json(DailySeriesResponse { ok: true, data }))
}

#[utoipa::path(
    get,
    path = "/api/dayle-stats/daily-dht-light",
    params(DayRangeParams),
    responses(
        (status = 200, description = "Daily DHT+Light summaries", body = DailySeriesResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "stats"
)]
pub async fn daily_dht_light(
    State(state): State<AppState>,
    params: Result<Query<DayRangeParams>, QueryRejection>,
) -> Result<Json<DailySeriesResponse>, AppError> {
    let Query(params) = params.map_err(reject_query)?;
    let window = day_range_window(&params, state.settings());
    let data = daily_for_class(&state, DeviceClass::DhtLight, window).await?;
    Ok(Json(DailySeriesResponse { ok: true, data }))
}

// ---------------------------------------------------------------------------
// Compliance
// ---------------------------------------------------------------------------

fn within(metric: Metric, range: Range) -> RangeCondition {
    RangeCondition { metric, range }
}

/// Share of individual readings inside the recommended ranges.
#[utoipa::path(
    get,
    path = "/api/stats/compliance",
    params(StatsWindowParams),
    responses(
        (status = 200, description = "Compliance percentages", body = ComplianceResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "stats"
)]
pub async fn compliance(
    State(state): State<AppState>,
    params: Result<Query<StatsWindowParams>, QueryRejection>,
) -> Result<Json<ComplianceResponse>, AppError> {
    let Query(params) = params.map_err(reject_query)?;
    let settings = state.settings();
    let ranges = settings.ranges;
    let (from, until) = stats_window(&params, settings);
    let window = TimeWindow { from: Some(from), until: Some(until) };

    let temp = within(Metric::TempBme, ranges.temperature);
    let hum = within(Metric::HumidityBme, ranges.humidity);
    let bme = state
        .store()
        .compliance(&ComplianceQuery {
            filter: ReadingFilter { device_class: Some(DeviceClass::Bme), window, ..Default::default() },
            checks: vec![
                ComplianceCheck::new(vec![temp]),
                ComplianceCheck::new(vec![hum]),
                ComplianceCheck::new(vec![temp, hum]),
            ],
        })
        .await?;

    let light = state
        .store()
        .compliance(&ComplianceQuery {
            filter: ReadingFilter {
                device_class: Some(DeviceClass::DhtLight),
                window,
                ..Default::default()
            },
            checks: vec![ComplianceCheck::new(vec![within(Metric::LightLux, ranges.light)])],
        })
        .await?;

    Ok(Json(ComplianceResponse {
        range: reported_range(from, until),
        temperature_humidity: TemperatureHumidityCompliance {
            total: bme.total,
            temp_ok_pct: bme.pct(0),
            hum_ok_pct: bme.pct(1),
            both_ok_pct: bme.pct(2),
        },
        light: LightCompliance { total: light.total, light_ok_pct: light.pct(0) },
    }))
}

// ---------------------------------------------------------------------------
// Current snapshot
// ---------------------------------------------------------------------------

fn evaluate(value: Option<f64>, unit: &str, range: Range) -> EvaluatedMetric {
    let status = classify_range(value, range);
    EvaluatedMetric { value, unit: unit.to_owned(), ok: status.is_ok(), status }
}

fn metric_of(reading: Option<&Reading>, metric: Metric) -> Option<f64> {
    reading.and_then(|r| metric.value(r))
}

/// Latest reading of each class, with temperature and humidity taken from
/// the BME680 and light from the DHT+Light node.
#[utoipa::path(
    get,
    path = "/api/stats/current",
    responses(
        (status = 200, description = "Current environmental snapshot", body = CurrentStatsResponse),
        (status = 404, description = "No readings of either class"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "stats"
)]
pub async fn current(State(state): State<AppState>) -> Result<Json<CurrentStatsResponse>, AppError> {
    let store = state.store();
    let bme_latest = store.latest(&ReadingFilter::class(DeviceClass::Bme)).await?;
    let dht_latest = store.latest(&ReadingFilter::class(DeviceClass::DhtLight)).await?;

    if bme_latest.is_none() && dht_latest.is_none() {
        return Err(AppError::NotFound("no readings yet".to_owned()));
    }

    let ranges = state.settings().ranges;
    let bme = bme_latest.as_ref();
    let dht = dht_latest.as_ref();
    let derived = DerivedMetrics {
        temperature: evaluate(metric_of(bme, Metric::TempBme), "°C", ranges.temperature),
        humidity: evaluate(metric_of(bme, Metric::HumidityBme), "%", ranges.humidity),
        light: evaluate(metric_of(dht, Metric::LightLux), "lux", ranges.light),
        pressure: PlainMetric { value: metric_of(bme, Metric::Pressure), unit: "hPa".to_owned() },
    };

    Ok(Json(CurrentStatsResponse {
        sources: CurrentSources { bme_latest, dht_latest },
        derived,
    }))
}
