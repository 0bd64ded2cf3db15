//! Structured query descriptors handed to a `ReadingStore`.
//!
//! Handlers describe *what* to fetch or aggregate; each store backend decides
//! how to execute it (SQL for Postgres, iteration for the in-memory store).

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use super::models::{DeviceClass, Reading};
use crate::stats::{MetricStats, Range};

/// A numeric field inside the `sensors` document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    TempDht,
    HumidityDht,
    LightLux,
    TempBme,
    HumidityBme,
    Pressure,
    GasResistance,
}

impl Metric {
    /// Key of the field inside `sensors`.
    pub fn key(&self) -> &'static str {
        match self {
            Metric::TempDht => "temp_dht_c",
            Metric::HumidityDht => "humidity_pct",
            Metric::LightLux => "light_lux",
            Metric::TempBme => "temp_bme_c",
            Metric::HumidityBme => "humidity_bme_pct",
            Metric::Pressure => "pressure_hpa",
            Metric::GasResistance => "gas_resistance_ohms",
        }
    }

    pub fn value(&self, reading: &Reading) -> Option<f64> {
        reading.sensors.field(self.key())
    }
}

/// Half-open time window `[from, until)`. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| ts >= from) && self.until.is_none_or(|until| ts < until)
    }
}

/// Which readings an operation applies to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingFilter {
    pub device_class: Option<DeviceClass>,
    /// Already normalized.
    pub device_id: Option<String>,
    pub window: TimeWindow,
}

impl ReadingFilter {
    pub fn class(device_class: DeviceClass) -> Self {
        Self { device_class: Some(device_class), ..Self::default() }
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        self.device_class.is_none_or(|c| c == reading.device_class)
            && self.device_id.as_deref().is_none_or(|id| id == reading.device_id)
            && self.window.contains(reading.created_at)
    }
}

/// One page of results, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Group readings by local calendar day and compute min/max/avg per metric.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummaryQuery {
    pub filter: ReadingFilter,
    pub time_zone: Tz,
    pub metrics: Vec<Metric>,
}

/// One day bucket. `metrics` is aligned with `DailySummaryQuery::metrics`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyGroup {
    pub day: NaiveDate,
    pub count: u64,
    pub metrics: Vec<MetricStats>,
}

impl DailyGroup {
    pub fn metric(&self, index: usize) -> MetricStats {
        self.metrics.get(index).copied().unwrap_or_default()
    }
}

/// A reading satisfies the condition when `metric` is present and inside
/// `range` (inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeCondition {
    pub metric: Metric,
    pub range: Range,
}

impl RangeCondition {
    pub fn holds(&self, reading: &Reading) -> bool {
        self.metric.value(reading).is_some_and(|v| self.range.contains(v))
    }
}

/// Counts readings satisfying *all* of its conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceCheck {
    pub all_of: Vec<RangeCondition>,
}

impl ComplianceCheck {
    pub fn new(all_of: Vec<RangeCondition>) -> Self {
        Self { all_of }
    }

    pub fn holds(&self, reading: &Reading) -> bool {
        self.all_of.iter().all(|c| c.holds(reading))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceQuery {
    pub filter: ReadingFilter,
    pub checks: Vec<ComplianceCheck>,
}

/// `passed` is aligned with `ComplianceQuery::checks`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplianceCounts {
    pub total: u64,
    pub passed: Vec<u64>,
}

impl ComplianceCounts {
    pub fn pct(&self, index: usize) -> f64 {
        crate::stats::percentage(self.passed.get(index).copied().unwrap_or(0), self.total)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    use super::*;
    use crate::db::models::{BmeSensors, Sensors};

    fn bme(device_id: &str, temp: f64, hum: f64, created_at: DateTime<Utc>) -> Reading {
        Reading {
            id: Uuid::new_v4(),
            device_id: device_id.to_owned(),
            device_class: DeviceClass::Bme,
            sensors: Sensors::Bme(BmeSensors {
                temp_bme_c: temp,
                humidity_bme_pct: hum,
                pressure_hpa: 1000.0,
                gas_resistance_ohms: 5000.0,
            }),
            created_at,
        }
    }

    #[test]
    fn window_is_half_open() {
        let t0 = Utc.with_ymd_and_hms(2025, 11, 18, 0, 0, 0).unwrap();
        let w = TimeWindow { from: Some(t0), until: Some(t0 + Duration::days(1)) };
        assert!(w.contains(t0));
        assert!(w.contains(t0 + Duration::hours(23)));
        assert!(!w.contains(t0 + Duration::days(1)));
        assert!(!w.contains(t0 - Duration::seconds(1)));
        assert!(TimeWindow::default().contains(t0));
    }

    #[test]
    fn filter_matches_class_device_and_window() {
        let now = Utc::now();
        let r = bme("esp32-a", 25.0, 50.0, now);

        assert!(ReadingFilter::default().matches(&r));
        assert!(ReadingFilter::class(DeviceClass::Bme).matches(&r));
        assert!(!ReadingFilter::class(DeviceClass::DhtLight).matches(&r));

        let by_device = ReadingFilter { device_id: Some("esp32-b".into()), ..Default::default() };
        assert!(!by_device.matches(&r));

        let past = ReadingFilter {
            window: TimeWindow { from: None, until: Some(now) },
            ..Default::default()
        };
        assert!(!past.matches(&r));
    }

    #[test]
    fn page_offset() {
        assert_eq!(PageRequest { page: 1, limit: 50 }.offset(), 0);
        assert_eq!(PageRequest { page: 3, limit: 50 }.offset(), 100);
    }

    #[test]
    fn compliance_check_requires_all_conditions() {
        let both = ComplianceCheck::new(vec![
            RangeCondition { metric: Metric::TempBme, range: Range::new(23.0, 27.0) },
            RangeCondition { metric: Metric::HumidityBme, range: Range::new(40.0, 60.0) },
        ]);
        assert!(both.holds(&bme("a", 25.0, 50.0, Utc::now())));
        assert!(!both.holds(&bme("a", 25.0, 70.0, Utc::now())));

        let light = ComplianceCheck::new(vec![RangeCondition {
            metric: Metric::LightLux,
            range: Range::new(300.0, 500.0),
        }]);
        assert!(!light.holds(&bme("a", 25.0, 50.0, Utc::now())));
    }

    #[test]
    fn counts_percentage() {
        let counts = ComplianceCounts { total: 4, passed: vec![1, 4] };
        assert_eq!(counts.pct(0), 25.0);
        assert_eq!(counts.pct(1), 100.0);
        assert_eq!(counts.pct(2), 0.0);
        assert_eq!(ComplianceCounts::default().pct(0), 0.0);
    }
}
