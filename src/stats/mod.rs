//! Pure statistics over sensor readings: recommended ranges, range
//! classification, min/max/avg accumulation and percentage math.
//!
//! Nothing here touches the store, so every rule is testable in isolation.

pub mod calendar;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed numeric interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Recommended indoor ranges readings are compared against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendedRanges {
    /// °C
    pub temperature: Range,
    /// %
    pub humidity: Range,
    /// lux
    pub light: Range,
}

impl RecommendedRanges {
    pub const CLASSROOM: Self = Self {
        temperature: Range::new(23.0, 27.0),
        humidity: Range::new(40.0, 60.0),
        light: Range::new(300.0, 500.0),
    };
}

impl Default for RecommendedRanges {
    fn default() -> Self {
        Self::CLASSROOM
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    Bajo,
    Alto,
    EnRango,
    SinDatos,
}

impl RangeStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, RangeStatus::EnRango)
    }
}

/// Missing and NaN values are `SinDatos`, never a range violation.
pub fn classify_range(value: Option<f64>, range: Range) -> RangeStatus {
    match value {
        None => RangeStatus::SinDatos,
        Some(v) if v.is_nan() => RangeStatus::SinDatos,
        Some(v) if v < range.min => RangeStatus::Bajo,
        Some(v) if v > range.max => RangeStatus::Alto,
        Some(_) => RangeStatus::EnRango,
    }
}

/// `count / total * 100`, or 0 for an empty population.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

/// `ceil(total / limit)`; 0 when `limit` is 0.
pub fn total_pages(total: u64, limit: u32) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(u64::from(limit))
}

/// Min/max/avg of one metric over a group of readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetricStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

/// Running min/max/sum used to build a `MetricStats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accumulator {
    count: u64,
    min: f64,
    max: f64,
    sum: f64,
}

impl Accumulator {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.count += 1;
    }

    pub fn finish(&self) -> MetricStats {
        if self.count == 0 {
            return MetricStats::default();
        }
        MetricStats {
            min: Some(self.min),
            max: Some(self.max),
            avg: Some(self.sum / self.count as f64),
        }
    }
}

/// A metric's daily stats plus the classification of its average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClassifiedStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub status: RangeStatus,
}

impl ClassifiedStats {
    pub fn new(stats: MetricStats, range: Range) -> Self {
        Self {
            min: stats.min,
            max: stats.max,
            avg: stats.avg,
            status: classify_range(stats.avg, range),
        }
    }
}

/// One calendar day of readings for one device class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailySummary {
    /// Local calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub count: u64,
    pub temperature: ClassifiedStats,
    pub humidity: ClassifiedStats,
    /// BME680 only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<MetricStats>,
    /// DHT+Light only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<ClassifiedStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: RecommendedRanges = RecommendedRanges::CLASSROOM;

    #[test]
    fn classify_against_temperature_range() {
        assert_eq!(classify_range(Some(22.9), R.temperature), RangeStatus::Bajo);
        assert_eq!(classify_range(Some(23.0), R.temperature), RangeStatus::EnRango);
        assert_eq!(classify_range(Some(27.0), R.temperature), RangeStatus::EnRango);
        assert_eq!(classify_range(Some(27.1), R.temperature), RangeStatus::Alto);
    }

    #[test]
    fn missing_or_nan_is_sin_datos() {
        assert_eq!(classify_range(None, R.humidity), RangeStatus::SinDatos);
        assert_eq!(classify_range(Some(f64::NAN), R.humidity), RangeStatus::SinDatos);
        assert!(!RangeStatus::SinDatos.is_ok());
    }

    #[test]
    fn status_labels() {
        assert_eq!(serde_json::to_value(RangeStatus::EnRango).unwrap(), "en_rango");
        assert_eq!(serde_json::to_value(RangeStatus::SinDatos).unwrap(), "sin_datos");
        assert_eq!(serde_json::to_value(RangeStatus::Bajo).unwrap(), "bajo");
    }

    #[test]
    fn percentage_of_empty_population_is_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(3, 3), 100.0);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 50), 0);
        assert_eq!(total_pages(1, 50), 1);
        assert_eq!(total_pages(200, 200), 1);
        assert_eq!(total_pages(201, 200), 2);
        assert_eq!(total_pages(10, 0), 0);
    }

    #[test]
    fn accumulator_min_max_avg() {
        let mut acc = Accumulator::default();
        assert_eq!(acc.finish(), MetricStats::default());

        for v in [24.0, 21.0, 27.0] {
            acc.push(v);
        }
        let stats = acc.finish();
        assert_eq!(stats.min, Some(21.0));
        assert_eq!(stats.max, Some(27.0));
        assert_eq!(stats.avg, Some(24.0));
    }

    #[test]
    fn classified_stats_uses_average() {
        let stats = MetricStats { min: Some(10.0), max: Some(90.0), avg: Some(50.0) };
        let c = ClassifiedStats::new(stats, R.humidity);
        assert_eq!(c.status, RangeStatus::EnRango);

        let empty = ClassifiedStats::new(MetricStats::default(), R.humidity);
        assert_eq!(empty.status, RangeStatus::SinDatos);
    }
}
