use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{
    models::{NewReading, Reading, ReadingRow},
    query::{
        ComplianceCounts, ComplianceQuery, DailyGroup, DailySummaryQuery, PageRequest,
        ReadingFilter,
    },
    ReadingStore,
};
use crate::stats::MetricStats;

const READING_COLUMNS: &str = "id, device_id, device_class, sensors, created_at";

/// `ReadingStore` backed by the `readings` table; `sensors` is a JSONB document.
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Append `WHERE` clauses for `filter`. Every value is bound, never inlined.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ReadingFilter) {
    qb.push(" WHERE TRUE");
    if let Some(class) = filter.device_class {
        qb.push(" AND device_class = ").push_bind(class.as_str());
    }
    if let Some(device_id) = &filter.device_id {
        qb.push(" AND device_id = ").push_bind(device_id.clone());
    }
    if let Some(from) = filter.window.from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(until) = filter.window.until {
        qb.push(" AND created_at < ").push_bind(until);
    }
}

/// `(sensors->>'key')::float8`. Keys come from the closed `Metric` enum.
fn numeric_field(key: &str) -> String {
    format!("(sensors->>'{key}')::float8")
}

fn to_readings(rows: Vec<ReadingRow>) -> Result<Vec<Reading>> {
    rows.into_iter().map(Reading::try_from).collect()
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(&self, reading: NewReading) -> Result<Reading> {
        let device_class = reading.sensors.device_class();
        let row = sqlx::query_as::<_, ReadingRow>(
            r#"
            INSERT INTO readings (id, device_id, device_class, sensors)
            VALUES ($1, $2, $3, $4)
            RETURNING id, device_id, device_class, sensors, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&reading.device_id)
        .bind(device_class.as_str())
        .bind(Json(&reading.sensors))
        .fetch_one(&self.pool)
        .await
        .context("insert reading")?;

        row.try_into()
    }

    async fn count(&self, filter: &ReadingFilter) -> Result<u64> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT count(*) FROM readings");
        push_filter(&mut qb, filter);

        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("count readings")?;
        Ok(total.max(0) as u64)
    }

    async fn find(&self, filter: &ReadingFilter, page: PageRequest) -> Result<Vec<Reading>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {READING_COLUMNS} FROM readings"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = qb
            .build_query_as::<ReadingRow>()
            .fetch_all(&self.pool)
            .await
            .context("find readings")?;
        to_readings(rows)
    }

    async fn latest(&self, filter: &ReadingFilter) -> Result<Option<Reading>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {READING_COLUMNS} FROM readings"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT 1");

        let row = qb
            .build_query_as::<ReadingRow>()
            .fetch_optional(&self.pool)
            .await
            .context("fetch latest reading")?;
        row.map(Reading::try_from).transpose()
    }

    async fn daily_summary(&self, query: &DailySummaryQuery) -> Result<Vec<DailyGroup>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT (created_at AT TIME ZONE ");
        qb.push_bind(query.time_zone.name())
            .push(")::date AS day, count(*) AS count");
        for metric in &query.metrics {
            let field = numeric_field(metric.key());
            qb.push(format!(", min({field}), max({field}), avg({field})"));
        }
        qb.push(" FROM readings");
        push_filter(&mut qb, &query.filter);
        qb.push(" GROUP BY 1 ORDER BY 1");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("aggregate daily summary")?;

        rows.iter()
            .map(|row| -> Result<DailyGroup> {
                let day: NaiveDate = row.try_get("day")?;
                let count: i64 = row.try_get("count")?;
                let metrics = (0..query.metrics.len())
                    .map(|i| {
                        let base = 2 + i * 3;
                        Ok(MetricStats {
                            min: row.try_get(base)?,
                            max: row.try_get(base + 1)?,
                            avg: row.try_get(base + 2)?,
                        })
                    })
                    .collect::<Result<Vec<_>, sqlx::Error>>()?;
                Ok(DailyGroup { day, count: count.max(0) as u64, metrics })
            })
            .collect()
    }

    async fn compliance(&self, query: &ComplianceQuery) -> Result<ComplianceCounts> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT count(*)");
        for check in &query.checks {
            qb.push(", count(*) FILTER (WHERE TRUE");
            for cond in &check.all_of {
                qb.push(format!(" AND {} BETWEEN ", numeric_field(cond.metric.key())))
                    .push_bind(cond.range.min)
                    .push(" AND ")
                    .push_bind(cond.range.max);
            }
            qb.push(")");
        }
        qb.push(" FROM readings");
        push_filter(&mut qb, &query.filter);

        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .context("aggregate compliance")?;

        let total: i64 = row.try_get(0)?;
        let passed = (0..query.checks.len())
            .map(|i| row.try_get::<i64, _>(i + 1).map(|n| n.max(0) as u64))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ComplianceCounts { total: total.max(0) as u64, passed })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests (need a Postgres reachable through DATABASE_URL)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use chrono_tz::America::Mexico_City;
    use serde_json::json;

    use super::*;
    use crate::db::{
        models::DeviceClass,
        query::{ComplianceCheck, Metric, RangeCondition, TimeWindow},
    };
    use crate::stats::Range;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn insert_bme_at(pool: &PgPool, device_id: &str, temp: f64, hum: f64, at: &str) {
        sqlx::query(
            "INSERT INTO readings (id, device_id, device_class, sensors, created_at) \
             VALUES ($1, $2, 'bme', $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(device_id)
        .bind(Json(json!({
            "temp_bme_c": temp,
            "humidity_bme_pct": hum,
            "pressure_hpa": 1010.0,
            "gas_resistance_ohms": 1000.0
        })))
        .bind(ts(at))
        .execute(pool)
        .await
        .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres database (DATABASE_URL)"]
    async fn insert_then_latest(pool: PgPool) {
        let store = PgReadingStore::new(pool);
        let reading = crate::readings::validate::bme_reading(&json!({
            "deviceId": "ESP32-BME-01",
            "sensors": {
                "temp_bme_c": 26.8, "humidity_bme_pct": 45.1,
                "pressure_hpa": 1012.3, "gas_resistance_ohms": 123456.7
            }
        }))
        .unwrap();

        let stored = store.insert(reading.clone()).await.unwrap();
        assert_eq!(stored.device_id, "esp32-bme-01");
        assert_eq!(stored.sensors, reading.sensors);

        let latest = store.latest(&ReadingFilter::default()).await.unwrap().unwrap();
        assert_eq!(latest, stored);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres database (DATABASE_URL)"]
    async fn find_is_newest_first_and_paged(pool: PgPool) {
        insert_bme_at(&pool, "a", 20.0, 50.0, "2025-11-18T10:00:00Z").await;
        insert_bme_at(&pool, "a", 21.0, 50.0, "2025-11-18T11:00:00Z").await;
        insert_bme_at(&pool, "b", 22.0, 50.0, "2025-11-18T12:00:00Z").await;

        let store = PgReadingStore::new(pool);
        let all = ReadingFilter::default();
        assert_eq!(store.count(&all).await.unwrap(), 3);

        let page = store.find(&all, PageRequest { page: 1, limit: 2 }).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].device_id, "b");
        assert!(page[0].created_at > page[1].created_at);

        let only_a = ReadingFilter { device_id: Some("a".into()), ..Default::default() };
        assert_eq!(store.count(&only_a).await.unwrap(), 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres database (DATABASE_URL)"]
    async fn daily_summary_buckets_in_local_time(pool: PgPool) {
        // 05:59:59Z and 06:00:00Z straddle local midnight in Mexico City.
        insert_bme_at(&pool, "a", 20.0, 40.0, "2025-11-19T05:59:59Z").await;
        insert_bme_at(&pool, "a", 30.0, 60.0, "2025-11-19T06:00:00Z").await;
        insert_bme_at(&pool, "a", 26.0, 50.0, "2025-11-19T07:00:00Z").await;

        let store = PgReadingStore::new(pool);
        let groups = store
            .daily_summary(&DailySummaryQuery {
                filter: ReadingFilter::class(DeviceClass::Bme),
                time_zone: Mexico_City,
                metrics: vec![Metric::TempBme, Metric::HumidityBme],
            })
            .await
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].day.to_string(), "2025-11-18");
        assert_eq!(groups[0].count, 1);
        assert_eq!(groups[1].count, 2);
        assert_eq!(groups[1].metric(0).min, Some(26.0));
        assert_eq!(groups[1].metric(0).max, Some(30.0));
        assert_eq!(groups[1].metric(1).avg, Some(55.0));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres database (DATABASE_URL)"]
    async fn compliance_counts(pool: PgPool) {
        insert_bme_at(&pool, "a", 25.0, 50.0, "2025-11-18T10:00:00Z").await;
        insert_bme_at(&pool, "a", 25.0, 70.0, "2025-11-18T11:00:00Z").await;
        insert_bme_at(&pool, "a", 30.0, 50.0, "2025-11-18T12:00:00Z").await;

        let temp = RangeCondition { metric: Metric::TempBme, range: Range::new(23.0, 27.0) };
        let hum = RangeCondition { metric: Metric::HumidityBme, range: Range::new(40.0, 60.0) };
        let query = ComplianceQuery {
            filter: ReadingFilter::class(DeviceClass::Bme),
            checks: vec![
                ComplianceCheck::new(vec![temp]),
                ComplianceCheck::new(vec![hum]),
                ComplianceCheck::new(vec![temp, hum]),
            ],
        };

        let store = PgReadingStore::new(pool);
        let counts = store.compliance(&query).await.unwrap();
        assert_eq!(counts, ComplianceCounts { total: 3, passed: vec![2, 2, 1] });

        let empty = ComplianceQuery {
            filter: ReadingFilter {
                window: TimeWindow { from: Some(ts("2030-01-01T00:00:00Z")), until: None },
                ..query.filter.clone()
            },
            ..query
        };
        let counts = store.compliance(&empty).await.unwrap();
        assert_eq!(counts.total, 0);
        assert_eq!(counts.pct(0), 0.0);
    }
}
