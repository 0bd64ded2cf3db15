use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    models::{NewReading, Reading},
    query::{
        ComplianceCounts, ComplianceQuery, DailyGroup, DailySummaryQuery, PageRequest,
        ReadingFilter,
    },
    ReadingStore,
};
use crate::stats::{calendar::day_bucket, Accumulator};

/// In-process `ReadingStore` holding readings in insertion order.
///
/// Wrapped in `Arc` so clones share the same data. Used by the HTTP tests and
/// for running the API without a database.
#[derive(Clone, Default)]
pub struct MemoryReadingStore {
    inner: Arc<RwLock<Vec<Reading>>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a reading with an explicit `created_at`.
    pub async fn insert_at(&self, reading: NewReading, created_at: DateTime<Utc>) -> Reading {
        let stored = Reading {
            id: Uuid::new_v4(),
            device_id: reading.device_id,
            device_class: reading.sensors.device_class(),
            sensors: reading.sensors,
            created_at,
        };
        self.inner.write().await.push(stored.clone());
        stored
    }

    /// Matching readings, newest first. Ties keep the later insert first.
    async fn matching(&self, filter: &ReadingFilter) -> Vec<Reading> {
        let mut hits: Vec<Reading> = self
            .inner
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn insert(&self, reading: NewReading) -> Result<Reading> {
        Ok(self.insert_at(reading, Utc::now()).await)
    }

    async fn count(&self, filter: &ReadingFilter) -> Result<u64> {
        let readings = self.inner.read().await;
        Ok(readings.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn find(&self, filter: &ReadingFilter, page: PageRequest) -> Result<Vec<Reading>> {
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(self
            .matching(filter)
            .await
            .into_iter()
            .skip(skip)
            .take(page.limit as usize)
            .collect())
    }

    async fn latest(&self, filter: &ReadingFilter) -> Result<Option<Reading>> {
        Ok(self.matching(filter).await.into_iter().next())
    }

    async fn daily_summary(&self, query: &DailySummaryQuery) -> Result<Vec<DailyGroup>> {
        let readings = self.inner.read().await;
        let mut days: BTreeMap<NaiveDate, (u64, Vec<Accumulator>)> = BTreeMap::new();

        for r in readings.iter().filter(|r| query.filter.matches(r)) {
            let (count, accs) = days
                .entry(day_bucket(r.created_at, query.time_zone))
                .or_insert_with(|| (0, vec![Accumulator::default(); query.metrics.len()]));
            *count += 1;
            for (metric, acc) in query.metrics.iter().zip(accs.iter_mut()) {
                if let Some(v) = metric.value(r) {
                    acc.push(v);
                }
            }
        }

        Ok(days
            .into_iter()
            .map(|(day, (count, accs))| DailyGroup {
                day,
                count,
                metrics: accs.iter().map(Accumulator::finish).collect(),
            })
            .collect())
    }

    async fn compliance(&self, query: &ComplianceQuery) -> Result<ComplianceCounts> {
        let readings = self.inner.read().await;
        let mut counts = ComplianceCounts { total: 0, passed: vec![0; query.checks.len()] };

        for r in readings.iter().filter(|r| query.filter.matches(r)) {
            counts.total += 1;
            for (check, passed) in query.checks.iter().zip(counts.passed.iter_mut()) {
                if check.holds(r) {
                    *passed += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
