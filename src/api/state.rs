use std::sync::Arc;

use chrono_tz::Tz;

use crate::{
    config::{Config, PageLimits},
    db::ReadingStore,
    readings::light::LightThresholds,
    stats::RecommendedRanges,
};

/// Request-time settings derived from `Config`.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub light_thresholds: LightThresholds,
    pub time_zone: Tz,
    pub page_limits: PageLimits,
    pub ranges: RecommendedRanges,
}

impl ApiSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            light_thresholds: config.light_thresholds,
            time_zone: config.time_zone,
            page_limits: config.page_limits,
            ranges: RecommendedRanges::default(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            light_thresholds: LightThresholds::default(),
            time_zone: chrono_tz::America::Mexico_City,
            page_limits: PageLimits::default(),
            ranges: RecommendedRanges::default(),
        }
    }
}

/// Shared handler state, built once at startup. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ReadingStore>,
    settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(store: Arc<dyn ReadingStore>, settings: ApiSettings) -> Self {
        Self { store, settings: Arc::new(settings) }
    }

    pub fn store(&self) -> &dyn ReadingStore {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }
}
