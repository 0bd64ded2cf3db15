use anyhow::{bail, Context, Result};
use chrono_tz::Tz;

use crate::readings::light::LightThresholds;

// ---------------------------------------------------------------------------
// PageLimits
// ---------------------------------------------------------------------------

/// Page size used when a list request gives none, and the hard cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl PageLimits {
    pub fn new(default_limit: u32, max_limit: u32) -> Result<Self> {
        if default_limit == 0 || max_limit == 0 {
            bail!("page limits must be positive");
        }
        if default_limit > max_limit {
            bail!("PAGE_DEFAULT_LIMIT ({default_limit}) exceeds PAGE_MAX_LIMIT ({max_limit})");
        }
        Ok(Self { default_limit, max_limit })
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self { default_limit: 50, max_limit: 200 }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    /// IANA zone used for daily buckets and plain `YYYY-MM-DD` dates.
    pub time_zone: Tz,
    /// Format: `"t1,t2,t3,t4"` (e.g. `"10,50,200,1000"`).
    pub light_thresholds: LightThresholds,
    pub page_limits: PageLimits,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "4000")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            time_zone: parse_time_zone(&optional("STATS_TIME_ZONE", "America/Mexico_City"))?,
            light_thresholds: optional("LIGHT_THRESHOLDS", "10,50,200,1000")
                .parse()
                .context("LIGHT_THRESHOLDS must be 4 increasing numbers, e.g. 10,50,200,1000")?,
            page_limits: PageLimits::new(
                optional("PAGE_DEFAULT_LIMIT", "50")
                    .parse()
                    .context("PAGE_DEFAULT_LIMIT must be a positive integer")?,
                optional("PAGE_MAX_LIMIT", "200")
                    .parse()
                    .context("PAGE_MAX_LIMIT must be a positive integer")?,
            )?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_time_zone(raw: &str) -> Result<Tz> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("STATS_TIME_ZONE {raw:?} is not an IANA time zone: {e}"))
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_zone_known() {
        assert_eq!(parse_time_zone("America/Mexico_City").unwrap(), chrono_tz::America::Mexico_City);
        assert_eq!(parse_time_zone(" UTC ").unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn parse_time_zone_unknown_errors() {
        let err = parse_time_zone("Mars/Olympus_Mons").unwrap_err();
        assert!(err.to_string().contains("not an IANA time zone"));
    }

    #[test]
    fn page_limits_validation() {
        assert_eq!(PageLimits::new(100, 500).unwrap(), PageLimits { default_limit: 100, max_limit: 500 });
        assert!(PageLimits::new(0, 200).is_err());
        let err = PageLimits::new(300, 200).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn page_limits_default() {
        assert_eq!(PageLimits::default(), PageLimits::new(50, 200).unwrap());
    }
}
