use std::{fmt, str::FromStr};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Human-readable light level derived from a light magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LightLevel {
    #[serde(rename = "muy oscuro")]
    VeryDark,
    #[serde(rename = "oscuro")]
    Dark,
    #[serde(rename = "poco iluminado")]
    Dim,
    #[serde(rename = "bien iluminado")]
    Bright,
    #[serde(rename = "muy iluminado")]
    VeryBright,
}

impl fmt::Display for LightLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LightLevel::VeryDark => "muy oscuro",
            LightLevel::Dark => "oscuro",
            LightLevel::Dim => "poco iluminado",
            LightLevel::Bright => "bien iluminado",
            LightLevel::VeryBright => "muy iluminado",
        };
        f.write_str(s)
    }
}

/// Ordered upper bounds for the first four light levels.
///
/// A value below `very_dark` is "muy oscuro", below `dark` is "oscuro",
/// below `dim` is "poco iluminado", below `bright` is "bien iluminado" and
/// anything else is "muy iluminado". The bounds are deployment-specific: lux
/// sensors and raw ADC readings need very different tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightThresholds {
    pub very_dark: f64,
    pub dark: f64,
    pub dim: f64,
    pub bright: f64,
}

impl LightThresholds {
    /// Lux table used by the DHT+Light nodes.
    pub const LUX: Self = Self { very_dark: 10.0, dark: 50.0, dim: 200.0, bright: 1000.0 };

    /// Table for nodes reporting raw 12-bit ADC counts.
    pub const RAW_ADC: Self = Self { very_dark: 500.0, dark: 1200.0, dim: 2200.0, bright: 3200.0 };

    pub fn new(very_dark: f64, dark: f64, dim: f64, bright: f64) -> Result<Self> {
        let bounds = [very_dark, dark, dim, bright];
        if bounds.iter().any(|b| !b.is_finite() || *b < 0.0) {
            bail!("light thresholds must be finite and non-negative, got {bounds:?}");
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            bail!("light thresholds must be strictly increasing, got {bounds:?}");
        }
        Ok(Self { very_dark, dark, dim, bright })
    }

    pub fn classify(&self, value: f64) -> LightLevel {
        if value < self.very_dark {
            LightLevel::VeryDark
        } else if value < self.dark {
            LightLevel::Dark
        } else if value < self.dim {
            LightLevel::Dim
        } else if value < self.bright {
            LightLevel::Bright
        } else {
            LightLevel::VeryBright
        }
    }

    /// Binary light state: 0 (dark) below the `dim` threshold, 1
    /// (illuminated) at or above it.
    pub fn state(&self, value: f64) -> u8 {
        u8::from(value >= self.dim)
    }
}

impl Default for LightThresholds {
    fn default() -> Self {
        Self::LUX
    }
}

/// Parses `"t1,t2,t3,t4"`, e.g. `"10,50,200,1000"`.
impl FromStr for LightThresholds {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .with_context(|| format!("invalid light threshold {part:?}"))
            })
            .collect::<Result<Vec<_>>>()?;

        match values.as_slice() {
            [a, b, c, d] => Self::new(*a, *b, *c, *d),
            _ => bail!("expected 4 comma-separated light thresholds, got {}", values.len()),
        }
    }
}
