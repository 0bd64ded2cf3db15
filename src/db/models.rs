use std::{fmt, str::FromStr};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::readings::light::LightLevel;

/// Which board produced a reading, and therefore which `sensors` field set
/// the document carries. Stored as text in `readings.device_class`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// DHT22 temperature/humidity plus a lux sensor.
    DhtLight,
    /// BME680 temperature/humidity/pressure/gas.
    Bme,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::DhtLight => "dht_light",
            DeviceClass::Bme => "bme",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "dht_light" => Ok(Self::DhtLight),
            "bme" => Ok(Self::Bme),
            other => Err(anyhow::anyhow!("unknown device class: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DhtLightSensors {
    /// Degrees Celsius
    pub temp_dht_c: f64,
    /// Relative humidity, 0–100
    pub humidity_pct: f64,
    /// Illuminance in lux, >= 0
    pub light_lux: f64,
    /// 0 = dark (below the dim threshold), 1 = illuminated. Derived from `light_lux`.
    pub light_state: u8,
    /// Derived from `light_lux`.
    pub light_level: LightLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BmeSensors {
    /// Degrees Celsius
    pub temp_bme_c: f64,
    /// Relative humidity, 0–100
    pub humidity_bme_pct: f64,
    /// Hectopascal, 300–1100
    pub pressure_hpa: f64,
    /// Ohms, >= 0
    pub gas_resistance_ohms: f64,
}

/// Embedded sensor values. Serialized flat, without a tag: the owning
/// reading's `deviceClass` says which variant it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Sensors {
    DhtLight(DhtLightSensors),
    Bme(BmeSensors),
}

impl Sensors {
    pub fn device_class(&self) -> DeviceClass {
        match self {
            Sensors::DhtLight(_) => DeviceClass::DhtLight,
            Sensors::Bme(_) => DeviceClass::Bme,
        }
    }

    /// Decode a stored `sensors` document using the class recorded beside it.
    pub fn from_document(class: DeviceClass, doc: serde_json::Value) -> anyhow::Result<Self> {
        let sensors = match class {
            DeviceClass::DhtLight => Sensors::DhtLight(serde_json::from_value(doc)?),
            DeviceClass::Bme => Sensors::Bme(serde_json::from_value(doc)?),
        };
        Ok(sensors)
    }

    /// Look up a numeric field by its document key.
    pub fn field(&self, key: &str) -> Option<f64> {
        match self {
            Sensors::DhtLight(s) => match key {
                "temp_dht_c" => Some(s.temp_dht_c),
                "humidity_pct" => Some(s.humidity_pct),
                "light_lux" => Some(s.light_lux),
                "light_state" => Some(f64::from(s.light_state)),
                _ => None,
            },
            Sensors::Bme(s) => match key {
                "temp_bme_c" => Some(s.temp_bme_c),
                "humidity_bme_pct" => Some(s.humidity_bme_pct),
                "pressure_hpa" => Some(s.pressure_hpa),
                "gas_resistance_ohms" => Some(s.gas_resistance_ohms),
                _ => None,
            },
        }
    }
}

/// A validated, normalized reading that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub device_id: String,
    pub sensors: Sensors,
}

/// One stored sensor sample. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: Uuid,
    pub device_id: String,
    pub device_class: DeviceClass,
    pub sensors: Sensors,
    pub created_at: DateTime<Utc>,
}

/// Row shape of the `readings` table.
#[derive(Debug, FromRow)]
pub struct ReadingRow {
    pub id: Uuid,
    pub device_id: String,
    pub device_class: String,
    pub sensors: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReadingRow> for Reading {
    type Error = anyhow::Error;

    fn try_from(row: ReadingRow) -> anyhow::Result<Self> {
        let device_class: DeviceClass = row.device_class.parse()?;
        let sensors = Sensors::from_document(device_class, row.sensors.0)
            .with_context(|| format!("malformed sensors document for reading {}", row.id))?;
        Ok(Self {
            id: row.id,
            device_id: row.device_id,
            device_class,
            sensors,
            created_at: row.created_at,
        })
    }
}
