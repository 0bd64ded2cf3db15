use serde_json::{Map, Value};
use thiserror::Error;

use super::light::LightThresholds;
use crate::db::models::{BmeSensors, DhtLightSensors, NewReading, Sensors};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("missing field: {0}")]
    Missing(&'static str),
    #[error("{0} must be a string")]
    NotAString(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("sensors must be an object")]
    SensorsNotAnObject,
    #[error("missing field: sensors.{0}")]
    MissingSensor(&'static str),
    #[error("sensors.{0} must be a finite number")]
    NotANumber(&'static str),
    #[error("sensors.{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("sensors.{field} must be >= {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: f64,
        value: f64,
    },
}

/// Trim and lowercase a device identifier. Idempotent.
pub fn normalize_device_id(raw: &str) -> Result<String, ValidationError> {
    let id = raw.trim().to_lowercase();
    if id.is_empty() {
        return Err(ValidationError::Empty("deviceId"));
    }
    Ok(id)
}

/// Validate a DHT22 + light payload and derive `light_state`/`light_level`.
///
/// Client-supplied `light_state` and `light_level` are ignored.
pub fn dht_light_reading(
    payload: &Value,
    thresholds: &LightThresholds,
) -> Result<NewReading, ValidationError> {
    let (device_id, sensors) = envelope(payload)?;

    let temp_dht_c = number(sensors, "temp_dht_c")?;
    let humidity_pct = within(number(sensors, "humidity_pct")?, "humidity_pct", 0.0, 100.0)?;
    let light_lux = at_least(number(sensors, "light_lux")?, "light_lux", 0.0)?;

    Ok(NewReading {
        device_id,
        sensors: Sensors::DhtLight(DhtLightSensors {
            temp_dht_c,
            humidity_pct,
            light_lux,
            light_state: thresholds.state(light_lux),
            light_level: thresholds.classify(light_lux),
        }),
    })
}

/// Validate a BME680 payload.
pub fn bme_reading(payload: &Value) -> Result<NewReading, ValidationError> {
    let (device_id, sensors) = envelope(payload)?;

    let temp_bme_c = number(sensors, "temp_bme_c")?;
    let humidity_bme_pct =
        within(number(sensors, "humidity_bme_pct")?, "humidity_bme_pct", 0.0, 100.0)?;
    let pressure_hpa = within(number(sensors, "pressure_hpa")?, "pressure_hpa", 300.0, 1100.0)?;
    let gas_resistance_ohms =
        at_least(number(sensors, "gas_resistance_ohms")?, "gas_resistance_ohms", 0.0)?;

    Ok(NewReading {
        device_id,
        sensors: Sensors::Bme(BmeSensors {
            temp_bme_c,
            humidity_bme_pct,
            pressure_hpa,
            gas_resistance_ohms,
        }),
    })
}

/// Extract the normalized `deviceId` and the `sensors` object.
fn envelope(payload: &Value) -> Result<(String, &Map<String, Value>), ValidationError> {
    let body = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    let device_id = match body.get("deviceId") {
        None | Some(Value::Null) => return Err(ValidationError::Missing("deviceId")),
        Some(Value::String(s)) => normalize_device_id(s)?,
        Some(_) => return Err(ValidationError::NotAString("deviceId")),
    };

    let sensors = match body.get("sensors") {
        None | Some(Value::Null) => return Err(ValidationError::Missing("sensors")),
        Some(Value::Object(m)) => m,
        Some(_) => return Err(ValidationError::SensorsNotAnObject),
    };

    Ok((device_id, sensors))
}

fn number(sensors: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    match sensors.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingSensor(field)),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or(ValidationError::NotANumber(field)),
        Some(_) => Err(ValidationError::NotANumber(field)),
    }
}

fn within(value: f64, field: &'static str, min: f64, max: f64) -> Result<f64, ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange { field, min, max, value });
    }
    Ok(value)
}

fn at_least(value: f64, field: &'static str, min: f64) -> Result<f64, ValidationError> {
    if value < min {
        return Err(ValidationError::BelowMinimum { field, min, value });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::readings::light::LightLevel;

    fn dht(payload: Value) -> Result<NewReading, ValidationError> {
        dht_light_reading(&payload, &LightThresholds::LUX)
    }

    #[test]
    fn device_id_normalization_is_idempotent() {
        for raw in ["ESP32-A ", "esp32-a", " esp32-a", "\tEsP32-A\n"] {
            let once = normalize_device_id(raw).unwrap();
            assert_eq!(once, "esp32-a");
            assert_eq!(normalize_device_id(&once).unwrap(), once);
        }
    }

    #[test]
    fn blank_device_id_is_rejected() {
        assert_eq!(normalize_device_id("   "), Err(ValidationError::Empty("deviceId")));
    }

    #[test]
    fn dht_light_derives_level_and_state() {
        let r = dht(json!({
            "deviceId": " ESP32-DHT-Light-01 ",
            "sensors": { "temp_dht_c": 27.2, "humidity_pct": 47.3, "light_lux": 120.5 }
        }))
        .unwrap();

        assert_eq!(r.device_id, "esp32-dht-light-01");
        let Sensors::DhtLight(s) = r.sensors else { panic!("expected DHT+Light sensors") };
        assert_eq!(s.light_level, LightLevel::Dim);
        assert_eq!(s.light_state, 0);
        assert_eq!(s.humidity_pct, 47.3);
    }

    #[test]
    fn dht_light_ignores_client_supplied_level() {
        let r = dht(json!({
            "deviceId": "n1",
            "sensors": {
                "temp_dht_c": 20, "humidity_pct": 50, "light_lux": 3,
                "light_level": "muy iluminado", "light_state": 1
            }
        }))
        .unwrap();

        let Sensors::DhtLight(s) = r.sensors else { panic!("expected DHT+Light sensors") };
        assert_eq!(s.light_level, LightLevel::VeryDark);
        assert_eq!(s.light_state, 0);
    }

    #[test]
    fn missing_fields_are_named() {
        assert_eq!(
            dht(json!({ "sensors": {} })).unwrap_err(),
            ValidationError::Missing("deviceId")
        );
        assert_eq!(
            dht(json!({ "deviceId": "n1" })).unwrap_err(),
            ValidationError::Missing("sensors")
        );
        assert_eq!(
            dht(json!({ "deviceId": "n1", "sensors": { "temp_dht_c": 1, "light_lux": 1 } }))
                .unwrap_err(),
            ValidationError::MissingSensor("humidity_pct")
        );
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert_eq!(
            dht(json!({ "deviceId": 42, "sensors": {} })).unwrap_err(),
            ValidationError::NotAString("deviceId")
        );
        assert_eq!(
            dht(json!({ "deviceId": "n1", "sensors": [1, 2] })).unwrap_err(),
            ValidationError::SensorsNotAnObject
        );
        assert_eq!(
            dht(json!({
                "deviceId": "n1",
                "sensors": { "temp_dht_c": "27", "humidity_pct": 50, "light_lux": 1 }
            }))
            .unwrap_err(),
            ValidationError::NotANumber("temp_dht_c")
        );
        assert_eq!(dht(json!([1])).unwrap_err(), ValidationError::NotAnObject);
    }

    #[test]
    fn humidity_out_of_range() {
        let err = dht(json!({
            "deviceId": "n1",
            "sensors": { "temp_dht_c": 20, "humidity_pct": 100.5, "light_lux": 1 }
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { field: "humidity_pct", .. }));
    }

    #[test]
    fn negative_light_rejected() {
        let err = dht(json!({
            "deviceId": "n1",
            "sensors": { "temp_dht_c": 20, "humidity_pct": 50, "light_lux": -0.1 }
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::BelowMinimum { field: "light_lux", .. }));
    }

    #[test]
    fn bme_valid_payload() {
        let r = bme_reading(&json!({
            "deviceId": "ESP32-BME-01",
            "sensors": {
                "temp_bme_c": -12.5,
                "humidity_bme_pct": 45.1,
                "pressure_hpa": 1012.3,
                "gas_resistance_ohms": 123456.7
            }
        }))
        .unwrap();

        assert_eq!(r.device_id, "esp32-bme-01");
        assert_eq!(r.sensors.field("temp_bme_c"), Some(-12.5));
    }

    #[test]
    fn bme_pressure_bounds() {
        let payload = |p: f64| {
            json!({
                "deviceId": "b",
                "sensors": {
                    "temp_bme_c": 20, "humidity_bme_pct": 40,
                    "pressure_hpa": p, "gas_resistance_ohms": 0
                }
            })
        };
        assert!(bme_reading(&payload(300.0)).is_ok());
        assert!(bme_reading(&payload(1100.0)).is_ok());
        assert!(matches!(
            bme_reading(&payload(299.9)).unwrap_err(),
            ValidationError::OutOfRange { field: "pressure_hpa", .. }
        ));
        assert!(matches!(
            bme_reading(&payload(1100.1)).unwrap_err(),
            ValidationError::OutOfRange { field: "pressure_hpa", .. }
        ));
    }

    #[test]
    fn bme_negative_gas_rejected() {
        let err = bme_reading(&json!({
            "deviceId": "b",
            "sensors": {
                "temp_bme_c": 20, "humidity_bme_pct": 40,
                "pressure_hpa": 1000, "gas_resistance_ohms": -1
            }
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "sensors.gas_resistance_ohms must be >= 0, got -1");
    }
}
