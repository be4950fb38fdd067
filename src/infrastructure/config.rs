use crate::infrastructure::error::EngineError;
use chrono_tz::Tz;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const APP_JSON: &str = "app.json";
const DEFAULT_TRACK_CAPACITY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub timezone: Tz,
    pub track_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            track_capacity: DEFAULT_TRACK_CAPACITY,
        }
    }
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "appName": "HabitLoop",
        "timezone": "UTC",
        "timelineTrackCapacity": DEFAULT_TRACK_CAPACITY,
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), EngineError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, EngineError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| EngineError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(EngineError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, EngineError> {
    let app = read_config(&config_dir.join(APP_JSON))?;

    let timezone_name = app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("UTC");
    let timezone = Tz::from_str(timezone_name).map_err(|_| {
        EngineError::InvalidConfig(format!("unknown timezone '{timezone_name}' in {APP_JSON}"))
    })?;

    let track_capacity = app
        .get("timelineTrackCapacity")
        .and_then(serde_json::Value::as_u64)
        .map(|value| value as usize)
        .unwrap_or(DEFAULT_TRACK_CAPACITY);
    if track_capacity == 0 {
        return Err(EngineError::InvalidConfig(
            "timelineTrackCapacity must be > 0".to_string(),
        ));
    }

    Ok(AppConfig {
        timezone,
        track_capacity,
    })
}
