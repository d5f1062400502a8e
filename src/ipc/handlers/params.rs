use chrono::NaiveDate;

use crate::store::StoreError;

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, StoreError> {
    let value = params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| StoreError::BadParams(format!("missing {}", key)))?;
    if value.is_empty() {
        return Err(StoreError::BadParams(format!("{} must not be empty", key)));
    }
    Ok(value)
}

pub fn required_i64(params: &serde_json::Value, key: &str) -> Result<i64, StoreError> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| StoreError::BadParams(format!("missing {}", key)))
}

/// Parses and re-formats so stored dates are canonical ISO text.
pub fn required_date(params: &serde_json::Value, key: &str) -> Result<String, StoreError> {
    let raw = required_str(params, key)?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Ok(date.format("%Y-%m-%d").to_string()),
        Err(_) => Err(StoreError::BadParams(format!(
            "{} must be YYYY-MM-DD",
            key
        ))),
    }
}
