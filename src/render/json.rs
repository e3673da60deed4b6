use serde::Serialize;

use crate::error::CollectorError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, CollectorError> {
    Ok(serde_json::to_string_pretty(value)?)
}
