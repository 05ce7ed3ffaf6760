pub mod admin;
pub mod analytics;
pub mod client_portal;
pub mod ordering;
pub mod payment;

use crate::utils::error::Result;
use serde::de::DeserializeOwned;

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<serde_json::Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

pub(crate) fn decode_first<T: DeserializeOwned>(rows: Vec<serde_json::Value>) -> Result<Option<T>> {
    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}
