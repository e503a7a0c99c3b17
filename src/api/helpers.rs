//! Conversions between desk values and `JsValue`
//!
//! Failures crossing into JavaScript are logged once here and handed back to
//! the host as string values.

use log::error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::JsValue;

use crate::desk::DeskError;

/// Log a failure and turn it into the value thrown to the host
pub fn js_error(failure: impl std::fmt::Display) -> JsValue {
    let msg = failure.to_string();
    error!("{}", msg);
    JsValue::from_str(&msg)
}

pub fn deserialize<T: DeserializeOwned>(value: JsValue, context: &str) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| js_error(format!("{}: {}", context, e)))
}

/// Maps become plain objects so hosts can index snapshots by page number.
pub fn serialize<T: Serialize>(value: &T, context: &str) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|e| js_error(format!("{}: {}", context, e)))
}

/// 0-based index of a 1-based page number, if `page_count` pages cover it
pub fn checked_page_index(number: usize, page_count: usize) -> Option<usize> {
    number.checked_sub(1).filter(|index| *index < page_count)
}

pub fn page_index(number: usize, page_count: usize) -> Result<usize, JsValue> {
    checked_page_index(number, page_count).ok_or_else(|| js_error(DeskError::InvalidPageNumber(number)))
}
