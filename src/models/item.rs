use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

pub const NAME_REQUIRED: &str = "Name is required";
pub const QUANTITY_INVALID: &str = "Quantity must be a positive integer";
pub const INVALID_JSON: &str = "Invalid JSON";
pub const INVALID_ITEM_ID: &str = "Invalid item ID";

/// A row of the `items` table. Names are unique case-insensitively, which the
/// store upholds on create rather than the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: i32,
    pub name: String,
    pub quantity: i32,
}

/// Validated `{name, quantity}` body shared by create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInput {
    /// Already trimmed and non-empty.
    pub name: String,
    /// Always >= 1.
    pub quantity: i32,
}

impl ItemInput {
    /// Parses a raw request body. Malformed JSON is reported on its own;
    /// otherwise every failed field check is collected into one message.
    pub fn from_body(body: &[u8]) -> AppResult<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| AppError::BadRequest(INVALID_JSON.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> AppResult<Self> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let quantity = value.get("quantity").and_then(positive_quantity);

        match (name, quantity) {
            (Some(name), Some(quantity)) => Ok(Self {
                name: name.to_string(),
                quantity,
            }),
            (name, quantity) => {
                let mut errors = Vec::with_capacity(2);
                if name.is_none() {
                    errors.push(NAME_REQUIRED);
                }
                if quantity.is_none() {
                    errors.push(QUANTITY_INVALID);
                }
                Err(AppError::BadRequest(errors.join(", ")))
            }
        }
    }
}

/// Accepts JSON numbers and numeric strings (`3`, `"3"`, `"2.5"`) that are at
/// least one, truncating any fractional part.
fn positive_quantity(value: &Value) -> Option<i32> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    if !number.is_finite() || number < 1.0 || number > f64::from(i32::MAX) {
        return None;
    }
    Some(number.trunc() as i32)
}

/// Parses the `{id}` path segment into a positive item id.
pub fn parse_item_id(raw: &str) -> AppResult<i32> {
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest(INVALID_ITEM_ID.to_string()))
}
