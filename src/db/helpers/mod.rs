use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{ffi, Row};

use crate::models::{Category, InventoryRecord};

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub const INVENTORY_COLUMNS: &str = "product_id, category, name, price, quantity, \
     return_period_days, size, color, created_at, updated_at";

pub fn row_to_record(row: &Row) -> Result<InventoryRecord> {
    let category: String = row.get("category")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(InventoryRecord {
        product_id: row.get("product_id")?,
        category: Category::from_columns(&category, row.get("size")?, row.get("color")?),
        name: row.get("name")?,
        price: row.get("price")?,
        quantity: to_u32(row.get("quantity")?, "quantity")?,
        return_period_days: to_u32(row.get("return_period_days")?, "return_period_days")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}
