use anyhow::Context;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::db::{
    connection::Database,
    helpers::{is_unique_violation, row_to_record, to_u32, INVENTORY_COLUMNS},
};
use crate::inventory::InventoryError;
use crate::models::InventoryRecord;

type InventoryResult<T> = Result<T, InventoryError>;

impl Database {
    /// Insert a new product. The store's uniqueness constraint on
    /// `product_id` decides duplicates; nothing is mutated on conflict.
    pub async fn add_product(&self, record: &InventoryRecord) -> InventoryResult<()> {
        record
            .validate()
            .map_err(|err| InventoryError::InvalidRecord(err.to_string()))?;

        let record = record.clone();
        self.execute(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO inventory (product_id, category, name, price, quantity,
                                        return_period_days, size, color, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.product_id,
                    record.category.as_str(),
                    record.name,
                    record.price,
                    record.quantity,
                    record.return_period_days,
                    record.category.size(),
                    record.category.color(),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            );

            match inserted {
                Ok(_) => Ok(()),
                Err(err) if is_unique_violation(&err) => Err(InventoryError::Duplicate {
                    product_id: record.product_id.clone(),
                }
                .into()),
                Err(err) => Err(anyhow::Error::new(err).context("failed to insert product")),
            }
        })
        .await
        .map_err(InventoryError::from_task)
    }

    pub async fn search_product(
        &self,
        product_id: &str,
    ) -> InventoryResult<Option<InventoryRecord>> {
        let product_id = product_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventory WHERE product_id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![product_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_record(row)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(InventoryError::from_task)
    }

    /// Apply a signed change to a product's quantity and return the new value.
    ///
    /// The read and the write share one immediate transaction so concurrent
    /// writers on the same file cannot lose an increment.
    pub async fn update_quantity(&self, product_id: &str, delta: i64) -> InventoryResult<u32> {
        let product_id = product_id.to_string();
        self.execute(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .context("failed to open quantity transaction")?;

            let current: Option<i64> = tx
                .query_row(
                    "SELECT quantity FROM inventory WHERE product_id = ?1",
                    params![product_id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(current) = current else {
                return Err(InventoryError::NotFound { product_id }.into());
            };
            let current = to_u32(current, "quantity")?;

            let next = i64::from(current) + delta;
            if next < 0 {
                return Err(InventoryError::NegativeStock {
                    product_id,
                    current,
                    delta,
                }
                .into());
            }
            let next = to_u32(next, "quantity")?;

            tx.execute(
                "UPDATE inventory SET quantity = ?1, updated_at = ?2 WHERE product_id = ?3",
                params![next, Utc::now().to_rfc3339(), product_id],
            )?;
            tx.commit().context("failed to commit quantity update")?;
            Ok(next)
        })
        .await
        .map_err(InventoryError::from_task)
    }

    pub async fn remove_product(&self, product_id: &str) -> InventoryResult<()> {
        let product_id = product_id.to_string();
        self.execute(move |conn| {
            let removed = conn.execute(
                "DELETE FROM inventory WHERE product_id = ?1",
                params![product_id],
            )?;
            if removed == 0 {
                return Err(InventoryError::NotFound { product_id }.into());
            }
            Ok(())
        })
        .await
        .map_err(InventoryError::from_task)
    }

    /// All products ordered by product id.
    pub async fn list_products(&self) -> InventoryResult<Vec<InventoryRecord>> {
        self.execute(|conn| {
            let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventory ORDER BY product_id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
        .map_err(InventoryError::from_task)
    }
}
