use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("product {product_id} already exists")]
    Duplicate { product_id: String },
    #[error("product {product_id} not found in inventory")]
    NotFound { product_id: String },
    #[error("invalid product record: {0}")]
    InvalidRecord(String),
    #[error("quantity of {product_id} cannot drop below zero (current {current}, change {delta})")]
    NegativeStock {
        product_id: String,
        current: u32,
        delta: i64,
    },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl InventoryError {
    /// Recover a domain error raised inside a database task.
    pub fn from_task(err: anyhow::Error) -> Self {
        match err.downcast::<InventoryError>() {
            Ok(domain) => domain,
            Err(other) => InventoryError::Storage(other),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, InventoryError::Duplicate { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, InventoryError::NotFound { .. })
    }
}
