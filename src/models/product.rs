//! Inventory data models.
//!
//! Products share one flat record; category-specific attributes live on the
//! `Category` variant instead of a type hierarchy.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Category {
    Electronics,
    Clothing {
        size: Option<String>,
        color: Option<String>,
    },
    Groceries,
    Other {
        label: String,
    },
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Electronics => "electronics",
            Category::Clothing { .. } => "clothing",
            Category::Groceries => "groceries",
            Category::Other { label } => label.as_str(),
        }
    }

    /// Rebuild a category from its stored columns.
    pub fn from_columns(category: &str, size: Option<String>, color: Option<String>) -> Self {
        match category.trim().to_lowercase().as_str() {
            "electronics" => Category::Electronics,
            "clothing" => Category::Clothing { size, color },
            "groceries" => Category::Groceries,
            _ => Category::Other {
                label: category.trim().to_string(),
            },
        }
    }

    pub fn size(&self) -> Option<&str> {
        match self {
            Category::Clothing { size, .. } => size.as_deref(),
            _ => None,
        }
    }

    pub fn color(&self) -> Option<&str> {
        match self {
            Category::Clothing { color, .. } => color.as_deref(),
            _ => None,
        }
    }
}

/// Attributes supplied for a product that is not in the store yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub category: Category,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    pub return_period_days: u32,
}

impl ProductDetails {
    pub fn validate(&self) -> Result<()> {
        if self.category.as_str().trim().is_empty() {
            bail!("category must not be empty");
        }
        if let Category::Clothing { size, color } = &self.category {
            if size.as_deref().is_some_and(|s| s.trim().is_empty()) {
                bail!("clothing size must not be blank");
            }
            if color.as_deref().is_some_and(|c| c.trim().is_empty()) {
                bail!("clothing color must not be blank");
            }
        }
        if self.name.trim().is_empty() {
            bail!("name must not be empty");
        }
        if !self.price.is_finite() || self.price < 0.0 {
            bail!("price must be a non-negative number, got {}", self.price);
        }
        Ok(())
    }

    pub fn into_record(self, product_id: &str, now: DateTime<Utc>) -> InventoryRecord {
        InventoryRecord {
            product_id: product_id.to_string(),
            category: self.category,
            name: self.name,
            price: self.price,
            quantity: self.quantity,
            return_period_days: self.return_period_days,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub product_id: String,
    pub category: Category,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    pub return_period_days: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn validate(&self) -> Result<()> {
        if self.product_id.trim().is_empty() {
            bail!("product id must not be empty");
        }
        self.details().validate()
    }

    pub fn details(&self) -> ProductDetails {
        ProductDetails {
            category: self.category.clone(),
            name: self.name.clone(),
            price: self.price,
            quantity: self.quantity,
            return_period_days: self.return_period_days,
        }
    }
}

impl std::fmt::Display for InventoryRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} | {} | ${:.2} | qty {} | return {}d",
            self.product_id,
            self.category.as_str(),
            self.name,
            self.price,
            self.quantity,
            self.return_period_days
        )?;
        if let Some(size) = self.category.size() {
            write!(f, " | size {size}")?;
        }
        if let Some(color) = self.category.color() {
            write!(f, " | color {color}")?;
        }
        Ok(())
    }
}
