use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;

use crate::db::Database;
use crate::models::{InventoryRecord, ProductDetails};

use super::error::InventoryError;
use super::resolver::{ProductResolver, SkipUnknown};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Updated {
        product_id: String,
        new_quantity: u32,
    },
    Created(InventoryRecord),
    Failed {
        product_id: String,
        reason: String,
    },
}

impl ReconcileOutcome {
    fn failed(product_id: &str, reason: impl ToString) -> Self {
        ReconcileOutcome::Failed {
            product_id: product_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Looks decoded codes up as product ids: a hit adds one unit of stock, a
/// miss asks the resolver for attributes and inserts a new record.
pub struct InventoryReconciler {
    db: Database,
    resolver: Box<dyn ProductResolver>,
}

impl InventoryReconciler {
    pub fn new(db: Database, resolver: Box<dyn ProductResolver>) -> Self {
        Self { db, resolver }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn reconcile(&mut self, product_id: &str) -> ReconcileOutcome {
        let outcome = match self.db.search_product(product_id).await {
            Ok(Some(_)) => increment(&self.db, product_id).await,
            Ok(None) => self.create(product_id).await,
            Err(err) => ReconcileOutcome::failed(product_id, err),
        };

        match &outcome {
            ReconcileOutcome::Updated { new_quantity, .. } => {
                info!("Updated inventory for {product_id}: quantity now {new_quantity}")
            }
            ReconcileOutcome::Created(record) => {
                info!("Added new product {} (ID: {product_id})", record.name)
            }
            ReconcileOutcome::Failed { reason, .. } => {
                warn!("Reconciliation failed for {product_id}: {reason}")
            }
        }
        outcome
    }

    async fn create(&mut self, product_id: &str) -> ReconcileOutcome {
        let Some(details) = self.describe(product_id).await else {
            return ReconcileOutcome::failed(product_id, "product creation abandoned");
        };
        if let Err(err) = details.validate() {
            let err = InventoryError::InvalidRecord(err.to_string());
            return ReconcileOutcome::failed(product_id, err);
        }

        let record = details.into_record(product_id, Utc::now());
        match self.db.add_product(&record).await {
            Ok(()) => ReconcileOutcome::Created(record),
            Err(err) if err.is_duplicate() => {
                // Another writer created it between lookup and insert.
                warn!("{product_id} appeared while it was being created; counting it instead");
                increment(&self.db, product_id).await
            }
            Err(err) => ReconcileOutcome::failed(product_id, err),
        }
    }

    /// Resolvers may block on an operator, so they run on the blocking pool.
    async fn describe(&mut self, product_id: &str) -> Option<ProductDetails> {
        let mut resolver = std::mem::replace(&mut self.resolver, Box::new(SkipUnknown));
        let id = product_id.to_string();
        let task = tokio::task::spawn_blocking(move || {
            let details = resolver.describe(&id);
            (resolver, details)
        });
        match task.await {
            Ok((resolver, details)) => {
                self.resolver = resolver;
                details
            }
            Err(err) => {
                error!("Resolver for {product_id} crashed: {err}; unknown codes are now skipped");
                None
            }
        }
    }
}

async fn increment(db: &Database, product_id: &str) -> ReconcileOutcome {
    match db.update_quantity(product_id, 1).await {
        Ok(new_quantity) => ReconcileOutcome::Updated {
            product_id: product_id.to_string(),
            new_quantity,
        },
        Err(err) => ReconcileOutcome::failed(product_id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn no_resolver() -> Box<dyn ProductResolver> {
        Box::new(|_: &str| -> Option<ProductDetails> { None })
    }

    fn details(name: &str) -> ProductDetails {
        ProductDetails {
            category: Category::Electronics,
            name: name.into(),
            price: 19.0,
            quantity: 1,
            return_period_days: 14,
        }
    }

    #[tokio::test]
    async fn hit_increments_by_one() {
        let db = Database::in_memory().unwrap();
        db.add_product(&details("Mouse").into_record("M-1", Utc::now()))
            .await
            .unwrap();

        let mut reconciler = InventoryReconciler::new(db.clone(), no_resolver());
        let outcome = reconciler.reconcile("M-1").await;
        assert_eq!(
            outcome,
            ReconcileOutcome::Updated {
                product_id: "M-1".into(),
                new_quantity: 2
            }
        );
    }

    #[tokio::test]
    async fn miss_creates_through_resolver() {
        let db = Database::in_memory().unwrap();
        let mut reconciler =
            InventoryReconciler::new(db.clone(), Box::new(|_: &str| Some(details("Keyboard"))));

        let outcome = reconciler.reconcile("K-9").await;
        assert!(matches!(outcome, ReconcileOutcome::Created(ref r) if r.product_id == "K-9"));
        assert_eq!(db.search_product("K-9").await.unwrap().unwrap().name, "Keyboard");
    }

    #[tokio::test]
    async fn abandoned_or_invalid_creation_fails_without_mutation() {
        let db = Database::in_memory().unwrap();

        let mut abandoning = InventoryReconciler::new(db.clone(), no_resolver());
        assert!(matches!(
            abandoning.reconcile("X").await,
            ReconcileOutcome::Failed { .. }
        ));

        let mut invalid =
            InventoryReconciler::new(db.clone(), Box::new(|_: &str| Some(details(""))));
        assert!(matches!(
            invalid.reconcile("X").await,
            ReconcileOutcome::Failed { .. }
        ));
        assert!(db.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_creation_falls_back_to_increment() {
        let db = Database::in_memory().unwrap();
        let racer = db.clone();

        // The resolver runs between lookup and insert; a competing writer
        // inserts the same id in that window.
        let resolver = move |product_id: &str| {
            let record = details("Racer").into_record(product_id, Utc::now());
            let racer = racer.clone();
            std::thread::spawn(move || {
                tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap()
                    .block_on(racer.add_product(&record))
            })
            .join()
            .unwrap()
            .unwrap();
            Some(details("Loser"))
        };

        let mut reconciler = InventoryReconciler::new(db.clone(), Box::new(resolver));
        let outcome = reconciler.reconcile("R-1").await;
        assert_eq!(
            outcome,
            ReconcileOutcome::Updated {
                product_id: "R-1".into(),
                new_quantity: 2
            }
        );
        assert_eq!(db.search_product("R-1").await.unwrap().unwrap().name, "Racer");
    }

    #[tokio::test]
    async fn waiting_resolver_does_not_stall_the_runtime() {
        let db = Database::in_memory().unwrap();
        let (asked_tx, asked_rx) = tokio::sync::oneshot::channel::<()>();
        let (answer_tx, answer_rx) = std::sync::mpsc::channel::<()>();

        // The answer comes from a task on the same single-threaded runtime,
        // so it only arrives if the resolver is not holding that thread.
        tokio::spawn(async move {
            if asked_rx.await.is_ok() {
                answer_tx.send(()).unwrap();
            }
        });

        let mut asked_tx = Some(asked_tx);
        let resolver = move |_: &str| {
            asked_tx.take()?.send(()).ok()?;
            answer_rx
                .recv_timeout(std::time::Duration::from_secs(5))
                .ok()?;
            Some(details("Cable"))
        };

        let mut reconciler = InventoryReconciler::new(db, Box::new(resolver));
        let outcome = reconciler.reconcile("C-1").await;
        assert!(matches!(outcome, ReconcileOutcome::Created(ref r) if r.name == "Cable"));
    }
}
