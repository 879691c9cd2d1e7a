mod error;
mod reconciler;
mod resolver;

pub use error::InventoryError;
pub use reconciler::{InventoryReconciler, ReconcileOutcome};
pub use resolver::{ProductResolver, PromptResolver, SkipUnknown};
