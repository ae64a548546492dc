use crate::error::ReconcileError;
use crate::logic::engine::VariantEngine;
use crate::model::{FamilyVariantId, GenerationResult, Id, PreparedVariant, UserContext};
use crate::store::Store;
use std::collections::VecDeque;
use std::fmt;

/// A unit of reconciliation work
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileCommand {
    Product(Id),
    FamilyVariant(FamilyVariantId),
    Prepared {
        product_id: Id,
        variants: Vec<PreparedVariant>,
        delete_ids: Vec<Id>,
    },
    All,
}

impl fmt::Display for ReconcileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileCommand::Product(id) => write!(f, "product {}", id),
            ReconcileCommand::FamilyVariant(id) => write!(f, "family variant {}", id),
            ReconcileCommand::Prepared { product_id, variants, .. } => {
                write!(f, "product {} ({} prepared variants)", product_id, variants.len())
            }
            ReconcileCommand::All => write!(f, "all family variants"),
        }
    }
}

#[derive(Debug)]
pub struct CommandOutcome {
    pub command: ReconcileCommand,
    pub result: Result<GenerationResult, ReconcileError>,
}

/// Outcome of draining the queue
#[derive(Debug, Default)]
pub struct QueueReport {
    pub outcomes: Vec<CommandOutcome>,
    /// Sum of successful results; failed commands appear as errors
    pub total: GenerationResult,
}

/// FIFO of pending reconciliations with a single consumer.
///
/// Runs for the same product never overlap because `drain` takes the queue
/// mutably and processes one command at a time. Repeated full-regeneration
/// requests for the same target coalesce while pending.
#[derive(Debug, Default)]
pub struct ReconcileQueue {
    pending: VecDeque<ReconcileCommand>,
}

impl ReconcileQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command; returns false when an identical pending command absorbed it
    pub fn enqueue(&mut self, command: ReconcileCommand) -> bool {
        let coalesces = !matches!(command, ReconcileCommand::Prepared { .. })
            && self.pending.contains(&command);
        if coalesces {
            log::debug!("Reconciliation of {} already pending", command);
            return false;
        }
        self.pending.push_back(command);
        true
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Run every pending command in order
    pub async fn drain<S: Store>(&mut self, engine: &VariantEngine<S>, ctx: &UserContext) -> QueueReport {
        let mut report = QueueReport::default();
        while let Some(command) = self.pending.pop_front() {
            let result = match &command {
                ReconcileCommand::Product(id) => engine.reconcile_product(ctx, id).await,
                ReconcileCommand::FamilyVariant(id) => engine.reconcile_family_variant(ctx, *id).await,
                ReconcileCommand::Prepared {
                    product_id,
                    variants,
                    delete_ids,
                } => {
                    engine
                        .reconcile_from_prepared(ctx, product_id, variants, delete_ids)
                        .await
                }
                ReconcileCommand::All => engine.reconcile_all(ctx).await,
            };
            match &result {
                Ok(generation) => report.total.absorb(generation.clone()),
                Err(e) => {
                    log::error!("Reconciliation of {} failed: {}", command, e);
                    report.total.push_error(format!("{}: {}", command, e));
                }
            }
            report.outcomes.push(CommandOutcome { command, result });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcileConfig;
    use crate::model::{AttributeKind, Product};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_identical_commands_coalesce() {
        let mut queue = ReconcileQueue::new();
        assert!(queue.enqueue(ReconcileCommand::Product("tee".to_string())));
        assert!(!queue.enqueue(ReconcileCommand::Product("tee".to_string())));
        assert!(queue.enqueue(ReconcileCommand::FamilyVariant(7)));
        let prepared = ReconcileCommand::Prepared {
            product_id: "tee".to_string(),
            variants: Vec::new(),
            delete_ids: Vec::new(),
        };
        assert!(queue.enqueue(prepared.clone()));
        assert!(queue.enqueue(prepared));
        assert_eq!(queue.len(), 4);
    }

    #[tokio::test]
    async fn test_drain_runs_in_order_and_collects_failures() {
        let store = MemoryStore::new();
        store.add_attribute(1, "color", AttributeKind::Select);
        store.add_option(10, 1, "red", "Red");
        store.add_family_variant(7, "tee", &[(100, 1, 1)]);
        let mut tee = Product::model("tee", 1, 7);
        tee.variant_configuration = Some(json!({"100": [10]}));
        store.add_product(tee);
        let engine = VariantEngine::new(Arc::new(store), ReconcileConfig::default());

        let mut queue = ReconcileQueue::new();
        queue.enqueue(ReconcileCommand::Product("missing".to_string()));
        queue.enqueue(ReconcileCommand::Product("tee".to_string()));
        let report = queue.drain(&engine, &UserContext::system()).await;

        assert!(queue.is_empty());
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0].result.is_err());
        assert_eq!(report.total.created, 1);
        assert_eq!(report.total.errors, vec!["product missing: Product missing not found".to_string()]);
    }
}
