pub mod axes;
pub mod catalog_cache;
pub mod codec;
pub mod combination_key;
pub mod combinations;
pub mod engine;
pub mod materialize;
pub mod queue;
pub mod reconcile;
pub mod selection;

pub use axes::{AxisResolver, ResolvedAxis};
pub use catalog_cache::CatalogCache;
pub use combination_key::{CombinationKey, CombinationKeyEncoder, OptionIndex};
pub use combinations::{Combination, CombinationGenerator};
pub use engine::VariantEngine;
pub use materialize::{Materializer, OverrideAttributes};
pub use queue::{CommandOutcome, QueueReport, ReconcileCommand, ReconcileQueue};
pub use reconcile::{plan_differential, plan_full, PlannedUpdate, ReconcilePlan, VariantDraft};
pub use selection::{SelectionResolver, SelectionSource, Selections};
