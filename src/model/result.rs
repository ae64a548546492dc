use crate::model::{FamilyVariantId, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts of one reconciliation plus non-fatal errors
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationResult {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: Vec<String>,
}

impl GenerationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add another result's counts and errors into this one
    pub fn absorb(&mut self, other: GenerationResult) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.errors.extend(other.errors);
    }

    pub fn push_error(&mut self, error: impl ToString) {
        self.errors.push(error.to_string());
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Per-axis line of a combination preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisBreakdown {
    pub code: String,
    pub label: String,
    pub selected_count: usize,
    pub total_available: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinationBreakdown {
    pub axes: Vec<AxisBreakdown>,
    pub total_combinations: u64,
}

/// Audit record of a generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationLogEntry {
    pub family_variant_id: FamilyVariantId,
    pub model_product_id: Option<Id>,
    pub action: String,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: Vec<String>,
    pub user: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl GenerationLogEntry {
    pub fn generate(
        family_variant_id: FamilyVariantId,
        model_product_id: Option<Id>,
        result: &GenerationResult,
        user: Option<String>,
    ) -> Self {
        Self {
            family_variant_id,
            model_product_id,
            action: "generate".to_string(),
            created: result.created,
            updated: result.updated,
            deleted: result.deleted,
            errors: result.errors.clone(),
            user,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_sums_counts_and_concatenates_errors() {
        let mut total = GenerationResult {
            created: 4,
            updated: 0,
            deleted: 2,
            errors: vec!["a".to_string()],
        };
        total.absorb(GenerationResult {
            created: 1,
            updated: 3,
            deleted: 0,
            errors: vec!["b".to_string()],
        });
        assert_eq!(total.created, 5);
        assert_eq!(total.updated, 3);
        assert_eq!(total.deleted, 2);
        assert_eq!(total.errors, vec!["a".to_string(), "b".to_string()]);
        assert!(!total.is_clean());
    }

    #[test]
    fn test_breakdown_serializes_camel_case() {
        let breakdown = CombinationBreakdown {
            axes: vec![AxisBreakdown {
                code: "color".to_string(),
                label: "Color".to_string(),
                selected_count: 2,
                total_available: 5,
            }],
            total_combinations: 2,
        };
        let json = serde_json::to_value(&breakdown).unwrap();
        assert_eq!(json["totalCombinations"], 2);
        assert_eq!(json["axes"][0]["selectedCount"], 2);
        assert_eq!(json["axes"][0]["totalAvailable"], 5);
    }
}
