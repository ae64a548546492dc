use crate::model::Id;

/// Failures surfaced by the reconciliation engine
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Referenced product, family variant or axis attribute does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Operation requires a model product
    #[error("Product {id} is not a model type (found {product_type})")]
    InvalidProductType { id: Id, product_type: String },

    /// A single item of a batch could not be processed
    #[error("{item}: {reason}")]
    PerItemFailure { item: String, reason: String },

    /// Storage failure; any open transaction has been rolled back
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ReconcileError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ReconcileError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn per_item(item: impl Into<String>, reason: impl Into<String>) -> Self {
        ReconcileError::PerItemFailure {
            item: item.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::NotFound { .. })
    }
}

pub type EngineResult<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ReconcileError::not_found("Product", 42).to_string(),
            "Product 42 not found"
        );
        let err = ReconcileError::InvalidProductType {
            id: "p-1".to_string(),
            product_type: "simple".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Product p-1 is not a model type (found simple)"
        );
        assert_eq!(
            ReconcileError::per_item("prepared variant #2", "no axis values").to_string(),
            "prepared variant #2: no axis values"
        );
    }

    #[test]
    fn test_storage_error_is_transparent() {
        let err: ReconcileError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.to_string(), "connection reset");
        assert!(!err.is_not_found());
    }
}
