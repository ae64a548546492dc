use crate::error::{EngineResult, ReconcileError};
use crate::logic::catalog_cache::CatalogCache;
use crate::model::{Attribute, AttributeId, AttributeKind, AxisId, FamilyVariantId, VariantAxis};
use crate::store::AttributeStore;

/// A variant axis joined with its attribute definition
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAxis {
    pub axis: VariantAxis,
    pub attribute: Attribute,
}

impl ResolvedAxis {
    pub fn axis_id(&self) -> AxisId {
        self.axis.id
    }

    pub fn attribute_id(&self) -> AttributeId {
        self.attribute.id
    }

    pub fn code(&self) -> &str {
        &self.attribute.code
    }

    pub fn kind(&self) -> AttributeKind {
        self.attribute.kind
    }
}

pub struct AxisResolver;

impl AxisResolver {
    /// Ordered axes of a family variant (ascending sort order, ties by axis id).
    ///
    /// An empty list is valid and means nothing is generated.
    pub async fn get_axes<S>(
        store: &S,
        cache: &mut CatalogCache,
        family_variant_id: FamilyVariantId,
    ) -> EngineResult<Vec<ResolvedAxis>>
    where
        S: AttributeStore + ?Sized,
    {
        let family_variant = store
            .get_family_variant(family_variant_id)
            .await?
            .ok_or_else(|| ReconcileError::not_found("Family variant", family_variant_id))?;

        let mut axes = family_variant.axes;
        axes.sort_by_key(|axis| (axis.sort_order, axis.id));

        let mut resolved = Vec::with_capacity(axes.len());
        for axis in axes {
            let attribute = cache
                .attribute(store, axis.attribute_id)
                .await?
                .ok_or_else(|| ReconcileError::not_found("Attribute", axis.attribute_id))?;
            resolved.push(ResolvedAxis { axis, attribute });
        }

        log::debug!(
            "Family variant {} has axes [{}]",
            family_variant_id,
            resolved.iter().map(|a| a.code()).collect::<Vec<_>>().join(", ")
        );
        Ok(resolved)
    }
}
