use crate::logic::axes::ResolvedAxis;
use crate::logic::selection::Selections;
use crate::model::{AttributeId, AttributeOption};

/// One assignment of a selected option to every axis, in axis order
#[derive(Debug, Clone, PartialEq)]
pub struct Combination {
    pub options: Vec<AttributeOption>,
}

impl Combination {
    pub fn option_for(&self, attribute_id: AttributeId) -> Option<&AttributeOption> {
        self.options.iter().find(|o| o.attribute_id == attribute_id)
    }

    /// Human readable form such as "Red / M"
    pub fn label(&self) -> String {
        self.options
            .iter()
            .map(|o| o.label.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

pub struct CombinationGenerator;

impl CombinationGenerator {
    /// Cartesian product of the selected options.
    ///
    /// The first axis varies slowest and the last axis fastest. No axes, or
    /// an axis with nothing selected, yields no combinations.
    pub fn generate(axes: &[ResolvedAxis], selections: &Selections) -> Vec<Combination> {
        let lists: Vec<&[AttributeOption]> = axes
            .iter()
            .map(|axis| selections.for_axis(axis.attribute_id()))
            .collect();
        cartesian(&lists)
    }

    /// Number of combinations `generate` would produce, without materializing them
    pub fn count(axes: &[ResolvedAxis], selections: &Selections) -> u64 {
        if axes.is_empty() {
            return 0;
        }
        axes.iter()
            .map(|axis| selections.selected_count(axis.attribute_id()) as u64)
            .fold(1u64, u64::saturating_mul)
    }
}

/// Mixed-radix walk over the option lists; memory is bounded by the output
fn cartesian(lists: &[&[AttributeOption]]) -> Vec<Combination> {
    if lists.is_empty() || lists.iter().any(|list| list.is_empty()) {
        return Vec::new();
    }

    let Some(total) = lists
        .iter()
        .try_fold(1usize, |total, list| total.checked_mul(list.len()))
    else {
        log::warn!(
            "{} option lists multiply past the addressable range, no combinations generated",
            lists.len()
        );
        return Vec::new();
    };
    let mut combinations = Vec::with_capacity(total);
    let mut indices = vec![0usize; lists.len()];

    loop {
        combinations.push(Combination {
            options: indices
                .iter()
                .zip(lists)
                .map(|(&i, list)| list[i].clone())
                .collect(),
        });

        let mut position = lists.len();
        loop {
            if position == 0 {
                return combinations;
            }
            position -= 1;
            indices[position] += 1;
            if indices[position] < lists[position].len() {
                break;
            }
            indices[position] = 0;
        }
    }
}
