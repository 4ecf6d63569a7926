//! Engine-builtin A/B routing.

use std::sync::Arc;

use rand::Rng;

use crate::graph::PredictiveUnit;

/// Pick a child index by weighted random draw.
///
/// Negative weights count as zero; missing weights mean uniform. When every
/// weight is zero the draw falls back to uniform.
pub(crate) fn choose_weighted(children: &[Arc<PredictiveUnit>]) -> usize {
    debug_assert!(!children.is_empty());
    let weights: Vec<f64> = children
        .iter()
        .map(|c| c.weight.unwrap_or(1.0).max(0.0))
        .collect();
    let total: f64 = weights.iter().sum();

    let mut rng = rand::thread_rng();
    if total <= 0.0 {
        return rng.gen_range(0..children.len());
    }

    let mut remaining = rng.gen::<f64>() * total;
    for (index, weight) in weights.iter().enumerate() {
        remaining -= weight;
        if remaining < 0.0 {
            return index;
        }
    }
    children.len() - 1
}
