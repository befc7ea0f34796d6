//! End-to-end suggestion: coercion, partitioning and selection

use crate::data::{coerce_records, Item, ItemRecord, SuggestionResponse};
use crate::error::{CriticalError, CriticalResult};
use crate::model::{fit_partition, KMeansConfig, Partition, CLUSTER_COUNT};
use crate::selector::{select_critical, CriticalSelection, SelectorConfig};
use tracing::debug;

/// Everything computed for one request
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalReport {
    pub items: Vec<Item>,
    pub partition: Partition,
    pub selection: CriticalSelection,
}

impl CriticalReport {
    /// The `{"sugerencias": [...]}` response body
    pub fn response(&self) -> SuggestionResponse {
        SuggestionResponse {
            suggestions: self.selection.suggestions.clone(),
        }
    }
}

/// Suggest the critical products from raw records.
///
/// The record count is checked before coercion so that a short payload is
/// reported as `InsufficientData` even if it also holds bad values.
pub fn suggest(
    records: &[ItemRecord],
    kmeans: &KMeansConfig,
    selector: &SelectorConfig,
) -> CriticalResult<CriticalReport> {
    if records.len() < CLUSTER_COUNT {
        return Err(CriticalError::InsufficientData {
            found: records.len(),
            required: CLUSTER_COUNT,
        });
    }

    let items = coerce_records(records)?;
    suggest_items(items, kmeans, selector)
}

/// Suggest the critical products from validated items
pub fn suggest_items(
    items: Vec<Item>,
    kmeans: &KMeansConfig,
    selector: &SelectorConfig,
) -> CriticalResult<CriticalReport> {
    let partition = fit_partition(&items, kmeans)?;
    debug!(
        items = items.len(),
        iterations = partition.iterations,
        converged = partition.converged,
        inertia = partition.inertia,
        "partitioned products"
    );

    let selection = select_critical(&partition, &items, selector)?;

    Ok(CriticalReport {
        items,
        partition,
        selection,
    })
}
