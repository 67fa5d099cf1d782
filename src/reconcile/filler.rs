//! Stand-in references for relations the catalog does not specify.
//!
//! When a device type needs a manufacturer, or a device needs a site, type
//! and role, and nothing names one explicitly, the record with the smallest
//! identifier among those currently known is used. This is a placeholder
//! heuristic: it is deterministic within a run and nothing more.

use super::Index;

/// Smallest identifier in the index, `None` when the index is empty
pub fn lowest_id(index: &Index) -> Option<i32> {
    index.values().copied().min()
}
