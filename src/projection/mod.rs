//! Filtered and sorted view of the canonical transfer collection
//!
//! `project` is pure: the same transfers and criteria always give the same
//! output, so renderers can memoize it by (store version, criteria) through
//! [`ProjectionCache`].

pub mod criteria;

use {crate::model::Transfer, std::sync::Arc};

pub use criteria::{BlockFilter, FilterCriteria, SortDirection};

/// Filter then sort by block number
///
/// `sort_by` is stable, so transfers in the same block keep their insertion
/// order in both directions.
pub fn project(transfers: &[Transfer], criteria: &FilterCriteria) -> Vec<Transfer> {
    let mut view: Vec<Transfer> = transfers
        .iter()
        .filter(|transfer| criteria.matches(transfer))
        .cloned()
        .collect();

    match criteria.sort {
        SortDirection::Ascending => view.sort_by(|a, b| a.block_number.cmp(&b.block_number)),
        SortDirection::Descending => view.sort_by(|a, b| b.block_number.cmp(&a.block_number)),
    }

    view
}

/// Memoized projection keyed by store version and criteria
#[derive(Debug, Default)]
pub struct ProjectionCache {
    key: Option<(u64, FilterCriteria)>,
    view: Arc<Vec<Transfer>>,
    recomputed: u64,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        version: u64,
        transfers: &[Transfer],
        criteria: &FilterCriteria,
    ) -> Arc<Vec<Transfer>> {
        let fresh = matches!(&self.key, Some((v, c)) if *v == version && c == criteria);
        if !fresh {
            self.view = Arc::new(project(transfers, criteria));
            self.key = Some((version, criteria.clone()));
            self.recomputed += 1;
        }
        self.view.clone()
    }

    /// How many times the view was actually recomputed
    pub fn recomputed(&self) -> u64 {
        self.recomputed
    }
}
