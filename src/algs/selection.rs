//! Resolve externally selected cells into an assignment map.
//!
//! The selection arrives as a list of cell identifiers produced by an
//! external lookup, where a miss is reported as `-1`. [`CellLookup`] makes
//! that explicit. [`resolve`] validates the list against the mesh and pairs
//! each accepted cell with its insertion point (the cell centroid).
//!
//! Any rejected entry turns the whole batch into a no-op: the returned map is
//! empty and every failure is listed.

use crate::mesh_error::SelectionError;
use crate::topology::ids::CellId;
use crate::topology::mesh::Point3;
use std::collections::{BTreeMap, BTreeSet};

/// Selected cell -> apex position.
pub type AssignmentMap = BTreeMap<CellId, Point3>;

/// Result of an external cell lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CellLookup {
    Found(i64),
    NotFound,
}

impl CellLookup {
    /// Interpret a raw identifier, `-1` meaning "not found".
    pub fn from_raw(raw: i64) -> Self {
        if raw == -1 {
            CellLookup::NotFound
        } else {
            CellLookup::Found(raw)
        }
    }

    pub fn from_raw_ids(raw: &[i64]) -> Vec<Self> {
        raw.iter().copied().map(Self::from_raw).collect()
    }
}

impl From<i64> for CellLookup {
    fn from(raw: i64) -> Self {
        Self::from_raw(raw)
    }
}

/// Outcome of a resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SelectionStatus {
    /// Every entry was accepted and at least one cell is selected.
    Ready,
    /// No selection was supplied.
    Missing,
    /// The selection was supplied but names no cell.
    Empty,
    /// Some entry was rejected; nothing will be edited.
    Rejected,
}

/// Validated selection together with any rejected entries.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub map: AssignmentMap,
    pub failures: Vec<SelectionError>,
    pub status: SelectionStatus,
}

impl Resolution {
    pub fn is_ready(&self) -> bool {
        self.status == SelectionStatus::Ready
    }
}

/// Validate `selection` against a mesh with `centres.len()` cells.
///
/// Pure: resolving the same input twice gives the same result.
pub fn resolve(selection: Option<&[CellLookup]>, centres: &[Point3]) -> Resolution {
    let Some(selection) = selection else {
        log::warn!("no cell selection given, nothing to do");
        return Resolution {
            map: AssignmentMap::new(),
            failures: vec![SelectionError::MissingSelection],
            status: SelectionStatus::Missing,
        };
    };

    let n_cells = centres.len();
    let mut map = AssignmentMap::new();
    let mut seen = BTreeSet::new();
    let mut failures = Vec::new();
    for (position, lookup) in selection.iter().enumerate() {
        let raw = match *lookup {
            CellLookup::NotFound => {
                failures.push(SelectionError::NotFound { position });
                continue;
            }
            CellLookup::Found(raw) => raw,
        };
        let cell = match usize::try_from(raw) {
            Ok(idx) if idx < n_cells => CellId::from_index(idx),
            _ => {
                failures.push(SelectionError::OutOfRange {
                    position,
                    raw,
                    n_cells,
                });
                continue;
            }
        };
        if !seen.insert(cell) {
            failures.push(SelectionError::Duplicate { position, cell });
            continue;
        }
        map.insert(cell, centres[cell.index()]);
    }

    if !failures.is_empty() {
        for failure in &failures {
            log::warn!("{failure}");
        }
        log::warn!(
            "{} of {} selected cells rejected, mesh left unchanged",
            failures.len(),
            selection.len()
        );
        return Resolution {
            map: AssignmentMap::new(),
            failures,
            status: SelectionStatus::Rejected,
        };
    }

    let status = if map.is_empty() {
        log::warn!("selection is empty, nothing to do");
        SelectionStatus::Empty
    } else {
        log::info!("found {} cells to split", map.len());
        SelectionStatus::Ready
    };
    Resolution {
        map,
        failures,
        status,
    }
}
