//! Staged topology edits.
//!
//! A [`Ledger`] is an ordered, append-only log of primitive edit records. It
//! never touches the mesh: records reference existing entities by id and
//! entities added earlier in the same ledger by *handle* (`Added(k)` is the
//! `k`-th point/face/cell added). Each record is checked for structural
//! well-formedness on append; consistency against the mesh is established by
//! [`crate::algs::compile`] when the ledger is committed.
//!
//! Ledgers compose: a ledger built for one cell (handles starting at zero) can
//! be merged into a larger one with [`Ledger::absorb`], which shifts its
//! handles past the ones already allocated.

use crate::mesh_error::LedgerError;
use crate::topology::ids::{CellId, FaceId, PatchId, PointId};
use crate::topology::mesh::{FaceSide, Point3};
use hashbrown::HashSet as FastSet;
use std::fmt;

/// A point that exists in the mesh or is added by the ledger.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PointRef {
    Existing(PointId),
    Added(u32),
}

/// A face that exists in the mesh or is added by the ledger.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaceRef {
    Existing(FaceId),
    Added(u32),
}

/// A cell that exists in the mesh or is added by the ledger.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellRef {
    Existing(CellId),
    Added(u32),
}

/// One primitive topology change.
#[derive(Clone, Debug, PartialEq)]
pub enum EditOp {
    /// Insert a point at `position`. `master` is the point an inflating commit
    /// places it on before motion.
    AddPoint {
        position: Point3,
        master: Option<PointId>,
    },
    /// Point one side of an existing face at another cell.
    ModifyFace {
        face: FaceId,
        side: FaceSide,
        cell: CellRef,
    },
    /// Insert a face. Internal faces have a neighbour and no patch.
    AddFace {
        vertices: Vec<PointRef>,
        owner: CellRef,
        neighbour: Option<CellRef>,
        patch: Option<PatchId>,
    },
    RemoveFace {
        face: FaceId,
    },
    /// Insert a cell bounded by `faces`.
    AddCell {
        faces: Vec<FaceRef>,
    },
    RemoveCell {
        cell: CellId,
    },
}

/// An edit and the selected cell whose decomposition produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct EditRecord {
    pub driver: CellId,
    pub op: EditOp,
}

/// Position of a record in its ledger, for error reporting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordRef {
    pub index: usize,
    pub driver: CellId,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record #{} (cell {})", self.index, self.driver)
    }
}

/// Handle shifts applied when one ledger is absorbed into another.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HandleOffsets {
    pub points: u32,
    pub faces: u32,
    pub cells: u32,
}

impl HandleOffsets {
    pub fn point(&self, r: PointRef) -> PointRef {
        match r {
            PointRef::Added(k) => PointRef::Added(k + self.points),
            other => other,
        }
    }

    pub fn face(&self, r: FaceRef) -> FaceRef {
        match r {
            FaceRef::Added(k) => FaceRef::Added(k + self.faces),
            other => other,
        }
    }

    pub fn cell(&self, r: CellRef) -> CellRef {
        match r {
            CellRef::Added(k) => CellRef::Added(k + self.cells),
            other => other,
        }
    }
}

impl EditOp {
    fn rebase(self, off: &HandleOffsets) -> Self {
        match self {
            EditOp::ModifyFace { face, side, cell } => EditOp::ModifyFace {
                face,
                side,
                cell: off.cell(cell),
            },
            EditOp::AddFace {
                vertices,
                owner,
                neighbour,
                patch,
            } => EditOp::AddFace {
                vertices: vertices.into_iter().map(|v| off.point(v)).collect(),
                owner: off.cell(owner),
                neighbour: neighbour.map(|n| off.cell(n)),
                patch,
            },
            EditOp::AddCell { faces } => EditOp::AddCell {
                faces: faces.into_iter().map(|f| off.face(f)).collect(),
            },
            op @ (EditOp::AddPoint { .. }
            | EditOp::RemoveFace { .. }
            | EditOp::RemoveCell { .. }) => op,
        }
    }

    fn check(&self) -> Result<(), LedgerError> {
        match self {
            EditOp::AddFace {
                vertices,
                owner,
                neighbour,
                patch,
            } => {
                if vertices.len() < 3 {
                    return Err(LedgerError::FaceTooSmall {
                        n_vertices: vertices.len(),
                    });
                }
                let mut seen = FastSet::with_capacity(vertices.len());
                if !vertices.iter().all(|v| seen.insert(*v)) {
                    return Err(LedgerError::RepeatedVertex);
                }
                match (neighbour, patch) {
                    (Some(n), _) if n == owner => Err(LedgerError::SelfNeighbour),
                    (Some(_), Some(_)) => Err(LedgerError::InternalFaceWithPatch),
                    (None, None) => Err(LedgerError::BoundaryFaceWithoutPatch),
                    _ => Ok(()),
                }
            }
            EditOp::AddCell { faces } if faces.is_empty() => Err(LedgerError::EmptyCell),
            _ => Ok(()),
        }
    }
}

/// Append-only log of staged edits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ledger {
    records: Vec<EditRecord>,
    added: HandleOffsets,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record after checking it in isolation.
    pub fn append(&mut self, driver: CellId, op: EditOp) -> Result<RecordRef, LedgerError> {
        op.check()?;
        match op {
            EditOp::AddPoint { .. } => self.added.points += 1,
            EditOp::AddFace { .. } => self.added.faces += 1,
            EditOp::AddCell { .. } => self.added.cells += 1,
            _ => {}
        }
        let index = self.records.len();
        self.records.push(EditRecord { driver, op });
        Ok(RecordRef { index, driver })
    }

    pub fn add_point(
        &mut self,
        driver: CellId,
        position: Point3,
        master: Option<PointId>,
    ) -> PointRef {
        let handle = PointRef::Added(self.added.points);
        self.added.points += 1;
        self.records.push(EditRecord {
            driver,
            op: EditOp::AddPoint { position, master },
        });
        handle
    }

    pub fn add_face(
        &mut self,
        driver: CellId,
        vertices: Vec<PointRef>,
        owner: CellRef,
        neighbour: Option<CellRef>,
        patch: Option<PatchId>,
    ) -> Result<FaceRef, LedgerError> {
        let handle = FaceRef::Added(self.added.faces);
        self.append(
            driver,
            EditOp::AddFace {
                vertices,
                owner,
                neighbour,
                patch,
            },
        )?;
        Ok(handle)
    }

    pub fn modify_face(
        &mut self,
        driver: CellId,
        face: FaceId,
        side: FaceSide,
        cell: CellRef,
    ) -> RecordRef {
        self.push_unchecked(driver, EditOp::ModifyFace { face, side, cell })
    }

    pub fn remove_face(&mut self, driver: CellId, face: FaceId) -> RecordRef {
        self.push_unchecked(driver, EditOp::RemoveFace { face })
    }

    pub fn add_cell(
        &mut self,
        driver: CellId,
        faces: Vec<FaceRef>,
    ) -> Result<CellRef, LedgerError> {
        let handle = CellRef::Added(self.added.cells);
        self.append(driver, EditOp::AddCell { faces })?;
        Ok(handle)
    }

    pub fn remove_cell(&mut self, driver: CellId, cell: CellId) -> RecordRef {
        self.push_unchecked(driver, EditOp::RemoveCell { cell })
    }

    // Only for ops whose `check` is trivially Ok.
    fn push_unchecked(&mut self, driver: CellId, op: EditOp) -> RecordRef {
        let index = self.records.len();
        self.records.push(EditRecord { driver, op });
        RecordRef { index, driver }
    }

    /// Append every record of `other`, shifting its handles past the ones
    /// already allocated here. Returns the shift that was applied.
    pub fn absorb(&mut self, other: Ledger) -> HandleOffsets {
        let off = self.added;
        self.records.extend(other.records.into_iter().map(|rec| EditRecord {
            driver: rec.driver,
            op: rec.op.rebase(&off),
        }));
        self.added.points += other.added.points;
        self.added.faces += other.added.faces;
        self.added.cells += other.added.cells;
        off
    }

    pub fn records(&self) -> &[EditRecord] {
        &self.records
    }

    pub fn record_ref(&self, index: usize) -> RecordRef {
        RecordRef {
            index,
            driver: self.records[index].driver,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of points, faces and cells this ledger adds.
    pub fn added(&self) -> HandleOffsets {
        self.added
    }

    /// Distinct driving cells, ascending.
    pub fn drivers(&self) -> Vec<CellId> {
        let mut out: Vec<CellId> = self.records.iter().map(|r| r.driver).collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}
