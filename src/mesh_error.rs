//! Error types for mesh-pyramid public APIs.
//!
//! Each stage of the pipeline has its own error family so callers can tell a
//! rejected selection from a degenerate cell or a failed commit.
//! [`PyramidError`] unifies them for the driver.

use crate::algs::ledger::RecordRef;
use crate::topology::ids::{CellId, FaceId, PatchId, PointId};
use crate::topology::mesh::FaceSide;
use thiserror::Error;

/// Structural violations of the polyhedral mesh invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("face {face} has {n_vertices} vertices (at least 3 required)")]
    DegenerateFace { face: FaceId, n_vertices: usize },
    #[error("face {face} visits point {point} more than once")]
    RepeatedVertex { face: FaceId, point: PointId },
    #[error("face {face} references point {point}, mesh has {n_points} points")]
    PointOutOfRange {
        face: FaceId,
        point: PointId,
        n_points: usize,
    },
    #[error("face {face} references cell {cell}, mesh has {n_cells} cells")]
    CellOutOfRange {
        face: FaceId,
        cell: CellId,
        n_cells: usize,
    },
    #[error("face {face} references patch {patch}, mesh has {n_patches} patches")]
    PatchOutOfRange {
        face: FaceId,
        patch: PatchId,
        n_patches: usize,
    },
    #[error("face {face} has cell {cell} as both owner and neighbour")]
    SelfNeighbour { face: FaceId, cell: CellId },
    #[error("boundary face {face} has no patch")]
    BoundaryFaceWithoutPatch { face: FaceId },
    #[error("internal face {face} is listed in patch {patch}")]
    InternalFaceWithPatch { face: FaceId, patch: PatchId },
    #[error("face {face} references removed cell {cell}")]
    DanglingCell { face: FaceId, cell: CellId },
    #[error("cell {cell} has {n_faces} faces (at least 4 required)")]
    TooFewFaces { cell: CellId, n_faces: usize },
    #[error("cell {cell} is not closed: edge {a}-{b} is used by {uses} faces")]
    OpenCell {
        cell: CellId,
        a: PointId,
        b: PointId,
        uses: usize,
    },
    #[error("cell {cell} is inconsistently oriented along edge {a}-{b}")]
    InconsistentOrientation { cell: CellId, a: PointId, b: PointId },
    #[error("face {face} breaks the canonical face order: {reason}")]
    FaceOrder { face: FaceId, reason: String },
    #[error("expected {expected} point positions, got {found}")]
    PointCountMismatch { expected: usize, found: usize },
    #[error("field has {found} values, {expected} expected")]
    FieldSizeMismatch { expected: usize, found: usize },
    #[error("partition metadata mismatch: {0}")]
    Partition(String),
}

/// Why a selected cell identifier was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("selection entry #{position}: cell not found")]
    NotFound { position: usize },
    #[error("selection entry #{position}: cell {raw} out of range (mesh has {n_cells} cells)")]
    OutOfRange {
        position: usize,
        raw: i64,
        n_cells: usize,
    },
    #[error("selection entry #{position}: cell {cell} is already marked for splitting")]
    Duplicate { position: usize, cell: CellId },
    #[error("no cell selection was provided")]
    MissingSelection,
}

/// A selected cell cannot be decomposed into pyramids.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecompositionError {
    #[error("cell {cell} out of range (mesh has {n_cells} cells)")]
    CellOutOfRange { cell: CellId, n_cells: usize },
    #[error("cell {cell} has {n_faces} faces (at least 4 required)")]
    TooFewFaces { cell: CellId, n_faces: usize },
    #[error("cell {cell}: face {face} has {n_vertices} vertices (at least 3 required)")]
    DegenerateFace {
        cell: CellId,
        face: FaceId,
        n_vertices: usize,
    },
    #[error("cell {cell}: face {face} names the cell on both sides")]
    SelfNeighbour { cell: CellId, face: FaceId },
    #[error("cell {cell} is not closed: edge {a}-{b} is used by {uses} faces")]
    OpenCell {
        cell: CellId,
        a: PointId,
        b: PointId,
        uses: usize,
    },
    #[error("cell {cell} is inconsistently oriented along edge {a}-{b}")]
    InconsistentOrientation { cell: CellId, a: PointId, b: PointId },
    #[error("cell {cell} is already planned for splitting")]
    AlreadyPlanned { cell: CellId },
    #[error("cell {cell}: {source}")]
    Staging { cell: CellId, source: LedgerError },
}

/// An edit record is malformed on its own, independent of the mesh.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("added face has {n_vertices} vertices (at least 3 required)")]
    FaceTooSmall { n_vertices: usize },
    #[error("added face visits a vertex more than once")]
    RepeatedVertex,
    #[error("added face has the same cell as owner and neighbour")]
    SelfNeighbour,
    #[error("internal face cannot carry a patch")]
    InternalFaceWithPatch,
    #[error("boundary face requires a patch")]
    BoundaryFaceWithoutPatch,
    #[error("added cell lists no faces")]
    EmptyCell,
}

/// The ledger cannot be committed against the mesh. The mesh is unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitError {
    #[error("{record}: face {face} does not exist")]
    UnknownFace { record: RecordRef, face: FaceId },
    #[error("{record}: cell {cell} does not exist")]
    UnknownCell { record: RecordRef, cell: CellId },
    #[error("{record}: point {point} does not exist")]
    UnknownPoint { record: RecordRef, point: PointId },
    #[error("{record}: reference to unallocated added {kind} #{handle}")]
    UnknownHandle {
        record: RecordRef,
        kind: &'static str,
        handle: u32,
    },
    #[error("{record}: face {face} was already removed by {first}")]
    FaceAlreadyRemoved {
        record: RecordRef,
        face: FaceId,
        first: RecordRef,
    },
    #[error("{record}: cell {cell} was already removed by {first}")]
    CellAlreadyRemoved {
        record: RecordRef,
        cell: CellId,
        first: RecordRef,
    },
    #[error("{record}: boundary face {face} has no neighbour side")]
    NoNeighbourSide { record: RecordRef, face: FaceId },
    #[error("face {face}: {side:?} side written by {first} and again by {second}")]
    ConflictingFaceEdit {
        face: FaceId,
        side: FaceSide,
        first: RecordRef,
        second: RecordRef,
    },
    #[error("{record}: added cell lists a face that does not bound it")]
    UndeclaredFace { record: RecordRef },
    #[error("invariant violated ({violation}); offending records: {}", fmt_records(.records))]
    Invariant {
        violation: MeshError,
        records: Vec<RecordRef>,
    },
}

impl CommitError {
    /// Records that caused the failure.
    pub fn records(&self) -> Vec<RecordRef> {
        match self {
            CommitError::UnknownFace { record, .. }
            | CommitError::UnknownCell { record, .. }
            | CommitError::UnknownPoint { record, .. }
            | CommitError::UnknownHandle { record, .. }
            | CommitError::NoNeighbourSide { record, .. }
            | CommitError::UndeclaredFace { record } => vec![*record],
            CommitError::FaceAlreadyRemoved { record, first, .. }
            | CommitError::CellAlreadyRemoved { record, first, .. } => vec![*first, *record],
            CommitError::ConflictingFaceEdit { first, second, .. } => vec![*first, *second],
            CommitError::Invariant { records, .. } => records.clone(),
        }
    }
}

fn fmt_records(records: &[RecordRef]) -> String {
    if records.is_empty() {
        return "none".to_string();
    }
    records
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Partition boundary exchange failed. Every participating rank aborts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    #[error("communication with rank {neighbor} failed: {message}")]
    Comm { neighbor: usize, message: String },
    #[error("malformed message from rank {neighbor}: {message}")]
    Wire { neighbor: usize, message: String },
    #[error("rank {neighbor} did not answer after {attempts} attempts")]
    Timeout { neighbor: usize, attempts: u32 },
    #[error("rank {neighbor} aborted the transaction")]
    PeerAborted { neighbor: usize },
    #[error("rank {neighbor} rejected the boundary edit")]
    PeerRejected { neighbor: usize },
    #[error("patch {patch}: rank {neighbor} sent {found} faces, {expected} expected")]
    FaceCountMismatch {
        patch: PatchId,
        neighbor: usize,
        expected: usize,
        found: usize,
    },
    #[error("patch {patch} face {patch_face}: rank {neighbor} describes a different face")]
    FaceMismatch {
        patch: PatchId,
        patch_face: usize,
        neighbor: usize,
    },
    #[error("patch {patch} face {patch_face}: inconsistent intent from rank {neighbor}: {reason}")]
    InconsistentIntent {
        patch: PatchId,
        patch_face: usize,
        neighbor: usize,
        reason: &'static str,
    },
    #[error("no processor patch shares a boundary with rank {neighbor}")]
    UnknownNeighbor { neighbor: usize },
    #[error("local transaction aborted before the exchange")]
    LocalAbort,
}

/// Unified error returned by the driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PyramidError {
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Decomposition(#[from] DecompositionError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Commit(#[from] CommitError),
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
    #[error("write-back failed: {0}")]
    Store(String),
}

impl PyramidError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            PyramidError::Commit(_) => 2,
            PyramidError::Coordination(_) => 3,
            PyramidError::Decomposition(_) | PyramidError::Ledger(_) => 4,
            PyramidError::Mesh(_) | PyramidError::Selection(_) | PyramidError::Store(_) => 1,
        }
    }
}
