//! Commit a [`Ledger`] against a [`PolyMesh`].
//!
//! [`compile`] is a pure function of the mesh and the ledger: it either
//! returns the edited mesh together with its [`TopoMap`], or a
//! [`CommitError`] naming the offending records. [`commit`] swaps the result
//! into place only on success, so a failed commit leaves the mesh untouched.
//!
//! The commit runs in two passes. The first replays the records in order and
//! checks each against the mesh and against the records before it (unknown
//! entities, double removals, conflicting writes to one side of a face). The
//! second resolves handles to final indices, validates the edited topology and
//! sorts the faces into canonical order.
//!
//! # Numbering
//! - Surviving cells keep their relative order; added cells follow in the
//!   order they were staged.
//! - Points are never removed; added points are appended.
//! - Faces are re-sorted into canonical order. Internal faces whose new owner
//!   index exceeds the neighbour index are flipped and reported in
//!   [`TopoMap::flipped_faces`].
//!
//! Faces named in [`CommitError::Invariant`] use the staging numbering: the
//! pre-commit faces by their old index, followed by added faces in staging
//! order.

use crate::algs::ledger::{CellRef, EditOp, FaceRef, HandleOffsets, Ledger, PointRef, RecordRef};
use crate::algs::renumber::{MotionPoints, Origin, Renumbering, TopoMap};
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::{CommitError, MeshError};
use crate::topology::ids::{CellId, FaceId, PatchId, PointId};
use crate::topology::mesh::{Face, FaceSide, Point3, PolyMesh, canonicalize};
use crate::topology::validation::{check_closed, validate_face};
use serde::{Deserialize, Serialize};

/// Options controlling a commit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitOptions {
    /// Place added points on their master point; the motion step carries them
    /// to their target.
    pub inflate: bool,
    /// Require every added or edited cell to be closed and consistently
    /// oriented.
    pub check_closed_cells: bool,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            inflate: false,
            check_closed_cells: true,
        }
    }
}

/// Commit `ledger` into `mesh`. On error `mesh` is left as it was.
pub fn commit(
    mesh: &mut PolyMesh,
    ledger: &Ledger,
    options: &CommitOptions,
) -> Result<TopoMap, CommitError> {
    let (compiled, map) = compile(mesh, ledger, options)?;
    *mesh = compiled;
    Ok(map)
}

/// Build the mesh that results from applying `ledger` to `mesh`.
pub fn compile(
    mesh: &PolyMesh,
    ledger: &Ledger,
    options: &CommitOptions,
) -> Result<(PolyMesh, TopoMap), CommitError> {
    let mut staging = Staging::new(mesh, ledger.added());
    for (index, rec) in ledger.records().iter().enumerate() {
        let record = RecordRef {
            index,
            driver: rec.driver,
        };
        staging.apply(record, &rec.op)?;
    }
    let (compiled, map) = staging.finish(options)?;

    log::debug!(
        "committed {} records: cells {} -> {}, faces {} -> {}, points {} -> {}, {} flipped",
        ledger.len(),
        mesh.n_cells(),
        compiled.n_cells(),
        mesh.n_faces(),
        compiled.n_faces(),
        mesh.n_points(),
        compiled.n_points(),
        map.flipped_faces.len()
    );
    if options.check_closed_cells {
        compiled.debug_assert_invariants();
    }
    Ok((compiled, map))
}

/// A face as it stands during staging.
struct Slot {
    vertices: Vec<PointRef>,
    owner: CellRef,
    neighbour: Option<CellRef>,
    patch: Option<PatchId>,
    removed: Option<RecordRef>,
    /// Last writer of the owner and neighbour sides.
    written: [Option<RecordRef>; 2],
    records: Vec<RecordRef>,
    driver: Option<CellId>,
}

struct AddedPoint {
    position: Point3,
    master: Option<PointId>,
    driver: CellId,
}

struct AddedCell {
    faces: Vec<FaceRef>,
    record: RecordRef,
}

struct Staging<'m> {
    mesh: &'m PolyMesh,
    limits: HandleOffsets,
    faces: Vec<Slot>,
    points: Vec<AddedPoint>,
    cells: Vec<AddedCell>,
    removed_cells: Vec<Option<RecordRef>>,
    touched: Vec<Vec<RecordRef>>,
}

fn side_slot(side: FaceSide) -> usize {
    match side {
        FaceSide::Owner => 0,
        FaceSide::Neighbour => 1,
    }
}

impl<'m> Staging<'m> {
    fn new(mesh: &'m PolyMesh, limits: HandleOffsets) -> Self {
        let faces = mesh
            .faces()
            .iter()
            .map(|f| Slot {
                vertices: f.vertices.iter().map(|&p| PointRef::Existing(p)).collect(),
                owner: CellRef::Existing(f.owner),
                neighbour: f.neighbour.map(CellRef::Existing),
                patch: f.patch,
                removed: None,
                written: [None; 2],
                records: Vec::new(),
                driver: None,
            })
            .collect();
        Self {
            mesh,
            limits,
            faces,
            points: Vec::with_capacity(limits.points as usize),
            cells: Vec::with_capacity(limits.cells as usize),
            removed_cells: vec![None; mesh.n_cells()],
            touched: vec![Vec::new(); mesh.n_cells()],
        }
    }

    fn check_point(&self, record: RecordRef, r: PointRef) -> Result<(), CommitError> {
        match r {
            PointRef::Existing(point) if point.index() >= self.mesh.n_points() => {
                Err(CommitError::UnknownPoint { record, point })
            }
            PointRef::Added(handle) if handle >= self.limits.points => {
                Err(CommitError::UnknownHandle {
                    record,
                    kind: "point",
                    handle,
                })
            }
            _ => Ok(()),
        }
    }

    fn check_cell(&self, record: RecordRef, r: CellRef) -> Result<(), CommitError> {
        match r {
            CellRef::Existing(cell) if cell.index() >= self.mesh.n_cells() => {
                Err(CommitError::UnknownCell { record, cell })
            }
            CellRef::Added(handle) if handle >= self.limits.cells => {
                Err(CommitError::UnknownHandle {
                    record,
                    kind: "cell",
                    handle,
                })
            }
            _ => Ok(()),
        }
    }

    fn check_face(&self, record: RecordRef, r: FaceRef) -> Result<(), CommitError> {
        match r {
            FaceRef::Existing(face) if face.index() >= self.mesh.n_faces() => {
                Err(CommitError::UnknownFace { record, face })
            }
            FaceRef::Added(handle) if handle >= self.limits.faces => {
                Err(CommitError::UnknownHandle {
                    record,
                    kind: "face",
                    handle,
                })
            }
            _ => Ok(()),
        }
    }

    /// Slot of a pre-commit face that is still present.
    fn live_face(&self, record: RecordRef, face: FaceId) -> Result<usize, CommitError> {
        self.check_face(record, FaceRef::Existing(face))?;
        match self.faces[face.index()].removed {
            Some(first) => Err(CommitError::FaceAlreadyRemoved {
                record,
                face,
                first,
            }),
            None => Ok(face.index()),
        }
    }

    fn touch(&mut self, cell: CellRef, record: RecordRef) {
        if let CellRef::Existing(c) = cell {
            let list = &mut self.touched[c.index()];
            if list.last() != Some(&record) {
                list.push(record);
            }
        }
    }

    fn apply(&mut self, record: RecordRef, op: &EditOp) -> Result<(), CommitError> {
        match op {
            EditOp::AddPoint { position, master } => {
                if let Some(m) = master {
                    self.check_point(record, PointRef::Existing(*m))?;
                }
                self.points.push(AddedPoint {
                    position: *position,
                    master: *master,
                    driver: record.driver,
                });
            }
            EditOp::ModifyFace { face, side, cell } => {
                let idx = self.live_face(record, *face)?;
                self.check_cell(record, *cell)?;
                let current = match side {
                    FaceSide::Owner => self.faces[idx].owner,
                    FaceSide::Neighbour => self.faces[idx]
                        .neighbour
                        .ok_or(CommitError::NoNeighbourSide {
                            record,
                            face: *face,
                        })?,
                };
                if let Some(first) = self.faces[idx].written[side_slot(*side)] {
                    if current != *cell {
                        return Err(CommitError::ConflictingFaceEdit {
                            face: *face,
                            side: *side,
                            first,
                            second: record,
                        });
                    }
                }
                self.touch(current, record);
                self.touch(*cell, record);
                let slot = &mut self.faces[idx];
                match side {
                    FaceSide::Owner => slot.owner = *cell,
                    FaceSide::Neighbour => slot.neighbour = Some(*cell),
                }
                slot.written[side_slot(*side)] = Some(record);
                slot.records.push(record);
            }
            EditOp::AddFace {
                vertices,
                owner,
                neighbour,
                patch,
            } => {
                for &v in vertices {
                    self.check_point(record, v)?;
                }
                self.check_cell(record, *owner)?;
                if let Some(n) = neighbour {
                    self.check_cell(record, *n)?;
                }
                self.touch(*owner, record);
                if let Some(n) = neighbour {
                    self.touch(*n, record);
                }
                self.faces.push(Slot {
                    vertices: vertices.clone(),
                    owner: *owner,
                    neighbour: *neighbour,
                    patch: *patch,
                    removed: None,
                    written: [None; 2],
                    records: vec![record],
                    driver: Some(record.driver),
                });
            }
            EditOp::RemoveFace { face } => {
                let idx = self.live_face(record, *face)?;
                let (owner, neighbour) = (self.faces[idx].owner, self.faces[idx].neighbour);
                self.touch(owner, record);
                if let Some(n) = neighbour {
                    self.touch(n, record);
                }
                self.faces[idx].removed = Some(record);
            }
            EditOp::AddCell { faces } => {
                for &f in faces {
                    self.check_face(record, f)?;
                }
                self.cells.push(AddedCell {
                    faces: faces.clone(),
                    record,
                });
            }
            EditOp::RemoveCell { cell } => {
                self.check_cell(record, CellRef::Existing(*cell))?;
                if let Some(first) = self.removed_cells[cell.index()] {
                    return Err(CommitError::CellAlreadyRemoved {
                        record,
                        cell: *cell,
                        first,
                    });
                }
                self.removed_cells[cell.index()] = Some(record);
                self.touch(CellRef::Existing(*cell), record);
            }
        }
        Ok(())
    }

    fn finish(self, options: &CommitOptions) -> Result<(PolyMesh, TopoMap), CommitError> {
        let mesh = self.mesh;
        let n_old_points = mesh.n_points();
        let n_old_faces = mesh.n_faces();
        let n_old_cells = mesh.n_cells();

        // cells: survivors, then added
        let mut cell_new: Vec<Option<CellId>> = vec![None; n_old_cells];
        let mut cell_backward = Vec::with_capacity(n_old_cells + self.cells.len());
        for old in CellId::range(n_old_cells) {
            if self.removed_cells[old.index()].is_none() {
                cell_new[old.index()] = Some(CellId::from_index(cell_backward.len()));
                cell_backward.push(Origin::Existing(old));
            }
        }
        let mut added_cells = Vec::with_capacity(self.cells.len());
        for cell in &self.cells {
            added_cells.push(CellId::from_index(cell_backward.len()));
            cell_backward.push(Origin::Added {
                driver: cell.record.driver,
            });
        }
        let n_cells = cell_backward.len();
        let resolve_cell = |r: CellRef| match r {
            CellRef::Existing(c) => cell_new[c.index()],
            CellRef::Added(k) => Some(added_cells[k as usize]),
        };
        let resolve_point = |r: PointRef| match r {
            PointRef::Existing(p) => p,
            PointRef::Added(k) => PointId::from_index(n_old_points + k as usize),
        };
        let n_points = n_old_points + self.points.len();

        // Records that shaped a cell, for error attribution.
        let cell_records = |cell: CellId| -> Vec<RecordRef> {
            match cell_backward[cell.index()] {
                Origin::Existing(old) => self.touched[old.index()].clone(),
                Origin::Added { .. } => {
                    let k = cell.index() - (n_cells - added_cells.len());
                    vec![self.cells[k].record]
                }
            }
        };

        let mut faces: Vec<Face> = Vec::with_capacity(self.faces.len());
        let mut face_slot: Vec<usize> = Vec::with_capacity(self.faces.len());
        let mut slot_face: Vec<Option<usize>> = vec![None; self.faces.len()];
        let mut bounding: Vec<Vec<(usize, FaceSide)>> = vec![Vec::new(); n_cells];
        for (idx, slot) in self.faces.iter().enumerate() {
            if slot.removed.is_some() {
                continue;
            }
            let staged = FaceId::from_index(idx);
            let dangling = |r: CellRef| {
                let mut records = slot.records.clone();
                let cell = match r {
                    CellRef::Existing(c) => {
                        records.extend(self.removed_cells[c.index()]);
                        c
                    }
                    CellRef::Added(k) => CellId::new(k),
                };
                CommitError::Invariant {
                    violation: MeshError::DanglingCell { face: staged, cell },
                    records,
                }
            };
            let owner = resolve_cell(slot.owner).ok_or_else(|| dangling(slot.owner))?;
            let neighbour = match slot.neighbour {
                Some(n) => Some(resolve_cell(n).ok_or_else(|| dangling(n))?),
                None => None,
            };
            let face = Face {
                vertices: slot.vertices.iter().map(|&v| resolve_point(v)).collect(),
                owner,
                neighbour,
                patch: slot.patch,
            };
            validate_face(staged, &face, n_points, n_cells, mesh.patches().len()).map_err(
                |violation| CommitError::Invariant {
                    violation,
                    records: slot.records.clone(),
                },
            )?;

            let pos = faces.len();
            bounding[owner.index()].push((pos, FaceSide::Owner));
            if let Some(n) = neighbour {
                bounding[n.index()].push((pos, FaceSide::Neighbour));
            }
            slot_face[idx] = Some(pos);
            face_slot.push(idx);
            faces.push(face);
        }

        for (idx, bound) in bounding.iter().enumerate() {
            if bound.len() < 4 {
                let cell = CellId::from_index(idx);
                return Err(CommitError::Invariant {
                    violation: MeshError::TooFewFaces {
                        cell,
                        n_faces: bound.len(),
                    },
                    records: cell_records(cell),
                });
            }
        }

        for (k, added) in self.cells.iter().enumerate() {
            let cell = added_cells[k];
            for &f in &added.faces {
                let slot = match f {
                    FaceRef::Existing(id) => id.index(),
                    FaceRef::Added(h) => n_old_faces + h as usize,
                };
                let bounds = slot_face[slot]
                    .map(|pos| &faces[pos])
                    .is_some_and(|face| face.side_of(cell).is_some());
                if !bounds {
                    return Err(CommitError::UndeclaredFace {
                        record: added.record,
                    });
                }
            }
        }

        if options.check_closed_cells {
            for (idx, bound) in bounding.iter().enumerate() {
                let cell = CellId::from_index(idx);
                let edited = match cell_backward[idx] {
                    Origin::Existing(old) => !self.touched[old.index()].is_empty(),
                    Origin::Added { .. } => true,
                };
                if !edited {
                    continue;
                }
                check_closed(cell, bound.iter().map(|&(pos, side)| (&faces[pos], side))).map_err(
                    |violation| CommitError::Invariant {
                        violation,
                        records: cell_records(cell),
                    },
                )?;
            }
        }

        // faces: canonical order
        let (faces, origin) = canonicalize(faces);
        let n_added_faces = self.faces.len() - n_old_faces;
        let mut face_backward = Vec::with_capacity(faces.len());
        let mut added_faces = vec![FaceId::new(0); n_added_faces];
        let mut flipped_faces = Vec::new();
        for (new, &(pos, flipped)) in origin.iter().enumerate() {
            let new = FaceId::from_index(new);
            let slot = face_slot[pos];
            if slot < n_old_faces {
                face_backward.push(Origin::Existing(FaceId::from_index(slot)));
                if flipped {
                    flipped_faces.push(new);
                }
            } else {
                added_faces[slot - n_old_faces] = new;
                face_backward.push(Origin::Added {
                    driver: self.faces[slot].driver.unwrap_or(CellId::new(0)),
                });
            }
        }

        // points: existing, then added
        let mut points = mesh.points().to_vec();
        let mut point_backward: Vec<Origin<PointId>> =
            PointId::range(n_old_points).map(Origin::Existing).collect();
        let mut motion = MotionPoints::default();
        for (k, added) in self.points.iter().enumerate() {
            let id = PointId::from_index(n_old_points + k);
            let seeded = match (options.inflate, added.master) {
                (true, Some(m)) => mesh.point(m),
                _ => added.position,
            };
            points.push(seeded);
            point_backward.push(Origin::Added {
                driver: added.driver,
            });
            motion.points.push(id);
            motion.pre_motion.push(seeded);
            motion.target.push(added.position);
        }
        let added_points = motion.points.clone();

        let map = TopoMap {
            points: Renumbering::from_backward(n_old_points, point_backward, added_points),
            faces: Renumbering::from_backward(n_old_faces, face_backward, added_faces),
            cells: Renumbering::from_backward(n_old_cells, cell_backward, added_cells),
            flipped_faces,
            motion,
        };
        let compiled = PolyMesh::assemble(points, faces, n_cells, mesh.patches().to_vec());
        Ok((compiled, map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::meshgen::hex_block;
    use crate::algs::pyramid::plan_cell;
    use crate::geometry::metrics::cell_centres_and_volumes;

    fn c(i: u32) -> CellId {
        CellId::new(i)
    }

    #[test]
    fn empty_ledger_is_identity() {
        let mesh = hex_block(2, 2, 1, [1.0; 3]).unwrap();
        let (out, map) = compile(&mesh, &Ledger::new(), &CommitOptions::default()).unwrap();
        assert_eq!(out, mesh);
        assert!(map.is_identity());
        assert_eq!(map, TopoMap::identity(&mesh));
    }

    #[test]
    fn split_shared_face_is_flipped() {
        let mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
        let (centres, _) = cell_centres_and_volumes(&mesh);
        let ledger = plan_cell(&mesh, c(0), centres[0]).unwrap();
        let (out, map) = compile(&mesh, &ledger, &CommitOptions::default()).unwrap();

        assert_eq!(out.n_cells(), 1 + 6);
        assert_eq!(out.n_points(), 13);
        assert_eq!(out.n_faces(), 11 + 12);
        assert_eq!(map.cells.new_index(c(1)), Some(c(0)));
        assert_eq!(map.cells.new_index(c(0)), None);
        // the old internal face now has pyramid -> cell 0, so it is flipped
        assert_eq!(map.flipped_faces.len(), 1);
        let flipped = out.face(map.flipped_faces[0]);
        assert_eq!(flipped.owner, c(0));
        assert_eq!(map.faces.old_index(map.flipped_faces[0]), Some(FaceId::new(0)));
        for new in CellId::range(out.n_cells()).skip(1) {
            assert_eq!(map.cells.backward(new), Origin::Added { driver: c(0) });
        }
    }

    #[test]
    fn unknown_face_leaves_mesh_untouched() {
        let mut mesh = hex_block(1, 1, 1, [1.0; 3]).unwrap();
        let before = mesh.clone();
        let mut ledger = Ledger::new();
        ledger.modify_face(c(0), FaceId::new(99), FaceSide::Owner, CellRef::Existing(c(0)));
        let err = commit(&mut mesh, &ledger, &CommitOptions::default()).unwrap_err();
        assert!(matches!(err, CommitError::UnknownFace { .. }));
        assert_eq!(mesh, before);
    }

    #[test]
    fn unknown_handle_rejected() {
        let mesh = hex_block(1, 1, 1, [1.0; 3]).unwrap();
        let mut ledger = Ledger::new();
        ledger.modify_face(c(0), FaceId::new(0), FaceSide::Owner, CellRef::Added(3));
        let err = compile(&mesh, &ledger, &CommitOptions::default()).unwrap_err();
        assert_eq!(
            err,
            CommitError::UnknownHandle {
                record: ledger.record_ref(0),
                kind: "cell",
                handle: 3
            }
        );
    }

    #[test]
    fn conflicting_side_writes() {
        let mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
        let mut ledger = Ledger::new();
        let a = ledger.add_cell(c(0), vec![FaceRef::Existing(FaceId::new(0))]).unwrap();
        let b = ledger.add_cell(c(1), vec![FaceRef::Existing(FaceId::new(0))]).unwrap();
        let first = ledger.modify_face(c(0), FaceId::new(0), FaceSide::Owner, a);
        // same value again is harmless
        ledger.modify_face(c(0), FaceId::new(0), FaceSide::Owner, a);
        let second = ledger.modify_face(c(1), FaceId::new(0), FaceSide::Owner, b);
        let err = compile(&mesh, &ledger, &CommitOptions::default()).unwrap_err();
        assert_eq!(
            err,
            CommitError::ConflictingFaceEdit {
                face: FaceId::new(0),
                side: FaceSide::Owner,
                first,
                second
            }
        );
        assert_eq!(err.records(), vec![first, second]);
    }

    #[test]
    fn neighbour_side_of_boundary_face() {
        let mesh = hex_block(1, 1, 1, [1.0; 3]).unwrap();
        let mut ledger = Ledger::new();
        let r = ledger.modify_face(
            c(0),
            FaceId::new(2),
            FaceSide::Neighbour,
            CellRef::Existing(c(0)),
        );
        assert_eq!(
            compile(&mesh, &ledger, &CommitOptions::default()),
            Err(CommitError::NoNeighbourSide {
                record: r,
                face: FaceId::new(2)
            })
        );
    }

    #[test]
    fn double_removal_names_both_records() {
        let mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
        let mut ledger = Ledger::new();
        let first = ledger.remove_cell(c(0), c(1));
        let second = ledger.remove_cell(c(1), c(1));
        let err = compile(&mesh, &ledger, &CommitOptions::default()).unwrap_err();
        assert_eq!(
            err,
            CommitError::CellAlreadyRemoved {
                record: second,
                cell: c(1),
                first
            }
        );
    }

    #[test]
    fn removed_cell_left_dangling() {
        let mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
        let mut ledger = Ledger::new();
        let removal = ledger.remove_cell(c(1), c(1));
        let err = compile(&mesh, &ledger, &CommitOptions::default()).unwrap_err();
        match err {
            CommitError::Invariant {
                violation: MeshError::DanglingCell { cell, .. },
                records,
            } => {
                assert_eq!(cell, c(1));
                assert_eq!(records, vec![removal]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn undeclared_face_rejected() {
        let mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
        let plan = plan_cell(&mesh, c(0), [0.5; 3]).unwrap();
        // face 2 is the xmax face of cell 1 and cannot bound a pyramid of cell 0
        let mut ledger = Ledger::new();
        let mut claimed = None;
        for rec in plan.records() {
            let op = match &rec.op {
                EditOp::AddCell { faces } if claimed.is_none() => {
                    let mut faces = faces.clone();
                    faces.push(FaceRef::Existing(FaceId::new(2)));
                    EditOp::AddCell { faces }
                }
                op => op.clone(),
            };
            let is_cell = matches!(op, EditOp::AddCell { .. });
            let r = ledger.append(rec.driver, op).unwrap();
            if is_cell && claimed.is_none() {
                claimed = Some(r);
            }
        }
        let err = compile(&mesh, &ledger, &CommitOptions::default()).unwrap_err();
        assert_eq!(
            err,
            CommitError::UndeclaredFace {
                record: claimed.unwrap()
            }
        );
    }

    #[test]
    fn cell_without_faces_is_too_small() {
        let mesh = hex_block(1, 1, 1, [1.0; 3]).unwrap();
        let mut ledger = Ledger::new();
        let r = ledger.append(
            c(0),
            EditOp::AddCell {
                faces: vec![FaceRef::Existing(FaceId::new(0))],
            },
        );
        let err = compile(&mesh, &ledger, &CommitOptions::default()).unwrap_err();
        match err {
            CommitError::Invariant {
                violation: MeshError::TooFewFaces { n_faces: 0, .. },
                records,
            } => assert_eq!(records, vec![r.unwrap()]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn inflate_seeds_on_master() {
        let mesh = hex_block(1, 1, 1, [1.0; 3]).unwrap();
        let ledger = plan_cell(&mesh, c(0), [0.5; 3]).unwrap();
        let options = CommitOptions {
            inflate: true,
            ..CommitOptions::default()
        };
        let (out, map) = compile(&mesh, &ledger, &options).unwrap();
        let apex = map.motion.points[0];
        assert_eq!(out.point(apex), [0.0; 3]);
        assert_eq!(map.motion.target, vec![[0.5; 3]]);
        assert!(map.has_pending_motion());

        let (out, map) = compile(&mesh, &ledger, &CommitOptions::default()).unwrap();
        assert_eq!(out.point(map.motion.points[0]), [0.5; 3]);
        assert!(!map.has_pending_motion());
    }
}
