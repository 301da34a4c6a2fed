//! Centroid-apex pyramid decomposition.
//!
//! A selected cell with `N` bounding faces is replaced by `N` pyramids that
//! share one new apex point. Each bounding face becomes the base of one
//! pyramid; every edge of the cell yields one triangular lateral face joining
//! the two pyramids on either side of it.
//!
//! Planning is read-only: [`plan_cell`] returns a [`Ledger`] for one cell and
//! [`PyramidPlanner`] merges the plans of a whole selection in ascending cell
//! order. With the `rayon` feature the per-cell plans are built in parallel.

use crate::algs::ledger::{CellRef, FaceRef, Ledger, PointRef};
use crate::algs::selection::AssignmentMap;
use crate::mesh_error::DecompositionError;
use crate::topology::ids::{CellId, PointId};
use crate::topology::mesh::{Point3, PolyMesh};
use hashbrown::HashMap as FastMap;
use std::collections::BTreeMap;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// One cell edge and the pyramids on either side of it.
struct EdgeUse {
    /// Direction in which the first pyramid's base traverses the edge.
    a: PointId,
    b: PointId,
    first: u32,
    second: Option<u32>,
    uses: usize,
}

/// Stage the decomposition of `cell` about `apex`.
///
/// Record order: the apex point, the lateral faces, one cell per pyramid, the
/// base face re-assignments and finally the removal of `cell`. Pyramid `k`
/// sits on the `k`-th face of [`PolyMesh::cell_faces`].
pub fn plan_cell(
    mesh: &PolyMesh,
    cell: CellId,
    apex: Point3,
) -> Result<Ledger, DecompositionError> {
    if cell.index() >= mesh.n_cells() {
        return Err(DecompositionError::CellOutOfRange {
            cell,
            n_cells: mesh.n_cells(),
        });
    }
    let bases = mesh.cell_faces(cell);
    if bases.len() < 4 {
        return Err(DecompositionError::TooFewFaces {
            cell,
            n_faces: bases.len(),
        });
    }

    let mut order: Vec<(PointId, PointId)> = Vec::new();
    let mut edges: FastMap<(PointId, PointId), EdgeUse> = FastMap::new();
    let mut sides = Vec::with_capacity(bases.len());
    for (k, &fid) in bases.iter().enumerate() {
        let face = mesh.face(fid);
        if face.vertices.len() < 3 {
            return Err(DecompositionError::DegenerateFace {
                cell,
                face: fid,
                n_vertices: face.vertices.len(),
            });
        }
        if face.neighbour == Some(face.owner) {
            return Err(DecompositionError::SelfNeighbour { cell, face: fid });
        }
        let Some(side) = face.side_of(cell) else {
            return Err(DecompositionError::SelfNeighbour { cell, face: fid });
        };
        sides.push(side);

        let outward = face.outward_vertices(side);
        let n = outward.len();
        for i in 0..n {
            let (a, b) = (outward[i], outward[(i + 1) % n]);
            let key = if a < b { (a, b) } else { (b, a) };
            match edges.get_mut(&key) {
                None => {
                    order.push(key);
                    edges.insert(
                        key,
                        EdgeUse {
                            a,
                            b,
                            first: k as u32,
                            second: None,
                            uses: 1,
                        },
                    );
                }
                Some(e) => {
                    e.uses += 1;
                    if e.uses > 2 {
                        continue;
                    }
                    if (e.a, e.b) == (a, b) {
                        return Err(DecompositionError::InconsistentOrientation {
                            cell,
                            a: key.0,
                            b: key.1,
                        });
                    }
                    e.second = Some(k as u32);
                }
            }
        }
    }

    let mut open: Vec<_> = edges.iter().filter(|(_, e)| e.uses != 2).collect();
    open.sort_unstable_by_key(|(key, _)| **key);
    if let Some(&(&(a, b), e)) = open.first() {
        return Err(DecompositionError::OpenCell {
            cell,
            a,
            b,
            uses: e.uses,
        });
    }

    let staging = |source| DecompositionError::Staging { cell, source };
    let master = mesh.cell_points(cell).first().copied();
    let mut ledger = Ledger::new();
    let apex_ref = ledger.add_point(cell, apex, master);

    let mut laterals: Vec<Vec<FaceRef>> = vec![Vec::new(); bases.len()];
    for key in &order {
        let e = &edges[key];
        let Some(second) = e.second else {
            continue;
        };
        let lateral = ledger
            .add_face(
                cell,
                vec![PointRef::Existing(e.b), PointRef::Existing(e.a), apex_ref],
                CellRef::Added(e.first),
                Some(CellRef::Added(second)),
                None,
            )
            .map_err(staging)?;
        laterals[e.first as usize].push(lateral);
        laterals[second as usize].push(lateral);
    }

    for (k, &fid) in bases.iter().enumerate() {
        let mut faces = Vec::with_capacity(1 + laterals[k].len());
        faces.push(FaceRef::Existing(fid));
        faces.append(&mut laterals[k]);
        ledger.add_cell(cell, faces).map_err(staging)?;
    }
    for (k, (&fid, &side)) in bases.iter().zip(&sides).enumerate() {
        ledger.modify_face(cell, fid, side, CellRef::Added(k as u32));
    }
    ledger.remove_cell(cell, cell);

    log::debug!(
        "cell {cell}: {} pyramids, {} lateral faces, apex {apex:?}",
        bases.len(),
        order.len()
    );
    Ok(ledger)
}

/// Plans the decomposition of a whole selection into one ledger.
#[derive(Debug)]
pub struct PyramidPlanner<'m> {
    mesh: &'m PolyMesh,
    ledger: Ledger,
    apexes: BTreeMap<CellId, PointRef>,
}

impl<'m> PyramidPlanner<'m> {
    pub fn new(mesh: &'m PolyMesh) -> Self {
        Self {
            mesh,
            ledger: Ledger::new(),
            apexes: BTreeMap::new(),
        }
    }

    /// Stage every `(cell, apex)` of `assignment`, in ascending cell order.
    ///
    /// Nothing is staged if any cell fails to decompose.
    pub fn set_refinement(&mut self, assignment: &AssignmentMap) -> Result<(), DecompositionError> {
        if let Some(&cell) = assignment.keys().find(|c| self.apexes.contains_key(c)) {
            return Err(DecompositionError::AlreadyPlanned { cell });
        }
        let entries: Vec<(CellId, Point3)> = assignment.iter().map(|(&c, &p)| (c, p)).collect();

        #[cfg(feature = "rayon")]
        let plans: Vec<Result<Ledger, DecompositionError>> = entries
            .par_iter()
            .map(|&(cell, apex)| plan_cell(self.mesh, cell, apex))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let plans: Vec<Result<Ledger, DecompositionError>> = entries
            .iter()
            .map(|&(cell, apex)| plan_cell(self.mesh, cell, apex))
            .collect();

        let plans = plans.into_iter().collect::<Result<Vec<_>, _>>()?;
        for ((cell, _), plan) in entries.into_iter().zip(plans) {
            let offsets = self.ledger.absorb(plan);
            self.apexes.insert(cell, offsets.point(PointRef::Added(0)));
        }
        log::debug!(
            "planned {} cells into {} records",
            self.apexes.len(),
            self.ledger.len()
        );
        Ok(())
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Apex handle of every planned cell.
    pub fn apex_points(&self) -> &BTreeMap<CellId, PointRef> {
        &self.apexes
    }

    pub fn into_parts(self) -> (Ledger, BTreeMap<CellId, PointRef>) {
        (self.ledger, self.apexes)
    }
}
