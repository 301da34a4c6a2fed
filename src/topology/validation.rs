//! Topology validation helpers.

use crate::mesh_error::MeshError;
use crate::topology::ids::{CellId, FaceId, PatchId, PointId};
use crate::topology::mesh::{Face, FaceSide, Patch, Point3};
use hashbrown::HashMap as FastMap;
use hashbrown::HashSet as FastSet;

/// Optional validation toggles for mesh checks.
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Require canonical face order (internal first, upper-triangular, patches grouped).
    pub check_order: bool,
    /// Require every cell to be closed and consistently oriented.
    pub check_closed_cells: bool,
}

impl ValidationOptions {
    /// Enable all checks.
    pub fn all() -> Self {
        Self {
            check_order: true,
            check_closed_cells: true,
        }
    }
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self::all()
    }
}

/// Validate raw mesh parts: per-face references, face order, cell face counts
/// and (optionally) cell closedness.
pub fn validate_parts(
    points: &[Point3],
    faces: &[Face],
    n_cells: usize,
    patches: &[Patch],
    options: ValidationOptions,
) -> Result<(), MeshError> {
    let mut face_counts = vec![0usize; n_cells];
    for (idx, face) in faces.iter().enumerate() {
        let id = FaceId::from_index(idx);
        validate_face(id, face, points.len(), n_cells, patches.len())?;
        face_counts[face.owner.index()] += 1;
        if let Some(nbr) = face.neighbour {
            face_counts[nbr.index()] += 1;
        }
    }

    if options.check_order {
        validate_order(faces)?;
    }

    for (idx, &n_faces) in face_counts.iter().enumerate() {
        if n_faces < 4 {
            return Err(MeshError::TooFewFaces {
                cell: CellId::from_index(idx),
                n_faces,
            });
        }
    }

    if options.check_closed_cells {
        let mut cell_faces: Vec<Vec<(&Face, FaceSide)>> = vec![Vec::new(); n_cells];
        for face in faces {
            cell_faces[face.owner.index()].push((face, FaceSide::Owner));
            if let Some(nbr) = face.neighbour {
                cell_faces[nbr.index()].push((face, FaceSide::Neighbour));
            }
        }
        for (idx, bounding) in cell_faces.iter().enumerate() {
            check_closed(CellId::from_index(idx), bounding.iter().copied())?;
        }
    }

    Ok(())
}

/// Check a single face against the entity counts.
pub fn validate_face(
    id: FaceId,
    face: &Face,
    n_points: usize,
    n_cells: usize,
    n_patches: usize,
) -> Result<(), MeshError> {
    if face.vertices.len() < 3 {
        return Err(MeshError::DegenerateFace {
            face: id,
            n_vertices: face.vertices.len(),
        });
    }
    let mut seen = FastSet::with_capacity(face.vertices.len());
    for &p in &face.vertices {
        if p.index() >= n_points {
            return Err(MeshError::PointOutOfRange {
                face: id,
                point: p,
                n_points,
            });
        }
        if !seen.insert(p) {
            return Err(MeshError::RepeatedVertex { face: id, point: p });
        }
    }

    for cell in std::iter::once(face.owner).chain(face.neighbour) {
        if cell.index() >= n_cells {
            return Err(MeshError::CellOutOfRange {
                face: id,
                cell,
                n_cells,
            });
        }
    }

    match (face.neighbour, face.patch) {
        (Some(nbr), _) if nbr == face.owner => {
            Err(MeshError::SelfNeighbour { face: id, cell: nbr })
        }
        (Some(_), Some(patch)) => Err(MeshError::InternalFaceWithPatch { face: id, patch }),
        (None, None) => Err(MeshError::BoundaryFaceWithoutPatch { face: id }),
        (None, Some(patch)) if patch.index() >= n_patches => Err(MeshError::PatchOutOfRange {
            face: id,
            patch,
            n_patches,
        }),
        _ => Ok(()),
    }
}

fn validate_order(faces: &[Face]) -> Result<(), MeshError> {
    let mut prev_internal: Option<(CellId, CellId)> = None;
    let mut prev_patch: Option<PatchId> = None;
    for (idx, face) in faces.iter().enumerate() {
        let id = FaceId::from_index(idx);
        match face.neighbour {
            Some(nbr) => {
                if prev_patch.is_some() {
                    return Err(order_error(id, "internal face after boundary faces"));
                }
                if face.owner > nbr {
                    return Err(order_error(id, "owner is greater than neighbour"));
                }
                if prev_internal.is_some_and(|prev| prev > (face.owner, nbr)) {
                    return Err(order_error(id, "internal faces not sorted by owner/neighbour"));
                }
                prev_internal = Some((face.owner, nbr));
            }
            None => {
                let patch = face.patch;
                if prev_patch.is_some_and(|prev| Some(prev) > patch) {
                    return Err(order_error(id, "boundary faces not grouped by patch"));
                }
                prev_patch = patch;
            }
        }
    }
    Ok(())
}

fn order_error(face: FaceId, reason: &str) -> MeshError {
    MeshError::FaceOrder {
        face,
        reason: reason.to_string(),
    }
}

/// Check that the faces bounding `cell` close up: every undirected edge is
/// used by exactly two faces, once in each direction when traversed outward.
pub fn check_closed<'a>(
    cell: CellId,
    bounding: impl IntoIterator<Item = (&'a Face, FaceSide)>,
) -> Result<(), MeshError> {
    // (low, high) -> (uses, net direction)
    let mut edges: FastMap<(PointId, PointId), (usize, i32)> = FastMap::new();
    for (face, side) in bounding {
        let outward = face.outward_vertices(side);
        let n = outward.len();
        for i in 0..n {
            let (a, b) = (outward[i], outward[(i + 1) % n]);
            let (key, dir) = if a < b { ((a, b), 1) } else { ((b, a), -1) };
            let entry = edges.entry(key).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += dir;
        }
    }

    let mut sorted: Vec<_> = edges.into_iter().collect();
    sorted.sort_unstable_by_key(|(key, _)| *key);
    for ((a, b), (uses, net)) in sorted {
        if uses != 2 {
            return Err(MeshError::OpenCell { cell, a, b, uses });
        }
        if net != 0 {
            return Err(MeshError::InconsistentOrientation { cell, a, b });
        }
    }
    Ok(())
}
