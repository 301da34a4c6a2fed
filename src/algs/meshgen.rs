//! Basic mesh generators for structured hexahedral blocks.
//!
//! Blocks are emitted as general polyhedral meshes: every hex is a cell bounded
//! by six quadrilateral faces. Boundary faces are grouped in six patches named
//! `xmin`, `xmax`, `ymin`, `ymax`, `zmin`, `zmax`. [`split_block`] cuts a block
//! in two along `x` and replaces the cut with a pair of processor patches.

use crate::mesh_error::MeshError;
use crate::topology::ids::{CellId, PatchId, PointId};
use crate::topology::mesh::{Face, Patch, PatchKind, Point3, PolyMesh};
use crate::topology::partition::{GlobalIndex, Partition};
use std::collections::BTreeMap;

/// Patch names in patch-id order.
pub const BLOCK_PATCHES: [&str; 6] = ["xmin", "xmax", "ymin", "ymax", "zmin", "zmax"];

/// Build an `nx * ny * nz` block of hexahedra with the given cell spacing.
pub fn hex_block(
    nx: usize,
    ny: usize,
    nz: usize,
    spacing: [f64; 3],
) -> Result<PolyMesh, MeshError> {
    let kinds = std::array::from_fn(|_| PatchKind::Wall);
    block_region(0..nx, ny, nz, spacing, kinds)
}

/// Cut an `nx * ny * nz` block after `nx_left` cells along `x` into two
/// partitions (rank 0 on the left, rank 1 on the right).
///
/// Each side replaces its cut patch (`xmax` on rank 0, `xmin` on rank 1) with
/// a processor patch. Both sides list the shared faces in the same order.
pub fn split_block(
    nx: usize,
    ny: usize,
    nz: usize,
    spacing: [f64; 3],
    nx_left: usize,
) -> Result<[(PolyMesh, Partition); 2], MeshError> {
    if nx_left == 0 || nx_left >= nx {
        return Err(MeshError::Partition(format!(
            "cannot cut {nx} cells after {nx_left}"
        )));
    }

    let mut left_kinds: [PatchKind; 6] = std::array::from_fn(|_| PatchKind::Wall);
    left_kinds[1] = PatchKind::Processor { neighbour_rank: 1 };
    let mut right_kinds: [PatchKind; 6] = std::array::from_fn(|_| PatchKind::Wall);
    right_kinds[0] = PatchKind::Processor { neighbour_rank: 0 };

    let left = block_region(0..nx_left, ny, nz, spacing, left_kinds)?;
    let right = block_region(nx_left..nx, ny, nz, spacing, right_kinds)?;

    let cells = GlobalIndex::from_counts(&[left.n_cells(), right.n_cells()]);
    let points = GlobalIndex::from_counts(&[left.n_points(), right.n_points()]);

    // Across the cut, face (j, k) joins left cell (nx_left-1, j, k) and right cell (0, j, k).
    let left_width = nx_left;
    let right_width = nx - nx_left;
    let mut left_remote = Vec::with_capacity(ny * nz);
    let mut right_remote = Vec::with_capacity(ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            let right_cell = cell_index(right_width, ny, 0, j, k);
            let left_cell = cell_index(left_width, ny, left_width - 1, j, k);
            left_remote.push(cells.to_global(1, right_cell));
            right_remote.push(cells.to_global(0, left_cell));
        }
    }

    let left_part = Partition::new(
        0,
        cells.clone(),
        points.clone(),
        BTreeMap::from([(PatchId::new(1), left_remote)]),
    );
    let right_part = Partition::new(
        1,
        cells,
        points,
        BTreeMap::from([(PatchId::new(0), right_remote)]),
    );
    left_part.check(&left)?;
    right_part.check(&right)?;

    Ok([(left, left_part), (right, right_part)])
}

fn cell_index(nx: usize, ny: usize, i: usize, j: usize, k: usize) -> usize {
    i + nx * (j + ny * k)
}

fn block_region(
    xs: std::ops::Range<usize>,
    ny: usize,
    nz: usize,
    spacing: [f64; 3],
    kinds: [PatchKind; 6],
) -> Result<PolyMesh, MeshError> {
    let nx = xs.len();
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(MeshError::Partition(format!(
            "block dimensions must be non-zero, got {nx}x{ny}x{nz}"
        )));
    }
    let x0 = xs.start;

    let pt = |i: usize, j: usize, k: usize| PointId::from_index(i + (nx + 1) * (j + (ny + 1) * k));
    let cell = |i: usize, j: usize, k: usize| CellId::from_index(cell_index(nx, ny, i, j, k));

    let mut points: Vec<Point3> = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                points.push([
                    (x0 + i) as f64 * spacing[0],
                    j as f64 * spacing[1],
                    k as f64 * spacing[2],
                ]);
            }
        }
    }

    // Quads with normals along +x, +y, +z respectively.
    let x_quad = |i, j, k| vec![pt(i, j, k), pt(i, j + 1, k), pt(i, j + 1, k + 1), pt(i, j, k + 1)];
    let y_quad = |i, j, k| vec![pt(i, j, k), pt(i, j, k + 1), pt(i + 1, j, k + 1), pt(i + 1, j, k)];
    let z_quad = |i, j, k| vec![pt(i, j, k), pt(i + 1, j, k), pt(i + 1, j + 1, k), pt(i, j + 1, k)];
    let reversed = |mut v: Vec<PointId>| {
        v.reverse();
        v
    };

    let mut faces = Vec::new();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let own = cell(i, j, k);
                if i + 1 < nx {
                    faces.push(Face::internal(x_quad(i + 1, j, k), own, cell(i + 1, j, k)));
                }
                if j + 1 < ny {
                    faces.push(Face::internal(y_quad(i, j + 1, k), own, cell(i, j + 1, k)));
                }
                if k + 1 < nz {
                    faces.push(Face::internal(z_quad(i, j, k + 1), own, cell(i, j, k + 1)));
                }
            }
        }
    }

    let patch = PatchId::from_index;
    for k in 0..nz {
        for j in 0..ny {
            faces.push(Face::boundary(reversed(x_quad(0, j, k)), cell(0, j, k), patch(0)));
        }
    }
    for k in 0..nz {
        for j in 0..ny {
            faces.push(Face::boundary(x_quad(nx, j, k), cell(nx - 1, j, k), patch(1)));
        }
    }
    for k in 0..nz {
        for i in 0..nx {
            faces.push(Face::boundary(reversed(y_quad(i, 0, k)), cell(i, 0, k), patch(2)));
            faces.push(Face::boundary(y_quad(i, ny, k), cell(i, ny - 1, k), patch(3)));
        }
    }
    for j in 0..ny {
        for i in 0..nx {
            faces.push(Face::boundary(reversed(z_quad(i, j, 0)), cell(i, j, 0), patch(4)));
            faces.push(Face::boundary(z_quad(i, j, nz), cell(i, j, nz - 1), patch(5)));
        }
    }

    let patches = BLOCK_PATCHES
        .iter()
        .zip(kinds)
        .map(|(name, kind)| {
            let name = match kind {
                PatchKind::Processor { neighbour_rank } => format!("procBoundary{neighbour_rank}"),
                _ => (*name).to_string(),
            };
            Patch::new(name, kind)
        })
        .collect();

    PolyMesh::from_unordered(points, faces, nx * ny * nz, patches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::metrics::cell_centres_and_volumes;

    #[test]
    fn block_counts() {
        let mesh = hex_block(3, 2, 2, [1.0, 1.0, 1.0]).unwrap();
        assert_eq!(mesh.n_cells(), 12);
        assert_eq!(mesh.n_points(), 4 * 3 * 3);
        // internal: x 2*2*2, y 3*1*2, z 3*2*1
        assert_eq!(mesh.n_internal_faces(), 8 + 6 + 6);
        assert_eq!(mesh.n_faces(), 20 + 2 * (4 + 6 + 6));
        assert_eq!(mesh.find_patch("zmax"), Some(PatchId::new(5)));
    }

    #[test]
    fn block_volumes_positive() {
        let mesh = hex_block(2, 2, 2, [0.5, 0.5, 0.5]).unwrap();
        let (_, volumes) = cell_centres_and_volumes(&mesh);
        for v in volumes {
            assert!((v - 0.125).abs() < 1e-12);
        }
    }

    #[test]
    fn split_block_shares_cut() {
        let [(left, lp), (right, rp)] = split_block(3, 2, 1, [1.0, 1.0, 1.0], 1).unwrap();
        assert_eq!(left.n_cells(), 2);
        assert_eq!(right.n_cells(), 4);
        assert_eq!(left.patch(PatchId::new(1)).neighbour_rank(), Some(1));
        assert_eq!(right.patch(PatchId::new(0)).neighbour_rank(), Some(0));
        assert_eq!(left.patch_range(PatchId::new(1)).len(), 2);
        assert_eq!(right.patch_range(PatchId::new(0)).len(), 2);
        // left cell (0, j) faces right cell (0, j) which is global 2 + 2*j
        assert_eq!(lp.remote_cells(PatchId::new(1)), Some(&[2u64, 4][..]));
        assert_eq!(rp.remote_cells(PatchId::new(0)), Some(&[0u64, 1][..]));
    }

    #[test]
    fn split_block_rejects_bad_cut() {
        assert!(split_block(2, 1, 1, [1.0; 3], 0).is_err());
        assert!(split_block(2, 1, 1, [1.0; 3], 2).is_err());
    }
}
