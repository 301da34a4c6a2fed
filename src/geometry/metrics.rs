//! Face and cell centroids, area vectors and volumes.
//!
//! Faces are decomposed into triangles about their vertex average; cells are
//! decomposed into pyramids about the average of their face centres. Both
//! estimates are then area- or volume-weighted, which gives the exact
//! centroid for planar faces and convex cells.

use crate::topology::ids::PointId;
use crate::topology::mesh::{Point3, PolyMesh};

const VSMALL: f64 = 1e-300;

#[inline]
pub(crate) fn add(a: Point3, b: Point3) -> Point3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub(crate) fn sub(a: Point3, b: Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub(crate) fn scale(a: Point3, s: f64) -> Point3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub(crate) fn dot(a: Point3, b: Point3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn cross(a: Point3, b: Point3) -> Point3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub(crate) fn norm(a: Point3) -> f64 {
    dot(a, a).sqrt()
}

/// Centroid and area vector of a polygon.
///
/// The area vector follows the right-hand rule over `vertices`.
pub fn face_centre_and_area(points: &[Point3], vertices: &[PointId]) -> (Point3, Point3) {
    let n = vertices.len();
    let at = |i: usize| points[vertices[i].index()];

    if n == 3 {
        let (a, b, c) = (at(0), at(1), at(2));
        let centre = scale(add(add(a, b), c), 1.0 / 3.0);
        let area = scale(cross(sub(b, a), sub(c, a)), 0.5);
        return (centre, area);
    }

    let mut estimate = [0.0; 3];
    for i in 0..n {
        estimate = add(estimate, at(i));
    }
    let estimate = scale(estimate, 1.0 / n as f64);

    let mut sum_n = [0.0; 3];
    let mut sum_a = 0.0;
    let mut sum_ac = [0.0; 3];
    for i in 0..n {
        let this = at(i);
        let next = at((i + 1) % n);
        let c = add(add(this, next), estimate);
        let tri_n = cross(sub(next, this), sub(estimate, this));
        let a = norm(tri_n);
        sum_n = add(sum_n, tri_n);
        sum_a += a;
        sum_ac = add(sum_ac, scale(c, a));
    }

    let centre = if sum_a < VSMALL {
        estimate
    } else {
        scale(sum_ac, 1.0 / (3.0 * sum_a))
    };
    (centre, scale(sum_n, 0.5))
}

/// Centroids and volumes of every cell.
pub fn cell_centres_and_volumes(mesh: &PolyMesh) -> (Vec<Point3>, Vec<f64>) {
    let points = mesh.points();
    let faces = mesh.faces();
    let face_geom: Vec<(Point3, Point3)> = faces
        .iter()
        .map(|f| face_centre_and_area(points, &f.vertices))
        .collect();

    let n_cells = mesh.n_cells();
    let mut estimate = vec![[0.0; 3]; n_cells];
    let mut n_faces = vec![0usize; n_cells];
    for (face, (ctr, _)) in faces.iter().zip(&face_geom) {
        for cell in std::iter::once(face.owner).chain(face.neighbour) {
            estimate[cell.index()] = add(estimate[cell.index()], *ctr);
            n_faces[cell.index()] += 1;
        }
    }
    for (est, &n) in estimate.iter_mut().zip(&n_faces) {
        if n > 0 {
            *est = scale(*est, 1.0 / n as f64);
        }
    }

    let mut centres = vec![[0.0; 3]; n_cells];
    let mut volumes = vec![0.0; n_cells];
    for (face, &(ctr, area)) in faces.iter().zip(&face_geom) {
        let own = face.owner.index();
        let pyr3_vol = dot(area, sub(ctr, estimate[own]));
        let pyr_ctr = add(scale(ctr, 0.75), scale(estimate[own], 0.25));
        centres[own] = add(centres[own], scale(pyr_ctr, pyr3_vol));
        volumes[own] += pyr3_vol;

        if let Some(nbr) = face.neighbour {
            let nei = nbr.index();
            let pyr3_vol = dot(area, sub(estimate[nei], ctr));
            let pyr_ctr = add(scale(ctr, 0.75), scale(estimate[nei], 0.25));
            centres[nei] = add(centres[nei], scale(pyr_ctr, pyr3_vol));
            volumes[nei] += pyr3_vol;
        }
    }

    for cell in 0..n_cells {
        if volumes[cell].abs() > VSMALL {
            centres[cell] = scale(centres[cell], 1.0 / volumes[cell]);
        } else {
            centres[cell] = estimate[cell];
        }
        volumes[cell] /= 3.0;
    }

    (centres, volumes)
}
