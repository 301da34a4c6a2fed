//! Old <-> new index maps produced by a commit.
//!
//! A [`Renumbering`] is total in both directions: every pre-commit entity maps
//! to its new index or to [`Mapped::Removed`], and every post-commit entity
//! maps back to the entity it continues or to the selected cell whose edit
//! created it. [`TopoMap`] bundles the maps for points, faces and cells with
//! the motion points of the commit.

use crate::algs::ledger::{CellRef, FaceRef, PointRef};
use crate::topology::ids::{CellId, FaceId, MeshIndex, PointId};
use crate::topology::mesh::{Point3, PolyMesh};

/// Where a pre-commit entity went.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mapped<I> {
    Kept(I),
    Removed,
}

impl<I: Copy> Mapped<I> {
    pub fn kept(self) -> Option<I> {
        match self {
            Mapped::Kept(i) => Some(i),
            Mapped::Removed => None,
        }
    }
}

/// Where a post-commit entity came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Origin<I> {
    Existing(I),
    /// Created by the decomposition of `driver`.
    Added { driver: CellId },
}

/// Forward and backward index maps for one entity kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Renumbering<I: MeshIndex> {
    forward: Vec<Mapped<I>>,
    backward: Vec<Origin<I>>,
    // new index of the k-th added entity
    added: Vec<I>,
}

impl<I: MeshIndex> Renumbering<I> {
    /// The map of a commit that changed nothing.
    pub fn identity(n: usize) -> Self {
        Self {
            forward: (0..n).map(|i| Mapped::Kept(I::from_index(i))).collect(),
            backward: (0..n).map(|i| Origin::Existing(I::from_index(i))).collect(),
            added: Vec::new(),
        }
    }

    /// Build from the backward map. `added` lists the new index of every added
    /// entity in handle order.
    pub(crate) fn from_backward(n_old: usize, backward: Vec<Origin<I>>, added: Vec<I>) -> Self {
        let mut forward = vec![Mapped::Removed; n_old];
        for (new, origin) in backward.iter().enumerate() {
            if let Origin::Existing(old) = origin {
                forward[old.index()] = Mapped::Kept(I::from_index(new));
            }
        }
        Self {
            forward,
            backward,
            added,
        }
    }

    pub fn old_len(&self) -> usize {
        self.forward.len()
    }

    pub fn new_len(&self) -> usize {
        self.backward.len()
    }

    pub fn forward(&self, old: I) -> Mapped<I> {
        self.forward[old.index()]
    }

    pub fn backward(&self, new: I) -> Origin<I> {
        self.backward[new.index()]
    }

    /// New index of a surviving entity.
    pub fn new_index(&self, old: I) -> Option<I> {
        self.forward.get(old.index()).and_then(|m| m.kept())
    }

    /// Pre-commit index of an entity that existed before.
    pub fn old_index(&self, new: I) -> Option<I> {
        match self.backward.get(new.index())? {
            Origin::Existing(old) => Some(*old),
            Origin::Added { .. } => None,
        }
    }

    /// New index of the `k`-th added entity.
    pub fn added_index(&self, k: u32) -> Option<I> {
        self.added.get(k as usize).copied()
    }

    /// New indices of added entities, in the order they were staged.
    pub fn added(&self) -> &[I] {
        &self.added
    }

    /// Pre-commit indices of removed entities, ascending.
    pub fn removed(&self) -> impl Iterator<Item = I> + '_ {
        self.forward
            .iter()
            .enumerate()
            .filter(|(_, m)| matches!(m, Mapped::Removed))
            .map(|(old, _)| I::from_index(old))
    }

    pub fn n_removed(&self) -> usize {
        self.removed().count()
    }

    pub fn is_identity(&self) -> bool {
        self.forward.len() == self.backward.len()
            && self
                .backward
                .iter()
                .enumerate()
                .all(|(i, o)| *o == Origin::Existing(I::from_index(i)))
    }

    pub fn forward_map(&self) -> &[Mapped<I>] {
        &self.forward
    }

    pub fn backward_map(&self) -> &[Origin<I>] {
        &self.backward
    }
}

/// Points inserted by the commit and where they are to be moved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MotionPoints {
    /// New point indices.
    pub points: Vec<PointId>,
    /// Positions stored in the committed mesh.
    pub pre_motion: Vec<Point3>,
    /// Positions requested by the edits.
    pub target: Vec<Point3>,
}

impl MotionPoints {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PointId, Point3, Point3)> + '_ {
        self.points
            .iter()
            .zip(&self.pre_motion)
            .zip(&self.target)
            .map(|((&p, &from), &to)| (p, from, to))
    }
}

/// Everything a consumer needs to follow a commit.
#[derive(Clone, Debug, PartialEq)]
pub struct TopoMap {
    pub points: Renumbering<PointId>,
    pub faces: Renumbering<FaceId>,
    pub cells: Renumbering<CellId>,
    /// Existing faces (new indices) whose orientation was reversed.
    pub flipped_faces: Vec<FaceId>,
    pub motion: MotionPoints,
}

impl TopoMap {
    /// The map of an empty commit against `mesh`.
    pub fn identity(mesh: &PolyMesh) -> Self {
        Self {
            points: Renumbering::identity(mesh.n_points()),
            faces: Renumbering::identity(mesh.n_faces()),
            cells: Renumbering::identity(mesh.n_cells()),
            flipped_faces: Vec::new(),
            motion: MotionPoints::default(),
        }
    }

    pub fn resolve_point(&self, r: PointRef) -> Option<PointId> {
        match r {
            PointRef::Existing(p) => self.points.new_index(p),
            PointRef::Added(k) => self.points.added_index(k),
        }
    }

    pub fn resolve_face(&self, r: FaceRef) -> Option<FaceId> {
        match r {
            FaceRef::Existing(f) => self.faces.new_index(f),
            FaceRef::Added(k) => self.faces.added_index(k),
        }
    }

    pub fn resolve_cell(&self, r: CellRef) -> Option<CellId> {
        match r {
            CellRef::Existing(c) => self.cells.new_index(c),
            CellRef::Added(k) => self.cells.added_index(k),
        }
    }

    pub fn has_motion_points(&self) -> bool {
        !self.motion.is_empty()
    }

    /// Whether some motion point is not yet at its target.
    pub fn has_pending_motion(&self) -> bool {
        self.motion.pre_motion != self.motion.target
    }

    pub fn is_identity(&self) -> bool {
        self.points.is_identity() && self.faces.is_identity() && self.cells.is_identity()
    }
}
