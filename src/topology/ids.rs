//! Strong, zero-cost index handles for mesh entities.
//!
//! A polyhedral mesh addresses its points, faces, cells and boundary patches
//! by dense zero-based indices. Mixing them up (passing a face index where a
//! cell index is expected) is the classic bug in owner/neighbour code, so each
//! entity kind gets its own `repr(transparent)` newtype around `u32`.
//!
//! This module provides:
//! - `PointId`, `FaceId`, `CellId` and `PatchId`, all `Copy`, ordered, hashable
//!   and serializable.
//! - `Debug` as `CellId(7)` and `Display` as the bare integer.
//! - MPI datatype equivalence with `u32` behind the `mpi-support` feature.

use std::fmt;

/// Dense index handles that can key renumbering tables.
pub trait MeshIndex: Copy + Eq + Ord + fmt::Debug {
    fn index(self) -> usize;
    fn from_index(idx: usize) -> Self;
}

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a raw index.
            #[inline]
            pub const fn new(raw: u32) -> Self {
                $name(raw)
            }

            /// Wraps a `usize` position in a dense array.
            ///
            /// Mesh sizes are bounded by `u32::MAX`; larger positions are a
            /// logic error caught in debug builds.
            #[inline]
            pub fn from_index(idx: usize) -> Self {
                debug_assert!(idx <= u32::MAX as usize, "index {idx} overflows u32");
                $name(idx as u32)
            }

            /// Returns the raw `u32` value.
            #[inline]
            pub const fn get(self) -> u32 {
                self.0
            }

            /// Returns the index as a `usize`, ready for slice access.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Iterate the handles `0..n`.
            pub fn range(n: usize) -> impl Iterator<Item = Self> {
                (0..n).map(Self::from_index)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl MeshIndex for $name {
            #[inline]
            fn index(self) -> usize {
                $name::index(self)
            }
            #[inline]
            fn from_index(idx: usize) -> Self {
                $name::from_index(idx)
            }
        }

        #[cfg(feature = "mpi-support")]
        unsafe impl mpi::datatype::Equivalence for $name {
            type Out = <u32 as mpi::datatype::Equivalence>::Out;

            fn equivalent_datatype() -> Self::Out {
                u32::equivalent_datatype()
            }
        }
    };
}

index_type!(
    /// Index of a mesh point (vertex).
    PointId
);
index_type!(
    /// Index of a face in the canonical face order.
    FaceId
);
index_type!(
    /// Index of a volume cell.
    CellId
);
index_type!(
    /// Index of a boundary patch.
    PatchId
);

#[cfg(test)]
mod layout_tests {
    //! Compile-time assertion that the handles are the size of `u32`.
    use super::*;
    use static_assertions::{assert_eq_align, assert_eq_size};

    assert_eq_size!(PointId, u32);
    assert_eq_size!(FaceId, u32);
    assert_eq_size!(CellId, u32);
    assert_eq_align!(PatchId, u32);
}
