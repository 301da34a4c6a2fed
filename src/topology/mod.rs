//! Mesh topology: typed entity handles, the face-addressed polyhedral mesh,
//! structural validation and partition metadata.
//!
//! Most users will build a [`PolyMesh`] (directly or via
//! [`crate::algs::meshgen`]) and query it through face/cell addressing.

pub mod ids;
pub mod mesh;
pub mod partition;
pub mod validation;

pub use ids::{CellId, FaceId, MeshIndex, PatchId, PointId};
pub use mesh::{Face, FaceSide, Patch, PatchKind, Point3, PolyMesh};
pub use partition::{GlobalIndex, Partition};
