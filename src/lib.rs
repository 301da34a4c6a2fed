#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-pyramid
//!
//! mesh-pyramid splits selected cells of an unstructured polyhedral mesh into
//! pyramids. Each selected cell gets a new apex point at its centroid and is
//! replaced by one pyramid per face, joined by triangular lateral faces.
//!
//! ## Pipeline
//! - [`algs::selection`] validates an externally produced list of cells.
//! - [`algs::pyramid`] turns every selected cell into edit records.
//! - [`algs::ledger`] collects the records; nothing touches the mesh yet.
//! - [`algs::compile`] applies a ledger atomically and returns a
//!   [`algs::renumber::TopoMap`] from old to new entities.
//! - [`algs::mutate`] moves inserted points and carries tables through the map.
//! - [`algs::rendezvous`] agrees on processor boundaries and global numbering
//!   when the mesh is partitioned.
//! - [`driver`] runs the whole chain and hands the result to a
//!   [`driver::MeshStore`].
//!
//! ## Features
//! - `rayon`: plan selected cells in parallel.
//! - `mpi-support`: `MpiComm` backend for the rendezvous.
//! - `check-invariants` / `strict-invariants`: extra structural checks after
//!   every commit.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-pyramid = "0.1"
//! # features = ["mpi-support", "rayon"]
//! ```

pub mod algs;
pub mod config;
pub mod debug_invariants;
pub mod driver;
pub mod geometry;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm, Wait};
    pub use crate::algs::compile::{CommitOptions, commit, compile};
    pub use crate::algs::ledger::{CellRef, EditOp, FaceRef, Ledger, PointRef};
    pub use crate::algs::mutate::{ApexTable, apply_motion};
    pub use crate::algs::pyramid::PyramidPlanner;
    pub use crate::algs::renumber::{Mapped, Origin, Renumbering, TopoMap};
    pub use crate::algs::rendezvous::{Proposal, RendezvousOptions, coordinate};
    pub use crate::algs::selection::{CellLookup, Resolution, SelectionStatus, resolve};
    pub use crate::config::SplitConfig;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::driver::{MeshStore, RunOutcome, WriteBack, run, run_partitioned};
    pub use crate::mesh_error::PyramidError;
    pub use crate::topology::{CellId, FaceId, PatchId, PointId, PolyMesh};
}
