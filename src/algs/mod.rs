//! Algorithms over polyhedral meshes: generation, edit planning, transactional
//! commit, renumbering and partition coordination.

pub mod communicator;
pub mod compile;
pub mod ledger;
pub mod meshgen;
pub mod mutate;
pub mod pyramid;
pub mod rendezvous;
pub mod renumber;
pub mod selection;
pub mod wire;

pub use compile::{CommitOptions, commit, compile};
pub use pyramid::{PyramidPlanner, plan_cell};
pub use selection::resolve;
