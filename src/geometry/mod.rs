//! Geometric measures of polyhedral meshes.

pub mod metrics;

pub use metrics::{cell_centres_and_volumes, face_centre_and_area};
