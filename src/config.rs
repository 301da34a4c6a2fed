//! Run configuration.
//!
//! All fields have defaults, so a configuration can be given partially (for
//! instance as JSON) and the rest is filled in.

use crate::algs::compile::CommitOptions;
use crate::algs::rendezvous::RendezvousOptions;
use serde::{Deserialize, Serialize};

/// Options for one split run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Name of the cell selection, used in log messages.
    pub set: Option<String>,
    /// Write the result over the current mesh instead of advancing to a new
    /// slot.
    pub overwrite: bool,
    pub commit: CommitOptions,
    /// Move inserted points to their targets before write-back.
    pub apply_motion: bool,
    pub rendezvous: RendezvousOptions,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            set: None,
            overwrite: false,
            commit: CommitOptions::default(),
            apply_motion: true,
            rendezvous: RendezvousOptions::default(),
        }
    }
}

impl SplitConfig {
    /// Configuration for the named selection.
    pub fn for_set(name: impl Into<String>) -> Self {
        Self {
            set: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn set_name(&self) -> &str {
        self.set.as_deref().unwrap_or("<unnamed>")
    }
}
