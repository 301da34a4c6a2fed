//! End-to-end split runs.
//!
//! [`run`] takes a mesh and an externally resolved selection through the whole
//! pipeline: resolve, plan, commit, move points and hand the result to a
//! [`MeshStore`]. [`run_partitioned`] does the same on one rank of a
//! distributed mesh, agreeing with the other ranks before anything is
//! installed.
//!
//! The in-memory mesh is replaced only after the store accepted the result.

use crate::algs::communicator::Communicator;
use crate::algs::compile::compile;
use crate::algs::ledger::Ledger;
use crate::algs::mutate::{ApexTable, apply_motion};
use crate::algs::pyramid::PyramidPlanner;
use crate::algs::renumber::TopoMap;
use crate::algs::rendezvous::{Proposal, coordinate};
use crate::algs::selection::{CellLookup, Resolution, SelectionStatus, resolve};
use crate::config::SplitConfig;
use crate::geometry::metrics::cell_centres_and_volumes;
use crate::mesh_error::{PyramidError, SelectionError};
use crate::topology::mesh::PolyMesh;
use crate::topology::partition::Partition;

/// Where the edited mesh is written.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WriteBack {
    /// A new time slot after the current one.
    Advance,
    /// Over the current slot.
    Overwrite,
}

/// External persistence of meshes.
pub trait MeshStore {
    fn write(
        &mut self,
        mesh: &PolyMesh,
        map: Option<&TopoMap>,
        slot: WriteBack,
    ) -> Result<(), PyramidError>;
}

/// Why nothing was edited.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoOpReason {
    /// No selection was given.
    MissingSelection,
    /// The selection names no cell.
    EmptySelection,
    /// Some selected cell was rejected.
    RejectedSelection,
}

/// Entity counts of a committed edit.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cells_split: usize,
    pub cells_added: usize,
    pub faces_added: usize,
    pub points_added: usize,
}

impl RunSummary {
    fn of(map: &TopoMap) -> Self {
        Self {
            cells_split: map.cells.n_removed(),
            cells_added: map.cells.added().len(),
            faces_added: map.faces.added().len(),
            points_added: map.points.added().len(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum RunOutcome {
    NoOp {
        reason: NoOpReason,
        failures: Vec<SelectionError>,
    },
    Modified {
        summary: RunSummary,
        map: TopoMap,
        apexes: ApexTable,
    },
}

impl RunOutcome {
    pub fn is_modified(&self) -> bool {
        matches!(self, RunOutcome::Modified { .. })
    }
}

/// Process exit status for a run: 0 on success, including no-op runs.
pub fn exit_code(result: &Result<RunOutcome, PyramidError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    }
}

fn no_op(resolution: Resolution) -> RunOutcome {
    let reason = match resolution.status {
        SelectionStatus::Missing => NoOpReason::MissingSelection,
        SelectionStatus::Rejected => NoOpReason::RejectedSelection,
        SelectionStatus::Empty | SelectionStatus::Ready => NoOpReason::EmptySelection,
    };
    RunOutcome::NoOp {
        reason,
        failures: resolution.failures,
    }
}

fn slot(config: &SplitConfig) -> WriteBack {
    if config.overwrite {
        WriteBack::Overwrite
    } else {
        WriteBack::Advance
    }
}

fn select(mesh: &PolyMesh, selection: Option<&[CellLookup]>) -> Resolution {
    let (centres, _) = cell_centres_and_volumes(mesh);
    resolve(selection, &centres)
}

/// Plan and compile the split of every resolved cell.
fn stage(
    mesh: &PolyMesh,
    resolution: &Resolution,
    config: &SplitConfig,
) -> Result<(PolyMesh, TopoMap, ApexTable), PyramidError> {
    let mut planner = PyramidPlanner::new(mesh);
    planner.set_refinement(&resolution.map)?;
    let (ledger, planned): (Ledger, _) = planner.into_parts();
    let (mut compiled, map) = compile(mesh, &ledger, &config.commit)?;
    let apexes = ApexTable::translate(&planned, &map);
    if config.apply_motion && map.has_pending_motion() {
        apply_motion(&mut compiled, &map)?;
    }
    Ok((compiled, map, apexes))
}

/// Split the selected cells of a serial mesh.
pub fn run<S: MeshStore>(
    mesh: &mut PolyMesh,
    selection: Option<&[CellLookup]>,
    config: &SplitConfig,
    store: &mut S,
) -> Result<RunOutcome, PyramidError> {
    let resolution = select(mesh, selection);
    if !resolution.is_ready() {
        return Ok(no_op(resolution));
    }
    log::info!(
        "splitting {} cells of set {}",
        resolution.map.len(),
        config.set_name()
    );

    let (compiled, map, apexes) = stage(mesh, &resolution, config)?;
    let slot = slot(config);
    log::info!(
        "writing mesh with {} cells ({:?})",
        compiled.n_cells(),
        slot
    );
    store.write(&compiled, Some(&map), slot)?;
    *mesh = compiled;

    Ok(RunOutcome::Modified {
        summary: RunSummary::of(&map),
        map,
        apexes,
    })
}

/// Split the selected cells of this rank's part of a distributed mesh.
///
/// Every rank must call this together. A rank whose selection is empty or
/// rejected edits nothing but still renumbers. A planning or commit failure
/// on any rank aborts all of them.
pub fn run_partitioned<C: Communicator, S: MeshStore>(
    comm: &C,
    mesh: &mut PolyMesh,
    partition: &mut Partition,
    selection: Option<&[CellLookup]>,
    config: &SplitConfig,
    store: &mut S,
) -> Result<RunOutcome, PyramidError> {
    let resolution = select(mesh, selection);
    let (proposal, local_error) = if resolution.is_ready() {
        log::info!(
            "rank {}: splitting {} cells of set {}",
            comm.rank(),
            resolution.map.len(),
            config.set_name()
        );
        match stage(mesh, &resolution, config) {
            Ok((compiled, map, apexes)) => (
                Proposal::Commit {
                    mesh: compiled,
                    map,
                    apexes,
                },
                None,
            ),
            Err(e) => {
                log::error!("rank {}: {e}", comm.rank());
                (Proposal::Abort, Some(e))
            }
        }
    } else {
        (Proposal::Unchanged, None)
    };

    let agreed = coordinate(comm, mesh, partition, &proposal, &config.rendezvous);
    if let Some(e) = local_error {
        return Err(e);
    }
    let agreed = agreed?;

    match proposal {
        Proposal::Commit {
            mesh: compiled,
            map,
            apexes,
        } => {
            let slot = slot(config);
            log::info!(
                "rank {}: writing mesh with {} cells ({:?})",
                comm.rank(),
                compiled.n_cells(),
                slot
            );
            store.write(&compiled, Some(&map), slot)?;
            *mesh = compiled;
            *partition = agreed;
            Ok(RunOutcome::Modified {
                summary: RunSummary::of(&map),
                map,
                apexes,
            })
        }
        Proposal::Unchanged | Proposal::Abort => {
            *partition = agreed;
            Ok(no_op(resolution))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::meshgen::hex_block;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<(usize, WriteBack)>,
    }

    impl MeshStore for Recorder {
        fn write(
            &mut self,
            mesh: &PolyMesh,
            _map: Option<&TopoMap>,
            slot: WriteBack,
        ) -> Result<(), PyramidError> {
            self.writes.push((mesh.n_cells(), slot));
            Ok(())
        }
    }

    struct Broken;

    impl MeshStore for Broken {
        fn write(
            &mut self,
            _: &PolyMesh,
            _: Option<&TopoMap>,
            _: WriteBack,
        ) -> Result<(), PyramidError> {
            Err(PyramidError::Store("disk full".to_string()))
        }
    }

    #[test]
    fn splits_and_writes() {
        let mut mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
        let mut store = Recorder::default();
        let sel = CellLookup::from_raw_ids(&[1]);
        let result = run(&mut mesh, Some(&sel), &SplitConfig::for_set("one"), &mut store);
        assert_eq!(exit_code(&result), 0);
        match result.unwrap() {
            RunOutcome::Modified { summary, apexes, .. } => {
                assert_eq!(
                    summary,
                    RunSummary {
                        cells_split: 1,
                        cells_added: 6,
                        faces_added: 12,
                        points_added: 1
                    }
                );
                assert_eq!(apexes.len(), 6);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(mesh.n_cells(), 7);
        assert_eq!(store.writes, vec![(7, WriteBack::Advance)]);
    }

    #[test]
    fn rejected_selection_is_clean_no_op() {
        let mut mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
        let before = mesh.clone();
        let mut store = Recorder::default();
        let sel = CellLookup::from_raw_ids(&[-1, 0]);
        let result = run(&mut mesh, Some(&sel), &SplitConfig::default(), &mut store);
        assert_eq!(exit_code(&result), 0);
        assert!(matches!(
            result.unwrap(),
            RunOutcome::NoOp {
                reason: NoOpReason::RejectedSelection,
                ..
            }
        ));
        assert_eq!(mesh, before);
        assert!(store.writes.is_empty());

        let missing = run(&mut mesh, None, &SplitConfig::default(), &mut store).unwrap();
        assert!(matches!(
            missing,
            RunOutcome::NoOp {
                reason: NoOpReason::MissingSelection,
                ..
            }
        ));
    }

    #[test]
    fn failed_write_keeps_mesh() {
        let mut mesh = hex_block(1, 1, 1, [1.0; 3]).unwrap();
        let before = mesh.clone();
        let sel = CellLookup::from_raw_ids(&[0]);
        let mut cfg = SplitConfig::default();
        cfg.overwrite = true;
        let result = run(&mut mesh, Some(&sel), &cfg, &mut Broken);
        assert_eq!(exit_code(&result), 1);
        assert_eq!(mesh, before);
    }
}
