use mesh_pyramid::algs::communicator::LocalComm;
use mesh_pyramid::algs::meshgen::split_block;
use mesh_pyramid::algs::renumber::TopoMap;
use mesh_pyramid::algs::rendezvous::{Proposal, RendezvousOptions, coordinate};
use mesh_pyramid::algs::selection::CellLookup;
use mesh_pyramid::config::SplitConfig;
use mesh_pyramid::driver::{MeshStore, RunOutcome, WriteBack, run_partitioned};
use mesh_pyramid::mesh_error::{CoordinationError, PyramidError};
use mesh_pyramid::topology::{PatchId, PolyMesh};

#[derive(Default)]
struct CountingStore {
    writes: usize,
}

impl MeshStore for CountingStore {
    fn write(
        &mut self,
        _mesh: &PolyMesh,
        _map: Option<&TopoMap>,
        _slot: WriteBack,
    ) -> Result<(), PyramidError> {
        self.writes += 1;
        Ok(())
    }
}

fn config() -> SplitConfig {
    let mut cfg = SplitConfig::for_set("interface");
    cfg.rendezvous = RendezvousOptions {
        max_attempts: 400,
        poll_interval_ms: 5,
    };
    cfg
}

#[test]
fn split_next_to_processor_patch_updates_peer() {
    let sides = split_block(2, 1, 1, [1.0; 3], 1).unwrap();
    let selections: [Vec<i64>; 2] = [vec![0], vec![]];
    let handles: Vec<_> = LocalComm::world(2)
        .into_iter()
        .zip(sides)
        .zip(selections)
        .map(|((comm, (mut mesh, mut part)), raw)| {
            std::thread::spawn(move || {
                let mut store = CountingStore::default();
                let selection = CellLookup::from_raw_ids(&raw);
                let outcome = run_partitioned(
                    &comm,
                    &mut mesh,
                    &mut part,
                    Some(&selection),
                    &config(),
                    &mut store,
                );
                (outcome, mesh, part, store.writes)
            })
        })
        .collect();
    let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let (right_outcome, right_mesh, right_part, right_writes) = results.pop().unwrap();
    let (left_outcome, left_mesh, left_part, left_writes) = results.pop().unwrap();

    assert!(left_outcome.unwrap().is_modified());
    assert!(matches!(right_outcome.unwrap(), RunOutcome::NoOp { .. }));
    assert_eq!((left_writes, right_writes), (1, 0));

    assert_eq!(left_mesh.n_cells(), 6);
    assert_eq!(right_mesh.n_cells(), 1);
    assert_eq!(left_part.cells().size(), 7);
    assert_eq!(right_part.cells().offset(1), 6);
    assert_eq!(right_part.points().offset(1), left_mesh.n_points() as u64);

    // rank 1's processor patch sees the pyramid sitting on the shared face
    let left_patch = PatchId::new(1);
    let shared = left_mesh.patch_faces(left_patch).next().unwrap();
    let pyramid = left_mesh.face(shared).owner;
    let expected = left_part.cells().to_global(0, pyramid.index());
    assert_eq!(right_part.remote_cells(PatchId::new(0)), Some(&[expected][..]));
    assert_eq!(left_part.remote_cells(left_patch), Some(&[6u64][..]));
    left_part.check(&left_mesh).unwrap();
    right_part.check(&right_mesh).unwrap();
}

#[test]
fn abort_on_one_rank_stops_all() {
    let [(left, left_part), (right, right_part)] = split_block(2, 1, 1, [1.0; 3], 1).unwrap();
    let mut world = LocalComm::world(2);
    let comm1 = world.pop().unwrap();
    let comm0 = world.pop().unwrap();

    let aborting = std::thread::spawn(move || {
        coordinate(&comm0, &left, &left_part, &Proposal::Abort, &config().rendezvous)
    });

    let mut mesh = right.clone();
    let mut part = right_part.clone();
    let mut store = CountingStore::default();
    let selection = CellLookup::from_raw_ids(&[0]);
    let result = run_partitioned(
        &comm1,
        &mut mesh,
        &mut part,
        Some(&selection),
        &config(),
        &mut store,
    );

    assert_eq!(aborting.join().unwrap(), Err(CoordinationError::LocalAbort));
    assert_eq!(
        result.unwrap_err(),
        PyramidError::Coordination(CoordinationError::PeerAborted { neighbor: 0 })
    );
    assert_eq!(mesh, right);
    assert_eq!(part, right_part);
    assert_eq!(store.writes, 0);
}
