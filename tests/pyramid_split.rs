use mesh_pyramid::algs::compile::{CommitOptions, commit};
use mesh_pyramid::algs::ledger::{CellRef, Ledger};
use mesh_pyramid::algs::meshgen::hex_block;
use mesh_pyramid::algs::mutate::map_cell_values;
use mesh_pyramid::algs::pyramid::PyramidPlanner;
use mesh_pyramid::algs::renumber::{Mapped, Origin, TopoMap};
use mesh_pyramid::algs::selection::{CellLookup, SelectionStatus, resolve};
use mesh_pyramid::config::SplitConfig;
use mesh_pyramid::driver::{MeshStore, NoOpReason, RunOutcome, WriteBack, exit_code, run};
use mesh_pyramid::geometry::cell_centres_and_volumes;
use mesh_pyramid::mesh_error::{CommitError, PyramidError};
use mesh_pyramid::topology::{CellId, FaceId, FaceSide, PolyMesh};

#[derive(Default)]
struct MemoryStore {
    saved: Vec<(PolyMesh, WriteBack)>,
}

impl MeshStore for MemoryStore {
    fn write(
        &mut self,
        mesh: &PolyMesh,
        _map: Option<&TopoMap>,
        slot: WriteBack,
    ) -> Result<(), PyramidError> {
        self.saved.push((mesh.clone(), slot));
        Ok(())
    }
}

fn total_volume(mesh: &PolyMesh) -> f64 {
    cell_centres_and_volumes(mesh).1.iter().sum()
}

#[test]
fn single_hex_becomes_six_pyramids() {
    let mut mesh = hex_block(1, 1, 1, [1.0; 3]).unwrap();
    let before = mesh.clone();
    let mut store = MemoryStore::default();
    let selection = CellLookup::from_raw_ids(&[0]);

    let config = SplitConfig::for_set("hex");
    let outcome = run(&mut mesh, Some(&selection), &config, &mut store).unwrap();
    let RunOutcome::Modified { map, apexes, .. } = outcome else {
        panic!("expected an edit");
    };

    assert_eq!(mesh.n_cells(), 6);
    assert_eq!(mesh.n_points(), before.n_points() + 1);
    assert_eq!(mesh.n_faces(), before.n_faces() + 12);
    assert_eq!(mesh.n_internal_faces(), 12);

    let apex = *mesh.points().last().unwrap();
    for (c, expected) in apex.iter().zip([0.5, 0.5, 0.5]) {
        assert!((c - expected).abs() < 1e-12);
    }

    let (_, volumes) = cell_centres_and_volumes(&mesh);
    for v in &volumes {
        assert!(*v > 0.0);
        assert!((v - 1.0 / 6.0).abs() < 1e-12);
    }
    assert!((total_volume(&mesh) - total_volume(&before)).abs() < 1e-12);

    for cell in CellId::range(mesh.n_cells()) {
        assert_eq!(mesh.cell_faces(cell).len(), 5);
        assert_eq!(map.cells.backward(cell), Origin::Added { driver: CellId::new(0) });
    }
    assert_eq!(map.cells.forward(CellId::new(0)), Mapped::Removed);

    // the six hull faces stay boundary faces of their patch, now owned by a pyramid
    for old in FaceId::range(before.n_faces()) {
        let new = map.faces.new_index(old).unwrap();
        let (was, is) = (before.face(old), mesh.face(new));
        let mut got = is.vertices.clone();
        let mut want = was.vertices.clone();
        got.sort_unstable();
        want.sort_unstable();
        assert_eq!(got, want);
        assert_eq!(is.patch, was.patch);
        assert!(is.patch.is_some());
        assert_eq!(is.neighbour, None);
        assert!(matches!(map.cells.backward(is.owner), Origin::Added { .. }));
    }
    assert_eq!(apexes.points().len(), 1);
    assert_eq!(store.saved.len(), 1);
    assert_eq!(store.saved[0].0, mesh);
}

#[test]
fn unresolved_entry_is_a_no_op() {
    let mut mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
    let before = mesh.clone();
    let mut store = MemoryStore::default();
    let selection = CellLookup::from_raw_ids(&[-1, 1]);

    let result = run(&mut mesh, Some(&selection), &SplitConfig::default(), &mut store);
    assert_eq!(exit_code(&result), 0);
    match result.unwrap() {
        RunOutcome::NoOp { reason, failures } => {
            assert_eq!(reason, NoOpReason::RejectedSelection);
            assert_eq!(failures.len(), 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(mesh, before);
    assert!(store.saved.is_empty());

    let empty = run(&mut mesh, Some(&[]), &SplitConfig::default(), &mut store).unwrap();
    assert!(matches!(
        empty,
        RunOutcome::NoOp {
            reason: NoOpReason::EmptySelection,
            ..
        }
    ));
}

#[test]
fn neighbouring_cells_share_their_face() {
    let mut mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
    let before = mesh.clone();
    let shared = before.face(FaceId::new(0)).vertices.clone();
    let selection = CellLookup::from_raw_ids(&[0, 1]);

    let mut store = MemoryStore::default();
    let outcome = run(&mut mesh, Some(&selection), &SplitConfig::default(), &mut store).unwrap();
    assert!(outcome.is_modified());

    assert_eq!(mesh.n_cells(), 12);
    assert_eq!(mesh.n_points(), before.n_points() + 2);
    assert_eq!(mesh.n_faces(), before.n_faces() + 24);
    assert_eq!(mesh.n_internal_faces(), 1 + 24);

    let RunOutcome::Modified { map, .. } = outcome else {
        unreachable!()
    };
    let new_shared = map.faces.new_index(FaceId::new(0)).unwrap();
    let face = mesh.face(new_shared);
    let mut got = face.vertices.clone();
    let mut want = shared;
    got.sort_unstable();
    want.sort_unstable();
    assert_eq!(got, want);
    let neighbour = face.neighbour.unwrap();
    assert_eq!(map.cells.backward(face.owner), Origin::Added { driver: CellId::new(0) });
    assert_eq!(map.cells.backward(neighbour), Origin::Added { driver: CellId::new(1) });

    let (_, volumes) = cell_centres_and_volumes(&mesh);
    assert!(volumes.iter().all(|&v| v > 0.0));
    assert!((total_volume(&mesh) - 2.0).abs() < 1e-12);
}

#[test]
fn failed_commit_leaves_mesh_untouched() {
    let mut mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
    let before = mesh.clone();
    let (centres, _) = cell_centres_and_volumes(&mesh);
    let resolution = resolve(Some(&CellLookup::from_raw_ids(&[0])), &centres);
    assert_eq!(resolution.status, SelectionStatus::Ready);

    let mut planner = PyramidPlanner::new(&mesh);
    planner.set_refinement(&resolution.map).unwrap();
    let (plan, _) = planner.into_parts();

    // a second writer claims the owner side of the face the plan rewires
    let mut ledger = Ledger::new();
    ledger.absorb(plan);
    let extra = ledger.modify_face(
        CellId::new(1),
        FaceId::new(0),
        FaceSide::Owner,
        CellRef::Existing(CellId::new(1)),
    );

    let err = commit(&mut mesh, &ledger, &CommitOptions::default()).unwrap_err();
    match &err {
        CommitError::ConflictingFaceEdit { face, second, .. } => {
            assert_eq!(*face, FaceId::new(0));
            assert_eq!(*second, extra);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(err.records().contains(&extra));

    let wrapped = PyramidError::from(err);
    assert_eq!(wrapped.exit_code(), 2);
    assert_eq!(mesh, before);
}

#[test]
fn cell_fields_follow_their_driver() {
    let mut mesh = hex_block(3, 1, 1, [1.0; 3]).unwrap();
    let selection = CellLookup::from_raw_ids(&[1]);
    let mut store = MemoryStore::default();
    let outcome = run(&mut mesh, Some(&selection), &SplitConfig::default(), &mut store).unwrap();
    let RunOutcome::Modified { map, summary, .. } = outcome else {
        panic!("expected an edit");
    };
    assert_eq!(summary.cells_split, 1);

    let labels = map_cell_values(&["a", "b", "c"], &map.cells).unwrap();
    assert_eq!(labels.len(), 8);
    assert_eq!(&labels[..2], &["a", "c"]);
    assert!(labels[2..].iter().all(|&l| l == "b"));
    assert!(map_cell_values(&["a"], &map.cells).is_err());
}

#[test]
fn config_from_json_drives_the_run() {
    let config: SplitConfig = serde_json::from_str(
        r#"{"set": "refine", "overwrite": true, "commit": {"inflate": true}}"#,
    )
    .unwrap();
    let mut mesh = hex_block(1, 1, 1, [2.0; 3]).unwrap();
    let mut store = MemoryStore::default();
    let selection = CellLookup::from_raw_ids(&[0]);
    run(&mut mesh, Some(&selection), &config, &mut store).unwrap();

    assert_eq!(store.saved[0].1, WriteBack::Overwrite);
    // inflated apex was moved onto its target before write-back
    let apex = *mesh.points().last().unwrap();
    for c in apex {
        assert!((c - 1.0).abs() < 1e-12);
    }
}
