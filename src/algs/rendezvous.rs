//! Agreement between partitions before a distributed commit.
//!
//! Every rank compiles its own edit first, then calls [`coordinate`] with the
//! result. The exchange runs in three stages:
//!
//! 1. **Counts** (all ranks): new local cell and point counts plus an abort
//!    flag. Every rank derives the same new global numbering from them; a
//!    single abort stops all ranks.
//! 2. **Intents** (processor-patch neighbours): for every shared face, in
//!    patch order, the global index of the cell that will sit on the sender's
//!    side and, for split cells, of its apex. The receiver checks the faces
//!    line up with its own patch.
//! 3. **Verdict** (all ranks): accept or reject. A rejection anywhere aborts
//!    every rank.
//!
//! Pairs exchange in a fixed order (the lower rank sends first), so the
//! protocol also works over blocking sends. Receives are polled
//! `max_attempts` times, `poll_interval_ms` apart, before giving up with
//! [`CoordinationError::Timeout`].

use crate::algs::communicator::{Communicator, Wait};
use crate::algs::mutate::ApexTable;
use crate::algs::renumber::{Origin, TopoMap};
use crate::algs::wire::{self, WireAck, WireCounts, WireIntent};
use crate::mesh_error::CoordinationError;
use crate::topology::ids::PatchId;
use crate::topology::mesh::PolyMesh;
use crate::topology::partition::{GlobalIndex, Partition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::task::Poll;
use std::time::Duration;

const TAG_COUNTS: u16 = 0x50;
const TAG_INTENTS: u16 = 0x51;
const TAG_VERDICT: u16 = 0x52;

/// Timeout policy for the exchange.
///
/// A receive gives up after `max_attempts * poll_interval_ms`. The first
/// receive waits for peers that are still planning and compiling their own
/// edit, so the budget must cover the slowest rank's local work, not just the
/// message latency. The default allows two minutes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendezvousOptions {
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
}

impl RendezvousOptions {
    /// Longest a single receive waits before reporting a timeout.
    pub fn budget(&self) -> Duration {
        let attempts = u64::from(self.max_attempts.max(1));
        Duration::from_millis(self.poll_interval_ms.saturating_mul(attempts))
    }
}

impl Default for RendezvousOptions {
    fn default() -> Self {
        Self {
            max_attempts: 12_000,
            poll_interval_ms: 10,
        }
    }
}

/// What this rank intends to install.
#[derive(Clone, Debug)]
pub enum Proposal {
    /// A compiled edit, not yet installed.
    Commit {
        mesh: PolyMesh,
        map: TopoMap,
        apexes: ApexTable,
    },
    /// No local edit; the rank still takes part in renumbering.
    Unchanged,
    /// The local transaction failed.
    Abort,
}

impl Proposal {
    fn aborted(&self) -> bool {
        matches!(self, Proposal::Abort)
    }
}

/// Agree on the post-commit partition with every other rank.
///
/// `mesh` and `partition` describe the current (pre-commit) state. On success
/// the returned partition matches the proposed mesh on every rank; on error
/// every rank fails and nothing should be installed.
pub fn coordinate<C: Communicator>(
    comm: &C,
    mesh: &PolyMesh,
    partition: &Partition,
    proposal: &Proposal,
    options: &RendezvousOptions,
) -> Result<Partition, CoordinationError> {
    let rank = comm.rank();
    if comm.size() != partition.n_ranks() || rank != partition.rank() {
        return Err(CoordinationError::Comm {
            neighbor: rank,
            message: format!(
                "communicator is rank {rank} of {}, partition is rank {} of {}",
                comm.size(),
                partition.rank(),
                partition.n_ranks()
            ),
        });
    }
    let peers: Vec<usize> = (0..comm.size()).filter(|&r| r != rank).collect();

    // 1. counts
    let (new_mesh, map, apexes) = match proposal {
        Proposal::Commit { mesh, map, apexes } => (mesh, Some(map), Some(apexes)),
        Proposal::Unchanged | Proposal::Abort => (mesh, None, None),
    };
    let mine = WireCounts::new(new_mesh.n_cells(), new_mesh.n_points(), proposal.aborted());
    let mut cell_counts = vec![0usize; comm.size()];
    let mut point_counts = vec![0usize; comm.size()];
    cell_counts[rank] = new_mesh.n_cells();
    point_counts[rank] = new_mesh.n_points();
    let mut aborted_peer = None;
    let msg = wire::encode_counts(mine);
    for &peer in &peers {
        let reply = exchange(comm, peer, TAG_COUNTS, &msg, options)?;
        let counts = wire::decode_counts(&reply).map_err(|message| CoordinationError::Wire {
            neighbor: peer,
            message,
        })?;
        if counts.aborted() && aborted_peer.is_none() {
            aborted_peer = Some(peer);
        }
        cell_counts[peer] = counts.n_cells();
        point_counts[peer] = counts.n_points();
    }
    if proposal.aborted() {
        log::error!("rank {rank}: local transaction aborted, notified {} peers", peers.len());
        return Err(CoordinationError::LocalAbort);
    }
    if let Some(neighbor) = aborted_peer {
        log::error!("rank {rank}: rank {neighbor} aborted, abandoning commit");
        return Err(CoordinationError::PeerAborted { neighbor });
    }
    let cells = GlobalIndex::from_counts(&cell_counts);
    let points = GlobalIndex::from_counts(&point_counts);

    // 2. intents
    let mut remote_cells: BTreeMap<PatchId, Vec<u64>> = BTreeMap::new();
    let mut rejection = None;
    let mut touched = 0usize;
    for (patch, peer) in Partition::processor_patches(new_mesh) {
        if peer >= comm.size() {
            rejection = rejection.or(Some(CoordinationError::UnknownNeighbor { neighbor: peer }));
            continue;
        }
        let intents = build_intents(new_mesh, patch, rank, &cells, &points, map, apexes);
        touched += intents.iter().filter(|i| i.touched()).count();
        let reply = exchange(comm, peer, TAG_INTENTS, &wire::encode_intents(&intents), options)?;
        let theirs = wire::decode_intents(&reply).map_err(|message| CoordinationError::Wire {
            neighbor: peer,
            message,
        })?;
        match check_intents(new_mesh, patch, peer, &cells, &points, &theirs) {
            Ok(remote) => {
                remote_cells.insert(patch, remote);
            }
            Err(e) => {
                log::error!("rank {rank}: {e}");
                rejection = rejection.or(Some(e));
            }
        }
    }

    // 3. verdict
    let msg = wire::encode_ack(WireAck::new(rejection.is_none()));
    let mut rejected_by = None;
    for &peer in &peers {
        let reply = exchange(comm, peer, TAG_VERDICT, &msg, options)?;
        let ack = wire::decode_ack(&reply).map_err(|message| CoordinationError::Wire {
            neighbor: peer,
            message,
        })?;
        if !ack.accepted() && rejected_by.is_none() {
            rejected_by = Some(peer);
        }
    }
    if let Some(e) = rejection {
        return Err(e);
    }
    if let Some(neighbor) = rejected_by {
        log::error!("rank {rank}: rank {neighbor} rejected the boundary edit");
        return Err(CoordinationError::PeerRejected { neighbor });
    }

    log::debug!(
        "rank {rank}: agreed on {} cells / {} points globally, {touched} shared faces edited here",
        cells.size(),
        points.size()
    );
    Ok(Partition::new(rank, cells, points, remote_cells))
}

fn build_intents(
    mesh: &PolyMesh,
    patch: PatchId,
    rank: usize,
    cells: &GlobalIndex,
    points: &GlobalIndex,
    map: Option<&TopoMap>,
    apexes: Option<&ApexTable>,
) -> Vec<WireIntent> {
    mesh.patch_faces(patch)
        .enumerate()
        .map(|(k, fid)| {
            let face = mesh.face(fid);
            let owner = face.owner;
            let touched =
                map.is_some_and(|m| matches!(m.cells.backward(owner), Origin::Added { .. }));
            let apex = apexes
                .and_then(|a| a.get(owner))
                .map(|p| points.to_global(rank, p.index()));
            WireIntent::new(
                k,
                face.vertices.len(),
                cells.to_global(rank, owner.index()),
                apex,
                touched,
            )
        })
        .collect()
}

/// Match the peer's intents against the local side of `patch` and return the
/// peer's cell behind every face.
fn check_intents(
    mesh: &PolyMesh,
    patch: PatchId,
    peer: usize,
    cells: &GlobalIndex,
    points: &GlobalIndex,
    theirs: &[WireIntent],
) -> Result<Vec<u64>, CoordinationError> {
    let range = mesh.patch_range(patch);
    if theirs.len() != range.len() {
        return Err(CoordinationError::FaceCountMismatch {
            patch,
            neighbor: peer,
            expected: range.len(),
            found: theirs.len(),
        });
    }
    mesh.patch_faces(patch)
        .zip(theirs)
        .enumerate()
        .map(|(k, (fid, intent))| {
            if intent.patch_face() != k || intent.n_vertices() != mesh.face(fid).vertices.len() {
                return Err(CoordinationError::FaceMismatch {
                    patch,
                    patch_face: k,
                    neighbor: peer,
                });
            }
            let inconsistent = |reason| CoordinationError::InconsistentIntent {
                patch,
                patch_face: k,
                neighbor: peer,
                reason,
            };
            if cells.to_local(peer, intent.owner_global()).is_none() {
                return Err(inconsistent("cell outside the sender's range"));
            }
            match (intent.touched(), intent.apex_global()) {
                (true, None) => return Err(inconsistent("split cell without apex")),
                (false, Some(_)) => return Err(inconsistent("apex on an unsplit cell")),
                (true, Some(apex)) if points.to_local(peer, apex).is_none() => {
                    return Err(inconsistent("apex outside the sender's range"));
                }
                _ => {}
            }
            Ok(intent.owner_global())
        })
        .collect()
}

/// Swap one message with `peer`; the lower rank sends first.
fn exchange<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: u16,
    out: &[u8],
    options: &RendezvousOptions,
) -> Result<Vec<u8>, CoordinationError> {
    if comm.rank() < peer {
        comm.isend(peer, tag, out).wait();
        recv_within(comm, peer, tag, options)
    } else {
        let data = recv_within(comm, peer, tag, options)?;
        comm.isend(peer, tag, out).wait();
        Ok(data)
    }
}

fn recv_within<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: u16,
    options: &RendezvousOptions,
) -> Result<Vec<u8>, CoordinationError> {
    let mut handle = comm.irecv(peer, tag);
    let attempts = options.max_attempts.max(1);
    for attempt in 1..=attempts {
        match handle.try_wait() {
            Poll::Ready(Some(data)) => return Ok(data),
            Poll::Ready(None) => {
                return Err(CoordinationError::Comm {
                    neighbor: peer,
                    message: "receive completed without data".to_string(),
                });
            }
            Poll::Pending if attempt < attempts => {
                std::thread::sleep(Duration::from_millis(options.poll_interval_ms));
            }
            Poll::Pending => {}
        }
    }
    log::error!(
        "rank {}: no message from rank {peer} (tag {tag:#x}) after {attempts} attempts",
        comm.rank()
    );
    Err(CoordinationError::Timeout {
        neighbor: peer,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};
    use crate::algs::meshgen::{hex_block, split_block};

    fn quick() -> RendezvousOptions {
        RendezvousOptions {
            max_attempts: 400,
            poll_interval_ms: 5,
        }
    }

    #[test]
    fn serial_is_trivial() {
        let mesh = hex_block(2, 1, 1, [1.0; 3]).unwrap();
        let part = Partition::serial(&mesh);
        let out = coordinate(&NoComm, &mesh, &part, &Proposal::Unchanged, &quick()).unwrap();
        assert_eq!(out, part);
        assert_eq!(
            coordinate(&NoComm, &mesh, &part, &Proposal::Abort, &quick()),
            Err(CoordinationError::LocalAbort)
        );
    }

    #[test]
    fn unchanged_pair_agrees() {
        let sides = split_block(3, 2, 1, [1.0; 3], 1).unwrap();
        let handles: Vec<_> = LocalComm::world(2)
            .into_iter()
            .zip(sides)
            .map(|(comm, (mesh, part))| {
                std::thread::spawn(move || {
                    coordinate(&comm, &mesh, &part, &Proposal::Unchanged, &quick())
                        .map(|p| (p, part))
                })
            })
            .collect();
        for h in handles {
            let (after, before) = h.join().unwrap().unwrap();
            assert_eq!(after, before);
        }
    }

    #[test]
    fn silent_peer_times_out() {
        let [(mesh, part), _] = split_block(2, 1, 1, [1.0; 3], 1).unwrap();
        let mut world = LocalComm::world(2);
        let comm0 = world.remove(0);
        let options = RendezvousOptions {
            max_attempts: 3,
            poll_interval_ms: 1,
        };
        assert_eq!(
            coordinate(&comm0, &mesh, &part, &Proposal::Unchanged, &options),
            Err(CoordinationError::Timeout {
                neighbor: 1,
                attempts: 3
            })
        );
    }

    #[test]
    fn default_budget_covers_slow_peers() {
        let options = RendezvousOptions::default();
        assert!(options.budget() >= Duration::from_secs(60));
        assert_eq!(quick().budget(), Duration::from_secs(2));
    }

    #[test]
    fn inconsistent_intents_rejected() {
        let [(left, _), (right, _)] = split_block(2, 1, 1, [1.0; 3], 1).unwrap();
        let cells = GlobalIndex::from_counts(&[left.n_cells(), right.n_cells()]);
        let points = GlobalIndex::from_counts(&[left.n_points(), right.n_points()]);
        let patch = PatchId::new(1);
        let peer_cell = cells.to_global(1, 0);
        let peer_point = points.to_global(1, 0);
        let check = |intent: WireIntent| check_intents(&left, patch, 1, &cells, &points, &[intent]);

        assert_eq!(
            check(WireIntent::new(0, 4, peer_cell, None, false)),
            Ok(vec![peer_cell])
        );
        assert_eq!(
            check(WireIntent::new(0, 4, peer_cell, Some(peer_point), true)),
            Ok(vec![peer_cell])
        );

        let bad = [
            WireIntent::new(0, 4, peer_cell, None, true),
            WireIntent::new(0, 4, peer_cell, Some(peer_point), false),
            // apex numbered in the receiver's range
            WireIntent::new(0, 4, peer_cell, Some(0), true),
            // owner numbered in the receiver's range
            WireIntent::new(0, 4, 0, None, false),
        ];
        for intent in bad {
            assert!(matches!(
                check(intent),
                Err(CoordinationError::InconsistentIntent {
                    patch_face: 0,
                    neighbor: 1,
                    ..
                })
            ));
        }
    }

    #[test]
    fn mismatched_patch_rejected() {
        let [(left, lpart), _] = split_block(2, 2, 1, [1.0; 3], 1).unwrap();
        let [_, (right, rpart)] = split_block(2, 1, 1, [1.0; 3], 1).unwrap();
        // right side has one shared face, left side two
        let mut world = LocalComm::world(2);
        let comm1 = world.pop().unwrap();
        let comm0 = world.pop().unwrap();
        let t = std::thread::spawn(move || {
            coordinate(&comm1, &right, &rpart, &Proposal::Unchanged, &quick())
        });
        let left_result = coordinate(&comm0, &left, &lpart, &Proposal::Unchanged, &quick());
        let right_result = t.join().unwrap();
        assert!(matches!(
            left_result,
            Err(CoordinationError::FaceCountMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
        assert!(matches!(
            right_result,
            Err(CoordinationError::FaceCountMismatch {
                expected: 1,
                found: 2,
                ..
            })
        ));
    }
}
