//! Thin façade over intra-process or inter-process (MPI) message passing.
//!
//! Messages are contiguous byte buffers of any length. Receive handles can be
//! polled with [`Wait::try_wait`], which lets the rendezvous bound how long it
//! waits for a peer; [`Wait::wait`] blocks.
//!
//! Backends:
//! - [`NoComm`]: a single rank, for serial runs.
//! - [`LocalComm`]: ranks living in one process (usually one thread each),
//!   connected through a shared mailbox.
//! - `MpiComm` (feature `mpi-support`): one rank per MPI process.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::task::Poll;

/// Message passing between the ranks of one job.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Block until completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;

    /// Check for completion without blocking.
    fn try_wait(&mut self) -> Poll<Option<Vec<u8>>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }

    fn try_wait(&mut self) -> Poll<Option<Vec<u8>>> {
        Poll::Ready(None)
    }
}

/// Single-rank communicator. Nothing is ever sent or received.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: u16) {}
}

// --- LocalComm: ranks within one process ---
type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = Arc<DashMap<Key, VecDeque<Bytes>>>;

/// One rank of an in-process job. Messages between a pair of ranks on one tag
/// are delivered in send order.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Mailbox,
}

impl LocalComm {
    /// Communicators for ranks `0..size`, sharing one mailbox.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let mailbox: Mailbox = Arc::new(DashMap::new());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

pub struct LocalRecv {
    key: Key,
    mailbox: Mailbox,
}

impl Wait for LocalRecv {
    fn wait(mut self) -> Option<Vec<u8>> {
        loop {
            if let Poll::Ready(data) = self.try_wait() {
                return data;
            }
            std::thread::yield_now();
        }
    }

    fn try_wait(&mut self) -> Poll<Option<Vec<u8>>> {
        match self.mailbox.get_mut(&self.key).and_then(|mut q| q.pop_front()) {
            Some(bytes) => Poll::Ready(Some(bytes.to_vec())),
            None => Poll::Pending,
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        self.mailbox
            .entry((self.rank, peer, tag))
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16) -> LocalRecv {
        LocalRecv {
            key: (peer, self.rank, tag),
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Poll, Wait};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, Destination, Source};
    use std::rc::Rc;

    /// One MPI process. Sends complete before `isend` returns; receives are
    /// polled with a tag probe.
    #[derive(Clone)]
    pub struct MpiComm {
        world: Rc<SimpleCommunicator>,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                world: Rc::new(world),
                rank,
                size,
            }
        }
    }

    pub struct MpiRecv {
        world: Rc<SimpleCommunicator>,
        peer: i32,
        tag: i32,
    }

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            let (data, _status) = self
                .world
                .process_at_rank(self.peer)
                .receive_vec_with_tag::<u8>(self.tag);
            Some(data)
        }

        fn try_wait(&mut self) -> Poll<Option<Vec<u8>>> {
            let process = self.world.process_at_rank(self.peer);
            match process.immediate_probe_with_tag(self.tag) {
                Some(_) => {
                    let (data, _status) = process.receive_vec_with_tag::<u8>(self.tag);
                    Poll::Ready(Some(data))
                }
                None => Poll::Pending,
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
        }

        fn irecv(&self, peer: usize, tag: u16) -> MpiRecv {
            MpiRecv {
                world: Rc::clone(&self.world),
                peer: peer as i32,
                tag: i32::from(tag),
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiRecv};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_roundtrip_two_ranks() {
        let mut world = LocalComm::world(2);
        let comm1 = world.pop().unwrap();
        let comm0 = world.pop().unwrap();
        assert_eq!((comm0.rank(), comm1.rank(), comm1.size()), (0, 1, 2));

        let mut pending = comm1.irecv(0, 7);
        assert_eq!(pending.try_wait(), Poll::Pending);

        let sender = std::thread::spawn(move || {
            comm0.isend(1, 7, &[1, 2, 3, 4]);
            comm0.isend(1, 7, &[5]);
        });
        assert_eq!(pending.wait(), Some(vec![1, 2, 3, 4]));
        sender.join().unwrap();
        assert_eq!(comm1.irecv(0, 7).wait(), Some(vec![5]));
    }

    #[test]
    fn tags_and_peers_are_separate() {
        let world = LocalComm::world(3);
        world[0].isend(2, 1, b"a");
        world[1].isend(2, 1, b"b");
        world[0].isend(2, 2, b"c");
        assert_eq!(world[2].irecv(1, 1).wait(), Some(b"b".to_vec()));
        assert_eq!(world[2].irecv(0, 2).wait(), Some(b"c".to_vec()));
        assert_eq!(world[2].irecv(0, 1).wait(), Some(b"a".to_vec()));
        assert_eq!(world[2].irecv(0, 1).try_wait(), Poll::Pending);
    }

    #[test]
    fn no_comm_is_inert() {
        let comm = NoComm;
        assert_eq!((comm.rank(), comm.size()), (0, 1));
        comm.isend(0, 0, &[1]);
        let mut h = comm.irecv(0, 0);
        assert_eq!(h.try_wait(), Poll::Ready(None));
        assert_eq!(h.wait(), None);
    }
}
