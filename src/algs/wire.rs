//! Fixed, versioned, little-endian wire types for the partition rendezvous.
//!
//! Every message starts with a [`WireHdr`] naming its kind. Records are
//! `Pod` structs with explicit padding; integers are stored pre-LE with
//! `.to_le()` and decoded with `.from_le()`. Received buffers carry no
//! alignment guarantee, so records are read with `pod_read_unaligned`.

use bytemuck::{Pod, Zeroable};
use std::mem::{align_of, size_of};

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// New local sizes and readiness of the sender.
pub const KIND_COUNTS: u16 = 1;
/// Per-face edit intents on one processor patch.
pub const KIND_INTENTS: u16 = 2;
/// Acceptance or rejection of the peer's intents.
pub const KIND_ACK: u16 = 3;

/// Marker for "no apex" in [`WireIntent`].
pub const NO_APEX: u64 = u64::MAX;

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16, // = WIRE_VERSION.to_le()
    pub kind_le: u16,
    pub reserved_le: u32, // keep zero
}

impl WireHdr {
    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32, // count of following records
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// Sender's post-commit local sizes. `status` is 0 when the sender is ready
/// to commit and 1 when it aborts.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCounts {
    pub n_cells_le: u64,
    pub n_points_le: u64,
    pub status_le: u32,
    pub _pad: u32,
}

impl WireCounts {
    pub fn new(n_cells: usize, n_points: usize, abort: bool) -> Self {
        Self {
            n_cells_le: (n_cells as u64).to_le(),
            n_points_le: (n_points as u64).to_le(),
            status_le: u32::from(abort).to_le(),
            _pad: 0,
        }
    }
    pub fn n_cells(&self) -> usize {
        u64::from_le(self.n_cells_le) as usize
    }
    pub fn n_points(&self) -> usize {
        u64::from_le(self.n_points_le) as usize
    }
    pub fn aborted(&self) -> bool {
        u32::from_le(self.status_le) != 0
    }
}

/// What the sender will do to one face of a shared processor patch.
///
/// `owner_global` is the global index of the cell that will sit on the
/// sender's side of the face after the commit. `apex_global` is the global
/// index of the apex of that cell, or [`NO_APEX`].
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireIntent {
    pub patch_face_le: u32,
    pub n_vertices_le: u32,
    pub owner_global_le: u64,
    pub apex_global_le: u64,
    pub touched_le: u32,
    pub _pad: u32,
}

impl WireIntent {
    pub const SIZE: usize = 32; // 2*4 + 2*8 + 2*4

    pub fn new(
        patch_face: usize,
        n_vertices: usize,
        owner_global: u64,
        apex_global: Option<u64>,
        touched: bool,
    ) -> Self {
        Self {
            patch_face_le: (patch_face as u32).to_le(),
            n_vertices_le: (n_vertices as u32).to_le(),
            owner_global_le: owner_global.to_le(),
            apex_global_le: apex_global.unwrap_or(NO_APEX).to_le(),
            touched_le: u32::from(touched).to_le(),
            _pad: 0,
        }
    }
    pub fn patch_face(&self) -> usize {
        u32::from_le(self.patch_face_le) as usize
    }
    pub fn n_vertices(&self) -> usize {
        u32::from_le(self.n_vertices_le) as usize
    }
    pub fn owner_global(&self) -> u64 {
        u64::from_le(self.owner_global_le)
    }
    pub fn apex_global(&self) -> Option<u64> {
        let apex = u64::from_le(self.apex_global_le);
        (apex != NO_APEX).then_some(apex)
    }
    pub fn touched(&self) -> bool {
        u32::from_le(self.touched_le) != 0
    }
}

/// 0 accepts the peer's intents, 1 rejects them.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireAck {
    pub status_le: u32,
    pub _pad: u32,
}

impl WireAck {
    pub fn new(accept: bool) -> Self {
        Self {
            status_le: u32::from(!accept).to_le(),
            _pad: 0,
        }
    }
    pub fn accepted(&self) -> bool {
        u32::from_le(self.status_le) == 0
    }
}

// ===== Compile-time sanity checks =========================================

const _: () = {
    assert!(size_of::<WireHdr>() == 8);
    assert!(size_of::<WireCount>() == 4);
    assert!(size_of::<WireCounts>() == 24);
    assert!(size_of::<WireIntent>() == WireIntent::SIZE);
    assert!(align_of::<WireIntent>() == 8);
    assert!(size_of::<WireAck>() == 8);
};

// ===== Framing ============================================================

fn header(buf: &[u8], kind: u16) -> Result<&[u8], String> {
    let n = size_of::<WireHdr>();
    if buf.len() < n {
        return Err(format!("message of {} bytes has no header", buf.len()));
    }
    let hdr: WireHdr = bytemuck::pod_read_unaligned(&buf[..n]);
    if hdr.version() != WIRE_VERSION {
        return Err(format!(
            "wire version {} (expected {WIRE_VERSION})",
            hdr.version()
        ));
    }
    if hdr.kind() != kind {
        return Err(format!("message kind {} (expected {kind})", hdr.kind()));
    }
    Ok(&buf[n..])
}

fn single<T: Pod>(buf: &[u8], kind: u16) -> Result<T, String> {
    let body = header(buf, kind)?;
    expect_exact_len(body.len(), size_of::<T>())?;
    Ok(bytemuck::pod_read_unaligned(body))
}

pub fn encode_counts(counts: WireCounts) -> Vec<u8> {
    let mut out = bytemuck::bytes_of(&WireHdr::new(KIND_COUNTS)).to_vec();
    out.extend_from_slice(bytemuck::bytes_of(&counts));
    out
}

pub fn decode_counts(buf: &[u8]) -> Result<WireCounts, String> {
    single(buf, KIND_COUNTS)
}

pub fn encode_intents(intents: &[WireIntent]) -> Vec<u8> {
    let mut out = bytemuck::bytes_of(&WireHdr::new(KIND_INTENTS)).to_vec();
    out.extend_from_slice(bytemuck::bytes_of(&WireCount::new(intents.len())));
    out.extend_from_slice(bytemuck::cast_slice(intents));
    out
}

pub fn decode_intents(buf: &[u8]) -> Result<Vec<WireIntent>, String> {
    let body = header(buf, KIND_INTENTS)?;
    let nc = size_of::<WireCount>();
    if body.len() < nc {
        return Err("intent message has no record count".to_string());
    }
    let count: WireCount = bytemuck::pod_read_unaligned(&body[..nc]);
    let records = &body[nc..];
    expect_exact_len(records.len(), count.get() * WireIntent::SIZE)?;
    Ok(records
        .chunks_exact(WireIntent::SIZE)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

pub fn encode_ack(ack: WireAck) -> Vec<u8> {
    let mut out = bytemuck::bytes_of(&WireHdr::new(KIND_ACK)).to_vec();
    out.extend_from_slice(bytemuck::bytes_of(&ack));
    out
}

pub fn decode_ack(buf: &[u8]) -> Result<WireAck, String> {
    single(buf, KIND_ACK)
}
