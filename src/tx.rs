//! Transmit path.
//!
//! A packet arrives as up to [`MAX_TX_FRAGS`] pool buffers. Each
//! fragment is mapped for the device and cut into DMA segments whose
//! sizes the egress pipeline accepts, then the scatter-gather job is
//! staged, its header filled, and the job submitted. Completed jobs
//! are reclaimed by comparing the channel's completion counter against
//! each slot's job number.

use core::sync::atomic::{Ordering, fence};

use crate::checksum::{self, CrcMode, IpMode};
use crate::config::LaneConfig;
use crate::constants::{
    MAX_TX_FRAGS, MAX_TX_SEGMENTS, SEG_SIZE, MIN_LAST_SEG_SIZE, MAX_LAST_SEG_SIZE,
    TX_QUIESCE_STEP_US, TX_QUIESCE_TIMEOUT_US,
};
use crate::dma::{BufferPool, DmaAddr, DmaTxChannel, PacketSink, SgEntry};
use crate::error::{DmaError, DmaResult};
use crate::hdr::TxHeader;
use crate::rev::{ChipRev, RevData};
use crate::ring::Ring;
use crate::stats::RingStats;
use embedded_hal::delay::DelayNs;

/// Outcome of a transmit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStatus {
    /// Packet accepted (or dropped as empty); buffers now belong to
    /// the queue
    Sent,
    /// No ring space or mapping failed; buffers stay with the caller
    /// for a later retry
    Busy,
}

/// Checksum state of a packet entering the transmit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxChecksum {
    /// The stack already finished the checksum
    #[default]
    Done,
    /// Transport checksum still missing. Both offsets come from the
    /// stack and drive the software fallback when hardware cannot
    /// finish the job.
    Partial {
        /// Transport header offset from the start of the frame
        start: u16,
        /// Checksum field offset within the transport header
        offset: u16,
    },
}

/// One packet handed to [`TxQueue::transmit`].
#[derive(Debug, Clone, Copy)]
pub struct TxPacket<H: Copy> {
    frags: [Option<(H, usize)>; MAX_TX_FRAGS],
    nfrags: usize,
    len: usize,
    /// Checksum work still owed to this packet
    pub checksum: TxChecksum,
}

impl<H: Copy> TxPacket<H> {
    /// Empty packet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frags: [None; MAX_TX_FRAGS],
            nfrags: 0,
            len: 0,
            checksum: TxChecksum::Done,
        }
    }

    /// Append a fragment. Returns `Err` when the fragment table is
    /// full.
    pub fn push_frag(&mut self, handle: H, len: usize) -> DmaResult<()> {
        if self.nfrags >= MAX_TX_FRAGS {
            return Err(DmaError::TooManySegments);
        }
        self.frags[self.nfrags] = Some((handle, len));
        self.nfrags += 1;
        self.len += len;
        Ok(())
    }

    /// Total packet length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when no fragment carries any data.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn frags(&self) -> impl Iterator<Item = (H, usize)> + '_ {
        self.frags[..self.nfrags].iter().flatten().copied()
    }
}

impl<H: Copy> Default for TxPacket<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight state of one ring slot.
#[derive(Debug, Clone, Copy)]
struct TxSlot<H: Copy> {
    job: u64,
    sg: [SgEntry; MAX_TX_SEGMENTS],
    sg_len: usize,
    len: usize,
    frags: [Option<(H, usize)>; MAX_TX_FRAGS],
    nfrags: usize,
    mapped: [(DmaAddr, usize); MAX_TX_FRAGS],
}

impl<H: Copy> TxSlot<H> {
    const fn empty() -> Self {
        Self {
            job: 0,
            sg: [SgEntry { addr: 0, len: 0 }; MAX_TX_SEGMENTS],
            sg_len: 0,
            len: 0,
            frags: [None; MAX_TX_FRAGS],
            nfrags: 0,
            mapped: [(0, 0); MAX_TX_FRAGS],
        }
    }

    const fn is_empty(&self) -> bool {
        self.sg_len == 0
    }
}

/// Cut one mapped fragment into segments the egress pipeline accepts.
///
/// Segments are [`SEG_SIZE`] bytes except near the end, where the
/// remainder is redistributed so the final segment lands between
/// [`MIN_LAST_SEG_SIZE`] and [`MAX_LAST_SEG_SIZE`]. Fragments that
/// cannot be cut within those bounds are rejected.
fn split_segments(sg: &mut [SgEntry], base: usize, addr: DmaAddr, len: usize) -> DmaResult<usize> {
    let mut offset = 0usize;
    let mut remaining = len;
    let mut i = base;
    loop {
        let seg = if remaining > SEG_SIZE + MIN_LAST_SEG_SIZE {
            SEG_SIZE
        } else if remaining > SEG_SIZE {
            remaining + MAX_LAST_SEG_SIZE - SEG_SIZE
        } else if remaining > MAX_LAST_SEG_SIZE {
            remaining - MAX_LAST_SEG_SIZE + MIN_LAST_SEG_SIZE
        } else {
            remaining
        };
        if seg < MIN_LAST_SEG_SIZE {
            return Err(DmaError::SegmentTooSmall);
        }
        if i >= sg.len() {
            return Err(DmaError::TooManySegments);
        }
        sg[i] = SgEntry {
            addr: addr + offset as u64,
            len: seg as u32,
        };
        offset += seg;
        remaining -= seg;
        i += 1;
        if remaining == 0 {
            return Ok(i - base);
        }
    }
}

/// One transmit queue over a DMA channel.
#[derive(Debug)]
pub struct TxQueue<H: Copy, const N: usize> {
    ring: Ring,
    slots: [TxSlot<H>; N],
    queue_id: u8,
    paused: bool,
}

impl<H: Copy, const N: usize> TxQueue<H, N> {
    /// Create an idle queue.
    #[must_use]
    pub const fn new(queue_id: u8) -> Self {
        Self {
            ring: Ring::new(N as u32),
            slots: [TxSlot::empty(); N],
            queue_id,
            paused: false,
        }
    }

    /// Ring slots still available for submission.
    pub fn unused(&self) -> u32 {
        self.ring.unused()
    }

    /// Queue currently refusing traffic.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Submit one packet.
    ///
    /// On [`TxStatus::Sent`] the fragment buffers belong to the queue
    /// until reclaim releases them. On [`TxStatus::Busy`] all mappings
    /// are undone and the caller keeps the buffers.
    pub fn transmit<C, P, S>(
        &mut self,
        chan: &mut C,
        pool: &mut P,
        sink: &mut S,
        pkt: &TxPacket<H>,
        rev: &RevData,
        cfg: &LaneConfig,
        stats: &mut RingStats,
    ) -> TxStatus
    where
        C: DmaTxChannel,
        P: BufferPool<Handle = H>,
        S: PacketSink,
    {
        if pkt.is_empty() {
            for (h, _) in pkt.frags() {
                pool.recycle(h);
            }
            stats.tx_dropped += 1;
            return TxStatus::Sent;
        }

        if self.ring.unused() == 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!("tx[{}]: ring full", self.queue_id);
            stats.tx_ring_full += 1;
            return TxStatus::Busy;
        }

        let idx = self.ring.next_to_use() as usize;
        let slot = &mut self.slots[idx];
        match Self::map_packet(chan, pool, pkt, slot) {
            Ok(()) => {}
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::error!("tx[{}]: map failed: {}", self.queue_id, _e);
                return TxStatus::Busy;
            }
        }

        let job = match chan.prepare(&slot.sg[..slot.sg_len]) {
            Ok(job) => job,
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::error!("tx[{}]: prepare failed: {}", self.queue_id, _e);
                Self::unmap_slot(chan, slot);
                *slot = TxSlot::empty();
                return TxStatus::Busy;
            }
        };
        slot.job = job;

        Self::fill_header(chan, pool, pkt, slot, rev, cfg);
        // Header and descriptors must be visible before the doorbell.
        fence(Ordering::Release);
        chan.submit(job, slot.sg_len);
        self.ring.advance_use();

        if self.ring.unused() == 0 {
            self.paused = true;
            sink.pause_queue(self.queue_id);
        }
        TxStatus::Sent
    }

    fn map_packet<C, P>(
        chan: &mut C,
        pool: &P,
        pkt: &TxPacket<H>,
        slot: &mut TxSlot<H>,
    ) -> DmaResult<()>
    where
        C: DmaTxChannel,
        P: BufferPool<Handle = H>,
    {
        slot.sg_len = 0;
        slot.len = 0;
        slot.nfrags = 0;
        for (h, len) in pkt.frags() {
            let mapped = match chan.map(pool.dma_addr(h), len) {
                Ok(a) => a,
                Err(e) => {
                    Self::unmap_slot(chan, slot);
                    return Err(e);
                }
            };
            slot.mapped[slot.nfrags] = (mapped, len);
            slot.frags[slot.nfrags] = Some((h, len));
            slot.nfrags += 1;
            match split_segments(&mut slot.sg, slot.sg_len, mapped, len) {
                Ok(n) => slot.sg_len += n,
                Err(e) => {
                    Self::unmap_slot(chan, slot);
                    return Err(e);
                }
            }
            slot.len += len;
        }
        Ok(())
    }

    fn unmap_slot<C: DmaTxChannel>(chan: &mut C, slot: &mut TxSlot<H>) {
        for &(addr, len) in &slot.mapped[..slot.nfrags] {
            chan.unmap(addr, len);
        }
        slot.sg_len = 0;
        slot.len = 0;
        slot.nfrags = 0;
    }

    fn fill_header<C, P>(
        chan: &mut C,
        pool: &mut P,
        pkt: &TxPacket<H>,
        slot: &TxSlot<H>,
        rev: &RevData,
        cfg: &LaneConfig,
    ) where
        C: DmaTxChannel,
        P: BufferPool<Handle = H>,
    {
        let mut hdr = TxHeader::default();
        let first = slot.frags[0].map(|(h, _)| h);
        match rev.revision {
            ChipRev::V1 => {
                if !cfg.header_en {
                    *chan.header_slot(slot.job) = hdr.encode();
                    return;
                }
                hdr.pkt_size = slot.len as u16;
                hdr.lane = cfg.lane;
                hdr.header_en = true;
                hdr.nocx = cfg.nocx_en;
                if let TxChecksum::Partial { start, offset } = pkt.checksum {
                    Self::apply_checksum(pool, first, &mut hdr, start, offset);
                }
            }
            ChipRev::V2 => {
                hdr.pkt_size = slot.len as u16;
                if let TxChecksum::Partial { start, offset } = pkt.checksum {
                    // TODO: no stack observed requesting checksum
                    // assistance on V2 hardware so far; confirm with a
                    // traffic capture and drop this branch if it stays
                    // unused.
                    Self::apply_checksum(pool, first, &mut hdr, start, offset);
                }
            }
        }
        *chan.header_slot(slot.job) = hdr.encode();
    }

    fn apply_checksum<P>(pool: &mut P, first: Option<H>, hdr: &mut TxHeader, start: u16, offset: u16)
    where
        P: BufferPool<Handle = H>,
    {
        let Some(h) = first else { return };
        match checksum::plan_offload(pool.data(h)) {
            Some(plan) => {
                hdr.ip_mode = plan.ip_mode;
                hdr.crc_mode = plan.crc_mode;
                hdr.index = plan.csum_start as u16;
                hdr.udp_tcp_cksum = plan.pseudo_cksum;
            }
            None => {
                hdr.ip_mode = IpMode::None;
                hdr.crc_mode = CrcMode::None;
                // Hardware cannot finish this one; fall back to a
                // full software checksum at the stack's offsets.
                checksum::finish_in_software(
                    pool.data_mut(h),
                    usize::from(start),
                    usize::from(offset),
                );
            }
        }
    }

    /// Release every slot whose job the hardware reports finished,
    /// accounting transmitted bytes and packets. Returns the number of
    /// packets reclaimed.
    pub fn reclaim<C, P, S>(
        &mut self,
        chan: &mut C,
        pool: &mut P,
        sink: &mut S,
        carrier_up: bool,
        stats: &mut RingStats,
    ) -> usize
    where
        C: DmaTxChannel,
        P: BufferPool<Handle = H>,
        S: PacketSink,
    {
        let mut reclaimed = 0usize;
        loop {
            let idx = self.ring.next_to_clean() as usize;
            let completed = chan.completed();
            let slot = self.slots[idx];
            if slot.is_empty() {
                break;
            }
            if slot.job + slot.sg_len as u64 > completed {
                break;
            }
            if self.ring.unused() == self.ring.count() - 1 {
                break;
            }

            let mut owned = self.slots[idx];
            Self::unmap_slot(chan, &mut owned);
            for (h, _) in self.slots[idx].frags[..self.slots[idx].nfrags]
                .iter()
                .flatten()
            {
                pool.release(*h);
            }
            stats.tx_packets += 1;
            stats.tx_bytes += slot.len as u64;
            self.slots[idx] = TxSlot::empty();
            self.ring.advance_clean();
            reclaimed += 1;
        }

        if carrier_up && self.paused && self.ring.unused() > MAX_TX_SEGMENTS as u32 {
            self.paused = false;
            sink.resume_queue(self.queue_id);
        }
        reclaimed
    }

    /// Wait for in-flight jobs to finish, then pause the queue and
    /// reset the ring. Returns `false` when the wait timed out with
    /// jobs still pending.
    pub fn quiesce<C, S, D>(&mut self, chan: &mut C, sink: &mut S, delay: &mut D) -> bool
    where
        C: DmaTxChannel,
        S: PacketSink,
        D: DelayNs,
    {
        if !self.paused {
            self.paused = true;
            sink.pause_queue(self.queue_id);
        }
        let mut waited = 0u32;
        let drained = loop {
            if self.pending_jobs(chan) == 0 {
                break true;
            }
            if waited >= TX_QUIESCE_TIMEOUT_US {
                #[cfg(feature = "defmt")]
                defmt::warn!("tx[{}]: quiesce timed out", self.queue_id);
                break false;
            }
            delay.delay_us(TX_QUIESCE_STEP_US);
            waited += TX_QUIESCE_STEP_US;
        };
        self.ring.reset();
        drained
    }

    fn pending_jobs<C: DmaTxChannel>(&self, chan: &C) -> usize {
        let completed = chan.completed();
        self.slots
            .iter()
            .filter(|s| !s.is_empty() && s.job + s.sg_len as u64 > completed)
            .count()
    }

    /// Drop all slot state and release buffers without touching the
    /// hardware. Used on teardown after the channel is stopped.
    pub fn release_all<C, P>(&mut self, chan: &mut C, pool: &mut P)
    where
        C: DmaTxChannel,
        P: BufferPool<Handle = H>,
    {
        for i in 0..N {
            if self.slots[i].is_empty() {
                continue;
            }
            let mut owned = self.slots[i];
            Self::unmap_slot(chan, &mut owned);
            for (h, _) in self.slots[i].frags[..self.slots[i].nfrags].iter().flatten() {
                pool.release(*h);
            }
            self.slots[i] = TxSlot::empty();
        }
        self.ring.reset();
        self.paused = false;
    }
}

// =============================================================================
// Tests
// =============================================================================
