//! Receive path.
//!
//! Pool buffers are posted to the RX channel ahead of time. The
//! hardware fills them in order and raises an end-of-packet marker on
//! the last buffer of each frame, so a frame reassembles as a run of
//! consecutive completions. On end-of-packet the leading metadata
//! block is parsed and stripped, error counters updated, and the
//! frame handed upstream as borrowed segments before its buffers go
//! back to the pool.

use crate::constants::MAX_RX_SEGMENTS;
use crate::dma::{BufferPool, DmaRxChannel, PacketSink, RxFrame};
use crate::rev::RevData;
use crate::ring::Ring;
use crate::stats::RingStats;

/// In-progress frame reassembly.
#[derive(Debug)]
struct Assembly<H: Copy> {
    handles: [Option<H>; MAX_RX_SEGMENTS],
    lens: [usize; MAX_RX_SEGMENTS],
    nsegs: usize,
    /// A segment was dropped; discard the rest of the frame
    failed: bool,
}

impl<H: Copy> Assembly<H> {
    const fn new() -> Self {
        Self {
            handles: [None; MAX_RX_SEGMENTS],
            lens: [0; MAX_RX_SEGMENTS],
            nsegs: 0,
            failed: false,
        }
    }

    fn push(&mut self, handle: H, len: usize) -> bool {
        if self.nsegs >= MAX_RX_SEGMENTS {
            return false;
        }
        self.handles[self.nsegs] = Some(handle);
        self.lens[self.nsegs] = len;
        self.nsegs += 1;
        true
    }

    fn recycle_into<P: BufferPool<Handle = H>>(&mut self, pool: &mut P) {
        for h in self.handles[..self.nsegs].iter().flatten() {
            pool.recycle(*h);
        }
        *self = Self::new();
    }

    fn release_into<P: BufferPool<Handle = H>>(&mut self, pool: &mut P) {
        for h in self.handles[..self.nsegs].iter().flatten() {
            pool.release(*h);
        }
        *self = Self::new();
    }
}

/// One receive queue over a DMA channel.
#[derive(Debug)]
pub struct RxQueue<H: Copy, const N: usize> {
    ring: Ring,
    slots: [Option<H>; N],
    assembly: Assembly<H>,
    queue_id: u8,
}

impl<H: Copy, const N: usize> RxQueue<H, N> {
    /// Create an empty queue; call [`fill_buffers`](Self::fill_buffers)
    /// before enabling the channel.
    #[must_use]
    pub const fn new(queue_id: u8) -> Self {
        Self {
            ring: Ring::new(N as u32),
            slots: [None; N],
            assembly: Assembly::new(),
            queue_id,
        }
    }

    /// Ring slots without a posted buffer.
    pub fn unused(&self) -> u32 {
        self.ring.unused()
    }

    /// Post up to `count` fresh buffers to the hardware. Allocation or
    /// enqueue failure stops the refill early; the queue keeps running
    /// on what it has.
    pub fn fill_buffers<C, P>(
        &mut self,
        chan: &mut C,
        pool: &mut P,
        mut count: u32,
        stats: &mut RingStats,
    ) where
        C: DmaRxChannel,
        P: BufferPool<Handle = H>,
    {
        let mut rx_w = self.ring.next_to_use();
        while count > 0 {
            count -= 1;
            let idx = rx_w as usize;
            if self.slots[idx].is_some() {
                #[cfg(feature = "defmt")]
                defmt::error!("rx[{}]: slot {} still holds a buffer", self.queue_id, idx);
                break;
            }
            let Some(handle) = pool.alloc() else {
                stats.rx_alloc_errors += 1;
                break;
            };
            if chan.enqueue(pool.dma_addr(handle), pool.buf_size()).is_err() {
                pool.recycle(handle);
                break;
            }
            self.slots[idx] = Some(handle);

            rx_w = if rx_w >= self.ring.count() - 1 { 0 } else { rx_w + 1 };
            if rx_w == self.ring.next_to_clean() {
                break;
            }
        }
        self.ring.set_use(rx_w);
    }

    /// Drain completed buffers, handing at most `budget` of them to
    /// the reassembly machinery. Returns the number consumed.
    pub fn poll<C, P, S>(
        &mut self,
        chan: &mut C,
        pool: &mut P,
        sink: &mut S,
        budget: usize,
        rev: &RevData,
        stats: &mut RingStats,
    ) -> usize
    where
        C: DmaRxChannel,
        P: BufferPool<Handle = H>,
        S: PacketSink,
    {
        let mut rx_r = self.ring.next_to_clean();
        if rx_r == self.ring.next_to_use() {
            return 0;
        }
        let mut work_done = 0usize;
        while let Some(completion) = chan.completed() {
            work_done += 1;
            let idx = rx_r as usize;
            if let Some(handle) = self.slots[idx].take() {
                self.rx_segment(pool, sink, handle, completion.len, completion.end_of_packet, rev, stats);
            }
            rx_r = if rx_r >= self.ring.count() - 1 { 0 } else { rx_r + 1 };
            if work_done >= budget {
                break;
            }
        }
        self.ring.set_clean(rx_r);

        let unused = self.ring.unused();
        if unused > (2 * self.ring.count()) / 3 {
            self.fill_buffers(chan, pool, unused, stats);
        }
        work_done
    }

    fn rx_segment<P, S>(
        &mut self,
        pool: &mut P,
        sink: &mut S,
        handle: H,
        len: usize,
        end_of_packet: bool,
        rev: &RevData,
        stats: &mut RingStats,
    ) where
        P: BufferPool<Handle = H>,
        S: PacketSink,
    {
        if len > pool.buf_size() {
            #[cfg(feature = "defmt")]
            defmt::error!("rx[{}]: completion exceeds buffer size", self.queue_id);
            pool.recycle(handle);
            self.assembly.failed = true;
        } else if self.assembly.failed {
            pool.recycle(handle);
        } else {
            if !rev.cache_shoot_through {
                pool.sync_for_cpu(handle, len);
            }
            if self.assembly.push(handle, len) {
                stats.rx_bytes += len as u64;
            } else {
                stats.rx_alloc_errors += 1;
                pool.recycle(handle);
                self.assembly.failed = true;
            }
        }

        if !end_of_packet {
            return;
        }
        if self.assembly.failed {
            self.assembly.recycle_into(pool);
            return;
        }
        self.deliver(pool, sink, rev, stats);
    }

    fn deliver<P, S>(&mut self, pool: &mut P, sink: &mut S, rev: &RevData, stats: &mut RingStats)
    where
        P: BufferPool<Handle = H>,
        S: PacketSink,
    {
        let hdr_len = rev.rx_header_len();
        let nsegs = self.assembly.nsegs;
        debug_assert!(nsegs > 0);

        let first = self.assembly.handles[0].map(|h| pool.data(h));
        let Some(first) = first else { return };
        let Some(meta) = rev.parse_rx_metadata(&first[..self.assembly.lens[0].min(first.len())])
        else {
            self.assembly.recycle_into(pool);
            return;
        };
        if meta.fcs_error {
            stats.rx_fcs_errors += 1;
        }
        if meta.crc_error {
            stats.rx_crc_errors += 1;
        }
        if meta.mac_error {
            stats.rx_mac_errors += 1;
        }

        let mut segments: [&[u8]; MAX_RX_SEGMENTS] = [&[]; MAX_RX_SEGMENTS];
        let mut total = 0usize;
        for (i, h) in self.assembly.handles[..nsegs].iter().flatten().enumerate() {
            let data = &pool.data(*h)[..self.assembly.lens[i]];
            // Metadata sits at the front of the first segment.
            segments[i] = if i == 0 { &data[hdr_len..] } else { data };
            total += segments[i].len();
        }
        let frame = RxFrame {
            segments: &segments[..nsegs],
            len: total,
            queue: self.queue_id,
            checksum_ok: meta.checksum_ok,
        };
        sink.deliver(&frame);
        stats.rx_packets += 1;
        self.assembly.release_into(pool);
    }

    /// Tear the queue down: flush the channel and hand every posted or
    /// half-assembled buffer back to the pool.
    pub fn release_all<C, P>(&mut self, chan: &mut C, pool: &mut P)
    where
        C: DmaRxChannel,
        P: BufferPool<Handle = H>,
    {
        chan.flush();
        for slot in &mut self.slots {
            if let Some(h) = slot.take() {
                pool.recycle(h);
            }
        }
        self.assembly.recycle_into(pool);
        self.ring.reset();
    }
}

// =============================================================================
// Tests
// =============================================================================
