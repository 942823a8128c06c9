//! Hardware seams for the datapath.
//!
//! The driver core never touches DMA registers or memory directly.
//! Everything hardware-specific sits behind the traits here: a TX
//! channel that accepts scatter-gather jobs, an RX channel that
//! reports completed buffers, a buffer pool that owns receive memory,
//! and a packet sink standing in for the upstream network stack.

use crate::constants::TX_HEADER_SIZE;
use crate::error::DmaResult;

/// Bus address as seen by the DMA engine.
pub type DmaAddr = u64;

/// One scatter-gather entry of a transmit job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SgEntry {
    /// Mapped bus address of the segment
    pub addr: DmaAddr,
    /// Segment length in bytes
    pub len: u32,
}

/// A buffer that completed on the RX channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxCompletion {
    /// Bus address the buffer was enqueued with
    pub addr: DmaAddr,
    /// Bytes the hardware wrote into the buffer
    pub len: usize,
    /// This buffer ends a packet
    pub end_of_packet: bool,
}

// =============================================================================
// Channels
// =============================================================================

/// Transmit side of one DMA queue.
///
/// Jobs are identified by a monotonically increasing 64-bit counter;
/// `completed` reports the counter value up to which the hardware has
/// finished, so the reclaim path can compare `job + segments` against
/// it without worrying about wraparound.
pub trait DmaTxChannel {
    /// Map a CPU buffer for device reads. Returns the bus address.
    fn map(&mut self, addr: DmaAddr, len: usize) -> DmaResult<DmaAddr>;

    /// Undo a previous [`map`](Self::map).
    fn unmap(&mut self, addr: DmaAddr, len: usize);

    /// Stage a scatter-gather job. Returns the job number assigned to
    /// its first segment.
    fn prepare(&mut self, entries: &[SgEntry]) -> DmaResult<u64>;

    /// Scratch space for the 16-byte job header of `job`, written
    /// before [`submit`](Self::submit).
    fn header_slot(&mut self, job: u64) -> &mut [u8; TX_HEADER_SIZE];

    /// Hand a staged job to the hardware.
    fn submit(&mut self, job: u64, segments: usize);

    /// Job counter value up to which transmission has finished.
    fn completed(&self) -> u64;
}

/// Receive side of one DMA queue.
pub trait DmaRxChannel {
    /// Post a buffer for the hardware to fill.
    fn enqueue(&mut self, addr: DmaAddr, size: usize) -> DmaResult<()>;

    /// Next completed buffer, in FIFO order, if any.
    fn completed(&mut self) -> Option<RxCompletion>;

    /// Discard all posted buffers. Used on teardown; buffers come back
    /// through the owning queue's slot table, not through
    /// [`completed`](Self::completed).
    fn flush(&mut self);
}

// =============================================================================
// Buffer pool
// =============================================================================

/// Receive buffer allocator.
///
/// Handles are small copyable tokens; the pool keeps the backing
/// memory alive until [`release`](Self::release). `recycle` returns a
/// buffer to the free list without a device sync, for buffers the
/// hardware never touched or whose contents are being discarded.
pub trait BufferPool {
    /// Token identifying one buffer.
    type Handle: Copy + PartialEq + core::fmt::Debug;

    /// Take a buffer from the pool.
    fn alloc(&mut self) -> Option<Self::Handle>;

    /// Bus address the hardware writes to.
    fn dma_addr(&self, handle: Self::Handle) -> DmaAddr;

    /// Usable buffer size in bytes.
    fn buf_size(&self) -> usize;

    /// CPU view of the buffer contents.
    fn data(&self, handle: Self::Handle) -> &[u8];

    /// Mutable CPU view, for in-place fixups before transmission.
    fn data_mut(&mut self, handle: Self::Handle) -> &mut [u8];

    /// Return a buffer after its contents were consumed.
    fn release(&mut self, handle: Self::Handle);

    /// Return an unused or discarded buffer.
    fn recycle(&mut self, handle: Self::Handle);

    /// Make `len` device-written bytes visible to the CPU. Coherent
    /// pools leave this as a no-op.
    fn sync_for_cpu(&mut self, handle: Self::Handle, len: usize) {
        let _ = (handle, len);
    }
}

// =============================================================================
// Upstream sink
// =============================================================================

/// A fully reassembled receive packet, borrowed from pool buffers for
/// the duration of [`PacketSink::deliver`].
#[derive(Debug)]
pub struct RxFrame<'a> {
    /// Packet payload, split across the buffers it arrived in
    pub segments: &'a [&'a [u8]],
    /// Total payload length
    pub len: usize,
    /// RX queue the packet arrived on
    pub queue: u8,
    /// Transport checksum already verified by hardware
    pub checksum_ok: bool,
}

/// Upstream network stack callbacks.
pub trait PacketSink {
    /// Hand a received packet upstream. Segment borrows end when the
    /// call returns.
    fn deliver(&mut self, frame: &RxFrame<'_>);

    /// Stop accepting transmit traffic on `queue`.
    fn pause_queue(&mut self, queue: u8);

    /// Resume transmit traffic on `queue`.
    fn resume_queue(&mut self, queue: u8);

    /// Report a carrier transition.
    fn carrier_changed(&mut self, up: bool);
}
