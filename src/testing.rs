//! Recording fakes for the hardware seams. Test-only.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::config::LaneConfig;
use crate::constants::TX_HEADER_SIZE;
use crate::dma::{
    BufferPool, DmaAddr, DmaRxChannel, DmaTxChannel, PacketSink, RxCompletion, RxFrame, SgEntry,
};
use crate::error::{DmaError, DmaResult, LinkError, LinkResult};
use crate::link::{LinkFlags, LinkHardware, LinkIrqRegs};

// =============================================================================
// TX channel
// =============================================================================

pub struct MockTxChannel {
    next_job: u64,
    completed: u64,
    submissions: Vec<(u64, usize)>,
    headers: BTreeMap<u64, [u8; TX_HEADER_SIZE]>,
    active_mappings: usize,
    map_budget: Option<usize>,
    fail_prepare: bool,
}

impl MockTxChannel {
    pub fn new() -> Self {
        Self {
            next_job: 0,
            completed: 0,
            submissions: Vec::new(),
            headers: BTreeMap::new(),
            active_mappings: 0,
            map_budget: None,
            fail_prepare: false,
        }
    }

    /// Allow `n` successful maps, fail every one after that.
    pub fn fail_map_after(&mut self, n: usize) {
        self.map_budget = Some(n);
    }

    pub fn fail_prepare(&mut self) {
        self.fail_prepare = true;
    }

    pub fn active_mappings(&self) -> usize {
        self.active_mappings
    }

    pub fn submitted(&self) -> usize {
        self.submissions.len()
    }

    pub fn last_header(&self) -> Option<&[u8; TX_HEADER_SIZE]> {
        let (job, _) = self.submissions.last()?;
        self.headers.get(job)
    }

    /// Mark the first `n` submitted jobs finished.
    pub fn complete_jobs(&mut self, n: usize) {
        if let Some(&(job, segs)) = self.submissions.get(n - 1) {
            self.completed = job + segs as u64;
        }
    }

    pub fn complete_all(&mut self) {
        let n = self.submissions.len();
        if n > 0 {
            self.complete_jobs(n);
        }
    }
}

impl DmaTxChannel for MockTxChannel {
    fn map(&mut self, addr: DmaAddr, _len: usize) -> DmaResult<DmaAddr> {
        if let Some(budget) = self.map_budget {
            if budget == 0 {
                return Err(DmaError::MapFailed);
            }
            self.map_budget = Some(budget - 1);
        }
        self.active_mappings += 1;
        Ok(addr)
    }

    fn unmap(&mut self, _addr: DmaAddr, _len: usize) {
        assert!(self.active_mappings > 0, "unbalanced unmap");
        self.active_mappings -= 1;
    }

    fn prepare(&mut self, entries: &[SgEntry]) -> DmaResult<u64> {
        if self.fail_prepare {
            return Err(DmaError::SubmitFailed);
        }
        let job = self.next_job;
        self.next_job += entries.len() as u64;
        Ok(job)
    }

    fn header_slot(&mut self, job: u64) -> &mut [u8; TX_HEADER_SIZE] {
        self.headers.entry(job).or_insert([0; TX_HEADER_SIZE])
    }

    fn submit(&mut self, job: u64, segments: usize) {
        self.submissions.push((job, segments));
    }

    fn completed(&self) -> u64 {
        self.completed
    }
}

// =============================================================================
// RX channel
// =============================================================================

pub struct MockRxChannel {
    pending: VecDeque<DmaAddr>,
    completions: VecDeque<RxCompletion>,
    enqueued: usize,
    flushed: bool,
    fail_enqueue: bool,
}

impl MockRxChannel {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            completions: VecDeque::new(),
            enqueued: 0,
            flushed: false,
            fail_enqueue: false,
        }
    }

    pub fn fail_enqueue(&mut self) {
        self.fail_enqueue = true;
    }

    pub fn enqueued(&self) -> usize {
        self.enqueued
    }

    pub fn flushed(&self) -> bool {
        self.flushed
    }

    /// Complete the oldest posted buffer with `len` bytes written.
    pub fn complete_next(&mut self, len: usize, end_of_packet: bool) {
        let addr = self.pending.pop_front().expect("no buffer posted");
        self.completions.push_back(RxCompletion {
            addr,
            len,
            end_of_packet,
        });
    }
}

impl DmaRxChannel for MockRxChannel {
    fn enqueue(&mut self, addr: DmaAddr, _size: usize) -> DmaResult<()> {
        if self.fail_enqueue {
            return Err(DmaError::SubmitFailed);
        }
        self.pending.push_back(addr);
        self.enqueued += 1;
        Ok(())
    }

    fn completed(&mut self) -> Option<RxCompletion> {
        self.completions.pop_front()
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.flushed = true;
    }
}

// =============================================================================
// Buffer pool
// =============================================================================

pub struct MockPool {
    bufs: Vec<Vec<u8>>,
    free: VecDeque<usize>,
    buf_size: usize,
}

impl MockPool {
    pub fn new(count: usize, buf_size: usize) -> Self {
        Self {
            bufs: (0..count).map(|_| std::vec![0u8; buf_size]).collect(),
            free: (0..count).collect(),
            buf_size,
        }
    }

    /// Buffers currently held outside the pool.
    pub fn outstanding(&self) -> usize {
        self.bufs.len() - self.free.len()
    }

    /// Write one byte into a buffer, for staging fake frame contents.
    pub fn poke(&mut self, handle: usize, offset: usize, val: u8) {
        self.bufs[handle][offset] = val;
    }
}

impl BufferPool for MockPool {
    type Handle = usize;

    fn alloc(&mut self) -> Option<usize> {
        self.free.pop_front()
    }

    fn dma_addr(&self, handle: usize) -> DmaAddr {
        0x8000_0000 + (handle as u64) * 0x1000
    }

    fn buf_size(&self) -> usize {
        self.buf_size
    }

    fn data(&self, handle: usize) -> &[u8] {
        &self.bufs[handle]
    }

    fn data_mut(&mut self, handle: usize) -> &mut [u8] {
        &mut self.bufs[handle]
    }

    fn release(&mut self, handle: usize) {
        assert!(!self.free.contains(&handle), "double release");
        self.free.push_back(handle);
    }

    fn recycle(&mut self, handle: usize) {
        assert!(!self.free.contains(&handle), "double recycle");
        self.free.push_back(handle);
    }
}

// =============================================================================
// Packet sink
// =============================================================================

/// Owned copy of a delivered frame's shape.
pub struct DeliveredFrame {
    pub len: usize,
    pub nsegs: usize,
    pub queue: u8,
    pub checksum_ok: bool,
}

pub struct MockSink {
    delivered: Vec<DeliveredFrame>,
    paused: Vec<u8>,
    resumed: Vec<u8>,
    carrier: Vec<bool>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            delivered: Vec::new(),
            paused: Vec::new(),
            resumed: Vec::new(),
            carrier: Vec::new(),
        }
    }

    pub fn delivered(&self) -> &[DeliveredFrame] {
        &self.delivered
    }

    pub fn paused_queues(&self) -> &[u8] {
        &self.paused
    }

    pub fn resumed_queues(&self) -> &[u8] {
        &self.resumed
    }

    pub fn carrier_events(&self) -> &[bool] {
        &self.carrier
    }
}

impl PacketSink for MockSink {
    fn deliver(&mut self, frame: &RxFrame<'_>) {
        self.delivered.push(DeliveredFrame {
            len: frame.len,
            nsegs: frame.segments.len(),
            queue: frame.queue,
            checksum_ok: frame.checksum_ok,
        });
    }

    fn pause_queue(&mut self, queue: u8) {
        self.paused.push(queue);
    }

    fn resume_queue(&mut self, queue: u8) {
        self.resumed.push(queue);
    }

    fn carrier_changed(&mut self, up: bool) {
        self.carrier.push(up);
    }
}

// =============================================================================
// Link hardware
// =============================================================================

pub struct MockLinkHw<'a> {
    transceiver: bool,
    link_up: bool,
    retimer: bool,
    cdr_locked: bool,
    fail_setup_remaining: usize,
    setup_calls: usize,
    setup_restarts: Vec<bool>,
    quiesce_calls: usize,
    tx_started: bool,
    irq_armed: u32,
    irq_disarmed: u32,
    cancel_after: Option<(usize, &'a LinkFlags)>,
}

impl<'a> MockLinkHw<'a> {
    pub fn new() -> Self {
        Self {
            transceiver: true,
            link_up: true,
            retimer: false,
            cdr_locked: true,
            fail_setup_remaining: 0,
            setup_calls: 0,
            setup_restarts: Vec::new(),
            quiesce_calls: 0,
            tx_started: false,
            irq_armed: 0,
            irq_disarmed: 0,
            cancel_after: None,
        }
    }

    pub fn set_transceiver_connected(&mut self, v: bool) {
        self.transceiver = v;
    }

    pub fn set_link_up(&mut self, v: bool) {
        self.link_up = v;
    }

    pub fn set_retimer_present(&mut self, v: bool) {
        self.retimer = v;
    }

    pub fn set_cdr_locked(&mut self, v: bool) {
        self.cdr_locked = v;
    }

    pub fn fail_setup_link_times(&mut self, n: usize) {
        self.fail_setup_remaining = n;
    }

    /// Cancel the job through `flags` once `n` setup attempts ran.
    pub fn cancel_after_setup_calls(&mut self, n: usize, flags: &'a LinkFlags) {
        self.cancel_after = Some((n, flags));
    }

    pub fn setup_link_calls(&self) -> usize {
        self.setup_calls
    }

    pub fn setup_link_restarts(&self) -> &[bool] {
        &self.setup_restarts
    }

    pub fn quiesce_calls(&self) -> usize {
        self.quiesce_calls
    }

    pub fn tx_started(&self) -> bool {
        self.tx_started
    }

    pub fn irq_armed_mask(&self) -> u32 {
        self.irq_armed
    }

    pub fn irq_disarmed_mask(&self) -> u32 {
        self.irq_disarmed
    }
}

impl LinkHardware for MockLinkHw<'_> {
    fn transceiver_connected(&self) -> bool {
        self.transceiver
    }

    fn mac_setup_link(&mut self, _cfg: &LaneConfig, restart_serdes: bool) -> LinkResult<()> {
        self.setup_calls += 1;
        self.setup_restarts.push(restart_serdes);
        if let Some((n, flags)) = self.cancel_after {
            if self.setup_calls >= n {
                flags.cancel();
            }
        }
        if self.fail_setup_remaining > 0 {
            self.fail_setup_remaining -= 1;
            return Err(LinkError::NegotiationFailed);
        }
        Ok(())
    }

    fn mac_link_up(&mut self, _cfg: &LaneConfig) -> bool {
        self.link_up
    }

    fn retimer_present(&self) -> bool {
        self.retimer
    }

    fn retimer_cdr_locked(&mut self, _channel: u8) -> bool {
        self.cdr_locked
    }

    fn quiesce_tx(&mut self) {
        self.quiesce_calls += 1;
    }

    fn start_tx(&mut self) {
        self.tx_started = true;
    }

    fn enable_link_down_irq(&mut self, lane_mask: u32) {
        self.irq_armed |= lane_mask;
    }

    fn disable_link_down_irq(&mut self, lane_mask: u32) {
        self.irq_disarmed |= lane_mask;
    }
}

// =============================================================================
// IRQ registers
// =============================================================================

pub struct MockIrqRegs {
    latched: u32,
    enabled: u32,
}

impl MockIrqRegs {
    pub fn new(latched: u32, enabled: u32) -> Self {
        Self { latched, enabled }
    }
}

impl LinkIrqRegs for MockIrqRegs {
    fn latched(&mut self) -> u32 {
        core::mem::take(&mut self.latched)
    }

    fn enabled(&self) -> u32 {
        self.enabled
    }

    fn disable(&mut self, mask: u32) {
        self.enabled &= !mask;
    }

    fn enable(&mut self, mask: u32) {
        self.enabled |= mask;
    }
}

// =============================================================================
// Delays
// =============================================================================

/// Delay that does not wait at all.
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Delay that only records how long it was asked to wait.
pub struct FakeDelay {
    total_ns: u64,
}

impl FakeDelay {
    pub fn new() -> Self {
        Self { total_ns: 0 }
    }

    pub fn total_ms(&self) -> u32 {
        (self.total_ns / 1_000_000) as u32
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
