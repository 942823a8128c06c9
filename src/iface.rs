//! Interface facade.
//!
//! [`EthInterface`] bundles one lane configuration with its transmit
//! and receive queues, counters, and link supervisor, and sequences
//! bring-up and teardown. The owner provides the hardware seams on
//! each call so the same interface state works against real silicon
//! and against the test fakes.

use embedded_hal::delay::DelayNs;

use crate::config::{LaneConfig, RetimerParams};
use crate::constants::DEFAULT_RX_POLL_BUDGET;
use crate::dma::{BufferPool, DmaRxChannel, DmaTxChannel, PacketSink};
use crate::error::{ConfigError, ConfigResult};
use crate::link::{LinkFlags, LinkHardware, LinkOutcome, LinkSupervisor, PollVerdict};
use crate::rev::RevData;
use crate::rx::RxQueue;
use crate::stats::RingStats;
use crate::tx::{TxPacket, TxQueue, TxStatus};

/// One network interface: a lane group, one TX queue, one RX queue.
#[derive(Debug)]
pub struct EthInterface<H: Copy, const TX: usize, const RX: usize> {
    /// Link state machine
    pub link: LinkSupervisor,
    /// Transmit queue
    pub tx: TxQueue<H, TX>,
    /// Receive queue
    pub rx: RxQueue<H, RX>,
    /// Datapath counters
    pub stats: RingStats,
    rev: RevData,
}

impl<H: Copy, const TX: usize, const RX: usize> EthInterface<H, TX, RX> {
    /// Build an interface after validating its configuration.
    pub fn new(cfg: LaneConfig, rev: RevData, rtm: RetimerParams) -> ConfigResult<Self> {
        // The rings keep one slot empty to tell full from empty, so a
        // ring shorter than two slots can never hold a descriptor.
        if TX < 2 || RX < 2 {
            return Err(ConfigError::InvalidRingSize);
        }
        cfg.validate()?;
        let queue = cfg.rx_queue;
        Ok(Self {
            link: LinkSupervisor::new(cfg, rev, rtm),
            tx: TxQueue::new(queue),
            rx: RxQueue::new(queue),
            stats: RingStats::new(),
            rev,
        })
    }

    /// Silicon capabilities this interface was built for.
    #[must_use]
    pub const fn rev(&self) -> &RevData {
        &self.rev
    }

    /// Bring the interface up: post receive buffers and request a link
    /// bring-up with a SerDes restart. The caller runs
    /// [`service_link`](Self::service_link) when this returns `true`.
    pub fn open<CR, P>(&mut self, rx_chan: &mut CR, pool: &mut P, flags: &LinkFlags) -> bool
    where
        CR: DmaRxChannel,
        P: BufferPool<Handle = H>,
    {
        let unused = self.rx.unused();
        self.rx.fill_buffers(rx_chan, pool, unused, &mut self.stats);
        flags.request(true)
    }

    /// Run the link configuration job if one is requested. Returns the
    /// outcome, or `None` when nothing was pending.
    pub fn service_link<HW, S, D>(
        &mut self,
        flags: &LinkFlags,
        hw: &mut HW,
        sink: &mut S,
        delay: &mut D,
    ) -> Option<LinkOutcome>
    where
        HW: LinkHardware,
        S: PacketSink,
        D: DelayNs,
    {
        if !flags.is_pending() {
            return None;
        }
        Some(self.link.run(flags, hw, sink, delay))
    }

    /// Periodic link monitoring step.
    pub fn poll_link<HW: LinkHardware>(&mut self, flags: &LinkFlags, hw: &mut HW) -> PollVerdict {
        self.link.poll_link(flags, hw)
    }

    /// Submit one packet on the transmit queue.
    pub fn transmit<CT, P, S>(
        &mut self,
        tx_chan: &mut CT,
        pool: &mut P,
        sink: &mut S,
        pkt: &TxPacket<H>,
    ) -> TxStatus
    where
        CT: DmaTxChannel,
        P: BufferPool<Handle = H>,
        S: PacketSink,
    {
        self.tx.transmit(
            tx_chan,
            pool,
            sink,
            pkt,
            &self.rev,
            &self.link.cfg,
            &mut self.stats,
        )
    }

    /// Reclaim finished transmit jobs. Driven from the TX completion
    /// interrupt or the service loop.
    pub fn reclaim_tx<CT, P, S>(&mut self, tx_chan: &mut CT, pool: &mut P, sink: &mut S) -> usize
    where
        CT: DmaTxChannel,
        P: BufferPool<Handle = H>,
        S: PacketSink,
    {
        self.tx
            .reclaim(tx_chan, pool, sink, self.link.carrier(), &mut self.stats)
    }

    /// Drain received buffers with the default budget.
    pub fn poll_rx<CR, P, S>(&mut self, rx_chan: &mut CR, pool: &mut P, sink: &mut S) -> usize
    where
        CR: DmaRxChannel,
        P: BufferPool<Handle = H>,
        S: PacketSink,
    {
        self.rx.poll(
            rx_chan,
            pool,
            sink,
            DEFAULT_RX_POLL_BUDGET,
            &self.rev,
            &mut self.stats,
        )
    }

    /// Take the interface down and return every buffer to the pool.
    pub fn stop<HW, S, CT, CR, P>(
        &mut self,
        flags: &LinkFlags,
        hw: &mut HW,
        sink: &mut S,
        tx_chan: &mut CT,
        rx_chan: &mut CR,
        pool: &mut P,
    ) where
        HW: LinkHardware,
        S: PacketSink,
        CT: DmaTxChannel,
        CR: DmaRxChannel,
        P: BufferPool<Handle = H>,
    {
        self.link.down(flags, hw, sink);
        self.tx.release_all(tx_chan, pool);
        self.rx.release_all(rx_chan, pool);
    }

    /// Transceiver cable plugged in: bring the link up from scratch.
    pub fn transceiver_connected(&self, flags: &LinkFlags) -> bool {
        flags.request(true)
    }

    /// Transceiver cable pulled: drop the link.
    pub fn transceiver_disconnected<HW, S>(&mut self, flags: &LinkFlags, hw: &mut HW, sink: &mut S)
    where
        HW: LinkHardware,
        S: PacketSink,
    {
        self.link.down(flags, hw, sink);
    }

    /// Retimer lost clock-data recovery: reconfigure without a SerDes
    /// restart.
    pub fn cdr_lost(&self, flags: &LinkFlags) -> bool {
        flags.request(false)
    }

    /// Lane bitmask for matching link-down interrupt lines.
    pub fn lane_mask(&self) -> u32 {
        self.link.cfg.lane_mask()
    }
}

// =============================================================================
// Tests
// =============================================================================
